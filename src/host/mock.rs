//! In-memory host for tests
//!
//! Records every call the relay makes so tests can assert on subscriptions,
//! publisher sessions and forwarded packets.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use super::{Host, OutboundPublisher, StreamId, Subscription, TargetApp};
use crate::error::{Error, Result};
use crate::media::{Packet, PacketKind};

/// Call recorded on a mock publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublisherEvent {
    StreamType(String),
    Publish(String),
    Audio(u64),
    Video(u64),
    Data(u64),
    Unpublish,
    Close,
}

#[derive(Debug, Default)]
struct PublisherRecord {
    target: Option<TargetApp>,
    name: Option<String>,
    events: Vec<PublisherEvent>,
    forwarded: Vec<Packet>,
}

#[derive(Debug, Default)]
struct MockState {
    names: HashMap<StreamId, String>,
    destinations: HashSet<(TargetApp, String)>,
    subscriptions: HashMap<StreamId, usize>,
    subscribe_calls: HashMap<StreamId, usize>,
    watched: Vec<TargetApp>,
    publishers: Vec<PublisherRecord>,
    fail_open: bool,
    fail_publish: bool,
    fail_forward: bool,
}

/// Host double backed by shared in-memory state
#[derive(Clone, Default)]
pub struct MockHost {
    state: Arc<Mutex<MockState>>,
    untracked_destinations: bool,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not register published duplicates as existing destinations
    pub fn without_destination_tracking(mut self) -> Self {
        self.untracked_destinations = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Create (or rename) a source stream; an empty name means unresolved
    pub fn set_stream_name(&self, stream: StreamId, name: &str) {
        self.state().names.insert(stream, name.to_string());
    }

    pub fn remove_stream(&self, stream: StreamId) {
        self.state().names.remove(&stream);
    }

    pub fn add_destination(&self, target: &TargetApp, name: &str) {
        self.state()
            .destinations
            .insert((target.clone(), name.to_string()));
    }

    pub fn remove_destination(&self, target: &TargetApp, name: &str) {
        self.state()
            .destinations
            .remove(&(target.clone(), name.to_string()));
    }

    pub fn fail_open(&self, fail: bool) {
        self.state().fail_open = fail;
    }

    pub fn fail_publish(&self, fail: bool) {
        self.state().fail_publish = fail;
    }

    pub fn fail_forward(&self, fail: bool) {
        self.state().fail_forward = fail;
    }

    pub fn is_subscribed(&self, stream: StreamId) -> bool {
        self.state().subscriptions.get(&stream).copied().unwrap_or(0) > 0
    }

    pub fn subscribe_calls(&self, stream: StreamId) -> usize {
        self.state()
            .subscribe_calls
            .get(&stream)
            .copied()
            .unwrap_or(0)
    }

    pub fn watched_targets(&self) -> Vec<TargetApp> {
        self.state().watched.clone()
    }

    pub fn publishers_opened(&self) -> usize {
        self.state().publishers.len()
    }

    pub fn publisher_events_at(&self, index: usize) -> Vec<PublisherEvent> {
        self.state()
            .publishers
            .get(index)
            .map(|p| p.events.clone())
            .unwrap_or_default()
    }

    /// Events of the most recent publisher published under `name`
    pub fn publisher_events(&self, name: &str) -> Vec<PublisherEvent> {
        self.find(name).map(|p| p.events.clone()).unwrap_or_default()
    }

    /// Target of the most recent publisher published under `name`
    pub fn publisher_target(&self, name: &str) -> Option<TargetApp> {
        self.find(name).and_then(|p| p.target.clone())
    }

    /// Packets forwarded to the most recent publisher published under `name`
    pub fn forwarded(&self, name: &str) -> Vec<Packet> {
        self.find(name)
            .map(|p| p.forwarded.clone())
            .unwrap_or_default()
    }

    /// Packets forwarded to every publisher
    pub fn total_forwarded(&self) -> usize {
        self.state()
            .publishers
            .iter()
            .map(|p| p.forwarded.len())
            .sum()
    }

    fn find(&self, name: &str) -> Option<PublisherSnapshot> {
        let state = self.state();
        state
            .publishers
            .iter()
            .rev()
            .find(|p| p.name.as_deref() == Some(name))
            .map(|p| PublisherSnapshot {
                target: p.target.clone(),
                events: p.events.clone(),
                forwarded: p.forwarded.clone(),
            })
    }
}

struct PublisherSnapshot {
    target: Option<TargetApp>,
    events: Vec<PublisherEvent>,
    forwarded: Vec<Packet>,
}

impl Host for MockHost {
    fn stream_name(&self, stream: StreamId) -> String {
        self.state().names.get(&stream).cloned().unwrap_or_default()
    }

    fn stream_exists(&self, stream: StreamId) -> bool {
        self.state().names.contains_key(&stream)
    }

    fn destination_exists(&self, target: &TargetApp, name: &str) -> bool {
        self.state()
            .destinations
            .contains(&(target.clone(), name.to_string()))
    }

    fn default_stream_type(&self, _target: &TargetApp) -> String {
        "live".to_string()
    }

    fn open_publisher(&self, target: &TargetApp) -> Result<Box<dyn OutboundPublisher>> {
        let mut state = self.state();
        if state.fail_open {
            return Err(Error::host("open_publisher", "application not loaded"));
        }

        let index = state.publishers.len();
        state.publishers.push(PublisherRecord {
            target: Some(target.clone()),
            ..Default::default()
        });

        Ok(Box::new(MockPublisher {
            state: Arc::clone(&self.state),
            index,
            target: target.clone(),
            track_destination: !self.untracked_destinations,
        }))
    }

    fn subscribe_packets(&self, stream: StreamId) -> Subscription {
        {
            let mut state = self.state();
            *state.subscriptions.entry(stream).or_insert(0) += 1;
            *state.subscribe_calls.entry(stream).or_insert(0) += 1;
        }

        let shared = Arc::clone(&self.state);
        Subscription::new(move || {
            let mut state = shared.lock().unwrap();
            if let Some(count) = state.subscriptions.get_mut(&stream) {
                *count = count.saturating_sub(1);
            }
        })
    }

    fn watch_target(&self, target: &TargetApp) {
        let mut state = self.state();
        if !state.watched.contains(target) {
            state.watched.push(target.clone());
        }
    }

    fn unwatch_target(&self, target: &TargetApp) {
        self.state().watched.retain(|t| t != target);
    }
}

struct MockPublisher {
    state: Arc<Mutex<MockState>>,
    index: usize,
    target: TargetApp,
    track_destination: bool,
}

impl MockPublisher {
    fn record(&self, event: PublisherEvent) {
        self.state.lock().unwrap().publishers[self.index]
            .events
            .push(event);
    }

    fn media(&self, event: PublisherEvent, packet: Packet) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_forward {
            return Err(Error::host("forward", "publisher rejected packet"));
        }
        let record = &mut state.publishers[self.index];
        record.events.push(event);
        record.forwarded.push(packet);
        Ok(())
    }
}

impl OutboundPublisher for MockPublisher {
    fn set_stream_type(&mut self, stream_type: &str) {
        self.record(PublisherEvent::StreamType(stream_type.to_string()));
    }

    fn publish(&mut self, stream_name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.publishers[self.index]
            .events
            .push(PublisherEvent::Publish(stream_name.to_string()));
        if state.fail_publish {
            return Err(Error::host("publish", "stream name rejected"));
        }
        state.publishers[self.index].name = Some(stream_name.to_string());
        if self.track_destination {
            state
                .destinations
                .insert((self.target.clone(), stream_name.to_string()));
        }
        Ok(())
    }

    fn add_audio(&mut self, data: Bytes, timestamp: u64) -> Result<()> {
        self.media(
            PublisherEvent::Audio(timestamp),
            Packet::new(PacketKind::Audio, data, timestamp),
        )
    }

    fn add_video(&mut self, data: Bytes, timestamp: u64) -> Result<()> {
        self.media(
            PublisherEvent::Video(timestamp),
            Packet::new(PacketKind::Video, data, timestamp),
        )
    }

    fn add_data(&mut self, data: Bytes, timestamp: u64) -> Result<()> {
        self.media(
            PublisherEvent::Data(timestamp),
            Packet::new(PacketKind::Data, data, timestamp),
        )
    }

    fn unpublish(&mut self) {
        let mut state = self.state.lock().unwrap();
        let record = &mut state.publishers[self.index];
        record.events.push(PublisherEvent::Unpublish);
        if let Some(name) = record.name.clone() {
            let key = (self.target.clone(), name);
            state.destinations.remove(&key);
        }
    }

    fn close(&mut self) {
        self.record(PublisherEvent::Close);
    }
}
