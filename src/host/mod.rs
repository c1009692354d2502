//! Host bindings
//!
//! The relay lives inside a media server and never touches sockets or codecs
//! itself. Everything it needs from the server goes through the [`Host`]
//! trait, and every duplicate it publishes goes through an
//! [`OutboundPublisher`] opened by the host.
//!
//! Calls into the host are made while the engine holds its table lock, so
//! implementations must return quickly and must not block on I/O. A host whose
//! publish path can block should hand the work to its own task and return.

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;

use bytes::Bytes;

use crate::error::Result;

/// Default virtual host name
pub const DEFAULT_VHOST: &str = "_defaultVHost_";

/// Default application instance name
pub const DEFAULT_APP_INSTANCE: &str = "_definst_";

/// Stable identity of a source stream on the host
///
/// Names can be empty for a while after a stream is created, so the relay
/// keys its state by this id rather than by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Target application instance (vhost + app + instance)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetApp {
    /// Virtual host name
    pub vhost: String,
    /// Application name (e.g., "live")
    pub app: String,
    /// Application instance name (e.g., "_definst_")
    pub instance: String,
}

impl TargetApp {
    /// Create a target from its parts
    pub fn new(
        vhost: impl Into<String>,
        app: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            vhost: vhost.into(),
            app: app.into(),
            instance: instance.into(),
        }
    }

    /// Parse an `app` or `app/instance` context string
    ///
    /// A missing or empty instance falls back to [`DEFAULT_APP_INSTANCE`].
    /// Anything after the second `/` is ignored.
    pub fn parse(vhost: impl Into<String>, context: &str) -> Self {
        let mut parts = context.split('/');
        let app = parts.next().unwrap_or_default().trim();
        let instance = match parts.next().map(str::trim) {
            Some(inst) if !inst.is_empty() => inst,
            _ => DEFAULT_APP_INSTANCE,
        };

        Self::new(vhost, app, instance)
    }
}

impl fmt::Display for TargetApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.vhost, self.app, self.instance)
    }
}

/// Unsubscribe capability returned by [`Host::subscribe_packets`]
///
/// Calling [`Subscription::unsubscribe`] (or dropping the value) detaches the
/// listener from the host exactly once.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a detach callback
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to detach
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Detach the listener now
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.cancel.is_some())
            .finish()
    }
}

/// Outbound publish session opened on a target application instance
pub trait OutboundPublisher: Send {
    /// Set the stream type ("live", "record", ...) before publishing
    fn set_stream_type(&mut self, stream_type: &str);

    /// Start publishing under the given stream name
    fn publish(&mut self, stream_name: &str) -> Result<()>;

    /// Append an audio payload
    fn add_audio(&mut self, data: Bytes, timestamp: u64) -> Result<()>;

    /// Append a video payload
    fn add_video(&mut self, data: Bytes, timestamp: u64) -> Result<()>;

    /// Append a data (script/metadata) payload
    fn add_data(&mut self, data: Bytes, timestamp: u64) -> Result<()>;

    /// Stop publishing
    fn unpublish(&mut self);

    /// Release the session
    fn close(&mut self);
}

/// Callback surface the relay calls back into
pub trait Host: Send + Sync + 'static {
    /// Current name of a source stream; empty while unresolved
    fn stream_name(&self, stream: StreamId) -> String;

    /// Whether the source stream still exists on the source application
    fn stream_exists(&self, stream: StreamId) -> bool;

    /// Whether `name` is already a stream on the target application instance
    fn destination_exists(&self, target: &TargetApp, name: &str) -> bool;

    /// Default stream type of the target application instance
    fn default_stream_type(&self, target: &TargetApp) -> String;

    /// Open a new outbound publisher on the target application instance
    fn open_publisher(&self, target: &TargetApp) -> Result<Box<dyn OutboundPublisher>>;

    /// Attach the relay's packet listener to a source stream
    fn subscribe_packets(&self, stream: StreamId) -> Subscription;

    /// Ask to be told (via `on_target_destroyed`) when the target instance goes away
    fn watch_target(&self, target: &TargetApp);

    /// Undo [`Host::watch_target`]
    fn unwatch_target(&self, target: &TargetApp);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_target_parse_app_and_instance() {
        let target = TargetApp::parse(DEFAULT_VHOST, "live/studio");
        assert_eq!(target.app, "live");
        assert_eq!(target.instance, "studio");
        assert_eq!(target.vhost, DEFAULT_VHOST);
    }

    #[test]
    fn test_target_parse_defaults_instance() {
        assert_eq!(TargetApp::parse("v", "live").instance, DEFAULT_APP_INSTANCE);
        assert_eq!(TargetApp::parse("v", "live/").instance, DEFAULT_APP_INSTANCE);
    }

    #[test]
    fn test_target_display() {
        let target = TargetApp::new("vh", "live", "_definst_");
        assert_eq!(target.to_string(), "vh/live/_definst_");
    }

    #[test]
    fn test_subscription_detaches_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sub.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_detaches_on_drop() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        {
            let _sub = Subscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
