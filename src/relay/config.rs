//! Relay configuration
//!
//! Resolved once when the source application instance starts. The host
//! stores options as string properties prefixed with
//! [`PROPERTY_PREFIX`] and expands any variables in them before the relay
//! reads them.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::host::{TargetApp, DEFAULT_VHOST};

/// Prefix shared by every relay property key
pub const PROPERTY_PREFIX: &str = "duplicateStreams";

/// Default rule expression
pub const DEFAULT_STREAM_NAMES: &str = "*";

/// Default target application context
pub const DEFAULT_TARGET_APP: &str = "live/_definst_";

/// Default suffix appended to duplicate stream names
pub const DEFAULT_NAME_SUFFIX: &str = "_dest";

/// Default restart delay
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(10_000);

/// Default delay buffer capacity in packets
pub const DEFAULT_MAX_BUFFERED_PACKETS: usize = 100;

/// Relay configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Rule expression selecting source streams
    pub stream_names: String,

    /// Application instance the duplicates are published to
    pub target_app: TargetApp,

    /// Suffix appended to the source name to form the destination name
    pub name_suffix: String,

    /// Schedule a restart after a fatal relay failure
    pub restart_enabled: bool,

    /// Delay before a scheduled restart fires
    pub restart_delay: Duration,

    /// Packets held while a stream name is unresolved
    pub max_buffered_packets: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            stream_names: DEFAULT_STREAM_NAMES.to_string(),
            target_app: TargetApp::parse(DEFAULT_VHOST, DEFAULT_TARGET_APP),
            name_suffix: DEFAULT_NAME_SUFFIX.to_string(),
            restart_enabled: true,
            restart_delay: DEFAULT_RESTART_DELAY,
            max_buffered_packets: DEFAULT_MAX_BUFFERED_PACKETS,
        }
    }
}

impl RelayConfig {
    /// Build a config from host properties
    ///
    /// Keys are matched with the [`PROPERTY_PREFIX`] prefix
    /// (`duplicateStreamsStreamNames`, `duplicateStreamsTargetAppName`, ...).
    /// Unknown keys are ignored and missing keys keep their defaults.
    pub fn from_properties<'a, I>(properties: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = Self::default();
        let mut vhost = DEFAULT_VHOST.to_string();
        let mut app_context = DEFAULT_TARGET_APP.to_string();

        for (key, value) in properties {
            let Some(name) = key.strip_prefix(PROPERTY_PREFIX) else {
                continue;
            };

            match name {
                "StreamNames" => config.stream_names = value.to_string(),
                "TargetVHostName" => vhost = value.to_string(),
                "TargetAppName" => app_context = value.to_string(),
                "StreamNameSuffix" => config.name_suffix = value.to_string(),
                "DoRestarts" => config.restart_enabled = parse_bool(key, value)?,
                "RestartTimeout" => {
                    config.restart_delay = Duration::from_millis(parse_number(key, value)?)
                }
                "MaxBufferedPackets" => {
                    config.max_buffered_packets = usize::try_from(parse_number(key, value)?)
                        .map_err(|_| invalid(key, value))?
                }
                _ => {
                    tracing::debug!(key = key, "Ignoring unknown relay property");
                }
            }
        }

        config.target_app = TargetApp::parse(vhost, &app_context);
        Ok(config)
    }

    /// Set the rule expression
    pub fn stream_names(mut self, rule: impl Into<String>) -> Self {
        self.stream_names = rule.into();
        self
    }

    /// Set the target application instance
    pub fn target_app(mut self, target: TargetApp) -> Self {
        self.target_app = target;
        self
    }

    /// Set the destination name suffix
    pub fn name_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.name_suffix = suffix.into();
        self
    }

    /// Disable restarts after fatal failures
    pub fn disable_restarts(mut self) -> Self {
        self.restart_enabled = false;
        self
    }

    /// Set the restart delay
    pub fn restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Set the delay buffer capacity
    pub fn max_buffered_packets(mut self, max: usize) -> Self {
        self.max_buffered_packets = max;
        self
    }

    /// Destination name for a source stream name
    pub fn destination_name(&self, source_name: &str) -> String {
        format!("{}{}", source_name, self.name_suffix)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> Error {
    Error::InvalidProperty {
        key: key.to_string(),
        value: value.to_string(),
    }
}
