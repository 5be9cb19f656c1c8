use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_statsd::Flavor;

/// Parameters used by the [`StatsdMeterRegistry`](crate::StatsdMeterRegistry).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsdConfig {
    /// Enables publishing.
    ///
    /// Defaults to `true`. A disabled registry accepts all recordings but never produces lines.
    pub enabled: bool,

    /// The dialect lines are written in.
    ///
    /// Defaults to `datadog`.
    pub flavor: Flavor,

    /// The host of the StatsD daemon.
    ///
    /// Defaults to `localhost`. A host with a scheme, such as `unixgram:///var/run/statsd.sock`,
    /// is used as the full address and `port` is ignored.
    pub host: String,

    /// The port of the StatsD daemon.
    ///
    /// Defaults to `8125`.
    pub port: u16,

    /// The maximum size of a packet sent to the StatsD daemon in bytes.
    ///
    /// Defaults to `1400`, which fits into the MTU of common networks.
    pub max_packet_length: usize,

    /// The interval in seconds at which the registry checks for a completed step.
    ///
    /// Defaults to `10` seconds.
    pub polling_frequency: u64,

    /// The length of a step in seconds.
    ///
    /// Defaults to `60` seconds. Counters report their increments and timers their observations
    /// within one step.
    pub step: u64,

    /// Publishes lines whose value did not change since the previous step.
    ///
    /// Defaults to `true`.
    pub publish_unchanged_meters: bool,

    /// The maximum number of lines waiting to be written to the sink.
    ///
    /// Defaults to `10000`. Lines published while the queue is full are dropped.
    pub queue_size: usize,
}

impl StatsdConfig {
    /// Returns the step as [`Duration`].
    pub fn step_duration(&self) -> Duration {
        Duration::from_secs(self.step)
    }

    /// Returns the polling frequency as [`Duration`].
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_frequency)
    }

    /// Returns the address of the StatsD daemon.
    pub fn addr(&self) -> String {
        if self.host.contains("://") {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for StatsdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flavor: Flavor::Datadog,
            host: "localhost".to_owned(),
            port: 8125,
            max_packet_length: 1400,
            polling_frequency: 10,
            step: 60,
            publish_unchanged_meters: true,
            queue_size: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: StatsdConfig = serde_json::from_str("{}").unwrap();

        insta::assert_debug_snapshot!(config, @r###"
        StatsdConfig {
            enabled: true,
            flavor: Datadog,
            host: "localhost",
            port: 8125,
            max_packet_length: 1400,
            polling_frequency: 10,
            step: 60,
            publish_unchanged_meters: true,
            queue_size: 10000,
        }
        "###);
    }

    #[test]
    fn test_deserialize() {
        let json = r#"{
            "flavor": "telegraf",
            "host": "metrics.internal",
            "port": 9125,
            "step": 10,
            "publish_unchanged_meters": false
        }"#;

        let config: StatsdConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.flavor, Flavor::Telegraf);
        assert_eq!(config.addr(), "metrics.internal:9125");
        assert_eq!(config.step_duration(), Duration::from_secs(10));
        assert_eq!(config.polling_interval(), Duration::from_secs(10));
        assert!(!config.publish_unchanged_meters);
    }

    #[test]
    fn test_unknown_flavor() {
        let result = serde_json::from_str::<StatsdConfig>(r#"{"flavor": "graphite"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_addr_with_scheme() {
        let config = StatsdConfig {
            host: "unixgram:///var/run/statsd.sock".to_owned(),
            ..Default::default()
        };
        assert_eq!(config.addr(), "unixgram:///var/run/statsd.sock");
    }
}
