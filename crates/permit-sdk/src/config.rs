//! Simulation configuration.

use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a failed search affects the rest of the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExhaustionPolicy {
    /// The first critical section that finds nothing ends the run for
    /// everyone.
    #[default]
    SingleShot,
    /// Every critical section consumes one line; the run ends once every
    /// line has been examined or one was claimed.
    Exhaustive,
}

impl fmt::Display for ExhaustionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustionPolicy::SingleShot => write!(f, "single-shot"),
            ExhaustionPolicy::Exhaustive => write!(f, "exhaustive"),
        }
    }
}

impl FromStr for ExhaustionPolicy {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single-shot" | "single_shot" | "singleshot" => Ok(ExhaustionPolicy::SingleShot),
            "exhaustive" => Ok(ExhaustionPolicy::Exhaustive),
            other => Err(SimError::InvalidArgument(format!(
                "unknown exhaustion policy '{}'",
                other
            ))),
        }
    }
}

/// Configuration for a simulation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of competing nodes (ids `1..=node_count`).
    pub node_count: u32,
    /// Row count of the candidate source. Metadata only.
    pub rows: u32,
    /// Column count of the candidate source. Metadata only.
    pub cols: u32,
    /// What a failed search means for the run.
    pub policy: ExhaustionPolicy,
    /// Upper bound of the random pause before each request (in milliseconds).
    /// Zero disables pausing.
    pub think_delay_ms: u64,
    /// Seed for the per-node pause generators. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            node_count: 3,
            rows: 0,
            cols: 0,
            policy: ExhaustionPolicy::SingleShot,
            think_delay_ms: 0,
            seed: None,
            event_capacity: 256,
        }
    }
}

impl SimulationConfig {
    /// Check the values before any actor is started.
    pub fn validate(&self) -> Result<()> {
        if self.node_count == 0 {
            return Err(SimError::InvalidArgument(
                "node count must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(SimError::InvalidArgument(
                "event capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for simulation configuration.
pub struct SimulationConfigBuilder {
    config: SimulationConfig,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SimulationConfig::default(),
        }
    }

    pub fn node_count(mut self, count: u32) -> Self {
        self.config.node_count = count;
        self
    }

    pub fn shape(mut self, rows: u32, cols: u32) -> Self {
        self.config.rows = rows;
        self.config.cols = cols;
        self
    }

    pub fn policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn think_delay(mut self, ms: u64) -> Self {
        self.config.think_delay_ms = ms;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn build(self) -> SimulationConfig {
        self.config
    }
}

impl Default for SimulationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = SimulationConfigBuilder::new()
            .node_count(5)
            .shape(4, 8)
            .policy(ExhaustionPolicy::Exhaustive)
            .think_delay(20)
            .seed(7)
            .event_capacity(16)
            .build();

        assert_eq!(config.node_count, 5);
        assert_eq!((config.rows, config.cols), (4, 8));
        assert_eq!(config.policy, ExhaustionPolicy::Exhaustive);
        assert_eq!(config.think_delay_ms, 20);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.event_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_nodes_rejected() {
        let config = SimulationConfigBuilder::new().node_count(0).build();
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "single-shot".parse::<ExhaustionPolicy>().unwrap(),
            ExhaustionPolicy::SingleShot
        );
        assert_eq!(
            "exhaustive".parse::<ExhaustionPolicy>().unwrap(),
            ExhaustionPolicy::Exhaustive
        );
        assert!("sometimes".parse::<ExhaustionPolicy>().is_err());
        assert_eq!(ExhaustionPolicy::default().to_string(), "single-shot");
    }
}
