//! Engine configuration: sizing the shared region and choosing a starting
//! tempo, loaded from TOML.

use std::fmt;

use serde::Deserialize;

use crate::constants::{DEFAULT_BPM, DEFAULT_PPQ};

/// Error produced while loading or validating an [`EngineConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    Parse(String),
    /// A numeric field was present but out of range.
    InvalidValue(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "failed to parse config: {msg}"),
            ConfigError::InvalidValue(field, reason) => {
                write!(f, "invalid value for `{field}`: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Sizing and startup parameters for a [`crate::region::Region`].
///
/// Every field here becomes a fixed capacity baked into the region at
/// construction time: none of them can change afterward without
/// reallocating the whole region, since the header, node heap, synapse
/// table, command ring, and ID table are all laid out back-to-back at
/// fixed offsets derived from these values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Total number of node slots, Zone A and Zone B combined.
    pub node_capacity: usize,
    /// Number of node slots reserved for Zone A (the CAS free-list region).
    /// The remainder of `node_capacity` is Zone B (bump-allocated).
    pub zone_a_capacity: usize,
    /// Number of synapse slots in the synapse table.
    pub synapse_slot_count: usize,
    /// Capacity of the UI-to-audio command ring, in records.
    pub ring_capacity: usize,
    /// Capacity of the source-id lookup table.
    pub id_table_capacity: usize,
    /// Audio sample rate in Hz, used to derive samples-per-tick.
    pub sample_rate: f64,
    /// Starting tempo in beats per minute.
    pub bpm: f64,
    /// Pulses per quarter note.
    pub ppq: u32,
    /// Number of ticks of lookahead the audio thread treats as a "safe
    /// zone" for newly inserted nodes (see `DESIGN.md` Open Questions).
    pub safe_zone_ticks: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_capacity: 4096,
            zone_a_capacity: 3072,
            synapse_slot_count: 4096,
            ring_capacity: 1024,
            id_table_capacity: 4096,
            sample_rate: 44_100.0,
            bpm: DEFAULT_BPM,
            ppq: DEFAULT_PPQ,
            safe_zone_ticks: 0,
        }
    }
}

impl EngineConfig {
    /// Parse an [`EngineConfig`] from a TOML document, then validate it.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse an [`EngineConfig`] from a file on disk.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Check the config for internally-consistent, nonzero capacities.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_capacity == 0 {
            return Err(ConfigError::InvalidValue("node_capacity", "must be nonzero".into()));
        }
        if self.zone_a_capacity == 0 || self.zone_a_capacity >= self.node_capacity {
            return Err(ConfigError::InvalidValue(
                "zone_a_capacity",
                "must be nonzero and less than node_capacity".into(),
            ));
        }
        if self.synapse_slot_count == 0 {
            return Err(ConfigError::InvalidValue("synapse_slot_count", "must be nonzero".into()));
        }
        if self.ring_capacity == 0 || !self.ring_capacity.is_power_of_two() {
            return Err(ConfigError::InvalidValue(
                "ring_capacity",
                "must be a nonzero power of two".into(),
            ));
        }
        if self.id_table_capacity == 0 {
            return Err(ConfigError::InvalidValue("id_table_capacity", "must be nonzero".into()));
        }
        if self.sample_rate <= 0.0 {
            return Err(ConfigError::InvalidValue("sample_rate", "must be positive".into()));
        }
        if self.bpm <= 0.0 {
            return Err(ConfigError::InvalidValue("bpm", "must be positive".into()));
        }
        if self.ppq == 0 {
            return Err(ConfigError::InvalidValue("ppq", "must be nonzero".into()));
        }
        Ok(())
    }

    /// Number of whole samples per tick at the current tempo and PPQ,
    /// truncated toward zero (§3 "samples_per_tick").
    pub fn samples_per_tick(&self) -> u32 {
        ((self.sample_rate * 60.0) / (self.bpm * self.ppq as f64)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config = EngineConfig::from_toml("bpm = 140.0\nppq = 480\n").unwrap();
        assert_eq!(config.bpm, 140.0);
        assert_eq!(config.ppq, 480);
        assert_eq!(config.node_capacity, 4096);
    }

    #[test]
    fn rejects_zone_a_capacity_not_less_than_node_capacity() {
        let mut config = EngineConfig::default();
        config.zone_a_capacity = config.node_capacity;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_power_of_two_ring_capacity() {
        let mut config = EngineConfig::default();
        config.ring_capacity = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn samples_per_tick_matches_known_values() {
        let config = EngineConfig {
            sample_rate: 48_000.0,
            bpm: 120.0,
            ppq: 960,
            ..EngineConfig::default()
        };
        // 48000 * 60 / (120 * 960) = 25
        assert_eq!(config.samples_per_tick(), 25);
    }
}
