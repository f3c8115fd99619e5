//! Session configuration: arena and callback geometry from a TOML file.
//!
//! Every field is optional in the file; omitted fields take the same
//! defaults the library uses, so an empty file is a valid session.

use std::path::Path;

use pulso_arena::ArenaConfig;
use pulso_playback::QuantumConfig;
use serde::{Deserialize, Serialize};

/// Errors from loading or validating a session file.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The file could not be read.
    #[error("failed to read session file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for a session.
    #[error("failed to parse session file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values parsed but make no sense together.
    #[error("invalid session: {0}")]
    Invalid(String),
}

/// One live session's sizing and timing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Total node slots in the arena.
    pub node_capacity: u32,
    /// First Zone-B node index. Defaults to half the capacity.
    pub zone_split: Option<u32>,
    /// Pulses per quarter note.
    pub ppq: u32,
    /// Initial tempo.
    pub bpm: u32,
    /// Structural-edit exclusion window in ticks.
    pub safe_zone_ticks: u32,
    /// Command ring capacity (power of two).
    pub ring_capacity: u32,
    /// Groove template slots.
    pub groove_slots: u32,
    /// Frames per rendering quantum.
    pub quantum_frames: u32,
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            node_capacity: 4096,
            zone_split: None,
            ppq: 480,
            bpm: 120,
            safe_zone_ticks: 960,
            ring_capacity: 1024,
            groove_slots: 8,
            quantum_frames: 128,
            sample_rate: 48_000,
        }
    }
}

impl SessionConfig {
    /// Load a session from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), SessionError> {
        if self.node_capacity == 0 {
            return Err(SessionError::Invalid("node_capacity must be nonzero".into()));
        }
        if let Some(split) = self.zone_split {
            if split == 0 || split > self.node_capacity {
                return Err(SessionError::Invalid(format!(
                    "zone_split {split} must lie in 1..={}",
                    self.node_capacity
                )));
            }
        }
        if !self.ring_capacity.is_power_of_two() {
            return Err(SessionError::Invalid(format!(
                "ring_capacity {} must be a power of two",
                self.ring_capacity
            )));
        }
        if self.quantum_frames == 0 || self.sample_rate == 0 {
            return Err(SessionError::Invalid(
                "quantum_frames and sample_rate must be nonzero".into(),
            ));
        }
        Ok(())
    }

    /// Arena sizing derived from this session.
    pub fn arena_config(&self) -> ArenaConfig {
        let defaults = ArenaConfig::with_capacity(self.node_capacity);
        ArenaConfig {
            node_capacity: self.node_capacity,
            zone_split: self.zone_split.unwrap_or(defaults.zone_split),
            ring_capacity: self.ring_capacity,
            groove_slots: self.groove_slots,
            ppq: self.ppq,
            bpm: self.bpm,
            safe_zone_ticks: self.safe_zone_ticks,
        }
    }

    /// Audio callback geometry derived from this session.
    pub fn quantum_config(&self) -> QuantumConfig {
        QuantumConfig {
            sample_rate: f64::from(self.sample_rate),
            frames: self.quantum_frames,
        }
    }
}
