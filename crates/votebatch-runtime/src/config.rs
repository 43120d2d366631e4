//! Poll configuration

use crate::{Result, VoteBatchError};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Deepest credential tree the toolkit accepts (2^32 voters)
pub const MAX_TREE_DEPTH: usize = 32;

/// Parameters of one voting round.
///
/// The relation, and therefore the proving key, is specialised to
/// `poll_id`, `max_options`, `batch_capacity` and `tree_depth`. The
/// remaining fields only affect the off-circuit services.
///
/// # Examples
///
/// ```
/// use votebatch_runtime::PollConfig;
///
/// let config = PollConfig::new(7, 2);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_options, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    pub poll_id: u64,
    pub max_options: usize,
    #[serde(default = "default_batch_capacity")]
    pub batch_capacity: usize,
    #[serde(default = "default_tree_depth")]
    pub tree_depth: usize,
    /// Seconds an accepted batch stays open to challenges
    #[serde(default = "default_dispute_window")]
    pub dispute_window_secs: u64,
    /// Seconds a collecting batch accepts votes before it is sealed
    #[serde(default = "default_voting_window")]
    pub voting_window_secs: u64,
    /// Proving attempts per batch before it is marked failed
    #[serde(default = "default_prove_attempts")]
    pub max_prove_attempts: u32,
}

fn default_batch_capacity() -> usize {
    4
}

fn default_tree_depth() -> usize {
    8
}

fn default_dispute_window() -> u64 {
    3600
}

fn default_voting_window() -> u64 {
    600
}

fn default_prove_attempts() -> u32 {
    3
}

impl PollConfig {
    pub fn new(poll_id: u64, max_options: usize) -> Self {
        Self {
            poll_id,
            max_options,
            batch_capacity: default_batch_capacity(),
            tree_depth: default_tree_depth(),
            dispute_window_secs: default_dispute_window(),
            voting_window_secs: default_voting_window(),
            max_prove_attempts: default_prove_attempts(),
        }
    }

    pub fn with_batch_capacity(mut self, batch_capacity: usize) -> Self {
        self.batch_capacity = batch_capacity;
        self
    }

    pub fn with_tree_depth(mut self, tree_depth: usize) -> Self {
        self.tree_depth = tree_depth;
        self
    }

    pub fn with_dispute_window(mut self, secs: u64) -> Self {
        self.dispute_window_secs = secs;
        self
    }

    pub fn with_voting_window(mut self, secs: u64) -> Self {
        self.voting_window_secs = secs;
        self
    }

    pub fn with_prove_attempts(mut self, attempts: u32) -> Self {
        self.max_prove_attempts = attempts;
        self
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_options < 2 {
            return Err(VoteBatchError::invalid_config("a poll needs at least 2 options"));
        }
        if self.batch_capacity == 0 {
            return Err(VoteBatchError::invalid_config("batch capacity must be positive"));
        }
        if self.tree_depth == 0 || self.tree_depth > MAX_TREE_DEPTH {
            return Err(VoteBatchError::invalid_config(format!(
                "tree depth must be in 1..={}, got {}",
                MAX_TREE_DEPTH, self.tree_depth
            )));
        }
        if self.max_prove_attempts == 0 {
            return Err(VoteBatchError::invalid_config("at least one proving attempt is required"));
        }
        Ok(())
    }
}
