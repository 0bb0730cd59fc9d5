//! Selection strategies
//!
//! Pure value objects that parameterize what the engine selects. Invalid
//! combinations are rejected at construction, before any deployment logic
//! runs.

use chrono::{DateTime, Utc};

use crate::error::{EngineError, EngineResult};
use crate::location::Location;

/// Forward-selection options: an explicit path list XOR a count limit XOR
/// unrestricted. Mutual exclusion is guaranteed by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrateOptions {
    paths: Vec<Location>,
    count: Option<usize>,
}

impl MigrateOptions {
    /// Visit the whole store in its iteration order.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Visit exactly these Locations, in this order.
    pub fn with_paths(paths: Vec<Location>) -> EngineResult<Self> {
        if paths.is_empty() {
            return Err(EngineError::Options(
                "explicit path list must not be empty".to_string(),
            ));
        }
        Ok(Self {
            paths,
            count: None,
        })
    }

    /// Stop the run after `count` executions (skips do not consume the
    /// budget).
    pub fn with_count(count: usize) -> EngineResult<Self> {
        if count == 0 {
            return Err(EngineError::Options("count must be greater than zero".to_string()));
        }
        Ok(Self {
            paths: Vec::new(),
            count: Some(count),
        })
    }

    pub fn paths(&self) -> Option<&[Location]> {
        if self.paths.is_empty() {
            None
        } else {
            Some(&self.paths)
        }
    }

    pub fn count(&self) -> Option<usize> {
        self.count
    }
}

/// Rollback target selector; exactly one variant is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackBy {
    /// The last `n` deployed Changes
    Count(usize),
    /// Everything deployed at or after the deployment tagged `t`
    Tag(String),
    /// Everything deployed at or after a point in time
    Date(DateTime<Utc>),
    /// Exactly these Locations' latest Changes
    Paths(Vec<Location>),
}
