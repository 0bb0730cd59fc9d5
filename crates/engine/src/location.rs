//! Migration locations
//!
//! A Location is the opaque, stable identifier of one migration within a
//! store: the relative file path for SQL scripts, the registered name for
//! native scripts. It is the join key between store entries and history
//! records, and its total order drives default iteration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a migration within a store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        Location(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Location {
    fn from(path: &str) -> Self {
        Location(path.to_string())
    }
}

impl From<String> for Location {
    fn from(path: String) -> Self {
        Location(path)
    }
}
