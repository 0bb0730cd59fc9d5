//! In-memory history backend
//!
//! Keeps the whole ledger in a `Vec` behind a mutex. Useful for embedded
//! scenarios and as the test-suite fixture; semantics match the Postgres
//! backend exactly.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EngineResult;
use crate::history::{Change, ChangeStatus, History};
use crate::location::Location;

/// Ledger stored in process memory.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    changes: Mutex<Vec<Change>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded Change, in append order.
    pub fn all_changes(&self) -> Vec<Change> {
        // A poisoned lock still holds a consistent Vec; appends are atomic.
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn sorted_desc(&self) -> Vec<Change> {
        let mut changes = self.all_changes();
        // Stable sort: equal timestamps keep append order, reversed below.
        changes.sort_by_key(|c| c.deployed_at);
        changes.reverse();
        changes
    }
}

#[async_trait]
impl History for MemoryHistory {
    async fn most_recent_changes(
        &self,
        locations: &[Location],
        exclude_rollbacked: bool,
    ) -> EngineResult<Vec<Change>> {
        let sorted = self.sorted_desc();
        let mut result = Vec::new();
        for location in locations {
            let latest = sorted.iter().find(|c| &c.location == location);
            if let Some(change) = latest {
                if exclude_rollbacked && change.status == ChangeStatus::Rollbacked {
                    continue;
                }
                result.push(change.clone());
            }
        }
        Ok(result)
    }

    async fn most_recent_changes_by_count(&self, count: usize) -> EngineResult<Vec<Change>> {
        Ok(self.sorted_desc().into_iter().take(count).collect())
    }

    async fn most_recent_changes_since_tag(&self, tag: &str) -> EngineResult<Vec<Change>> {
        let changes = self.all_changes();
        let since = changes
            .iter()
            .filter(|c| c.tag == tag)
            .map(|c| c.deployed_at)
            .min();
        match since {
            Some(date) => self.most_recent_changes_since_date(date).await,
            None => Ok(Vec::new()),
        }
    }

    async fn most_recent_changes_since_date(
        &self,
        date: DateTime<Utc>,
    ) -> EngineResult<Vec<Change>> {
        Ok(self
            .sorted_desc()
            .into_iter()
            .filter(|c| c.deployed_at >= date)
            .collect())
    }

    async fn append(&self, change: Change) -> EngineResult<()> {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(change);
        Ok(())
    }

    async fn ensure_storage(&self) -> EngineResult<()> {
        Ok(())
    }

    async fn remove_storage(&self) -> EngineResult<()> {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}
