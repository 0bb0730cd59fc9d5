//! Shared fixtures for the scenario tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use migratory::deploy::Deployment;
use migratory::error::{EngineError, EngineResult};
use migratory::history::memory::MemoryHistory;
use migratory::session::Session;
use migratory::store::DirectoryStore;
use tempfile::TempDir;

/// Session double that records every executed statement.
pub struct RecordingSession {
    statements: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl RecordingSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            statements: Mutex::new(Vec::new()),
            fail_on: None,
        })
    }

    /// Fail any statement containing the given fragment.
    pub fn failing_on(fragment: &str) -> Arc<Self> {
        Arc::new(Self {
            statements: Mutex::new(Vec::new()),
            fail_on: Some(fragment.to_string()),
        })
    }

    pub fn executed(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl Session for RecordingSession {
    async fn execute_statement(&self, sql: &str) -> EngineResult<()> {
        if let Some(fragment) = &self.fail_on {
            if sql.contains(fragment) {
                return Err(EngineError::Session(format!(
                    "injected failure on '{}'",
                    fragment
                )));
            }
        }
        self.statements.lock().unwrap().push(sql.to_string());
        Ok(())
    }

    async fn close(&self) -> EngineResult<()> {
        Ok(())
    }

    fn platform(&self) -> &str {
        "recording"
    }
}

/// Render a tagged SQL script with the given policy and sections.
pub fn script_text(policy: &str, migrate_sql: Option<&str>, rollback_sql: Option<&str>) -> String {
    let mut text = format!(
        "-- @author alice\n\
         -- @authored_at 2024-02-01 09:30:00\n\
         -- @description test fixture\n\
         -- @migrate_policy {}\n",
        policy
    );
    if let Some(sql) = migrate_sql {
        text.push_str("-- @migrate\n");
        text.push_str(sql);
        text.push('\n');
    }
    if let Some(sql) = rollback_sql {
        text.push_str("-- @rollback\n");
        text.push_str(sql);
        text.push('\n');
    }
    text
}

/// Write a script file under the store directory.
pub fn write_script(dir: &TempDir, name: &str, content: &str) {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Wire a deployment over a directory store, a memory ledger, and a
/// recording session.
pub fn deployment(
    dir: &TempDir,
    session: &Arc<RecordingSession>,
    history: &Arc<MemoryHistory>,
) -> Deployment {
    let store = DirectoryStore::new(dir.path()).with_variables(HashMap::new());
    Deployment::new(
        "test-project",
        Arc::clone(session) as Arc<dyn Session>,
        Arc::clone(history) as Arc<dyn migratory::History>,
        Arc::new(store),
    )
}
