//! Script model
//!
//! A Script is a capability-tagged unit of change: metadata plus any
//! non-empty subset of {forward action, backward action, pre-deploy commit
//! hook, pre-deploy revert hook}. Capabilities are explicit optional
//! actions checked at assembly time; a script carrying neither a forward
//! nor a backward action is rejected when it is loaded, not when it is
//! first used. Scripts are immutable after load.

pub mod parser;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::location::Location;
use crate::session::Session;

/// Re-run rule for forward deployment.
///
/// Governs the forward direction only; rollback eligibility never consults
/// the policy. The policy is snapshotted into every Change record at
/// deployment time, and forward classification compares drift against the
/// recorded snapshot, not the script's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MigratePolicy {
    /// Run once, then never again; editing it afterwards is a fatal error
    Once,
    /// Re-run whenever the content checksum changes
    OnChange,
    /// Re-run on every deployment
    Always,
    /// Never run; the script is skipped before classification
    Never,
}

impl fmt::Display for MigratePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            MigratePolicy::Once => "ONCE",
            MigratePolicy::OnChange => "ONCHANGE",
            MigratePolicy::Always => "ALWAYS",
            MigratePolicy::Never => "NEVER",
        };
        f.write_str(keyword)
    }
}

impl FromStr for MigratePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ONCE" => Ok(MigratePolicy::Once),
            "ONCHANGE" => Ok(MigratePolicy::OnChange),
            "ALWAYS" => Ok(MigratePolicy::Always),
            "NEVER" => Ok(MigratePolicy::Never),
            other => Err(format!(
                "unknown migrate_policy '{}', expected ONCE, ONCHANGE, ALWAYS, or NEVER",
                other
            )),
        }
    }
}

/// Where a script's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptOrigin {
    /// Tagged SQL text parsed from the store
    SqlText,
    /// Registered native implementation
    Native,
}

/// Authoring metadata carried by every script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptMeta {
    pub author: String,
    pub authored_at: DateTime<Utc>,
    pub description: String,
    pub policy: MigratePolicy,
}

/// A native action executed against the target session.
#[async_trait]
pub trait NativeAction: Send + Sync {
    async fn execute(&self, session: &dyn Session) -> EngineResult<()>;
}

/// One executable capability of a script.
#[derive(Clone)]
pub enum ScriptAction {
    /// SQL text executed verbatim through the session
    Sql(String),
    /// Native implementation invoked with the session
    Native(Arc<dyn NativeAction>),
}

impl ScriptAction {
    /// Run the action against the target session.
    ///
    /// Empty SQL bodies are a no-op; a section marker with nothing under it
    /// is legal and records normally.
    pub async fn execute(&self, session: &dyn Session) -> EngineResult<()> {
        match self {
            ScriptAction::Sql(sql) => {
                if sql.trim().is_empty() {
                    return Ok(());
                }
                session.execute_statement(sql).await
            }
            ScriptAction::Native(action) => action.execute(session).await,
        }
    }
}

impl fmt::Debug for ScriptAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptAction::Sql(sql) => f.debug_tuple("Sql").field(sql).finish(),
            ScriptAction::Native(_) => f.write_str("Native(..)"),
        }
    }
}

/// The optional capabilities a script may carry.
#[derive(Debug, Clone, Default)]
pub struct ScriptActions {
    pub migrate: Option<ScriptAction>,
    pub rollback: Option<ScriptAction>,
    pub pre_deploy_commit: Option<ScriptAction>,
    pub pre_deploy_revert: Option<ScriptAction>,
}

/// A loaded, immutable migration script.
#[derive(Debug, Clone)]
pub struct Script {
    meta: ScriptMeta,
    origin: ScriptOrigin,
    actions: ScriptActions,
    variables: HashMap<String, String>,
}

impl Script {
    /// Assemble a script, rejecting an empty direction set.
    pub fn assemble(
        location: &Location,
        meta: ScriptMeta,
        origin: ScriptOrigin,
        actions: ScriptActions,
        variables: HashMap<String, String>,
    ) -> EngineResult<Self> {
        if actions.migrate.is_none() && actions.rollback.is_none() {
            return Err(EngineError::validation(
                location,
                "script must provide at least one of @migrate and @rollback",
            ));
        }
        Ok(Script {
            meta,
            origin,
            actions,
            variables,
        })
    }

    pub fn meta(&self) -> &ScriptMeta {
        &self.meta
    }

    pub fn policy(&self) -> MigratePolicy {
        self.meta.policy
    }

    pub fn origin(&self) -> ScriptOrigin {
        self.origin
    }

    /// Template variables resolved into this script at load time.
    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    pub fn migrate_action(&self) -> Option<&ScriptAction> {
        self.actions.migrate.as_ref()
    }

    pub fn rollback_action(&self) -> Option<&ScriptAction> {
        self.actions.rollback.as_ref()
    }

    pub fn pre_deploy_commit(&self) -> Option<&ScriptAction> {
        self.actions.pre_deploy_commit.as_ref()
    }

    pub fn pre_deploy_revert(&self) -> Option<&ScriptAction> {
        self.actions.pre_deploy_revert.as_ref()
    }

    pub fn can_migrate(&self) -> bool {
        self.actions.migrate.is_some()
    }

    pub fn can_rollback(&self) -> bool {
        self.actions.rollback.is_some()
    }
}

/// A natively implemented migration registered with the store.
///
/// `canonical_source()` is the string the store checksums; implementations
/// must keep it stable across runs, and editing it is observable as drift
/// exactly like editing a SQL file.
pub trait NativeScript: Send + Sync {
    fn meta(&self) -> ScriptMeta;

    fn canonical_source(&self) -> String;

    fn migrate_action(&self) -> Option<Arc<dyn NativeAction>> {
        None
    }

    fn rollback_action(&self) -> Option<Arc<dyn NativeAction>> {
        None
    }

    fn pre_deploy_commit(&self) -> Option<Arc<dyn NativeAction>> {
        None
    }

    fn pre_deploy_revert(&self) -> Option<Arc<dyn NativeAction>> {
        None
    }
}
