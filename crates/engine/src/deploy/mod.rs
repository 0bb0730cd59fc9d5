//! Deployment engine
//!
//! The orchestrator: selection strategies, the lifecycle-bearing shared
//! base, and the two direction-specific handlers.

pub mod events;
pub mod handler;
pub mod migrate;
pub mod options;
pub mod rollback;

pub use events::{DeployContext, DeployObserver};
pub use handler::{
    Deployment, DeployReport, ExecutedMigration, SkipReason, SkippedMigration,
};
pub use migrate::{classify, Decision, MigrateHandler};
pub use options::{MigrateOptions, RollbackBy};
pub use rollback::RollbackHandler;
