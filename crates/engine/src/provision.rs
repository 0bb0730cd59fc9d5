//! Environment provisioning saga
//!
//! Creating an environment is a multi-resource operation (probe the
//! target, create history storage, persist project metadata) with no
//! cross-resource transaction. Each completed step registers a named,
//! reversible compensation; when a later step fails, compensations run in
//! reverse order. A compensation failure is logged and attached to the
//! propagated error; it never replaces the original.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::history::History;
use crate::session::Session;

/// One named, reversible provisioning step.
#[async_trait]
pub trait ProvisionStep: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> EngineResult<()>;

    /// Best-effort reverse action; default is nothing to undo.
    async fn compensate(&self) -> EngineResult<()> {
        Ok(())
    }
}

/// Executes provisioning steps in order with saga-style compensation.
#[derive(Default)]
pub struct Provisioner {
    steps: Vec<Box<dyn ProvisionStep>>,
}

impl Provisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, step: Box<dyn ProvisionStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Run every step in order. On failure, compensate completed steps in
    /// reverse and propagate the original error with any compensation
    /// failures attached.
    pub async fn run(&self) -> EngineResult<()> {
        for (index, step) in self.steps.iter().enumerate() {
            info!(step = step.name(), "provisioning");
            if let Err(source) = step.run().await {
                let mut compensation_failures = Vec::new();
                for done in self.steps[..index].iter().rev() {
                    if let Err(err) = done.compensate().await {
                        warn!(step = done.name(), error = %err, "compensation failed");
                        compensation_failures.push(format!("{}: {}", done.name(), err));
                    }
                }
                return Err(EngineError::Provision {
                    step: step.name().to_string(),
                    source: Box::new(source),
                    compensation_failures,
                });
            }
        }
        Ok(())
    }
}

/// Probes target connectivity with a trivial statement.
pub struct ProbeTarget {
    session: Arc<dyn Session>,
}

impl ProbeTarget {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ProvisionStep for ProbeTarget {
    fn name(&self) -> &str {
        "probe target connectivity"
    }

    async fn run(&self) -> EngineResult<()> {
        self.session.execute_statement("SELECT 1").await
    }
}

/// Creates the history ledger storage; compensation tears it down again.
pub struct CreateHistoryStorage {
    history: Arc<dyn History>,
}

impl CreateHistoryStorage {
    pub fn new(history: Arc<dyn History>) -> Self {
        Self { history }
    }
}

#[async_trait]
impl ProvisionStep for CreateHistoryStorage {
    fn name(&self) -> &str {
        "create history storage"
    }

    async fn run(&self) -> EngineResult<()> {
        self.history.ensure_storage().await
    }

    async fn compensate(&self) -> EngineResult<()> {
        self.history.remove_storage().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        name: String,
        fail_run: bool,
        fail_compensation: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Scripted {
        fn step(
            name: &str,
            fail_run: bool,
            fail_compensation: bool,
            log: &Arc<Mutex<Vec<String>>>,
        ) -> Box<dyn ProvisionStep> {
            Box::new(Scripted {
                name: name.to_string(),
                fail_run,
                fail_compensation,
                log: Arc::clone(log),
            })
        }
    }

    #[async_trait]
    impl ProvisionStep for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self) -> EngineResult<()> {
            self.log.lock().unwrap().push(format!("run:{}", self.name));
            if self.fail_run {
                Err(EngineError::Connection(format!("{} unreachable", self.name)))
            } else {
                Ok(())
            }
        }

        async fn compensate(&self) -> EngineResult<()> {
            self.log.lock().unwrap().push(format!("undo:{}", self.name));
            if self.fail_compensation {
                Err(EngineError::History("storage busy".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn all_steps_run_in_order_on_success() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let provisioner = Provisioner::new()
            .with_step(Scripted::step("a", false, false, &log))
            .with_step(Scripted::step("b", false, false, &log));
        provisioner.run().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["run:a", "run:b"]);
    }

    #[tokio::test]
    async fn failure_compensates_completed_steps_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let provisioner = Provisioner::new()
            .with_step(Scripted::step("a", false, false, &log))
            .with_step(Scripted::step("b", false, false, &log))
            .with_step(Scripted::step("c", true, false, &log));
        let err = provisioner.run().await.unwrap_err();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["run:a", "run:b", "run:c", "undo:b", "undo:a"]
        );
        match err {
            EngineError::Provision {
                step,
                compensation_failures,
                ..
            } => {
                assert_eq!(step, "c");
                assert!(compensation_failures.is_empty());
            }
            other => panic!("expected provision error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn compensation_failure_is_attached_not_substituted() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let provisioner = Provisioner::new()
            .with_step(Scripted::step("a", false, true, &log))
            .with_step(Scripted::step("b", true, false, &log));
        let err = provisioner.run().await.unwrap_err();
        match err {
            EngineError::Provision {
                step,
                source,
                compensation_failures,
            } => {
                assert_eq!(step, "b");
                assert!(matches!(*source, EngineError::Connection(_)));
                assert_eq!(compensation_failures.len(), 1);
                assert!(compensation_failures[0].starts_with("a:"));
            }
            other => panic!("expected provision error, got {:?}", other),
        }
    }
}
