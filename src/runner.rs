//! Datapack Runner
//!
//! Owns one execution end to end:
//!
//! ```text
//! validate arguments → lock container → load arguments → load algorithm
//!     → resolve bindings → run algorithm → reconcile outputs
//!     → refresh metadata → save arguments
//! ```
//!
//! Nothing touches the datapackage until the arguments record has parsed.
//!
//! and the read-only view path (see [`crate::render`]).

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument};

use crate::binding::Bindings;
use crate::config::{Config, RunId};
use crate::descriptor::ArgumentSet;
use crate::error::Result;
use crate::event_log::{EventKind, EventLog};
use crate::reconcile::{reconcile, Reconciliation};
use crate::render::{render_view, ViewExport};
use crate::store::{ContainerLock, DataStore};
use crate::unit::UnitRegistry;

/// Which container to run, and under what identity
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteRequest {
    /// Algorithm identifier (`ALGORITHM`)
    pub algorithm: String,
    /// Argument set name (`ARGUMENTS`)
    pub arguments: String,
    /// Execution environment identifier recorded on the container (`CONTAINER`)
    pub container: Option<String>,
}

impl ExecuteRequest {
    pub fn new(algorithm: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            arguments: arguments.into(),
            container: None,
        }
    }

    /// Request for the run named `<algorithm>.<arguments>`
    pub fn from_run(run: &RunId) -> Self {
        Self::new(run.algorithm.clone(), run.arguments.clone())
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }
}

/// Result of one execution
#[derive(Debug, Clone)]
pub struct Execution {
    /// Container as persisted
    pub arguments: ArgumentSet,
    pub reconciliation: Reconciliation,
}

/// Pipeline entry point
#[derive(Debug, Clone)]
pub struct Runner {
    store: DataStore,
    units: UnitRegistry,
    event_log: EventLog,
}

impl Runner {
    pub fn new(config: Config) -> Self {
        Self {
            store: DataStore::new(config),
            units: UnitRegistry::new(),
            event_log: EventLog::new(),
        }
    }

    /// Use a pre-populated unit registry
    pub fn with_units(mut self, units: UnitRegistry) -> Self {
        self.units = units;
        self
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn units(&self) -> &UnitRegistry {
        &self.units
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Execute an algorithm against its argument set
    #[instrument(skip(self), fields(algorithm = %request.algorithm, arguments = %request.arguments))]
    pub async fn execute(&self, request: &ExecuteRequest) -> Result<Execution> {
        let result = self.execute_inner(request).await;
        if let Err(e) = &result {
            self.event_log.emit(EventKind::ExecutionFailed {
                error: e.to_string(),
            });
        }
        result
    }

    async fn execute_inner(&self, request: &ExecuteRequest) -> Result<Execution> {
        let start = Instant::now();
        let record_path = self
            .store
            .config()
            .arguments_path(&request.algorithm, &request.arguments)?;
        self.store
            .load_arguments(&request.algorithm, &request.arguments)
            .await?;
        let _lock = ContainerLock::acquire(&record_path)?;

        // Reload under the lock; another execution may have saved in between
        let mut arguments = self
            .store
            .load_arguments(&request.algorithm, &request.arguments)
            .await?;
        self.event_log.emit(EventKind::ExecutionStarted {
            algorithm: request.algorithm.clone(),
            arguments: request.arguments.clone(),
            descriptor_count: arguments.len(),
        });

        let algorithm = self
            .units
            .load_algorithm(&self.store, &request.algorithm)
            .await?;

        let inputs = Bindings::from_descriptors(&arguments.data, &self.store).await?;
        for (name, argument) in inputs.iter() {
            self.event_log.emit(EventKind::DescriptorResolved {
                subject: Arc::from(name.as_str()),
                kind: argument.kind().to_string(),
            });
        }

        self.event_log.emit(EventKind::AlgorithmInvoked {
            algorithm: request.algorithm.clone(),
            inputs: inputs.names(),
        });
        let invoked = Instant::now();
        let outputs = algorithm.run(inputs).await?;
        self.event_log.emit(EventKind::AlgorithmReturned {
            algorithm: request.algorithm.clone(),
            outputs: outputs.names(),
            duration_ms: invoked.elapsed().as_millis() as u64,
        });

        let reconciliation =
            reconcile(&mut arguments, outputs, &self.store, &self.event_log).await?;

        arguments.set_metadata(&request.algorithm, request.container.as_deref());
        let saved = self
            .store
            .save_arguments(&request.algorithm, &request.arguments, &arguments)
            .await?;
        self.event_log.emit(EventKind::ArgumentsPersisted {
            path: saved.display().to_string(),
        });

        let total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            updated = reconciliation.updated().len(),
            duration_ms = total_duration_ms,
            "execution complete"
        );
        self.event_log.emit(EventKind::ExecutionCompleted {
            updated: reconciliation.updated(),
            total_duration_ms,
        });

        Ok(Execution {
            arguments,
            reconciliation,
        })
    }

    /// Render a view and export its artifact, under `views/<run>/` for a run
    pub async fn view(&self, view: &str, run: Option<&RunId>) -> Result<ViewExport> {
        let result = render_view(&self.store, &self.units, &self.event_log, view, run).await;
        if let Err(e) = &result {
            self.event_log.emit(EventKind::ExecutionFailed {
                error: e.to_string(),
            });
        }
        result
    }
}
