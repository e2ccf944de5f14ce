//! The coordination core handle.

use super::state::{CoreState, Upsert};
use crate::analysis::{Analysis, AnalysisDetails, CompoundAnalysis, CompoundAnalysisDetails};
use crate::config::{ConfigFile, ServerConfig};
use crate::connection::{self, ClusterProbe, ConnectionSpec, ConnectionStatus, TcpClusterProbe};
use crate::dataset::{self, Dataset, DatasetParams};
use crate::error::{CoordinationError, EntityKind};
use crate::events::{EventBus, Message, Snapshot, Subscription};
use crate::ids::{AnalysisId, CompoundAnalysisId, DatasetId, JobId};
use crate::job::{
    JobEvent, JobEventSink, JobExecutor, JobHandle, JobRecord, LocalJobExecutor,
};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Collaborators and limits a core is built from.
pub struct CoreOptions {
    pub executor: Arc<dyn JobExecutor>,
    pub probe: Arc<dyn ClusterProbe>,
    pub subscriber_queue_capacity: usize,
    pub server: ServerConfig,
}

impl CoreOptions {
    /// Local executor and TCP probe, tuned from `config`.
    pub fn from_config(config: &ConfigFile) -> Self {
        Self {
            executor: Arc::new(LocalJobExecutor::new(config.executor_config())),
            probe: Arc::new(TcpClusterProbe::new(config.cluster_connect_timeout())),
            subscriber_queue_capacity: config.events.subscriber_queue_capacity,
            server: ServerConfig::from_config(config),
        }
    }
}

struct Inner {
    state: RwLock<CoreState>,
    bus: EventBus,
    executor: Arc<dyn JobExecutor>,
    probe: Arc<dyn ClusterProbe>,
    server: ServerConfig,
    shutdown: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Cloneable handle to one coordination core.
///
/// Commands are serialized through a single write lock, and every message a
/// command produces is published before that lock is released. Observers
/// therefore see messages in command order, and a subscription's
/// `INITIAL_STATE` (built under the read lock) never overlaps a command.
///
/// Must be created inside a tokio runtime: the job event relay runs as a
/// background task until [`shutdown`](Self::shutdown) or the last handle
/// is dropped.
#[derive(Clone)]
pub struct CoordinationCore {
    inner: Arc<Inner>,
}

impl CoordinationCore {
    pub fn new(options: CoreOptions) -> Self {
        let (job_events, rx) = JobEventSink::channel();
        let shutdown = CancellationToken::new();
        let inner = Arc::new(Inner {
            state: RwLock::new(CoreState::new(Arc::clone(&options.executor), job_events)),
            bus: EventBus::new(options.subscriber_queue_capacity),
            executor: options.executor,
            probe: options.probe,
            server: options.server,
            shutdown: shutdown.clone(),
        });

        tokio::spawn(relay_job_events(Arc::downgrade(&inner), rx, shutdown));
        info!(version = crate::VERSION, "Coordination core started");

        Self { inner }
    }

    /// Builds a core with the built-in executor and probe.
    pub fn from_config(config: &ConfigFile) -> Self {
        Self::new(CoreOptions::from_config(config))
    }

    /// Runs `apply` under the write lock and publishes what it produced.
    async fn commit<T>(
        &self,
        op: &'static str,
        apply: impl FnOnce(&mut CoreState, &mut Vec<Message>) -> Result<T, CoordinationError>,
    ) -> Result<T, CoordinationError> {
        let mut state = self.inner.state.write().await;
        let mut out = Vec::new();
        let result = apply(&mut state, &mut out);
        for message in out {
            self.inner.bus.publish(message);
        }
        drop(state);

        if let Err(e) = &result {
            warn!(op, code = %e.code(), error = %e, "Command rejected");
        }
        result
    }

    // =========================================================================
    // Connection
    // =========================================================================

    pub async fn connection(&self) -> ConnectionStatus {
        self.inner.state.read().await.connection_status()
    }

    /// Attaches to a compute resource. Cluster addresses are probed before
    /// any state changes; a failed attempt leaves the current connection as
    /// it was.
    pub async fn connect(&self, spec: ConnectionSpec) -> Result<ConnectionStatus, CoordinationError> {
        if let Err(e) = connection::verify(&spec, self.inner.probe.as_ref()).await {
            let e = CoordinationError::from(e);
            warn!(op = "connect", code = %e.code(), error = %e, "Command rejected");
            return Err(e);
        }
        self.commit("connect", |state, out| Ok(state.connect(spec, out)))
            .await
    }

    /// Detaches and removes every entity. Always succeeds.
    pub async fn disconnect(&self) {
        let _ = self
            .commit("disconnect", |state, out| {
                state.disconnect(out);
                Ok(())
            })
            .await;
    }

    // =========================================================================
    // Datasets
    // =========================================================================

    /// Validates and registers a dataset. File checks run before the state
    /// lock is taken.
    pub async fn register_dataset(
        &self,
        id: DatasetId,
        params: DatasetParams,
    ) -> Result<Dataset, CoordinationError> {
        self.inner.state.read().await.require_connected()?;
        let prepared = match dataset::prepare(id, params).await {
            Ok(prepared) => prepared,
            Err(e) => {
                let e = CoordinationError::from(e);
                warn!(op = "register_dataset", dataset_id = %id, code = %e.code(), error = %e, "Command rejected");
                return Err(e);
            }
        };
        self.commit("register_dataset", |state, out| {
            state.register_dataset(prepared, out)
        })
        .await
    }

    pub async fn remove_dataset(&self, id: DatasetId) -> Result<Dataset, CoordinationError> {
        self.commit("remove_dataset", |state, out| state.remove_dataset(&id, out))
            .await
    }

    pub async fn dataset(&self, id: DatasetId) -> Result<Dataset, CoordinationError> {
        self.inner
            .state
            .read()
            .await
            .dataset(&id)
            .ok_or_else(|| CoordinationError::not_found(EntityKind::Dataset, id))
    }

    pub async fn datasets(&self) -> Vec<Dataset> {
        self.inner.state.read().await.datasets()
    }

    // =========================================================================
    // Analyses
    // =========================================================================

    pub async fn create_or_update_compound_analysis(
        &self,
        id: CompoundAnalysisId,
        dataset: DatasetId,
        details: CompoundAnalysisDetails,
    ) -> Result<Upsert<CompoundAnalysis>, CoordinationError> {
        self.commit("create_or_update_compound_analysis", |state, out| {
            state.create_or_update_compound(id, dataset, details, out)
        })
        .await
    }

    pub async fn remove_compound_analysis(
        &self,
        id: CompoundAnalysisId,
    ) -> Result<CompoundAnalysis, CoordinationError> {
        self.commit("remove_compound_analysis", |state, out| {
            state.remove_compound(&id, out)
        })
        .await
    }

    pub async fn compound_analysis(
        &self,
        id: CompoundAnalysisId,
    ) -> Result<CompoundAnalysis, CoordinationError> {
        self.inner
            .state
            .read()
            .await
            .compound_analysis(&id)
            .ok_or_else(|| CoordinationError::not_found(EntityKind::CompoundAnalysis, id))
    }

    pub async fn create_or_update_analysis(
        &self,
        id: AnalysisId,
        compound_analysis: CompoundAnalysisId,
        details: AnalysisDetails,
    ) -> Result<Upsert<Analysis>, CoordinationError> {
        self.commit("create_or_update_analysis", |state, out| {
            state.create_or_update_analysis(id, compound_analysis, details, out)
        })
        .await
    }

    pub async fn remove_analysis(&self, id: AnalysisId) -> Result<Analysis, CoordinationError> {
        self.commit("remove_analysis", |state, out| state.remove_analysis(&id, out))
            .await
    }

    pub async fn analysis(&self, id: AnalysisId) -> Result<Analysis, CoordinationError> {
        self.inner
            .state
            .read()
            .await
            .analysis(&id)
            .ok_or_else(|| CoordinationError::not_found(EntityKind::Analysis, id))
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    /// Starts a job for the analysis. Progress arrives as job messages.
    pub async fn run_analysis(&self, id: AnalysisId) -> Result<JobHandle, CoordinationError> {
        self.commit("run_analysis", |state, out| state.run_analysis(&id, out))
            .await
    }

    pub async fn cancel_job(&self, id: JobId) -> Result<JobHandle, CoordinationError> {
        self.commit("cancel_job", |state, out| state.cancel_job(&id, out))
            .await
    }

    pub async fn job(&self, id: JobId) -> Result<JobRecord, CoordinationError> {
        self.inner
            .state
            .read()
            .await
            .job(&id)
            .ok_or_else(|| CoordinationError::not_found(EntityKind::Job, id))
    }

    async fn apply_job_event(&self, event: JobEvent) {
        let _ = self
            .commit("job_event", |state, out| {
                state.apply_job_event(event, out);
                Ok(())
            })
            .await;
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Registers an observer. Its first message is `INITIAL_STATE`.
    pub async fn subscribe(&self) -> Subscription {
        let state = self.inner.state.read().await;
        self.inner
            .bus
            .subscribe_with(Message::InitialState(state.snapshot()))
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.inner.state.read().await.snapshot()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.bus.subscriber_count()
    }

    pub fn server_config(&self) -> &ServerConfig {
        &self.inner.server
    }

    /// Stops the executor and the job relay, then disconnects all observers.
    pub fn shutdown(&self) {
        info!("Coordination core shutting down");
        self.inner.executor.shutdown();
        self.inner.shutdown.cancel();
        self.inner.bus.close();
    }
}

/// Feeds executor events into the core, one at a time, in arrival order.
async fn relay_job_events(
    core: Weak<Inner>,
    mut rx: mpsc::UnboundedReceiver<JobEvent>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            event = rx.recv() => {
                let Some(event) = event else { break };
                let Some(inner) = core.upgrade() else { break };
                CoordinationCore { inner }.apply_job_event(event).await;
            }
        }
    }
    debug!("Job event relay stopped");
}
