//! Integration tests for the coordination core.
//!
//! These drive `CoordinationCore` through its public API only and observe it
//! the way a client would: through command results and a subscription.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use framehub::analysis::{AnalysisDetails, AnalysisKind, CompoundAnalysisDetails};
use framehub::config::{ConfigFile, ServerConfig};
use framehub::connection::{ClusterProbe, ConnectionSpec, ProbeResult, TcpClusterProbe};
use framehub::dataset::{DType, DatasetParams, MemoryParams, RawParams};
use framehub::error::ErrorCode;
use framehub::events::{DropReason, Message, Subscription, DEFAULT_SUBSCRIBER_QUEUE_CAPACITY};
use framehub::ids::{AnalysisId, CompoundAnalysisId, DatasetId, JobId};
use framehub::job::{
    JobEventSink, JobExecutionError, JobExecutor, JobRequest, JobStatus, LocalJobExecutor,
    LocalJobExecutorConfig,
};
use framehub::{Command, CoordinationCore, CoreOptions};
use serde_json::json;
use tempfile::NamedTempFile;
use uuid::Uuid;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Fixtures
// =============================================================================

fn ds(n: u128) -> DatasetId {
    DatasetId::from_uuid(Uuid::from_u128(n))
}

fn ca(n: u128) -> CompoundAnalysisId {
    CompoundAnalysisId::from_uuid(Uuid::from_u128(0x100 + n))
}

fn an(n: u128) -> AnalysisId {
    AnalysisId::from_uuid(Uuid::from_u128(0x200 + n))
}

fn local() -> ConnectionSpec {
    ConnectionSpec::Local { num_workers: 2 }
}

fn memory_params() -> DatasetParams {
    DatasetParams::Memory(MemoryParams {
        dtype: DType::Float32,
        detector_size: vec![8, 8],
        scan_size: vec![4, 4],
    })
}

fn compound_details() -> CompoundAnalysisDetails {
    CompoundAnalysisDetails {
        main_type: AnalysisKind::ApplyDiskMask,
        analyses: vec![],
    }
}

fn disk_details() -> AnalysisDetails {
    AnalysisDetails::new(
        AnalysisKind::ApplyDiskMask,
        json!({"roi": {"shape": "disk", "r": 1, "cx": 1, "cy": 1}}),
    )
}

/// Probe with a fixed answer.
struct FixedProbe(ProbeResult);

impl ClusterProbe for FixedProbe {
    fn probe<'a>(
        &'a self,
        _host: &'a str,
        _port: u16,
    ) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + 'a>> {
        let result = self.0.clone();
        Box::pin(async move { result })
    }
}

/// Executor that only records requests; tests drive the event sinks.
#[derive(Default)]
struct ManualExecutor {
    started: Mutex<Vec<(JobRequest, JobEventSink)>>,
    cancelled: Mutex<Vec<JobId>>,
    shut_down: AtomicBool,
    reject: bool,
}

impl ManualExecutor {
    fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    fn sink(&self, index: usize) -> (JobId, JobEventSink) {
        let started = self.started.lock().unwrap();
        let (request, sink) = &started[index];
        (request.job_id, sink.clone())
    }

    fn cancelled(&self) -> Vec<JobId> {
        self.cancelled.lock().unwrap().clone()
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl JobExecutor for ManualExecutor {
    fn start(&self, request: JobRequest, events: JobEventSink) -> Result<(), JobExecutionError> {
        if self.reject {
            return Err(JobExecutionError::Rejected("no workers left".to_string()));
        }
        self.started.lock().unwrap().push((request, events));
        Ok(())
    }

    fn cancel(&self, job_id: &JobId) {
        self.cancelled.lock().unwrap().push(*job_id);
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

fn core_with(executor: Arc<dyn JobExecutor>, probe: Arc<dyn ClusterProbe>) -> CoordinationCore {
    CoordinationCore::new(CoreOptions {
        executor,
        probe,
        subscriber_queue_capacity: DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
        server: ServerConfig::from_config(&ConfigFile::default()),
    })
}

fn manual_core() -> (CoordinationCore, Arc<ManualExecutor>) {
    let executor = Arc::new(ManualExecutor::default());
    let core = core_with(executor.clone(), Arc::new(FixedProbe(Ok(()))));
    (core, executor)
}

fn local_core() -> CoordinationCore {
    let executor = LocalJobExecutor::new(LocalJobExecutorConfig {
        progress_steps: 2,
        step_delay: Duration::from_millis(5),
    });
    core_with(Arc::new(executor), Arc::new(TcpClusterProbe::default()))
}

/// Connected core with D1 → CA1 → A1 over a memory dataset.
async fn populated(core: &CoordinationCore) {
    core.connect(local()).await.unwrap();
    core.register_dataset(ds(1), memory_params()).await.unwrap();
    core.create_or_update_compound_analysis(ca(1), ds(1), compound_details())
        .await
        .unwrap();
    core.create_or_update_analysis(an(1), ca(1), disk_details())
        .await
        .unwrap();
}

async fn next(sub: &mut Subscription) -> Arc<Message> {
    tokio::time::timeout(RECV_TIMEOUT, sub.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("subscription closed")
}

async fn next_type(sub: &mut Subscription) -> &'static str {
    next(sub).await.message_type()
}

/// Subscribes and consumes the INITIAL_STATE.
async fn observer(core: &CoordinationCore) -> Subscription {
    let mut sub = core.subscribe().await;
    assert_eq!(next_type(&mut sub).await, "INITIAL_STATE");
    sub
}

fn assert_quiet(sub: &mut Subscription) {
    if let Some(message) = sub.try_recv() {
        panic!("unexpected message: {:?}", message);
    }
}

// =============================================================================
// Connection
// =============================================================================

#[tokio::test]
async fn test_mutations_while_disconnected_fail() {
    let (core, executor) = manual_core();
    let mut sub = observer(&core).await;

    let err = core.register_dataset(ds(1), memory_params()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotConnected);
    let err = core.remove_dataset(ds(1)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotConnected);
    let err = core
        .create_or_update_compound_analysis(ca(1), ds(1), compound_details())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotConnected);
    let err = core
        .create_or_update_analysis(an(1), ca(1), disk_details())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotConnected);
    let err = core.run_analysis(an(1)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotConnected);

    assert!(core.snapshot().await.is_empty());
    assert!(executor.started.lock().unwrap().is_empty());
    assert_quiet(&mut sub);
}

#[tokio::test]
async fn test_connect_then_read_returns_spec() {
    let (core, _) = manual_core();
    let mut sub = observer(&core).await;

    let status = core.connect(local()).await.unwrap();
    assert_eq!(status, core.connection().await);
    assert_eq!(
        serde_json::to_value(&status).unwrap(),
        json!({"status": "ok", "connection": {"type": "local", "numWorkers": 2}})
    );

    let message = next(&mut sub).await;
    assert_eq!(*message, Message::Connect { connection: local() });
}

#[tokio::test]
async fn test_failed_cluster_connect_preserves_state() {
    let probe = FixedProbe(Err("connection refused".to_string()));
    let core = core_with(Arc::new(ManualExecutor::default()), Arc::new(probe));
    populated(&core).await;
    let before = core.snapshot().await;
    let mut sub = observer(&core).await;

    let err = core
        .connect(ConnectionSpec::Cluster {
            address: "tcp://unknown:8786".to_string(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::ClusterConnectionError);
    assert_eq!(core.snapshot().await, before);
    assert_quiet(&mut sub);
}

#[tokio::test]
async fn test_unreachable_cluster_over_tcp() {
    let core = local_core();
    let reply = core
        .dispatch(Command::Connect {
            connection: ConnectionSpec::Cluster {
                address: "tcp://unknown:8786".to_string(),
            },
        })
        .await;

    assert_eq!(reply["status"], "error");
    assert_eq!(reply["messageType"], "CLUSTER_CONN_ERROR");
    assert_eq!(
        serde_json::to_value(core.connection().await).unwrap(),
        json!({"status": "disconnected", "connection": {}})
    );
}

#[tokio::test]
async fn test_invalid_local_spec_rejected() {
    let (core, _) = manual_core();
    let err = core
        .connect(ConnectionSpec::Local { num_workers: 0 })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParameters);
    assert_eq!(
        serde_json::to_value(core.connection().await).unwrap()["status"],
        "disconnected"
    );
}

#[tokio::test]
async fn test_reconnect_tears_down_first() {
    let (core, _) = manual_core();
    populated(&core).await;
    let mut sub = observer(&core).await;

    core.connect(ConnectionSpec::Local { num_workers: 4 })
        .await
        .unwrap();

    let mut types = Vec::new();
    loop {
        let t = next_type(&mut sub).await;
        types.push(t);
        if t == "CONNECT" {
            break;
        }
    }
    assert_eq!(
        types,
        vec![
            "ANALYSIS_REMOVED",
            "COMPOUND_ANALYSIS_REMOVED",
            "DELETE_DATASET",
            "CONNECT"
        ]
    );
    assert!(core.datasets().await.is_empty());
}

// =============================================================================
// Observers
// =============================================================================

#[tokio::test]
async fn test_initial_state_reflects_current_contents() {
    let (core, _) = manual_core();
    populated(&core).await;
    let handle = core.run_analysis(an(1)).await.unwrap();

    let mut sub = core.subscribe().await;
    let first = next(&mut sub).await;
    let snapshot = match &*first {
        Message::InitialState(snapshot) => snapshot.clone(),
        other => panic!("expected INITIAL_STATE, got {:?}", other),
    };

    assert_eq!(snapshot, core.snapshot().await);
    assert_eq!(snapshot.datasets.len(), 1);
    assert_eq!(snapshot.compound_analyses.len(), 1);
    assert_eq!(snapshot.analyses.len(), 1);
    assert_eq!(snapshot.jobs.len(), 1);
    assert_eq!(snapshot.jobs[0].id, handle.job_id);
    assert_eq!(snapshot.jobs[0].status, JobStatus::Created);
    assert_quiet(&mut sub);
}

#[tokio::test]
async fn test_every_observer_sees_same_order() {
    let (core, _) = manual_core();
    let mut a = observer(&core).await;
    let mut b = observer(&core).await;

    populated(&core).await;
    core.disconnect().await;

    let mut seen_a = Vec::new();
    let mut seen_b = Vec::new();
    for _ in 0..6 {
        seen_a.push(next_type(&mut a).await);
        seen_b.push(next_type(&mut b).await);
    }
    assert_eq!(seen_a, seen_b);
    assert_eq!(
        seen_a,
        vec![
            "CONNECT",
            "CREATE_DATASET",
            "COMPOUND_ANALYSIS_CREATED",
            "ANALYSIS_CREATED",
            "COMPOUND_ANALYSIS_UPDATED",
            "ANALYSIS_REMOVED"
        ]
    );
}

#[tokio::test]
async fn test_lagging_observer_does_not_stall_others() {
    let core = CoordinationCore::new(CoreOptions {
        executor: Arc::new(ManualExecutor::default()),
        probe: Arc::new(FixedProbe(Ok(()))),
        subscriber_queue_capacity: 4,
        server: ServerConfig::from_config(&ConfigFile::default()),
    });
    let stalled = core.subscribe().await;
    let mut live = observer(&core).await;
    assert_eq!(core.subscriber_count(), 2);

    core.connect(local()).await.unwrap();
    assert_eq!(next_type(&mut live).await, "CONNECT");
    core.register_dataset(ds(1), memory_params()).await.unwrap();
    assert_eq!(next_type(&mut live).await, "CREATE_DATASET");
    core.create_or_update_compound_analysis(ca(1), ds(1), compound_details())
        .await
        .unwrap();
    assert_eq!(next_type(&mut live).await, "COMPOUND_ANALYSIS_CREATED");

    // The stalled queue is full now; the next message drops it.
    core.create_or_update_analysis(an(1), ca(1), disk_details())
        .await
        .unwrap();
    assert_eq!(next_type(&mut live).await, "ANALYSIS_CREATED");
    assert_eq!(next_type(&mut live).await, "COMPOUND_ANALYSIS_UPDATED");

    assert_eq!(core.subscriber_count(), 1);
    assert_eq!(stalled.drop_reason(), Some(DropReason::Lagged));
}

// =============================================================================
// Datasets and analyses
// =============================================================================

#[tokio::test]
async fn test_dataset_replace_cascades_before_create() {
    let (core, executor) = manual_core();
    populated(&core).await;
    let handle = core.run_analysis(an(1)).await.unwrap();
    let mut sub = observer(&core).await;

    let replacement = DatasetParams::Memory(MemoryParams {
        dtype: DType::Uint16,
        detector_size: vec![16, 16],
        scan_size: vec![2, 2],
    });
    let dataset = core.register_dataset(ds(1), replacement).await.unwrap();
    assert_eq!(dataset.shape(), &[2, 2, 16, 16]);

    assert_eq!(
        *next(&mut sub).await,
        Message::CancelJobDone {
            job: handle.job_id,
            analysis: an(1)
        }
    );
    assert_eq!(next_type(&mut sub).await, "ANALYSIS_REMOVED");
    assert_eq!(next_type(&mut sub).await, "COMPOUND_ANALYSIS_REMOVED");
    assert_eq!(next_type(&mut sub).await, "CREATE_DATASET");

    let snapshot = core.snapshot().await;
    assert_eq!(snapshot.datasets.len(), 1);
    assert!(snapshot.compound_analyses.is_empty());
    assert!(snapshot.analyses.is_empty());
    assert!(snapshot.jobs.is_empty());
    assert_eq!(executor.cancelled(), vec![handle.job_id]);
}

#[tokio::test]
async fn test_analysis_with_unknown_compound_is_rejected() {
    let (core, _) = manual_core();
    core.connect(local()).await.unwrap();
    core.register_dataset(ds(1), memory_params()).await.unwrap();
    let mut sub = observer(&core).await;

    let err = core
        .create_or_update_analysis(an(1), ca(9), disk_details())
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::CompoundAnalysisNotFound);
    assert!(core.snapshot().await.analyses.is_empty());
    assert_quiet(&mut sub);
}

#[tokio::test]
async fn test_compound_with_unknown_dataset_is_rejected() {
    let (core, _) = manual_core();
    core.connect(local()).await.unwrap();

    let reply = core
        .dispatch(Command::CreateOrUpdateCompoundAnalysis {
            id: ca(1),
            dataset: ds(7),
            details: compound_details(),
        })
        .await;
    assert_eq!(reply["status"], "error");
    assert_eq!(reply["messageType"], "DATASET_NOT_FOUND");
}

#[tokio::test]
async fn test_end_to_end_raw_scenario() {
    let core = local_core();

    // 4x4 scan of 8x8 float32 frames
    let raw = NamedTempFile::new().unwrap();
    raw.as_file().set_len(4 * 4 * 8 * 8 * 4).unwrap();
    let params: DatasetParams = serde_json::from_value(json!({
        "type": "RAW",
        "path": raw.path(),
        "dtype": "float32",
        "detector_size": [8, 8],
        "scan_size": [4, 4],
        "enable_direct": false
    }))
    .unwrap();

    core.connect(local()).await.unwrap();
    core.register_dataset(ds(1), params).await.unwrap();
    core.create_or_update_compound_analysis(ca(1), ds(1), compound_details())
        .await
        .unwrap();
    core.create_or_update_analysis(an(1), ca(1), disk_details())
        .await
        .unwrap();

    let mut sub = core.subscribe().await;
    let first = next(&mut sub).await;
    let value = first.to_json();

    assert_eq!(value["messageType"], "INITIAL_STATE");
    let datasets = value["datasets"].as_array().unwrap();
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0]["id"], json!(ds(1)));
    assert_eq!(datasets[0]["params"]["shape"], json!([4, 4, 8, 8]));
    assert_eq!(datasets[0]["params"]["type"], "RAW");

    let analyses = value["analyses"].as_array().unwrap();
    assert_eq!(analyses.len(), 1);
    assert_eq!(analyses[0]["id"], json!(an(1)));
    assert_eq!(
        analyses[0]["details"]["parameters"],
        json!({"roi": {"shape": "disk", "r": 1, "cx": 1, "cy": 1}})
    );

    // Disconnect clears everything for the next observer.
    core.disconnect().await;
    let mut late = core.subscribe().await;
    let snapshot = next(&mut late).await.to_json();
    assert_eq!(snapshot["datasets"], json!([]));
    assert_eq!(snapshot["analyses"], json!([]));
    assert_eq!(snapshot["compoundAnalyses"], json!([]));
    assert_eq!(snapshot["jobs"], json!([]));
}

#[tokio::test]
async fn test_raw_dataset_too_small_is_invalid() {
    let (core, _) = manual_core();
    core.connect(local()).await.unwrap();
    let raw = NamedTempFile::new().unwrap();
    raw.as_file().set_len(16).unwrap();

    let err = core
        .register_dataset(
            ds(1),
            DatasetParams::Raw(RawParams {
                path: raw.path().to_path_buf(),
                dtype: DType::Float32,
                detector_size: vec![8, 8],
                scan_size: vec![4, 4],
                enable_direct: false,
            }),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidParameters);
    assert!(core.datasets().await.is_empty());
}

// =============================================================================
// Jobs
// =============================================================================

#[tokio::test]
async fn test_job_events_are_relayed_in_order() {
    let (core, executor) = manual_core();
    populated(&core).await;
    let mut sub = observer(&core).await;

    let handle = core.run_analysis(an(1)).await.unwrap();
    let (job, sink) = executor.sink(0);
    assert_eq!(job, handle.job_id);

    sink.started(job);
    sink.progress(job, 1, 2);
    sink.finished(job, json!({"ok": true}));

    assert_eq!(
        *next(&mut sub).await,
        Message::JobStarted {
            job,
            analysis: an(1)
        }
    );
    assert_eq!(
        *next(&mut sub).await,
        Message::TaskResult {
            job,
            analysis: an(1),
            done: 1,
            total: 2
        }
    );
    assert_eq!(next_type(&mut sub).await, "FINISH_JOB");
    assert_eq!(core.job(job).await.unwrap().status, JobStatus::Finished);
}

#[tokio::test]
async fn test_superseded_job_results_are_dropped() {
    let (core, executor) = manual_core();
    populated(&core).await;
    let mut sub = observer(&core).await;

    let first = core.run_analysis(an(1)).await.unwrap();
    let second = core.run_analysis(an(1)).await.unwrap();
    assert_ne!(first.job_id, second.job_id);

    assert_eq!(
        *next(&mut sub).await,
        Message::CancelJobDone {
            job: first.job_id,
            analysis: an(1)
        }
    );

    let (old_job, old_sink) = executor.sink(0);
    old_sink.finished(old_job, json!({"stale": true}));
    let (new_job, new_sink) = executor.sink(1);
    new_sink.started(new_job);

    // Only the current job's event comes through.
    assert_eq!(
        *next(&mut sub).await,
        Message::JobStarted {
            job: new_job,
            analysis: an(1)
        }
    );
    assert!(core.job(old_job).await.is_err());
}

#[tokio::test]
async fn test_updating_analysis_cancels_running_job() {
    let (core, executor) = manual_core();
    populated(&core).await;
    let handle = core.run_analysis(an(1)).await.unwrap();
    let mut sub = observer(&core).await;

    let upsert = core
        .create_or_update_analysis(
            an(1),
            ca(1),
            AnalysisDetails::new(AnalysisKind::SumFrames, json!({})),
        )
        .await
        .unwrap();
    assert!(!upsert.created);

    assert_eq!(next_type(&mut sub).await, "CANCEL_JOB_DONE");
    assert_eq!(next_type(&mut sub).await, "ANALYSIS_UPDATED");
    assert_eq!(executor.cancelled(), vec![handle.job_id]);
    assert!(core.snapshot().await.jobs.is_empty());
}

#[tokio::test]
async fn test_executor_rejection_becomes_job_error() {
    let core = core_with(
        Arc::new(ManualExecutor::rejecting()),
        Arc::new(FixedProbe(Ok(()))),
    );
    populated(&core).await;
    let mut sub = observer(&core).await;

    let handle = core.run_analysis(an(1)).await.unwrap();

    let message = next(&mut sub).await;
    assert_eq!(message.message_type(), "JOB_ERROR");
    assert_eq!(message.to_json()["status"], "error");
    assert_eq!(message.to_json()["code"], "JOB_EXECUTION_ERROR");
    assert_eq!(core.job(handle.job_id).await.unwrap().status, JobStatus::Error);
}

#[tokio::test]
async fn test_cancel_job() {
    let (core, executor) = manual_core();
    populated(&core).await;
    let handle = core.run_analysis(an(1)).await.unwrap();
    let mut sub = observer(&core).await;

    let err = core.cancel_job(JobId::generate()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    let cancelled = core.cancel_job(handle.job_id).await.unwrap();
    assert_eq!(cancelled, handle);
    assert_eq!(next_type(&mut sub).await, "CANCEL_JOB_DONE");
    assert_eq!(executor.cancelled(), vec![handle.job_id]);

    // Cancelling again is a no-op.
    core.cancel_job(handle.job_id).await.unwrap();
    let (job, sink) = executor.sink(0);
    sink.canceled(job);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_quiet(&mut sub);
}

#[tokio::test]
async fn test_local_executor_runs_to_completion() {
    let core = local_core();
    populated(&core).await;
    let mut sub = observer(&core).await;

    let handle = core.run_analysis(an(1)).await.unwrap();

    let mut types = Vec::new();
    let result = loop {
        let message = next(&mut sub).await;
        types.push(message.message_type());
        if let Message::FinishJob { result, job, .. } = &*message {
            assert_eq!(*job, handle.job_id);
            break result.clone();
        }
    };
    assert_eq!(types, vec!["JOB_STARTED", "TASK_RESULT", "TASK_RESULT", "FINISH_JOB"]);
    assert_eq!(result["analysisType"], "APPLY_DISK_MASK");
    assert_eq!(
        core.job(handle.job_id).await.unwrap().status,
        JobStatus::Finished
    );
}

#[tokio::test]
async fn test_roi_outside_scan_is_a_run_time_error() {
    let core = local_core();
    core.connect(local()).await.unwrap();
    core.register_dataset(ds(1), memory_params()).await.unwrap();
    core.create_or_update_compound_analysis(ca(1), ds(1), compound_details())
        .await
        .unwrap();

    // Creation does not check ROI semantics.
    core.create_or_update_analysis(
        an(1),
        ca(1),
        AnalysisDetails::new(
            AnalysisKind::ApplyDiskMask,
            json!({"roi": {"shape": "disk", "r": 1, "cx": 40, "cy": 1}}),
        ),
    )
    .await
    .unwrap();
    let mut sub = observer(&core).await;

    let handle = core.run_analysis(an(1)).await.unwrap();

    let mut last = next(&mut sub).await;
    while last.message_type() == "JOB_STARTED" {
        last = next(&mut sub).await;
    }
    assert_eq!(last.message_type(), "JOB_ERROR");
    assert_eq!(core.job(handle.job_id).await.unwrap().status, JobStatus::Error);
}

#[tokio::test]
async fn test_overflowing_rect_roi_fails_the_job() {
    let core = local_core();
    core.connect(local()).await.unwrap();
    core.register_dataset(ds(1), memory_params()).await.unwrap();
    core.create_or_update_compound_analysis(ca(1), ds(1), compound_details())
        .await
        .unwrap();
    core.create_or_update_analysis(
        an(1),
        ca(1),
        AnalysisDetails::new(
            AnalysisKind::SumFrames,
            json!({"roi": {"shape": "rect", "x": i64::MAX, "y": 0, "width": 1, "height": 1}}),
        ),
    )
    .await
    .unwrap();
    let mut sub = observer(&core).await;

    let handle = core.run_analysis(an(1)).await.unwrap();

    assert_eq!(next_type(&mut sub).await, "JOB_STARTED");
    let message = next(&mut sub).await;
    let value = message.to_json();
    assert_eq!(value["messageType"], "JOB_ERROR");
    assert_eq!(value["code"], "JOB_EXECUTION_ERROR");
    assert_eq!(core.job(handle.job_id).await.unwrap().status, JobStatus::Error);
}

// =============================================================================
// Removal
// =============================================================================

#[tokio::test]
async fn test_remove_dataset_cascades_in_order() {
    let (core, executor) = manual_core();
    populated(&core).await;
    let handle = core.run_analysis(an(1)).await.unwrap();
    let mut sub = observer(&core).await;

    let err = core.remove_dataset(ds(2)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    core.remove_dataset(ds(1)).await.unwrap();

    assert_eq!(
        *next(&mut sub).await,
        Message::CancelJobDone {
            job: handle.job_id,
            analysis: an(1)
        }
    );
    assert_eq!(*next(&mut sub).await, Message::AnalysisRemoved { analysis: an(1) });
    assert_eq!(
        *next(&mut sub).await,
        Message::CompoundAnalysisRemoved {
            compound_analysis: ca(1)
        }
    );
    assert_eq!(*next(&mut sub).await, Message::DeleteDataset { dataset: ds(1) });
    assert_quiet(&mut sub);

    assert_eq!(executor.cancelled(), vec![handle.job_id]);
    let snapshot = core.snapshot().await;
    assert!(snapshot.datasets.is_empty());
    assert!(snapshot.compound_analyses.is_empty());
    assert!(snapshot.analyses.is_empty());
    assert!(snapshot.jobs.is_empty());

    let err = core.remove_dataset(ds(1)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn test_remove_compound_cascades_and_keeps_dataset() {
    let (core, executor) = manual_core();
    populated(&core).await;
    let handle = core.run_analysis(an(1)).await.unwrap();
    let mut sub = observer(&core).await;

    core.remove_compound_analysis(ca(1)).await.unwrap();

    assert_eq!(next_type(&mut sub).await, "CANCEL_JOB_DONE");
    assert_eq!(*next(&mut sub).await, Message::AnalysisRemoved { analysis: an(1) });
    assert_eq!(
        *next(&mut sub).await,
        Message::CompoundAnalysisRemoved {
            compound_analysis: ca(1)
        }
    );
    assert_quiet(&mut sub);

    assert_eq!(executor.cancelled(), vec![handle.job_id]);
    assert!(core.dataset(ds(1)).await.is_ok());
    let err = core.analysis(an(1)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    let err = core.remove_compound_analysis(ca(1)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn test_remove_analysis_updates_parent_order() {
    let (core, executor) = manual_core();
    populated(&core).await;
    core.create_or_update_analysis(
        an(2),
        ca(1),
        AnalysisDetails::new(AnalysisKind::SumFrames, json!({})),
    )
    .await
    .unwrap();
    let handle = core.run_analysis(an(1)).await.unwrap();
    let mut sub = observer(&core).await;

    core.remove_analysis(an(1)).await.unwrap();

    assert_eq!(
        *next(&mut sub).await,
        Message::CancelJobDone {
            job: handle.job_id,
            analysis: an(1)
        }
    );
    assert_eq!(*next(&mut sub).await, Message::AnalysisRemoved { analysis: an(1) });
    match &*next(&mut sub).await {
        Message::CompoundAnalysisUpdated {
            compound_analysis,
            details,
            ..
        } => {
            assert_eq!(*compound_analysis, ca(1));
            assert_eq!(details.analyses, vec![an(2)]);
        }
        other => panic!("unexpected message: {:?}", other),
    }
    assert_quiet(&mut sub);

    assert_eq!(executor.cancelled(), vec![handle.job_id]);
    assert!(core.job(handle.job_id).await.is_err());
    let err = core.remove_analysis(an(1)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

// =============================================================================
// Dispatcher
// =============================================================================

#[tokio::test]
async fn test_dispatch_replies() {
    let (core, _) = manual_core();

    let reply = core.dispatch(Command::ListDatasets).await;
    assert_eq!(
        reply,
        json!({"status": "ok", "messageType": "DATASETS", "datasets": []})
    );

    let reply = core.dispatch(Command::RunAnalysis { id: an(1) }).await;
    assert_eq!(reply["status"], "error");
    assert_eq!(reply["messageType"], "NOT_CONNECTED");
    assert!(reply["msg"].as_str().unwrap().contains("not connected"));

    let reply = core.dispatch(Command::GetConfig).await;
    assert_eq!(reply["messageType"], "CONFIG");
    assert_eq!(reply["config"]["version"], framehub::VERSION);

    core.dispatch(Command::Connect { connection: local() }).await;
    let reply = core
        .dispatch(Command::RegisterDataset {
            id: ds(1),
            params: memory_params(),
        })
        .await;
    assert_eq!(reply["messageType"], "CREATE_DATASET");
    assert_eq!(reply["details"]["params"]["shape"], json!([4, 4, 8, 8]));

    let reply = core.dispatch(Command::GetDataset { id: ds(1) }).await;
    assert_eq!(reply["messageType"], "DATASET");
    assert_eq!(reply["dataset"], json!(ds(1)));

    let reply = core.dispatch(Command::RemoveDataset { id: ds(2) }).await;
    assert_eq!(reply["messageType"], "NOT_FOUND");
}

#[tokio::test]
async fn test_dispatch_value_rejects_undecodable_requests() {
    let (core, _) = manual_core();
    core.connect(local()).await.unwrap();
    let mut sub = observer(&core).await;

    let requests = [
        json!({
            "op": "registerDataset",
            "id": ds(1),
            "params": {"type": "MEMORY", "dtype": "float16",
                       "detector_size": [8, 8], "scan_size": [4, 4]}
        }),
        json!({
            "op": "registerDataset",
            "id": ds(1),
            "params": {"type": "RAW", "dtype": "float32",
                       "detector_size": [8, 8], "scan_size": [4, 4]}
        }),
        json!({"op": "connect", "connection": {"type": "local", "numWorkers": -1}}),
    ];
    for request in requests {
        let reply = core.dispatch_value(request).await;
        assert_eq!(reply["status"], "error");
        assert_eq!(reply["messageType"], "INVALID_PARAMETERS");
    }

    assert_quiet(&mut sub);
    assert!(core.datasets().await.is_empty());

    let reply = core
        .dispatch_value(json!({
            "op": "registerDataset",
            "id": ds(1),
            "params": {"type": "MEMORY", "dtype": "float32",
                       "detector_size": [8, 8], "scan_size": [4, 4]}
        }))
        .await;
    assert_eq!(reply["messageType"], "CREATE_DATASET");
}

#[tokio::test]
async fn test_shutdown_closes_observers() {
    let (core, executor) = manual_core();
    let mut sub = observer(&core).await;

    core.shutdown();
    assert!(executor.is_shut_down());

    let end = tokio::time::timeout(RECV_TIMEOUT, sub.recv()).await.unwrap();
    assert!(end.is_none());
    assert_eq!(core.subscriber_count(), 0);
}
