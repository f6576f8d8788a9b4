//! End-to-end provisioning against the in-memory scheduler.

use std::sync::Arc;
use std::time::Duration;

use drover_drm::{DrmError, MockDrm, SchedulerSession};
use drover_latent::secret::escape_env_value;
use drover_latent::strategy::fixed_directives;
use drover_latent::{
    DroverConfig, GridEngineOptions, HtCondorOptions, LatentError, LatentWorker,
    NativeSpecStrategy, WorkerDescriptor, WorkerState,
};

fn shared_session(drm: &MockDrm) -> Arc<SchedulerSession> {
    Arc::new(SchedulerSession::new(Arc::new(drm.clone())))
}

fn condor_worker(session: Arc<SchedulerSession>, name: &str) -> LatentWorker {
    let descriptor = WorkerDescriptor::with_password(name, "s3cr3t")
        .unwrap()
        .with_missing_timeout(Duration::from_secs(30));
    LatentWorker::new(
        session,
        Arc::new(HtCondorOptions::default()),
        descriptor,
        "/opt/worker/bin/start-worker",
    )
    .unwrap()
}

#[tokio::test]
async fn test_pool_worker_specification() {
    let drm = MockDrm::new();
    let mut worker = condor_worker(shared_session(&drm), "pool-worker");

    worker.start().await.unwrap();
    let spec = drm.submitted()[0].native_specification.clone();

    assert!(spec.contains("request_cpu=1\n"));
    assert!(spec.contains("(time() - EnteredCurrentStatus) > 120)"));
    assert!(!spec.contains("accounting_group="));
    let env_line = format!(
        "environment=\"WORKER_PASSWORD={}\"\n",
        escape_env_value("s3cr3t")
    );
    assert!(spec.ends_with(&env_line));
    assert!(spec.contains("arguments=pool-worker\n"));

    worker.stop(false).await.unwrap();
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let drm = MockDrm::new();
    let mut worker = condor_worker(shared_session(&drm), "idem");

    worker.stop(false).await.unwrap();
    assert_eq!(drm.control_count(), 0);

    worker.start().await.unwrap();
    worker.stop(false).await.unwrap();
    worker.stop(true).await.unwrap();
    assert_eq!(drm.control_count(), 1);
    assert_eq!(worker.state(), WorkerState::Idle);
}

#[tokio::test]
async fn test_identifier_cleared_after_every_stop_outcome() {
    let drm = MockDrm::new();
    let mut worker = condor_worker(shared_session(&drm), "ids");

    // Acknowledged.
    let job_id = worker.start().await.unwrap();
    assert!(!job_id.as_str().is_empty());
    worker.stop(false).await.unwrap();
    assert!(worker.job_id().is_none());

    // Already reaped.
    let job_id = worker.start().await.unwrap();
    drm.forget_job(&job_id);
    worker.stop(false).await.unwrap();
    assert!(worker.job_id().is_none());

    // Scheduler error.
    worker.start().await.unwrap();
    drm.fail_next_control(DrmError::Drm {
        code: 2,
        message: "lost contact with qmaster".into(),
    });
    let err = worker.stop(false).await.unwrap_err();
    assert!(matches!(err, LatentError::TerminationFailed { .. }));
    assert!(worker.job_id().is_none());
    assert_eq!(worker.state(), WorkerState::Idle);

    // Job ids are never reused.
    let next = worker.start().await.unwrap();
    assert_eq!(next.as_str(), "1003");
}

#[tokio::test]
async fn test_rejected_submission_is_retryable() {
    let drm = MockDrm::new();
    let mut worker = condor_worker(shared_session(&drm), "retry");

    drm.fail_next_submit(DrmError::Drm {
        code: 16,
        message: "try later".into(),
    });
    assert!(matches!(
        worker.start().await,
        Err(LatentError::SubmissionFailed(_))
    ));
    assert_eq!(worker.state(), WorkerState::Idle);
    assert!(worker.job_id().is_none());

    worker.start().await.unwrap();
    assert_eq!(worker.state(), WorkerState::Running);
}

#[tokio::test]
async fn test_timed_out_start_is_terminated_by_stop() {
    let drm = MockDrm::new().with_submit_delay(Duration::from_millis(100));
    let mut worker = condor_worker(shared_session(&drm), "deadline");

    let attempt = tokio::time::timeout(Duration::from_millis(10), worker.start()).await;
    assert!(attempt.is_err());
    assert_eq!(worker.state(), WorkerState::Submitting);
    assert!(worker.job_id().is_none());

    // The submission lands after the caller gave up.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(drm.active_count(), 1);

    worker.stop(false).await.unwrap();
    assert_eq!(drm.active_count(), 0);
    assert_eq!(drm.control_count(), 1);
    assert_eq!(worker.state(), WorkerState::Idle);
    assert!(worker.job_id().is_none());
}

#[tokio::test]
async fn test_dropped_worker_terminates_late_submission() {
    let drm = MockDrm::new().with_submit_delay(Duration::from_millis(100));
    let mut worker = condor_worker(shared_session(&drm), "abandoned");

    let attempt = tokio::time::timeout(Duration::from_millis(10), worker.start()).await;
    assert!(attempt.is_err());
    drop(worker);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(drm.submitted().len(), 1);
    assert_eq!(drm.active_count(), 0);
    assert_eq!(drm.control_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_workers_share_one_session() {
    let drm = MockDrm::new().with_connect_delay(Duration::from_millis(10));
    let session = shared_session(&drm);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                let name = format!("grid-{i}");
                let mut worker = tokio::task::spawn_blocking(move || {
                    LatentWorker::new(
                        session,
                        Arc::new(GridEngineOptions::default().job_name(name.clone())),
                        WorkerDescriptor::new(name).unwrap(),
                        "/opt/worker/bin/start-worker",
                    )
                })
                .await
                .unwrap()
                .unwrap();
                let job_id = worker.start().await.unwrap();
                worker.stop(false).await.unwrap();
                job_id
            })
        })
        .collect();

    let mut job_ids = Vec::new();
    for handle in futures::future::join_all(handles).await {
        job_ids.push(handle.unwrap());
    }
    job_ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    job_ids.dedup();

    assert_eq!(job_ids.len(), 8);
    assert_eq!(drm.connect_count(), 1);
    assert_eq!(drm.active_count(), 0);
}

#[tokio::test]
async fn test_worker_from_config() {
    let yaml = "\
worker:
  name: cfg-worker
  password: from-config
  start_command: /opt/worker/bin/start-worker
  missing_timeout_secs: 900
variant:
  kind: htcondor
  accounting_group: group_ci
  extra_directives: requirements = HasDocker
";
    let config = DroverConfig::from_yaml_str(yaml).unwrap();
    let drm = MockDrm::new();
    let mut worker = LatentWorker::from_config(shared_session(&drm), &config).unwrap();

    worker.start().await.unwrap();
    let spec = &drm.submitted()[0].native_specification;
    assert!(spec.contains("accounting_group=group_ci\n"));
    assert!(spec.contains("requirements = HasDocker\n+JobMaxVacateTime=60\n"));
    assert!(spec.contains("> 900)"));
    assert!(spec.ends_with("environment=\"WORKER_PASSWORD='from-config'\"\n"));
}

#[test]
fn test_unavailable_scheduler_fails_at_construction() {
    let session = Arc::new(SchedulerSession::new(Arc::new(MockDrm::unavailable(
        "libdrmaa.so: cannot open shared object file",
    ))));
    let err = LatentWorker::new(
        session,
        Arc::new(HtCondorOptions::default()),
        WorkerDescriptor::new("nowhere").unwrap(),
        "/opt/worker/bin/start-worker",
    )
    .unwrap_err();
    assert!(matches!(err, LatentError::Configuration(_)));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn options() -> impl Strategy<Value = HtCondorOptions> {
        (
            proptest::option::of(1u32..64),
            proptest::option::of(1u64..1 << 24),
            proptest::option::of(1u64..1 << 16),
            proptest::option::of("[a-z_]{1,12}"),
            proptest::option::of("[a-z]{1,8}"),
            proptest::option::of("[a-z_]{1,10}"),
            proptest::option::of("([a-z_]{1,10} ?= ?[A-Za-z0-9\"]{0,10}\n?){0,4}"),
        )
            .prop_map(|(cpu, disk, memory, group, user, slot, extra)| HtCondorOptions {
                request_cpu: cpu,
                request_disk: disk,
                request_memory: memory,
                accounting_group: group,
                accounting_group_user: user,
                slot_resource: slot,
                extra_directives: extra,
            })
    }

    proptest! {
        #[test]
        fn fixed_block_is_always_the_suffix(
            options in options(),
            timeout in 0u64..5000,
            password in "[ -~]{0,20}",
        ) {
            let worker = WorkerDescriptor::with_password("prop-worker", password)
                .unwrap()
                .with_missing_timeout(Duration::from_secs(timeout));
            let spec = options.render(&worker);
            let fixed = fixed_directives(&worker);

            prop_assert!(spec.ends_with(&fixed));
            prop_assert!(spec.ends_with('\n'));
            let floor = timeout.max(120);
            let expected = format!("> {floor})\n");
            prop_assert!(fixed.contains(&expected));
        }
    }
}
