use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use camfleet_common::config::Config;
use camfleet_common::credential::Credential;
use camfleet_common::deployment::{
    ConfigurePolicy, DeploymentResult, DeploymentStage, LifecycleStep, ProgressEvent,
};
use camfleet_common::package::PackageArtifact;
use camfleet_core::{BatchDeployer, BatchDeploymentJob, Discovery, ProgressStream};
use serde_json::json;

use crate::fleet::{Fault, PASSWORD, SimDevice, SimFleet};

fn camera_at(host: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 2, 0, host))
}

fn artifact(version: &str) -> PackageArtifact {
    PackageArtifact::from_bytes("app", version, format!("app-{version}.eap"), vec![0x1f; 4096])
}

fn credential() -> Credential {
    Credential::new("root", PASSWORD)
}

fn fleet_of(count: u8, device: impl Fn(u8) -> SimDevice) -> Arc<SimFleet> {
    let fleet = (1..=count).fold(SimFleet::new(), |fleet, host| {
        fleet.with_device(camera_at(host), device(host))
    });
    Arc::new(fleet)
}

fn deployer(fleet: &Arc<SimFleet>) -> BatchDeployer {
    BatchDeployer::new(fleet.clone(), Arc::new(Config::default()))
}

fn job(count: u8, version: &str) -> BatchDeploymentJob {
    BatchDeploymentJob::for_addresses((1..=count).map(camera_at), artifact(version), credential())
}

async fn drain(mut progress: ProgressStream) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Some(event) = progress.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn one_failing_device_does_not_stop_the_batch() {
    let fleet = fleet_of(10, |host| {
        let device = SimDevice::camera("M3045-V").with_latency(Duration::from_millis(2));
        if host == 3 {
            device.with_fault(Fault::RefuseAction("install"))
        } else {
            device
        }
    });

    let (run, progress) = deployer(&fleet).deploy_batch(job(10, "1.0").with_concurrency(5)).unwrap();
    let job_id = run.job_id();
    let events = drain(progress).await;
    let report = run.wait().await;

    assert_eq!(report.job_id, job_id);
    assert_eq!(report.len(), 10);
    assert_eq!(report.succeeded(), 9);
    assert_eq!(report.failed(), 1);

    match report.get(&camera_at(3)) {
        Some(DeploymentResult::Failure { stage, step, reason }) => {
            assert_eq!(*stage, DeploymentStage::Installing);
            assert_eq!(*step, Some(LifecycleStep::Install));
            assert!(reason.contains("install refused"), "{reason}");
        }
        other => panic!("expected failure for .3, got {other:?}"),
    }
    assert_eq!(fleet.installed(camera_at(7)), vec![("app".to_string(), "app-1.0.eap".to_string())]);

    assert!(events.iter().all(|e| e.job_id == job_id));
    for host in 1..=10 {
        let last = events
            .iter()
            .filter(|e| e.address == camera_at(host))
            .last()
            .unwrap();
        let expected = if host == 3 { DeploymentStage::Failed } else { DeploymentStage::Complete };
        assert_eq!(last.stage, expected, "last event of .{host}");
    }
}

#[tokio::test]
async fn upgrade_stops_and_removes_the_old_version_first() {
    let fleet = fleet_of(1, |_| SimDevice::camera("M3045-V").with_app("app", "1.0"));

    let (run, progress) = deployer(&fleet).deploy_batch(job(1, "2.0")).unwrap();
    let events = drain(progress).await;
    let report = run.wait().await;

    assert!(report.get(&camera_at(1)).is_some_and(DeploymentResult::is_success));

    let steps: Vec<LifecycleStep> = events.iter().filter_map(|e| e.step).collect();
    assert_eq!(
        steps,
        vec![
            LifecycleStep::List,
            LifecycleStep::Stop,
            LifecycleStep::Remove,
            LifecycleStep::Upload,
            LifecycleStep::Install,
            LifecycleStep::Start,
        ]
    );

    let served: Vec<String> = fleet
        .served(camera_at(1))
        .into_iter()
        .map(|(operation, _)| operation)
        .collect();
    assert_eq!(served, ["stop", "remove", "upload", "install", "start"]);
    assert_eq!(
        fleet.installed(camera_at(1)),
        vec![("app".to_string(), "app-2.0.eap".to_string())]
    );

    let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(percents.last(), Some(&100));
}

#[tokio::test]
async fn stalled_upload_fails_at_the_upload_step() {
    let fleet = fleet_of(2, |host| {
        let device = SimDevice::camera("M3045-V");
        if host == 2 { device.with_fault(Fault::UploadTimeout) } else { device }
    });

    let (run, progress) = deployer(&fleet).deploy_batch(job(2, "1.0")).unwrap();
    drain(progress).await;
    let report = run.wait().await;

    assert!(report.get(&camera_at(1)).is_some_and(DeploymentResult::is_success));
    match report.get(&camera_at(2)) {
        Some(DeploymentResult::Failure { stage, step, reason }) => {
            assert_eq!(*stage, DeploymentStage::Uploading);
            assert_eq!(*step, Some(LifecycleStep::Upload));
            assert!(reason.contains("timed out"), "{reason}");
        }
        other => panic!("expected upload failure, got {other:?}"),
    }
}

/// Most tasks seen between their first event and a terminal stage at once, replaying the
/// stream in the order it was published.
fn peak_active_tasks(events: &[ProgressEvent]) -> usize {
    let mut active = HashSet::new();
    let mut peak = 0;
    for event in events {
        if event.stage.is_terminal() {
            active.remove(&event.address);
        } else {
            active.insert(event.address);
            peak = peak.max(active.len());
        }
    }
    peak
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_caps_tasks_in_flight() {
    let fleet = fleet_of(12, |_| SimDevice::camera("M3045-V").with_latency(Duration::from_millis(15)));

    let (run, progress) = deployer(&fleet).deploy_batch(job(12, "1.0").with_concurrency(3)).unwrap();
    let events = drain(progress).await;
    let report = run.wait().await;

    assert_eq!(report.succeeded(), 12);
    let peak = peak_active_tasks(&events);
    assert!(peak <= 3, "{peak} tasks were between connecting and a terminal stage");
    assert!(peak >= 2, "tasks never overlapped");
    assert!(fleet.peak_in_flight() <= 3, "peak was {}", fleet.peak_in_flight());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_worker_runs_tasks_one_after_another() {
    let fleet = fleet_of(4, |_| SimDevice::camera("M3045-V").with_latency(Duration::from_millis(2)));

    let (run, progress) = deployer(&fleet).deploy_batch(job(4, "1.0").with_concurrency(1)).unwrap();
    let events = drain(progress).await;
    run.wait().await;

    assert_eq!(peak_active_tasks(&events), 1);
    let starts = events
        .iter()
        .filter(|e| e.stage == DeploymentStage::Connecting && e.step.is_none())
        .count();
    assert_eq!(starts, 4);
}

#[tokio::test]
async fn cancel_reports_unstarted_devices() {
    let fleet = fleet_of(5, |_| SimDevice::camera("M3045-V").with_latency(Duration::from_millis(5)));

    let (run, mut progress) = deployer(&fleet).deploy_batch(job(5, "1.0").with_concurrency(1)).unwrap();
    let first = progress.recv().await.unwrap();
    run.cancel();
    drain(progress).await;
    let report = run.wait().await;

    assert_eq!(report.len(), 5);
    assert!(report.get(&first.address).is_some_and(DeploymentResult::is_success));
    let cancelled = report
        .iter()
        .filter(|(_, result)| {
            matches!(result, DeploymentResult::Failure { reason, .. } if reason == "cancelled")
        })
        .count();
    assert_eq!(cancelled, 4);
}

#[tokio::test]
async fn configuration_failure_follows_the_policy() {
    let fleet = fleet_of(1, |_| SimDevice::camera("M3045-V").with_fault(Fault::ConfigureError));
    let settings = json!({ "sensitivity": 80 });

    let lenient = job(1, "1.0").with_configuration(settings.clone());
    let (run, progress) = deployer(&fleet).deploy_batch(lenient).unwrap();
    drain(progress).await;
    match run.wait().await.get(&camera_at(1)) {
        Some(DeploymentResult::Success { warning, .. }) => assert!(warning.is_some()),
        other => panic!("expected success with warning, got {other:?}"),
    }

    let strict = job(1, "1.0")
        .with_configuration(settings)
        .with_configure_policy(ConfigurePolicy::Required);
    let (run, progress) = deployer(&fleet).deploy_batch(strict).unwrap();
    drain(progress).await;
    match run.wait().await.get(&camera_at(1)) {
        Some(DeploymentResult::Failure { stage, step, .. }) => {
            assert_eq!(*stage, DeploymentStage::Configuring);
            assert_eq!(*step, Some(LifecycleStep::Configure));
        }
        other => panic!("expected configure failure, got {other:?}"),
    }
}

#[tokio::test]
async fn discovered_devices_feed_a_deployment() {
    let fleet = Arc::new(
        SimFleet::new()
            .with_device(camera_at(1), SimDevice::camera("M3045-V"))
            .with_device(camera_at(2), SimDevice::speaker())
            .with_device(camera_at(3), SimDevice::camera("P1455-LE").with_password("other")),
    );
    let config = Arc::new(Config::default());
    let targets = (1..=5).map(camera_at).collect();

    let devices = Discovery::new(fleet.clone(), config.clone())
        .scan(&targets, &credential())
        .await
        .unwrap();
    let job = BatchDeploymentJob::from_devices(&devices, artifact("1.0"), credential());
    assert_eq!(job.targets, vec![SocketAddr::new(camera_at(1), 80)]);

    let (run, progress) = BatchDeployer::new(fleet.clone(), config).deploy_batch(job).unwrap();
    drain(progress).await;
    let report = run.wait().await;

    assert_eq!(report.len(), 1);
    assert_eq!(report.succeeded(), 1);
    assert!(fleet.served(camera_at(2)).is_empty());
}

#[tokio::test]
async fn rejected_credentials_fail_while_connecting() {
    let fleet = fleet_of(1, |_| SimDevice::camera("M3045-V").with_password("other"));

    let (run, progress) = deployer(&fleet).deploy_batch(job(1, "1.0")).unwrap();
    drain(progress).await;

    match run.wait().await.get(&camera_at(1)) {
        Some(DeploymentResult::Failure { stage, step, reason }) => {
            assert_eq!(*stage, DeploymentStage::Connecting);
            assert_eq!(*step, Some(LifecycleStep::List));
            assert!(reason.contains("rejected"), "{reason}");
        }
        other => panic!("expected auth failure, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_jobs_are_refused_up_front() {
    let fleet = fleet_of(1, |_| SimDevice::camera("M3045-V"));

    let empty = PackageArtifact::from_bytes("app", "1.0", "app.eap", Vec::new());
    let job = BatchDeploymentJob::for_addresses([camera_at(1)], empty, credential());
    assert!(deployer(&fleet).deploy_batch(job).is_err());

    assert!(deployer(&fleet)
        .deploy_batch(self::job(1, "1.0").with_concurrency(0))
        .is_err());
    assert!(fleet.served(camera_at(1)).is_empty());
}
