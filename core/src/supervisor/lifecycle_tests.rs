//! Lifecycle tests for the supervisor pipeline
//!
//! These exercise the ordering and short-circuit contracts of the linear
//! pipeline and the signal-forwarding behavior of the supervise loop,
//! using the scripted command runner and the mock process adapter.

use super::adapters::{MockInstruction, MockProcessAdapter};
use super::pipeline::Supervisor;
use crate::config::SupervisorConfig;
use crate::runner::{CommandOutcome, ScriptedRunner};
use crate::CoreError;
use schema::{InterfaceSpec, StackSpec, SupervisorEvent, SupervisorState};
use std::future::pending;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

fn test_config(sysfs_root: &Path) -> SupervisorConfig {
    SupervisorConfig {
        stack: StackSpec {
            manifest_dir: PathBuf::from("/opt/netstack"),
            ..StackSpec::default()
        },
        interface: InterfaceSpec {
            sysfs_root: sysfs_root.to_path_buf(),
            ready_timeout_ms: 300,
            poll_interval_ms: 10,
            ..InterfaceSpec::default()
        },
        graceful_timeout_secs: 1,
    }
}

fn make_supervisor(
    config: SupervisorConfig,
    runner: &ScriptedRunner,
    adapter: &MockProcessAdapter,
) -> (Supervisor, broadcast::Receiver<SupervisorEvent>) {
    let (event_tx, event_rx) = broadcast::channel(64);
    let supervisor = Supervisor::new(
        config,
        Arc::new(runner.clone()),
        Arc::new(adapter.clone()),
        event_tx,
    );
    (supervisor, event_rx)
}

fn drain(rx: &mut broadcast::Receiver<SupervisorEvent>) -> Vec<SupervisorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn sysfs_with_device(name: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join(name)).expect("create device dir");
    dir
}

#[tokio::test]
async fn build_failure_short_circuits_everything() {
    let sysfs = sysfs_with_device("tun0");
    let runner = ScriptedRunner::new();
    runner.push_outcome(CommandOutcome::failed(101, "")).await;
    let adapter = MockProcessAdapter::new();

    let (supervisor, _rx) = make_supervisor(test_config(sysfs.path()), &runner, &adapter);
    let err = supervisor.run_with_shutdown(pending::<()>()).await.unwrap_err();

    match err {
        CoreError::BuildFailed { status } => assert_eq!(status, 101),
        other => panic!("expected BuildFailed, got: {}", other),
    }
    assert_eq!(err.exit_code(), 101);

    // No capability grant, no spawn, no interface configuration
    let recorded = runner.recorded().await;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].program, "cargo");
    assert_eq!(adapter.spawn_count(), 0);
}

#[tokio::test]
async fn clean_run_walks_the_stages_in_order() {
    let sysfs = sysfs_with_device("tun0");
    let runner = ScriptedRunner::new();
    let adapter = MockProcessAdapter::new();
    adapter
        .add_instruction(MockInstruction {
            exit_delay: Duration::from_millis(100),
            ..MockInstruction::default()
        })
        .await;

    let (supervisor, mut rx) = make_supervisor(test_config(sysfs.path()), &runner, &adapter);
    let exit = supervisor
        .run_with_shutdown(pending::<()>())
        .await
        .expect("clean run");

    assert!(exit.success());
    assert_eq!(exit.status_code(), 0);

    let recorded = runner.recorded().await;
    let programs: Vec<&str> = recorded.iter().map(|c| c.program.as_str()).collect();
    assert_eq!(programs, vec!["cargo", "setcap", "ip", "ip"]);
    assert_eq!(
        recorded[1].args,
        vec![
            "cap_net_admin+eip",
            "/opt/netstack/target/release/netstack"
        ]
    );

    // Natural exit: nothing was forwarded
    assert_eq!(adapter.spawn_count(), 1);
    assert_eq!(adapter.terminate_count(), 0);
    assert_eq!(adapter.kill_count(), 0);

    let events = drain(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, SupervisorEvent::SignalForwarded { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, SupervisorEvent::InterfaceConfigured { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        SupervisorEvent::StateChanged {
            from_state: SupervisorState::Running,
            to_state: SupervisorState::Exited,
            ..
        }
    )));
}

#[tokio::test]
async fn spawn_failure_aborts_before_interface_configuration() {
    let sysfs = sysfs_with_device("tun0");
    let runner = ScriptedRunner::new();
    let adapter = MockProcessAdapter::new();
    adapter.fail_spawns();

    let (supervisor, _rx) = make_supervisor(test_config(sysfs.path()), &runner, &adapter);
    let err = supervisor.run_with_shutdown(pending::<()>()).await.unwrap_err();

    assert!(matches!(err, CoreError::SpawnError(_)));
    assert_eq!(err.exit_code(), 21);

    // Build and grant ran, but no ip command was ever attempted
    let programs: Vec<String> = runner
        .recorded()
        .await
        .into_iter()
        .map(|c| c.program)
        .collect();
    assert_eq!(programs, vec!["cargo", "setcap"]);
}

#[tokio::test]
async fn signal_is_forwarded_exactly_once_and_wait_outlasts_the_child() {
    let sysfs = sysfs_with_device("tun0");
    let runner = ScriptedRunner::new();
    let adapter = MockProcessAdapter::new();
    adapter
        .add_instruction(MockInstruction {
            exit_delay: Duration::from_secs(30),
            responds_to_term: true,
            ..MockInstruction::default()
        })
        .await;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = shutdown_tx.send(());
    });

    let (supervisor, mut rx) = make_supervisor(test_config(sysfs.path()), &runner, &adapter);
    let exit = supervisor
        .run_with_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await
        .expect("signalled run");

    // The child died from the forwarded SIGTERM
    assert_eq!(exit.signal, Some(15));
    assert_eq!(exit.status_code(), 143);
    assert_eq!(adapter.terminate_count(), 1);
    assert_eq!(adapter.kill_count(), 0);

    let events = drain(&mut rx);
    let forwards = events
        .iter()
        .filter(|e| matches!(e, SupervisorEvent::SignalForwarded { .. }))
        .count();
    assert_eq!(forwards, 1);

    // Full state walk: Running -> SignalReceived -> Terminating -> Exited
    let transitions: Vec<(SupervisorState, SupervisorState)> = events
        .iter()
        .filter_map(|e| match e {
            SupervisorEvent::StateChanged {
                from_state,
                to_state,
                ..
            } => Some((*from_state, *to_state)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (SupervisorState::Running, SupervisorState::SignalReceived),
            (
                SupervisorState::SignalReceived,
                SupervisorState::Terminating
            ),
            (SupervisorState::Terminating, SupervisorState::Exited),
        ]
    );
}

#[tokio::test]
async fn unresponsive_child_is_killed_after_the_graceful_timeout() {
    let sysfs = sysfs_with_device("tun0");
    let runner = ScriptedRunner::new();
    let adapter = MockProcessAdapter::new();
    adapter
        .add_instruction(MockInstruction {
            exit_delay: Duration::from_secs(30),
            responds_to_term: false,
            ..MockInstruction::default()
        })
        .await;

    let (supervisor, _rx) = make_supervisor(test_config(sysfs.path()), &runner, &adapter);
    let exit = supervisor
        .run_with_shutdown(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        })
        .await
        .expect("escalated run");

    assert_eq!(exit.signal, Some(9));
    assert_eq!(exit.status_code(), 137);
    assert_eq!(adapter.terminate_count(), 1);
    assert_eq!(adapter.kill_count(), 1);
}

#[tokio::test]
async fn interface_timeout_reaps_the_child() {
    // Empty sysfs: the interface never appears
    let sysfs = tempfile::tempdir().expect("tempdir");
    let runner = ScriptedRunner::new();
    let adapter = MockProcessAdapter::new();
    adapter
        .add_instruction(MockInstruction {
            exit_delay: Duration::from_secs(30),
            responds_to_term: true,
            ..MockInstruction::default()
        })
        .await;

    let mut config = test_config(sysfs.path());
    config.interface.ready_timeout_ms = 100;

    let (supervisor, _rx) = make_supervisor(config, &runner, &adapter);
    let err = supervisor.run_with_shutdown(pending::<()>()).await.unwrap_err();

    match err {
        CoreError::InterfaceTimeout { ref interface, .. } => assert_eq!(interface, "tun0"),
        other => panic!("expected InterfaceTimeout, got: {}", other),
    }
    assert_eq!(err.exit_code(), 22);

    // The child was spawned, then terminated and reaped; no ip commands ran
    assert_eq!(adapter.spawn_count(), 1);
    assert_eq!(adapter.terminate_count(), 1);
    let programs: Vec<String> = runner
        .recorded()
        .await
        .into_iter()
        .map(|c| c.program)
        .collect();
    assert_eq!(programs, vec!["cargo", "setcap"]);
}

#[tokio::test]
async fn duplicate_address_assignment_is_nonfatal() {
    let sysfs = sysfs_with_device("tun0");
    let runner = ScriptedRunner::new();
    runner.push_outcome(CommandOutcome::ok()).await; // cargo
    runner.push_outcome(CommandOutcome::ok()).await; // setcap
    runner
        .push_outcome(CommandOutcome::failed(2, "RTNETLINK answers: File exists"))
        .await; // ip addr add
    runner.push_outcome(CommandOutcome::ok()).await; // ip link set up
    let adapter = MockProcessAdapter::new();

    let (supervisor, mut rx) = make_supervisor(test_config(sysfs.path()), &runner, &adapter);
    let exit = supervisor
        .run_with_shutdown(pending::<()>())
        .await
        .expect("idempotent run");

    assert!(exit.success());
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, SupervisorEvent::InterfaceConfigured { .. })));
}

#[tokio::test]
async fn interface_configuration_failure_still_supervises_to_exit() {
    let sysfs = sysfs_with_device("tun0");
    let runner = ScriptedRunner::new();
    runner.push_outcome(CommandOutcome::ok()).await; // cargo
    runner.push_outcome(CommandOutcome::ok()).await; // setcap
    runner
        .push_outcome(CommandOutcome::failed(1, "Cannot find device \"tun0\""))
        .await; // ip addr add
    let adapter = MockProcessAdapter::new();

    let (supervisor, mut rx) = make_supervisor(test_config(sysfs.path()), &runner, &adapter);
    let exit = supervisor
        .run_with_shutdown(pending::<()>())
        .await
        .expect("run proceeds to the wait despite config failure");

    assert!(exit.success());

    // Bring-up is skipped after the failed assignment
    let programs: Vec<String> = runner
        .recorded()
        .await
        .into_iter()
        .map(|c| c.program)
        .collect();
    assert_eq!(programs, vec!["cargo", "setcap", "ip"]);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        SupervisorEvent::Warning { code: Some(code), .. } if code == "IFACE_CONFIG"
    )));
}
