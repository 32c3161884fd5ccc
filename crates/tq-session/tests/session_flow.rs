//! Session orchestration against a scripted device

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tq_core::config::HostConfig;
use tq_core::error::Result;
use tq_core::{CommandOutput, ManualClock, Serial};
use tq_device::fake::{FakeBridge, FakeEvent, FakeTransport, ScriptedChooser};
use tq_device::{AndroidDevice, DeviceConnector, EndpointDirectory, PERFETTO_TRACE_FILE};
use tq_session::{
    Backend, EventKind, Orchestrator, SessionDescriptor, TriggerMode, TriggerSpec, Viewer,
};

const SERIAL: &str = "test-serial";

struct Harness {
    _dir: TempDir,
    out_dir: PathBuf,
    fake: FakeTransport,
    clock: Arc<ManualClock>,
    device: AndroidDevice,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new());
        let fake = FakeTransport::new(SERIAL).with_clock(clock.clone());
        let device = AndroidDevice::new(Arc::new(fake.clone()), clock.clone(), HostConfig::default());
        Self {
            out_dir: dir.path().to_path_buf(),
            _dir: dir,
            fake,
            clock,
            device,
        }
    }

    fn descriptor(&self) -> SessionDescriptor {
        SessionDescriptor {
            out_dir: self.out_dir.clone(),
            ..Default::default()
        }
    }

    fn pulls(&self) -> Vec<(Duration, String)> {
        self.fake
            .events()
            .into_iter()
            .filter_map(|(at, e)| match e {
                FakeEvent::Issue { args, .. } if args[0] == "pull" => Some((at, args[1].clone())),
                _ => None,
            })
            .collect()
    }

    fn spawns(&self) -> Vec<Duration> {
        self.fake
            .events()
            .into_iter()
            .filter_map(|(at, e)| match e {
                FakeEvent::Spawn { .. } => Some(at),
                _ => None,
            })
            .collect()
    }
}

#[derive(Default)]
struct RecordingViewer {
    opened: Vec<(PathBuf, Option<PathBuf>)>,
}

impl Viewer for RecordingViewer {
    fn open(&mut self, artifact: &Path, symbols: Option<&Path>) -> Result<()> {
        self.opened
            .push((artifact.to_path_buf(), symbols.map(Path::to_path_buf)));
        Ok(())
    }
}

fn users(fake: &FakeTransport) {
    fake.on(
        ["shell", "pm", "list", "users"],
        CommandOutput::ok("Users:\n\tUserInfo{0:Owner:c13} running\n\tUserInfo{10:Work:30}\n"),
    );
}

#[test]
fn test_two_runs_with_gap_between_collect_and_arm() {
    let h = Harness::new();
    let descriptor = SessionDescriptor {
        runs: 2,
        between_dur_ms: Some(5000),
        dur_ms: Some(3000),
        ..h.descriptor()
    };
    let mut viewer = RecordingViewer::default();
    let result = Orchestrator::new(&descriptor, &mut viewer)
        .run_on(&h.device)
        .unwrap()
        .unwrap();

    assert_eq!(result.runs.len(), 2);
    assert!(result.runs.iter().all(|r| r.artifacts.len() == 1));

    let pulls = h.pulls();
    let spawns = h.spawns();
    assert_eq!(pulls.len(), 2);
    assert_eq!(spawns.len(), 2);

    // arm -> collect -> arm -> collect
    assert!(spawns[0] < pulls[0].0);
    assert!(pulls[0].0 < spawns[1]);
    assert!(spawns[1] < pulls[1].0);
    assert!(spawns[1] - pulls[0].0 >= Duration::from_secs(5));

    assert_eq!(h.fake.terminations(), 2);
    // --ui defaults off for multi-run sessions
    assert!(viewer.opened.is_empty());
}

#[test]
fn test_single_run_opens_viewer_with_symbols() {
    let h = Harness::new();
    let descriptor = SessionDescriptor {
        dur_ms: Some(3000),
        symbols: Some(PathBuf::from("/symbols")),
        ..h.descriptor()
    };
    let mut viewer = RecordingViewer::default();
    let result = Orchestrator::new(&descriptor, &mut viewer)
        .run_on(&h.device)
        .unwrap()
        .unwrap();
    let artifact = result.artifacts().next().unwrap().clone();
    assert_eq!(viewer.opened, vec![(artifact, Some(PathBuf::from("/symbols")))]);
}

#[test]
fn test_clone_mode_numbers_snapshots_without_stopping() {
    let h = Harness::new();
    let descriptor = SessionDescriptor {
        event: EventKind::Trigger,
        trigger: Some(
            TriggerSpec::new(["team.pkg.first", "team.pkg.second"]).with_mode(TriggerMode::Clone),
        ),
        ..h.descriptor()
    };
    let mut viewer = RecordingViewer::default();
    let result = Orchestrator::new(&descriptor, &mut viewer)
        .run_on(&h.device)
        .unwrap()
        .unwrap();

    let pulled: Vec<String> = h.pulls().into_iter().map(|(_, p)| p).collect();
    assert_eq!(
        pulled,
        vec![
            format!("{}.0", PERFETTO_TRACE_FILE),
            format!("{}.1", PERFETTO_TRACE_FILE)
        ]
    );
    assert_eq!(result.runs[0].artifacts.len(), 2);

    // The backend is only halted once, after both snapshots
    let events = h.fake.events();
    let terminate_at = events
        .iter()
        .position(|(_, e)| matches!(e, FakeEvent::Terminate { .. }))
        .unwrap();
    let last_pull_at = events
        .iter()
        .rposition(|(_, e)| matches!(e, FakeEvent::Issue { args, .. } if args[0] == "pull"))
        .unwrap();
    assert!(terminate_at > last_pull_at);
    assert_eq!(h.fake.terminations(), 1);
}

#[test]
fn test_stop_mode_single_unsuffixed_artifact() {
    let h = Harness::new();
    let descriptor = SessionDescriptor {
        event: EventKind::Trigger,
        trigger: Some(
            TriggerSpec::new(["team.pkg.stop"])
                .with_mode(TriggerMode::Stop)
                .with_stop_delays(vec![1000]),
        ),
        ..h.descriptor()
    };
    let mut viewer = RecordingViewer::default();
    Orchestrator::new(&descriptor, &mut viewer)
        .run_on(&h.device)
        .unwrap()
        .unwrap();

    let pulled: Vec<String> = h.pulls().into_iter().map(|(_, p)| p).collect();
    assert_eq!(pulled, vec![PERFETTO_TRACE_FILE.to_string()]);
    assert_eq!(h.fake.terminations(), 1);
    assert!(h
        .fake
        .issued()
        .contains(&vec!["shell".to_string(), "trigger_perfetto".into(), "team.pkg.stop".into()]));
    assert_eq!(h.clock.sleeps(), vec![Duration::from_millis(1000)]);
}

#[test]
fn test_precondition_failure_has_no_side_effects() {
    let h = Harness::new();
    users(&h.fake);
    let descriptor = SessionDescriptor {
        event: EventKind::UserSwitch,
        to_user: Some(3),
        ..h.descriptor()
    };
    let mut viewer = RecordingViewer::default();
    let err = Orchestrator::new(&descriptor, &mut viewer)
        .run_on(&h.device)
        .unwrap()
        .unwrap_err();
    assert_eq!(
        err.message,
        "User ID 3 does not exist on device with serial test-serial."
    );
    assert!(h.spawns().is_empty());
    assert!(!h.fake.issued().iter().any(|a| a[0] == "root"));
}

#[test]
fn test_descriptor_error_stops_before_device() {
    let h = Harness::new();
    let descriptor = SessionDescriptor {
        dur_ms: Some(10),
        ..h.descriptor()
    };
    let mut viewer = RecordingViewer::default();
    assert!(Orchestrator::new(&descriptor, &mut viewer)
        .run_on(&h.device)
        .unwrap()
        .is_err());
    assert!(h.fake.events().is_empty());
}

#[test]
fn test_user_switch_session() {
    let h = Harness::new();
    users(&h.fake);
    h.fake.on_sequence(
        ["shell", "am", "get-current-user"],
        [
            CommandOutput::ok("0\n"),
            CommandOutput::ok("0\n"),
            CommandOutput::ok("10\n"),
        ],
    );
    let descriptor = SessionDescriptor {
        event: EventKind::UserSwitch,
        to_user: Some(10),
        dur_ms: Some(3000),
        ..h.descriptor()
    };
    let mut viewer = RecordingViewer::default();
    Orchestrator::new(&descriptor, &mut viewer)
        .run_on(&h.device)
        .unwrap()
        .unwrap();

    let issued = h.fake.issued();
    let switch = issued
        .iter()
        .position(|a| a.len() == 4 && a[2] == "switch-user" && a[3] == "10")
        .unwrap();
    let arm_time = h.spawns()[0];
    assert!(arm_time <= h.pulls()[0].0);
    assert!(issued[..switch].iter().any(|a| a[0] == "root"));
}

#[test]
fn test_service_package_aborts_session() {
    let h = Harness::new();
    h.fake.on(
        ["shell", "pm", "list", "packages"],
        CommandOutput::ok("package:com.example.svc\n"),
    );
    h.fake.on(
        ["shell", "am", "start"],
        CommandOutput {
            stdout: Vec::new(),
            stderr: b"Error: Activity not started, unable to resolve Intent\n".to_vec(),
            exit_code: 0,
        },
    );
    let descriptor = SessionDescriptor {
        event: EventKind::AppStartup,
        app: Some("com.example.svc".into()),
        ..h.descriptor()
    };
    let mut viewer = RecordingViewer::default();
    let err = Orchestrator::new(&descriptor, &mut viewer)
        .run_on(&h.device)
        .unwrap()
        .unwrap_err();
    assert!(err.message.contains("is a service package"));
    assert!(h.pulls().is_empty());
    assert_eq!(h.fake.terminations(), 1);
}

#[test]
fn test_app_startup_force_stops_running_app() {
    let h = Harness::new();
    h.fake.on(
        ["shell", "pm", "list", "packages"],
        CommandOutput::ok("package:com.example.app\n"),
    );
    h.fake.on(["shell", "pidof", "com.example.app"], CommandOutput::ok("1234\n"));
    let descriptor = SessionDescriptor {
        event: EventKind::AppStartup,
        app: Some("com.example.app".into()),
        dur_ms: Some(3000),
        ..h.descriptor()
    };
    let mut viewer = RecordingViewer::default();
    Orchestrator::new(&descriptor, &mut viewer)
        .run_on(&h.device)
        .unwrap()
        .unwrap();
    let issued = h.fake.issued();
    let stop = issued
        .iter()
        .position(|a| a.len() == 4 && a[2] == "force-stop")
        .unwrap();
    let start = issued
        .iter()
        .position(|a| a.len() == 4 && a[2] == "start")
        .unwrap();
    assert!(stop < start);
}

#[test]
fn test_boot_session() {
    let h = Harness::new();
    // reachable for root, gone after reboot, back for wait-for-device and root again
    let fake = h
        .fake
        .clone()
        .reachable_sequence([true, true, false, true]);
    fake.on(["shell", "getprop", "sys.boot_completed"], CommandOutput::ok("1\n"));
    let descriptor = SessionDescriptor {
        event: EventKind::Boot,
        dur_ms: Some(3000),
        ..h.descriptor()
    };
    let mut viewer = RecordingViewer::default();
    Orchestrator::new(&descriptor, &mut viewer)
        .run_on(&h.device)
        .unwrap()
        .unwrap();

    let issued = fake.issued();
    let joined: Vec<String> = issued.iter().map(|a| a.join(" ")).collect();
    let pos = |needle: &str| joined.iter().position(|c| c.starts_with(needle)).unwrap();
    assert!(pos("shell cat > /data/misc/perfetto-configs/boottrace.pbtxt") < pos("reboot"));
    assert!(pos("shell setprop persist.debug.perfetto.boottrace 1") < pos("reboot"));
    assert!(pos("reboot") < pos("wait-for-device"));
    assert!(joined
        .iter()
        .any(|c| c == "shell setprop persist.debug.perfetto.boottrace \"\""));
    assert!(joined
        .iter()
        .any(|c| c.starts_with("pull /data/misc/perfetto-traces/boottrace.perfetto-trace")));
    assert!(h.spawns().is_empty());
}

#[test]
fn test_simpleperf_session() {
    let h = Harness::new();
    h.fake.on(
        ["shell", "simpleperf", "list"],
        CommandOutput::ok("  cpu-cycles\n  instructions\n"),
    );
    let descriptor = SessionDescriptor {
        backend: Backend::Simpleperf,
        dur_ms: Some(3000),
        ..h.descriptor()
    };
    let mut viewer = RecordingViewer::default();
    Orchestrator::new(&descriptor, &mut viewer)
        .run_on(&h.device)
        .unwrap()
        .unwrap();
    let joined: Vec<String> = h.fake.issued().iter().map(|a| a.join(" ")).collect();
    assert!(joined.contains(&"shell mkdir -p /tmp/simpleperf-traces".to_string()));
    assert!(joined
        .iter()
        .any(|c| c.starts_with("pull /tmp/simpleperf-traces/perf.data")));
    let spawned = h.fake.spawned()[0].join(" ");
    assert!(spawned.contains("--duration 3 -e cpu-cycles -o /tmp/simpleperf-traces/perf.data"));
}

#[test]
fn test_execute_resolves_explicit_serial() {
    let h = Harness::new();
    let bridge = FakeBridge::with_devices(&[SERIAL, "other"]).with_transport(h.fake.clone());
    let connector = DeviceConnector::with_clock(
        EndpointDirectory::new(Arc::new(bridge)),
        HostConfig::default(),
        h.clock.clone(),
    );
    let descriptor = SessionDescriptor {
        dur_ms: Some(3000),
        ..h.descriptor()
    };
    let mut viewer = RecordingViewer::default();
    let mut chooser = ScriptedChooser::default();
    let result = Orchestrator::new(&descriptor, &mut viewer)
        .execute(&connector, Some(&Serial::new(SERIAL)), &mut chooser)
        .unwrap()
        .unwrap();
    assert_eq!(result.serial, SERIAL);
    assert_eq!(h.pulls().len(), 1);
}

#[test]
fn test_execute_unresolvable_device_is_validation_error() {
    let h = Harness::new();
    let connector = DeviceConnector::new(
        EndpointDirectory::new(Arc::new(FakeBridge::with_devices(&["a", "b"]))),
        HostConfig::default(),
    );
    let descriptor = h.descriptor();
    let mut viewer = RecordingViewer::default();
    let err = Orchestrator::new(&descriptor, &mut viewer)
        .execute(&connector, None, &mut ScriptedChooser::new(["9"]))
        .unwrap()
        .unwrap_err();
    assert_eq!(err.message, "Invalid selection: '9'.");
}
