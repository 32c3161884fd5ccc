//! Session orchestrator
//!
//! Drives one profiler session through its states:
//!
//! ```text
//! ResolveEndpoint -> ValidatePreconditions -> { ArmBackend -> AwaitTrigger -> StopAndCollect } x runs -> Done
//! ```
//!
//! Runs are strictly sequential with the inter-run delay slept before every
//! run except the first. Every check that can reject the session happens
//! before the first device mutation. A [`Fault`](tq_core::Fault) at any point
//! abandons the remaining runs; a trace that was already armed is left as is.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tq_core::error::Result;
use tq_core::time::current_time_millis;
use tq_core::{BackendHandle, Serial, ValidationError, Verdict};
use tq_device::{AndroidDevice, Chooser, DeviceConnector, UserId, BOOT_TRACE_PROP, PERFETTO_BOOT_CONFIG_FILE};
use tracing::{debug, info, warn};

use crate::artifacts::{self, ArtifactNamer};
use crate::descriptor::{Backend, EventKind, SessionDescriptor, TriggerMode};
use crate::outcome::{RunOutcome, SessionResult};
use crate::perfetto;
use crate::viewer::Viewer;

/// States of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ResolveEndpoint,
    ValidatePreconditions,
    ArmBackend,
    AwaitTrigger,
    StopAndCollect,
    Done,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::ResolveEndpoint => "resolve-endpoint",
            SessionState::ValidatePreconditions => "validate-preconditions",
            SessionState::ArmBackend => "arm-backend",
            SessionState::AwaitTrigger => "await-trigger",
            SessionState::StopAndCollect => "stop-and-collect",
            SessionState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Signal that makes a backend flush and exit
fn stop_signal(backend: Backend) -> &'static str {
    match backend {
        Backend::Perfetto => "TERM",
        Backend::Simpleperf => "INT",
    }
}

/// Per-session values computed once validation has passed
struct Plan {
    config: Option<String>,
    from_user: Option<UserId>,
    events: Vec<String>,
    device_path: &'static str,
    namer: ArtifactNamer,
    clone_index: usize,
}

/// Runs a [`SessionDescriptor`] against one device
pub struct Orchestrator<'a> {
    descriptor: &'a SessionDescriptor,
    viewer: &'a mut dyn Viewer,
    args_hint: String,
    state: SessionState,
}

impl<'a> Orchestrator<'a> {
    pub fn new(descriptor: &'a SessionDescriptor, viewer: &'a mut dyn Viewer) -> Self {
        Self {
            descriptor,
            viewer,
            args_hint: String::new(),
            state: SessionState::Idle,
        }
    }

    /// Arguments shown next to each serial if the user has to pick a device
    pub fn with_args_hint(mut self, hint: impl Into<String>) -> Self {
        self.args_hint = hint.into();
        self
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn enter(&mut self, state: SessionState) {
        debug!(from = %self.state, to = %state, "Session state change");
        self.state = state;
    }

    /// Resolve the device, then run the session on it
    pub fn execute(
        &mut self,
        connector: &DeviceConnector,
        serial: Option<&Serial>,
        chooser: &mut dyn Chooser,
    ) -> Result<Verdict<SessionResult>> {
        if let Err(e) = self.descriptor.validate() {
            return Ok(Err(e));
        }

        self.enter(SessionState::ResolveEndpoint);
        let device = match connector.get_device(serial, true, chooser, &self.args_hint)? {
            Ok(Some(device)) => device,
            Ok(None) => {
                return Ok(Err(ValidationError::new(
                    "There are currently no devices connected.",
                )))
            }
            Err(e) => return Ok(Err(e)),
        };
        self.run_on(&device)
    }

    /// Run the session on an already resolved device
    pub fn run_on(&mut self, device: &AndroidDevice) -> Result<Verdict<SessionResult>> {
        let descriptor = self.descriptor;
        if let Err(e) = descriptor.validate() {
            return Ok(Err(e));
        }

        self.enter(SessionState::ValidatePreconditions);
        let mut plan = match self.validate_preconditions(device)? {
            Ok(plan) => plan,
            Err(e) => return Ok(Err(e)),
        };

        device.root_device()?;
        if descriptor.backend == Backend::Simpleperf {
            device.create_directory(artifacts::device_trace_dir(plan.device_path))?;
        }

        info!(
            serial = %device.serial(),
            event = %descriptor.event,
            backend = %descriptor.backend,
            runs = descriptor.runs,
            "Starting session"
        );

        let between = Duration::from_millis(descriptor.effective_between_dur_ms());
        let mut outcomes = Vec::with_capacity(descriptor.runs as usize);
        for run in 1..=descriptor.runs {
            if run > 1 {
                info!(delay_ms = between.as_millis() as u64, "Waiting before next run");
                device.clock().sleep(between);
            }
            match self.run_once(device, &mut plan, run)? {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => return Ok(Err(e)),
            }
        }

        if descriptor.opens_ui() {
            if let Some(last) = outcomes.last().and_then(|o| o.artifacts.last()) {
                self.viewer
                    .open(last, descriptor.symbols.as_deref())?;
            }
        }

        self.enter(SessionState::Done);
        Ok(Ok(SessionResult {
            serial: device.serial().to_string(),
            event: descriptor.event,
            backend: descriptor.backend,
            runs: outcomes,
        }))
    }

    fn validate_preconditions(&mut self, device: &AndroidDevice) -> Result<Verdict<Plan>> {
        let descriptor = self.descriptor;
        if let Err(e) = device.check_connection()? {
            return Ok(Err(e));
        }

        let mut from_user = None;
        if descriptor.event == EventKind::UserSwitch {
            if let Some(to_user) = descriptor.to_user {
                if let Err(e) = device.user_exists(to_user)? {
                    return Ok(Err(e));
                }
            }
            let user = match descriptor.from_user {
                Some(user) => {
                    if let Err(e) = device.user_exists(user)? {
                        return Ok(Err(e));
                    }
                    user
                }
                None => device.get_current_user()?,
            };
            if Some(user) == descriptor.to_user {
                return Ok(Err(ValidationError::with_suggestion(
                    format!("Cannot perform user-switch to user {} because the current user on device with serial {} is already {}.", user, device.serial(), user),
                    format!("Choose a --to-user ID that is different than the --from-user ID, {}.", user),
                )));
            }
            from_user = Some(user);
        }

        if let Some(app) = &descriptor.app {
            if let Err(e) = device.package_exists(app)? {
                return Ok(Err(e));
            }
        }

        let events = descriptor.effective_simpleperf_events();
        if descriptor.backend == Backend::Simpleperf {
            if let Err(e) = device.simpleperf_event_exists(&events)? {
                return Ok(Err(e));
            }
        }

        let config = match descriptor.backend {
            Backend::Perfetto => Some(perfetto::session_config(descriptor)?),
            Backend::Simpleperf => None,
        };

        Ok(Ok(Plan {
            config,
            from_user,
            events,
            device_path: artifacts::device_trace_path(descriptor.backend, descriptor.event),
            namer: ArtifactNamer::new(
                &descriptor.out_dir,
                descriptor.backend,
                descriptor.event,
                descriptor.runs,
                current_time_millis(),
            ),
            clone_index: 0,
        }))
    }

    fn run_once(
        &mut self,
        device: &AndroidDevice,
        plan: &mut Plan,
        run: u32,
    ) -> Result<Verdict<RunOutcome>> {
        let descriptor = self.descriptor;
        let started = device.clock().now();
        let dur = Duration::from_millis(descriptor.effective_dur_ms());
        info!(run, of = descriptor.runs, "Performing run");

        // Put the device in the starting state for the event
        match descriptor.event {
            EventKind::UserSwitch => {
                if let Some(from_user) = plan.from_user {
                    if device.get_current_user()? != from_user {
                        device.perform_user_switch(from_user)?;
                        device.wait_for_user(from_user)?;
                    }
                }
            }
            EventKind::AppStartup => {
                if let Some(app) = &descriptor.app {
                    match device.is_process_running(app)? {
                        Ok(true) => device.force_stop_package(app)?,
                        Ok(false) => {}
                        Err(e) => return Ok(Err(e)),
                    }
                }
            }
            _ => {}
        }

        self.enter(SessionState::ArmBackend);
        let config = plan.config.as_deref().unwrap_or_default();
        let mut handle: Option<Box<dyn BackendHandle>> = match (descriptor.backend, descriptor.event) {
            (Backend::Perfetto, EventKind::Boot) => {
                device.write_to_file(PERFETTO_BOOT_CONFIG_FILE, config)?;
                device.set_prop(BOOT_TRACE_PROP, "1")?;
                None
            }
            (Backend::Perfetto, _) => Some(device.start_perfetto_trace(config)?),
            (Backend::Simpleperf, _) => {
                Some(device.start_simpleperf_trace(&plan.events, descriptor.dur_ms)?)
            }
        };

        self.enter(SessionState::AwaitTrigger);
        let mut artifacts = Vec::new();
        let mut success = true;
        match descriptor.event {
            EventKind::Custom => device.clock().sleep(dur),
            EventKind::Boot => {
                device.reboot()?;
                device.wait_for_device()?;
                device.wait_for_boot_completed()?;
                device.root_device()?;
                device.clock().sleep(dur);
                device.clear_prop(BOOT_TRACE_PROP)?;
            }
            EventKind::UserSwitch => {
                if let Some(to_user) = descriptor.to_user {
                    device.perform_user_switch(to_user)?;
                    device.wait_for_user(to_user)?;
                }
                device.clock().sleep(dur);
            }
            EventKind::AppStartup => {
                if let Some(app) = &descriptor.app {
                    if let Err(e) = device.start_package(app)? {
                        if let Some(h) = handle.as_mut() {
                            h.terminate()?;
                        }
                        return Ok(Err(e));
                    }
                }
                device.clock().sleep(dur);
            }
            EventKind::Trigger => {
                if let Some(trigger) = &descriptor.trigger {
                    for (i, name) in trigger.names.iter().enumerate() {
                        device.trigger_perfetto(name)?;
                        let delay = trigger.stop_delay_ms(i);
                        if delay > 0 {
                            device.clock().sleep(Duration::from_millis(delay));
                        }
                        if trigger.mode == TriggerMode::Clone {
                            let index = plan.clone_index;
                            plan.clone_index += 1;
                            let host = plan.namer.clone_path(run, index);
                            let source = artifacts::clone_path(plan.device_path, index);
                            match collect(device, &source, host, &mut artifacts)? {
                                Ok(pulled) => success &= pulled,
                                Err(e) => return Ok(Err(e)),
                            }
                        }
                    }
                    if trigger.mode == TriggerMode::Start {
                        device.clock().sleep(dur);
                    }
                }
            }
        }

        self.enter(SessionState::StopAndCollect);
        let process = descriptor.backend.process_name();
        match device.is_process_running(process)? {
            Ok(true) => device.send_signal(process, stop_signal(descriptor.backend))?,
            Ok(false) => {}
            Err(e) => return Ok(Err(e)),
        }
        if let Some(h) = handle.as_mut() {
            if h.is_running()? {
                h.terminate()?;
            }
            match h.wait()? {
                Some(code) => debug!(code, "Backend exited"),
                None => debug!("Backend exited on a signal"),
            }
        }

        let clones = matches!(&descriptor.trigger, Some(t) if t.mode == TriggerMode::Clone);
        if !clones {
            let host = plan.namer.run_path(run);
            match collect(device, plan.device_path, host, &mut artifacts)? {
                Ok(pulled) => success &= pulled,
                Err(e) => return Ok(Err(e)),
            }
        }

        let elapsed = device.clock().now().saturating_duration_since(started);
        Ok(Ok(RunOutcome {
            run,
            artifacts,
            elapsed_ms: elapsed.as_millis() as u64,
            success,
        }))
    }
}

/// Pull `source` to `host` and delete it from the device
fn collect(
    device: &AndroidDevice,
    source: &str,
    host: PathBuf,
    artifacts: &mut Vec<PathBuf>,
) -> Result<Verdict<bool>> {
    let pulled = match device.pull_file(source, &host)? {
        Ok(pulled) => pulled,
        Err(e) => return Ok(Err(e)),
    };
    if let Err(e) = device.remove_file(source)? {
        return Ok(Err(e));
    }
    if pulled {
        info!(path = %host.display(), "Trace saved");
        artifacts.push(host);
    } else {
        warn!(source, "Trace file could not be pulled from the device");
    }
    Ok(Ok(pulled))
}
