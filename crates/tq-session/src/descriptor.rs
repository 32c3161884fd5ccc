//! Session descriptor
//!
//! The immutable description of one profiler session, assembled by the CLI
//! and checked by [`SessionDescriptor::validate`] before any device is
//! touched.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tq_core::config::{ProfilerDefaults, MIN_DURATION_MS};
use tq_core::{ValidationError, Verdict};
use tq_device::{UserId, DEFAULT_SIMPLEPERF_EVENT};

/// The event a session traces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Boot,
    UserSwitch,
    AppStartup,
    Custom,
    Trigger,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Boot => "boot",
            EventKind::UserSwitch => "user-switch",
            EventKind::AppStartup => "app-startup",
            EventKind::Custom => "custom",
            EventKind::Trigger => "trigger",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boot" => Ok(EventKind::Boot),
            "user-switch" => Ok(EventKind::UserSwitch),
            "app-startup" => Ok(EventKind::AppStartup),
            "custom" => Ok(EventKind::Custom),
            "trigger" => Ok(EventKind::Trigger),
            other => Err(format!("unknown event: {}", other)),
        }
    }
}

/// On-device data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Perfetto,
    Simpleperf,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Perfetto => "perfetto",
            Backend::Simpleperf => "simpleperf",
        }
    }

    /// Name of the backend's process on the device
    pub fn process_name(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "perfetto" => Ok(Backend::Perfetto),
            "simpleperf" => Ok(Backend::Simpleperf),
            other => Err(format!("unknown profiler: {}", other)),
        }
    }
}

/// How a named trigger affects the trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// The trigger starts the trace
    Start,
    /// The trigger ends the trace
    #[default]
    Stop,
    /// The trigger snapshots the trace into a numbered file and tracing continues
    Clone,
}

impl TriggerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerMode::Start => "start",
            TriggerMode::Stop => "stop",
            TriggerMode::Clone => "clone",
        }
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(TriggerMode::Start),
            "stop" => Ok(TriggerMode::Stop),
            "clone" => Ok(TriggerMode::Clone),
            other => Err(format!("unknown trigger mode: {}", other)),
        }
    }
}

/// Named perfetto triggers and how they behave
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TriggerSpec {
    pub names: Vec<String>,
    pub mode: TriggerMode,
    /// Empty, one shared value, or one value per name
    pub stop_delays_ms: Vec<u64>,
}

impl TriggerSpec {
    /// A spec with the default mode and no stop delay
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: TriggerMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_stop_delays(mut self, delays: Vec<u64>) -> Self {
        self.stop_delays_ms = delays;
        self
    }

    /// Stop delay for the trigger at `index`
    pub fn stop_delay_ms(&self, index: usize) -> u64 {
        match self.stop_delays_ms.as_slice() {
            [] => 0,
            [shared] => *shared,
            delays => delays.get(index).copied().unwrap_or(0),
        }
    }

    fn validate(&self) -> Verdict<()> {
        if self.names.is_empty() {
            return Err(ValidationError::with_suggestion(
                "Command is invalid because --trigger-names is not passed.",
                "Set --trigger-names <name> to trace with perfetto triggers.",
            ));
        }
        let delays = self.stop_delays_ms.len();
        if delays > 1 && delays != self.names.len() {
            return Err(ValidationError::with_suggestion(
                format!(
                    "Command is invalid because {} values were passed to --trigger-stop-delay-ms for {} trigger names.",
                    delays,
                    self.names.len()
                ),
                format!(
                    "Pass one --trigger-stop-delay-ms value to share between all triggers, or exactly {} values.",
                    self.names.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Everything the orchestrator needs to run a profiler session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    pub event: EventKind,
    pub backend: Backend,
    /// Event duration; `None` uses the configured default
    pub dur_ms: Option<u64>,
    pub runs: u32,
    /// Delay between runs; `None` uses the configured default
    pub between_dur_ms: Option<u64>,
    pub out_dir: PathBuf,
    pub app: Option<String>,
    pub from_user: Option<UserId>,
    pub to_user: Option<UserId>,
    pub simpleperf_events: Option<Vec<String>>,
    /// Host file holding a perfetto text config; `None` uses the built-in one
    pub perfetto_config: Option<PathBuf>,
    pub trigger: Option<TriggerSpec>,
    /// Open the trace when done; `None` means only for single-run sessions
    pub ui: Option<bool>,
    pub symbols: Option<PathBuf>,
    pub defaults: ProfilerDefaults,
}

impl Default for SessionDescriptor {
    fn default() -> Self {
        let defaults = ProfilerDefaults::default();
        Self {
            event: EventKind::Custom,
            backend: Backend::Perfetto,
            dur_ms: None,
            runs: 1,
            between_dur_ms: None,
            out_dir: defaults.out_dir.clone(),
            app: None,
            from_user: None,
            to_user: None,
            simpleperf_events: None,
            perfetto_config: None,
            trigger: None,
            ui: None,
            symbols: None,
            defaults,
        }
    }
}

impl SessionDescriptor {
    /// Event duration after applying defaults
    pub fn effective_dur_ms(&self) -> u64 {
        self.dur_ms.unwrap_or(self.defaults.dur_ms)
    }

    /// Inter-run delay after applying defaults
    pub fn effective_between_dur_ms(&self) -> u64 {
        self.between_dur_ms.unwrap_or(self.defaults.between_dur_ms)
    }

    /// simpleperf events to record
    pub fn effective_simpleperf_events(&self) -> Vec<String> {
        self.simpleperf_events
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_SIMPLEPERF_EVENT.to_string()])
    }

    /// Whether the last trace is handed to the viewer
    pub fn opens_ui(&self) -> bool {
        self.ui.unwrap_or(self.runs == 1)
    }

    /// Check flag combinations. Touches only the host filesystem.
    pub fn validate(&self) -> Verdict<()> {
        if !self.out_dir.is_dir() {
            return Err(ValidationError::new(format!(
                "Command is invalid because --out-dir is not a valid directory path: {}.",
                self.out_dir.display()
            )));
        }

        if matches!(self.dur_ms, Some(ms) if ms < MIN_DURATION_MS) {
            return Err(ValidationError::with_suggestion(
                format!(
                    "Command is invalid because --dur-ms cannot be set to a value smaller than {}.",
                    MIN_DURATION_MS
                ),
                format!(
                    "Set --dur-ms {} to capture a trace for {} seconds.",
                    MIN_DURATION_MS,
                    MIN_DURATION_MS / 1000
                ),
            ));
        }

        if let Some(user) = self.from_user {
            if self.event != EventKind::UserSwitch {
                return Err(ValidationError::with_suggestion(
                    "Command is invalid because --from-user is passed, but --event is not set to user-switch.",
                    format!(
                        "Set --event user-switch --from-user {0} to perform a user-switch from user {0}.",
                        user
                    ),
                ));
            }
        }

        if let Some(user) = self.to_user {
            if self.event != EventKind::UserSwitch {
                return Err(ValidationError::with_suggestion(
                    "Command is invalid because --to-user is passed, but --event is not set to user-switch.",
                    format!(
                        "Set --event user-switch --to-user {0} to perform a user-switch to user {0}.",
                        user
                    ),
                ));
            }
        }

        if self.event == EventKind::UserSwitch && self.to_user.is_none() {
            return Err(ValidationError::with_suggestion(
                "Command is invalid because --to-user is not passed.",
                format!(
                    "Set --event {0} --to-user <user-id> to perform a {0}.",
                    self.event
                ),
            ));
        }

        if self.event == EventKind::Boot && self.backend == Backend::Simpleperf {
            return Err(ValidationError::with_suggestion(
                "Boot event is not yet implemented for simpleperf.",
                "Please try another event.",
            ));
        }

        if self.app.is_some() && self.event != EventKind::AppStartup {
            return Err(ValidationError::with_suggestion(
                "Command is invalid because --app is passed and --event is not set to app-startup.",
                "To profile an app startup run: torq --event app-startup --app <package-name>",
            ));
        }

        if self.event == EventKind::AppStartup && self.app.is_none() {
            return Err(ValidationError::with_suggestion(
                "Command is invalid because --app is not passed.",
                format!(
                    "Set --event {0} --app <package> to perform an {0}.",
                    self.event
                ),
            ));
        }

        if self.runs < 1 {
            return Err(ValidationError::new(
                "Command is invalid because --runs cannot be set to a value smaller than 1.",
            ));
        }

        if self.runs > 1 && self.ui == Some(true) {
            return Err(ValidationError::with_suggestion(
                "Command is invalid because --ui cannot be passed if --runs is set to a value greater than 1.",
                format!("Set torq -r {0} --no-ui to perform {0} runs.", self.runs),
            ));
        }

        if let Some(events) = &self.simpleperf_events {
            if self.backend != Backend::Simpleperf {
                return Err(ValidationError::with_suggestion(
                    "Command is invalid because --simpleperf-event cannot be passed if --profiler is not set to simpleperf.",
                    format!(
                        "To capture the simpleperf event run: torq --profiler simpleperf --simpleperf-event {}",
                        events.join(" --simpleperf-event ")
                    ),
                ));
            }
            let unique: HashSet<&String> = events.iter().collect();
            if unique.len() != events.len() {
                return Err(ValidationError::with_suggestion(
                    "Command is invalid because redundant calls to --simpleperf-event cannot be made.",
                    "Only set --simpleperf-event cpu-cycles once if you want to collect cpu-cycles.",
                ));
            }
        }

        if let Some(path) = &self.perfetto_config {
            if self.backend != Backend::Perfetto {
                return Err(ValidationError::with_suggestion(
                    "Command is invalid because --perfetto-config cannot be passed if --profiler is not set to perfetto.",
                    "Set --profiler perfetto to choose a perfetto-config to use.",
                ));
            }
            if !path.is_file() {
                return Err(ValidationError::with_suggestion(
                    format!(
                        "Command is invalid because --perfetto-config is not a valid file path: {}",
                        path.display()
                    ),
                    "Omit --perfetto-config to use the default config, or pass the path of a text config.",
                ));
            }
        }

        if let Some(between) = self.between_dur_ms {
            if between < MIN_DURATION_MS {
                return Err(ValidationError::with_suggestion(
                    format!(
                        "Command is invalid because --between-dur-ms cannot be set to a smaller value than {}.",
                        MIN_DURATION_MS
                    ),
                    format!(
                        "Set --between-dur-ms {} to wait {} seconds between each run.",
                        MIN_DURATION_MS,
                        MIN_DURATION_MS / 1000
                    ),
                ));
            }
            if self.runs == 1 {
                return Err(ValidationError::with_suggestion(
                    "Command is invalid because --between-dur-ms cannot be passed if --runs is not a value greater than 1.",
                    "Set --runs 2 to run 2 tests.",
                ));
            }
        }

        match (&self.trigger, self.event) {
            (None, EventKind::Trigger) => {
                return Err(ValidationError::with_suggestion(
                    "Command is invalid because --trigger-names is not passed.",
                    "Set --trigger-names <name> to trace with perfetto triggers.",
                ));
            }
            (Some(_), event) if event != EventKind::Trigger => {
                return Err(ValidationError::with_suggestion(
                    format!(
                        "Command is invalid because --trigger-names is passed, but --event is set to {}.",
                        event
                    ),
                    format!("Remove --event {} to trace with perfetto triggers.", event),
                ));
            }
            (Some(trigger), _) => {
                if self.backend != Backend::Perfetto {
                    return Err(ValidationError::with_suggestion(
                        "Command is invalid because --trigger-names cannot be passed if --profiler is not set to perfetto.",
                        "Set --profiler perfetto to trace with perfetto triggers.",
                    ));
                }
                trigger.validate()?;
            }
            (None, _) => {}
        }

        Ok(())
    }
}
