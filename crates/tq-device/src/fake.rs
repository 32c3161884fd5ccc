//! Scripted transport for tests
//!
//! [`FakeTransport`] answers commands from rules keyed by argument prefix
//! and records everything it is asked to do, stamped with the virtual time
//! of an optional [`ManualClock`]. Clones share state, so a test can keep
//! one handle while the code under test owns another.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tq_core::error::{Fault, Result};
use tq_core::{
    BackendHandle, CommandOutput, CommandRequest, ManualClock, Serial, Transport,
};

use crate::directory::DeviceBridge;
use crate::prompt::Chooser;

/// Something the fake was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    /// A blocking command
    Issue {
        args: Vec<String>,
        input: Option<String>,
    },
    /// A background command was started
    Spawn {
        id: usize,
        args: Vec<String>,
        input: Option<String>,
    },
    /// A background command was halted while still running
    Terminate { id: usize },
    /// A background command was reaped
    Wait { id: usize },
}

struct Rule {
    prefix: Vec<String>,
    outputs: VecDeque<CommandOutput>,
}

impl Rule {
    fn next(&mut self) -> CommandOutput {
        if self.outputs.len() > 1 {
            self.outputs.pop_front().unwrap_or_default()
        } else {
            self.outputs.front().cloned().unwrap_or_default()
        }
    }
}

#[derive(Default)]
struct FakeState {
    rules: Vec<Rule>,
    reachable: VecDeque<bool>,
    events: Vec<(Duration, FakeEvent)>,
    handles: Vec<Arc<AtomicBool>>,
}

/// Transport whose replies are scripted by the test
#[derive(Clone)]
pub struct FakeTransport {
    serial: Serial,
    state: Arc<Mutex<FakeState>>,
    clock: Option<Arc<ManualClock>>,
}

impl FakeTransport {
    /// A reachable device that answers every command with empty success
    pub fn new(serial: &str) -> Self {
        Self {
            serial: Serial::new(serial),
            state: Arc::new(Mutex::new(FakeState::default())),
            clock: None,
        }
    }

    /// Stamp recorded events with the virtual time of `clock`
    pub fn with_clock(mut self, clock: Arc<ManualClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Answers for successive reachability checks; the last one repeats
    pub fn reachable_sequence<I: IntoIterator<Item = bool>>(self, answers: I) -> Self {
        self.lock().reachable = answers.into_iter().collect();
        self
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn now(&self) -> Duration {
        self.clock
            .as_ref()
            .map(|c| c.elapsed())
            .unwrap_or_default()
    }

    /// Answer commands starting with `prefix` with `output`
    pub fn on<I, S>(&self, prefix: I, output: CommandOutput)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_sequence(prefix, [output]);
    }

    /// Answer successive matching commands with `outputs`; the last repeats.
    ///
    /// When several rules match, the most recently added wins.
    pub fn on_sequence<I, S, O>(&self, prefix: I, outputs: O)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        O: IntoIterator<Item = CommandOutput>,
    {
        self.lock().rules.push(Rule {
            prefix: prefix.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().collect(),
        });
    }

    /// Every recorded event with its virtual timestamp
    pub fn events(&self) -> Vec<(Duration, FakeEvent)> {
        self.lock().events.clone()
    }

    /// Arguments of every blocking command, in order
    pub fn issued(&self) -> Vec<Vec<String>> {
        self.lock()
            .events
            .iter()
            .filter_map(|(_, e)| match e {
                FakeEvent::Issue { args, .. } => Some(args.clone()),
                _ => None,
            })
            .collect()
    }

    /// Arguments of every background command, in order
    pub fn spawned(&self) -> Vec<Vec<String>> {
        self.lock()
            .events
            .iter()
            .filter_map(|(_, e)| match e {
                FakeEvent::Spawn { args, .. } => Some(args.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of background commands halted while running
    pub fn terminations(&self) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|(_, e)| matches!(e, FakeEvent::Terminate { .. }))
            .count()
    }

    /// Mark every background command as finished on its own
    pub fn finish_all(&self) {
        for handle in &self.lock().handles {
            handle.store(false, Ordering::SeqCst);
        }
    }
}

impl Transport for FakeTransport {
    fn id(&self) -> &Serial {
        &self.serial
    }

    fn issue(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let at = self.now();
        let mut state = self.lock();
        state.events.push((
            at,
            FakeEvent::Issue {
                args: request.args.clone(),
                input: request.input.clone(),
            },
        ));
        let output = state
            .rules
            .iter_mut()
            .rev()
            .find(|rule| request.args.starts_with(&rule.prefix))
            .map(Rule::next)
            .unwrap_or_default();
        if !request.accepts(output.exit_code) {
            return Err(Fault::UnexpectedExit {
                command: request.display(),
                code: output.exit_code,
                stderr: output.stderr_str().trim().to_string(),
            });
        }
        Ok(output)
    }

    fn issue_async(&self, args: &[String], input: Option<&str>) -> Result<Box<dyn BackendHandle>> {
        let at = self.now();
        let mut state = self.lock();
        let id = state.handles.len();
        let running = Arc::new(AtomicBool::new(true));
        state.handles.push(running.clone());
        state.events.push((
            at,
            FakeEvent::Spawn {
                id,
                args: args.to_vec(),
                input: input.map(str::to_string),
            },
        ));
        Ok(Box::new(FakeHandle {
            id,
            running,
            transport: self.clone(),
        }))
    }

    fn is_reachable(&self) -> Result<bool> {
        let mut state = self.lock();
        let answer = if state.reachable.len() > 1 {
            state.reachable.pop_front()
        } else {
            state.reachable.front().copied()
        };
        Ok(answer.unwrap_or(true))
    }
}

/// Handle returned by [`FakeTransport::issue_async`]
pub struct FakeHandle {
    id: usize,
    running: Arc<AtomicBool>,
    transport: FakeTransport,
}

impl BackendHandle for FakeHandle {
    fn is_running(&mut self) -> Result<bool> {
        Ok(self.running.load(Ordering::SeqCst))
    }

    fn terminate(&mut self) -> Result<()> {
        if self.running.swap(false, Ordering::SeqCst) {
            let at = self.transport.now();
            self.transport
                .lock()
                .events
                .push((at, FakeEvent::Terminate { id: self.id }));
        }
        Ok(())
    }

    fn wait(&mut self) -> Result<Option<i32>> {
        self.running.store(false, Ordering::SeqCst);
        let at = self.transport.now();
        self.transport
            .lock()
            .events
            .push((at, FakeEvent::Wait { id: self.id }));
        Ok(Some(0))
    }
}

/// Bridge with a fixed device listing
pub struct FakeBridge {
    listing: String,
    adb_installed: bool,
    transports: Mutex<HashMap<Serial, FakeTransport>>,
}

impl FakeBridge {
    /// A bridge reporting `listing` for `adb devices`
    pub fn new(listing: &str) -> Self {
        Self {
            listing: listing.to_string(),
            adb_installed: true,
            transports: Mutex::new(HashMap::new()),
        }
    }

    /// A bridge listing `serials` as ready
    pub fn with_devices(serials: &[&str]) -> Self {
        let mut listing = String::from("List of devices attached\n");
        for serial in serials {
            listing.push_str(serial);
            listing.push_str("\tdevice\n");
        }
        Self::new(&listing)
    }

    /// Pretend adb is not installed
    pub fn without_adb(mut self) -> Self {
        self.adb_installed = false;
        self
    }

    /// Hand out `transport` when its serial is connected
    pub fn with_transport(self, transport: FakeTransport) -> Self {
        self.transports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(transport.id().clone(), transport);
        self
    }
}

impl DeviceBridge for FakeBridge {
    fn adb_exists(&self) -> Result<bool> {
        Ok(self.adb_installed)
    }

    fn list_devices(&self) -> Result<String> {
        Ok(self.listing.clone())
    }

    fn connect(&self, serial: &Serial) -> Arc<dyn Transport> {
        let transport = self
            .transports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(serial.clone())
            .or_insert_with(|| FakeTransport::new(serial.as_str()))
            .clone();
        Arc::new(transport)
    }
}

/// Chooser that replays canned answers and records prompts
#[derive(Debug, Default)]
pub struct ScriptedChooser {
    answers: VecDeque<String>,
    prompts: Vec<String>,
    announcements: Vec<String>,
}

impl ScriptedChooser {
    /// Replay `answers` in order; an exhausted script answers with ""
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
            announcements: Vec::new(),
        }
    }

    /// Prompts shown so far
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Announcements made so far
    pub fn announcements(&self) -> &[String] {
        &self.announcements
    }
}

impl Chooser for ScriptedChooser {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        self.prompts.push(prompt.to_string());
        Ok(self.answers.pop_front().unwrap_or_default())
    }

    fn announce(&mut self, message: &str) {
        self.announcements.push(message.to_string());
    }
}
