//! Profiler command implementation

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tq_core::config::ProfilerDefaults;
use tq_device::StdinChooser;
use tq_session::{
    Backend, EventKind, NoViewer, Orchestrator, SessionDescriptor, TriggerMode, TriggerSpec,
    Viewer,
};

use super::CommandContext;
use crate::output::{format_session, print_validation_error, print_warning, TerminalViewer};

/// Flags of `torq profiler`, also accepted without the subcommand
#[derive(Args, Debug, Clone)]
pub struct ProfilerArgs {
    /// The event to trace/profile [boot, user-switch, app-startup, custom, trigger]
    #[arg(short, long)]
    pub event: Option<EventKind>,

    /// The performance data source [perfetto, simpleperf]
    #[arg(short, long = "profiler", default_value = "perfetto")]
    pub profiler: Backend,

    /// The path to the output directory
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// The duration (ms) of the event. Determines when to stop collecting performance data.
    #[arg(short, long)]
    pub dur_ms: Option<u64>,

    /// The package name of the app we want to start
    #[arg(short, long)]
    pub app: Option<String>,

    /// The number of times to run the event and capture the perf data
    #[arg(short, long, default_value_t = 1)]
    pub runs: u32,

    /// Simpleperf supported events to be collected, e.g. cpu-cycles, instructions
    #[arg(short = 's', long = "simpleperf-event")]
    pub simpleperf_event: Vec<String>,

    /// A file with a custom perfetto text config
    #[arg(long)]
    pub perfetto_config: Option<PathBuf>,

    /// Time (ms) to wait before executing the next event
    #[arg(long)]
    pub between_dur_ms: Option<u64>,

    /// Open the trace in the UI after profiling is complete
    #[arg(long, overrides_with = "no_ui")]
    pub ui: bool,

    /// Do not open the trace after profiling
    #[arg(long, overrides_with = "ui")]
    pub no_ui: bool,

    /// The user id from which to start the user switch
    #[arg(long)]
    pub from_user: Option<u32>,

    /// The user id of user that system is switching to
    #[arg(long)]
    pub to_user: Option<u32>,

    /// Specifies path to symbols library
    #[arg(long)]
    pub symbols: Option<PathBuf>,

    /// Perfetto trigger names to send, in order
    #[arg(long, value_delimiter = ',')]
    pub trigger_names: Vec<String>,

    /// How the triggers affect the trace [start, stop, clone]
    #[arg(long)]
    pub trigger_mode: Option<TriggerMode>,

    /// Delay (ms) after each trigger; one value is shared by all triggers
    #[arg(long, value_delimiter = ',')]
    pub trigger_stop_delay_ms: Vec<u64>,

    /// Print the session summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl ProfilerArgs {
    fn ui(&self) -> Option<bool> {
        match (self.ui, self.no_ui) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    fn uses_triggers(&self) -> bool {
        !self.trigger_names.is_empty()
            || self.trigger_mode.is_some()
            || !self.trigger_stop_delay_ms.is_empty()
    }

    /// Build the session descriptor, filling omitted flags from `defaults`
    pub fn to_descriptor(&self, defaults: &ProfilerDefaults) -> SessionDescriptor {
        let triggers = self.uses_triggers();
        let event = self.event.unwrap_or(if triggers {
            EventKind::Trigger
        } else {
            EventKind::Custom
        });
        let trigger = triggers.then(|| {
            TriggerSpec::new(self.trigger_names.iter().cloned())
                .with_mode(self.trigger_mode.unwrap_or_default())
                .with_stop_delays(self.trigger_stop_delay_ms.clone())
        });

        SessionDescriptor {
            event,
            backend: self.profiler,
            dur_ms: self.dur_ms,
            runs: self.runs,
            between_dur_ms: self.between_dur_ms,
            out_dir: self
                .out_dir
                .clone()
                .unwrap_or_else(|| defaults.out_dir.clone()),
            app: self.app.clone(),
            from_user: self.from_user,
            to_user: self.to_user,
            simpleperf_events: (!self.simpleperf_event.is_empty())
                .then(|| self.simpleperf_event.clone()),
            perfetto_config: self.perfetto_config.clone(),
            trigger,
            ui: self.ui(),
            symbols: self.symbols.clone(),
            defaults: defaults.clone(),
        }
    }
}

/// Execute the profiler command
pub fn profiler_command(ctx: &CommandContext, args: &ProfilerArgs) -> Result<()> {
    let descriptor = args.to_descriptor(&ctx.config.profiler);
    let connector = ctx.connector();
    let mut chooser = StdinChooser;

    let mut terminal = TerminalViewer;
    let mut silent = NoViewer;
    let viewer: &mut dyn Viewer = if args.json { &mut silent } else { &mut terminal };

    let result = Orchestrator::new(&descriptor, viewer)
        .with_args_hint(ctx.args_hint.clone())
        .execute(&connector, ctx.serial.as_ref(), &mut chooser)?;
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            print_validation_error(&e);
            return Ok(());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", format_session(&result));
    }
    if !result.succeeded() {
        print_warning("Some traces could not be pulled from the device");
    }
    Ok(())
}
