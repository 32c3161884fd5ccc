//! Output formatting utilities for the CLI
//!
//! Tables for device listings, session summaries, the terminal viewer
//! hand-off and colored status messages.

use std::path::Path;

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tq_core::error::Result as FaultResult;
use tq_core::{Serial, ValidationError};
use tq_session::{SessionResult, Viewer};

/// One reachable device as shown by `torq devices`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceEntry {
    pub index: usize,
    pub serial: String,
    /// Whether the serial environment variable points at this device
    pub default: bool,
}

impl DeviceEntry {
    /// Number `serials` in listing order and mark `env_serial`
    pub fn from_serials(serials: &[Serial], env_serial: Option<&str>) -> Vec<Self> {
        serials
            .iter()
            .enumerate()
            .map(|(index, serial)| Self {
                index,
                serial: serial.to_string(),
                default: env_serial == Some(serial.as_str()),
            })
            .collect()
    }
}

/// Format reachable devices as an ASCII table
///
/// Returns "No devices connected" if the list is empty.
pub fn format_devices(devices: &[DeviceEntry]) -> String {
    if devices.is_empty() {
        return "No devices connected".to_string();
    }

    #[derive(Tabled)]
    struct DeviceRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "SERIAL")]
        serial: String,
        #[tabled(rename = "DEFAULT")]
        default: String,
    }

    let rows: Vec<DeviceRow> = devices
        .iter()
        .map(|d| DeviceRow {
            index: d.index,
            serial: d.serial.clone(),
            default: if d.default { "*".to_string() } else { "-".to_string() },
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format the runs of a finished session as an ASCII table
pub fn format_session(result: &SessionResult) -> String {
    #[derive(Tabled)]
    struct RunRow {
        #[tabled(rename = "RUN")]
        run: u32,
        #[tabled(rename = "STATUS")]
        status: String,
        #[tabled(rename = "ELAPSED")]
        elapsed: String,
        #[tabled(rename = "ARTIFACTS")]
        artifacts: String,
    }

    let rows: Vec<RunRow> = result
        .runs
        .iter()
        .map(|r| RunRow {
            run: r.run,
            status: if r.success { "ok" } else { "incomplete" }.to_string(),
            elapsed: format_millis(r.elapsed_ms),
            artifacts: if r.artifacts.is_empty() {
                "-".to_string()
            } else {
                r.artifacts
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join("\n")
            },
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format a millisecond duration in human-readable form
fn format_millis(ms: u64) -> String {
    let secs = ms / 1000;
    if secs < 60 {
        format!("{}.{}s", secs, (ms % 1000) / 100)
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Prints where the trace is and how to open it
#[derive(Debug, Default)]
pub struct TerminalViewer;

impl Viewer for TerminalViewer {
    fn open(&mut self, artifact: &Path, symbols: Option<&Path>) -> FaultResult<()> {
        print_info(&format!(
            "Open {} at https://ui.perfetto.dev to view the trace",
            artifact.display()
        ));
        if let Some(symbols) = symbols {
            print_info(&format!("Symbols: {}", symbols.display()));
        }
        Ok(())
    }
}

/// Print a validation error, followed by its suggestion if it has one
///
/// Validation errors are an expected outcome, so they go to stdout.
pub fn print_validation_error(error: &ValidationError) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Red),
        Print(&error.message),
        ResetColor,
        Print("\n")
    );
    if let Some(suggestion) = &error.suggestion {
        println!("Suggestion:\n\t {}", suggestion);
    }
}

/// Kind of a one-line status message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Success,
    Error,
    Warning,
    Info,
}

impl Tone {
    fn mark(self) -> (crossterm::style::Color, &'static str) {
        use crossterm::style::Color;

        match self {
            Tone::Success => (Color::Green, "✓ "),
            Tone::Error => (Color::Red, "✗ "),
            Tone::Warning => (Color::Yellow, "⚠ "),
            Tone::Info => (Color::Cyan, "ℹ "),
        }
    }

    /// Errors and warnings go to stderr
    fn writer(self) -> Box<dyn std::io::Write> {
        match self {
            Tone::Error | Tone::Warning => Box::new(std::io::stderr()),
            Tone::Success | Tone::Info => Box::new(std::io::stdout()),
        }
    }
}

fn print_status(tone: Tone, msg: &str) {
    use crossterm::style::{Print, ResetColor, SetForegroundColor};

    let (color, mark) = tone.mark();
    let mut out = tone.writer();
    let _ = crossterm::execute!(
        out,
        SetForegroundColor(color),
        Print(mark),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a success message with a green checkmark
pub fn print_success(msg: &str) {
    print_status(Tone::Success, msg);
}

/// Print an error message to stderr
pub fn print_error(msg: &str) {
    print_status(Tone::Error, msg);
}

/// Print a warning to stderr
pub fn print_warning(msg: &str) {
    print_status(Tone::Warning, msg);
}

pub fn print_info(msg: &str) {
    print_status(Tone::Info, msg);
}
