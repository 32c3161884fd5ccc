//! simpleperf event list handling
//!
//! `simpleperf list` prints one event per line, indented by exactly two
//! spaces, with category headers and `#` comments in between. This text
//! contract is fragile: a change in indentation on the device side makes
//! every event look unknown.

/// Path of the simpleperf binary on the device
pub const SIMPLEPERF_BINARY: &str = "/system/bin/simpleperf";

/// Device-side output of a simpleperf recording
pub const SIMPLEPERF_TRACE_FILE: &str = "/tmp/simpleperf-traces/perf.data";

/// Event recorded when none is requested
pub const DEFAULT_SIMPLEPERF_EVENT: &str = "cpu-cycles";

/// Extract the event name from one `simpleperf list` line, if it names one
pub fn event_name(line: &str) -> Option<&str> {
    let bytes = line.as_bytes();
    if bytes.len() <= 3 || !line.starts_with("  ") || bytes[2] == b'#' {
        return None;
    }
    line[2..].split(' ').next()
}

/// Requested events that do not appear in `listing`, in request order.
///
/// `requested` is only read; the scan works on its own copy.
pub fn missing_events(requested: &[String], listing: &str) -> Vec<String> {
    let mut remaining: Vec<String> = requested.to_vec();
    for line in listing.split('\n') {
        if remaining.is_empty() {
            break;
        }
        if let Some(name) = event_name(line) {
            if let Some(pos) = remaining.iter().position(|e| e == name) {
                remaining.remove(pos);
            }
        }
    }
    remaining
}

/// `grep` pattern arguments that narrow `simpleperf list` to `events`
pub fn grep_command(events: &[String]) -> String {
    let mut command = String::from("grep");
    for event in events {
        command.push_str(" -e ");
        command.push_str(&event.to_lowercase());
    }
    command
}

/// Render names the way the invalid-event message lists them
pub fn format_event_list(events: &[String]) -> String {
    let quoted: Vec<String> = events.iter().map(|e| format!("'{}'", e)).collect();
    format!("[{}]", quoted.join(", "))
}
