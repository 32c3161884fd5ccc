//! Perfetto text config for a session
//!
//! A user-supplied config file is used verbatim. Otherwise a small built-in
//! config is rendered with the session duration and, for trigger sessions,
//! a `trigger_config` block.

use std::path::Path;

use tq_core::error::{Fault, Result};

use crate::descriptor::{SessionDescriptor, TriggerMode, TriggerSpec};

const BASE_CONFIG: &str = r#"buffers: {
  size_kb: 65536
  fill_policy: RING_BUFFER
}
data_sources: {
  config {
    name: "linux.process_stats"
    process_stats_config {
      scan_all_processes_on_start: true
    }
  }
}
data_sources: {
  config {
    name: "linux.ftrace"
    ftrace_config {
      ftrace_events: "sched/sched_switch"
      ftrace_events: "sched/sched_wakeup"
      ftrace_events: "sched/sched_process_exit"
      ftrace_events: "power/cpu_frequency"
      ftrace_events: "power/cpu_idle"
      ftrace_events: "power/suspend_resume"
      atrace_categories: "am"
      atrace_categories: "wm"
      atrace_categories: "gfx"
      atrace_categories: "view"
      atrace_apps: "*"
    }
  }
}
"#;

fn trigger_mode_name(mode: TriggerMode) -> &'static str {
    match mode {
        TriggerMode::Start => "START_TRACING",
        TriggerMode::Stop => "STOP_TRACING",
        TriggerMode::Clone => "CLONE_SNAPSHOT",
    }
}

fn render_trigger_block(trigger: &TriggerSpec, timeout_ms: u64) -> String {
    let mut block = String::from("trigger_config {\n");
    block.push_str(&format!("  trigger_mode: {}\n", trigger_mode_name(trigger.mode)));
    block.push_str(&format!("  trigger_timeout_ms: {}\n", timeout_ms));
    for (i, name) in trigger.names.iter().enumerate() {
        block.push_str("  triggers {\n");
        block.push_str(&format!("    producer_name_regex: \".*\"\n    name: \"{}\"\n", name));
        block.push_str(&format!("    stop_delay_ms: {}\n", trigger.stop_delay_ms(i)));
        block.push_str("  }\n");
    }
    block.push_str("}\n");
    block
}

/// Built-in config for `dur_ms`, with triggers when given
pub fn render_default(dur_ms: u64, trigger: Option<&TriggerSpec>) -> String {
    let mut config = String::from(BASE_CONFIG);
    match trigger {
        // With STOP_TRACING and CLONE_SNAPSHOT the trace runs until the
        // trigger timeout; duration_ms would end it early.
        Some(t) if t.mode != TriggerMode::Start => {
            config.push_str(&render_trigger_block(t, dur_ms));
        }
        Some(t) => {
            config.push_str(&render_trigger_block(t, dur_ms));
            config.push_str(&format!("duration_ms: {}\n", dur_ms));
        }
        None => config.push_str(&format!("duration_ms: {}\n", dur_ms)),
    }
    config
}

/// Read a user config file
pub fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Fault::HostIo {
        path: path.to_path_buf(),
        source,
    })
}

/// Config text for `descriptor`
pub fn session_config(descriptor: &SessionDescriptor) -> Result<String> {
    match &descriptor.perfetto_config {
        Some(path) => read_config(path),
        None => Ok(render_default(
            descriptor.effective_dur_ms(),
            descriptor.trigger.as_ref(),
        )),
    }
}
