//! Android device facade
//!
//! [`AndroidDevice`] turns device-level operations into transport calls and
//! interprets their text output. All parsing of `pm`, `am`, `getprop`,
//! `pidof` and `simpleperf` output lives here.

use std::path::Path;
use std::sync::Arc;

use tq_core::config::HostConfig;
use tq_core::error::{Fault, Result};
use tq_core::time::ceil_secs;
use tq_core::{
    poll_until, BackendHandle, Clock, CommandOutput, CommandRequest, ExitCode, Serial, SystemClock, Transport,
    ValidationError, Verdict,
};
use tracing::{debug, info};

use crate::simpleperf::{self, SIMPLEPERF_BINARY, SIMPLEPERF_TRACE_FILE};

/// Device-side output of a perfetto trace
pub const PERFETTO_TRACE_FILE: &str = "/data/misc/perfetto-traces/trace.perfetto-trace";

/// Device-side output of a boot trace
pub const PERFETTO_BOOT_TRACE_FILE: &str = "/data/misc/perfetto-traces/boottrace.perfetto-trace";

/// Device-side location perfetto reads the boot trace config from
pub const PERFETTO_BOOT_CONFIG_FILE: &str = "/data/misc/perfetto-configs/boottrace.pbtxt";

/// Property that arms a boot trace on the next boot
pub const BOOT_TRACE_PROP: &str = "persist.debug.perfetto.boottrace";

/// Android user id
pub type UserId = u32;

/// Facade over one Android device reached through a [`Transport`]
#[derive(Clone)]
pub struct AndroidDevice {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    config: HostConfig,
}

impl std::fmt::Debug for AndroidDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AndroidDevice")
            .field("serial", self.serial())
            .finish()
    }
}

fn shell<I, S>(args: I) -> CommandRequest
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut full = vec!["shell".to_string()];
    full.extend(args.into_iter().map(Into::into));
    CommandRequest::new(full)
}

impl AndroidDevice {
    /// Create a facade with explicit clock and host settings
    pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>, config: HostConfig) -> Self {
        Self {
            transport,
            clock,
            config,
        }
    }

    /// Create a facade with the system clock and default host settings
    pub fn with_defaults(transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, Arc::new(SystemClock), HostConfig::default())
    }

    /// Serial of the wrapped device
    pub fn serial(&self) -> &Serial {
        self.transport.id()
    }

    /// Clock used for every wait
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Host settings this facade was created with
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    fn run(&self, request: CommandRequest) -> Result<String> {
        Ok(self.transport.issue(&request)?.stdout_str())
    }

    fn wait_for(
        &self,
        timeout: std::time::Duration,
        operation: &str,
        mut predicate: impl FnMut() -> Result<bool>,
    ) -> Result<()> {
        if poll_until(
            self.clock.as_ref(),
            timeout,
            self.config.poll_interval,
            &mut predicate,
        )? {
            Ok(())
        } else {
            Err(Fault::StateTimeout {
                serial: self.serial().to_string(),
                operation: operation.to_string(),
            })
        }
    }

    /// Issue a request whose declared-ignorable exit doubles as a negative
    /// answer. adb also exits 1 when the device has gone away, so a non-zero
    /// exit is only trusted while the device is still reachable.
    fn issue_checked(&self, request: &CommandRequest) -> Result<Verdict<CommandOutput>> {
        let output = self.transport.issue(request)?;
        if !output.succeeded() {
            if let Err(e) = self.check_connection()? {
                return Ok(Err(e));
            }
        }
        Ok(Ok(output))
    }

    fn malformed(&self, command: &str, detail: impl Into<String>) -> Fault {
        Fault::MalformedOutput {
            command: command.to_string(),
            detail: detail.into(),
        }
    }

    // ========================================================================
    // Connectivity
    // ========================================================================

    /// Check that the device is still in the reachable set
    pub fn check_connection(&self) -> Result<Verdict<()>> {
        if self.transport.is_reachable()? {
            Ok(Ok(()))
        } else {
            Ok(Err(ValidationError::new(format!(
                "Device with serial {} is not connected.",
                self.serial()
            ))))
        }
    }

    /// Restart adbd as root and wait for the device to reconnect
    pub fn root_device(&self) -> Result<()> {
        info!(serial = %self.serial(), "Rooting device");
        self.transport.issue(&CommandRequest::new(["root"]))?;
        let transport = &self.transport;
        self.wait_for(self.config.root_timeout, "reconnect after being rooted", || {
            transport.is_reachable()
        })
    }

    /// Reboot and wait until the device drops off the reachable set.
    ///
    /// Returning only confirms the reboot was accepted.
    pub fn reboot(&self) -> Result<()> {
        info!(serial = %self.serial(), "Rebooting device");
        self.transport.issue(&CommandRequest::new(["reboot"]))?;
        let transport = &self.transport;
        self.wait_for(self.config.reboot_timeout, "start rebooting", || {
            Ok(!transport.is_reachable()?)
        })
    }

    /// Block until adb sees the device again, then confirm it is ready
    pub fn wait_for_device(&self) -> Result<()> {
        self.transport
            .issue(&CommandRequest::new(["wait-for-device"]))?;
        let transport = &self.transport;
        self.wait_for(
            self.config.wait_for_device_timeout,
            "reconnect after rebooting",
            || transport.is_reachable(),
        )
    }

    /// Whether `sys.boot_completed` is exactly `1`
    pub fn is_boot_completed(&self) -> Result<bool> {
        let out = self.run(shell(["getprop", "sys.boot_completed"]).capture())?;
        Ok(out.trim() == "1")
    }

    /// Wait for boot completion
    pub fn wait_for_boot_completed(&self) -> Result<()> {
        self.wait_for(self.config.boot_timeout, "finish rebooting", || {
            self.is_boot_completed()
        })
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Ids of every user on the device, in reporting order
    pub fn get_all_users(&self) -> Result<Vec<UserId>> {
        const COMMAND: &str = "pm list users";
        let out = self.run(shell(["pm", "list", "users"]).capture())?;
        out.lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                line.split_once('{')
                    .and_then(|(_, rest)| rest.split_once(':'))
                    .and_then(|(id, _)| id.trim().parse::<UserId>().ok())
                    .ok_or_else(|| self.malformed(COMMAND, format!("bad user line: {}", line)))
            })
            .collect()
    }

    /// Check that `user` exists on the device
    pub fn user_exists(&self, user: UserId) -> Result<Verdict<()>> {
        let users = self.get_all_users()?;
        if users.contains(&user) {
            return Ok(Ok(()));
        }
        let listed: Vec<String> = users.iter().map(ToString::to_string).collect();
        Ok(Err(ValidationError::with_suggestion(
            format!(
                "User ID {} does not exist on device with serial {}.",
                user,
                self.serial()
            ),
            format!(
                "Select from one of the following user IDs on device with serial {}: {}",
                self.serial(),
                listed.join(", ")
            ),
        )))
    }

    /// The user currently in the foreground
    pub fn get_current_user(&self) -> Result<UserId> {
        const COMMAND: &str = "am get-current-user";
        let out = self.run(shell(["am", "get-current-user"]).capture())?;
        out.split_whitespace()
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or_else(|| self.malformed(COMMAND, format!("expected a user id, got {:?}", out)))
    }

    /// Ask the device to switch to `user`. Does not wait.
    pub fn perform_user_switch(&self, user: UserId) -> Result<()> {
        info!(serial = %self.serial(), user, "Switching user");
        self.transport
            .issue(&shell(["am", "switch-user", &user.to_string()]))?;
        Ok(())
    }

    /// Wait until `user` is reported as the current user
    pub fn wait_for_user(&self, user: UserId) -> Result<()> {
        self.wait_for(
            self.config.user_switch_timeout,
            &format!("switch to user {}", user),
            || Ok(self.get_current_user()? == user),
        )
    }

    // ========================================================================
    // Packages and processes
    // ========================================================================

    /// Installed package names
    pub fn get_packages(&self) -> Result<Vec<String>> {
        let out = self.run(shell(["pm", "list", "packages"]).capture())?;
        Ok(out
            .lines()
            .map(|line| line.strip_prefix("package:").unwrap_or(line).to_string())
            .collect())
    }

    /// Check that `package` is installed
    pub fn package_exists(&self, package: &str) -> Result<Verdict<()>> {
        if self.get_packages()?.iter().any(|p| p == package) {
            return Ok(Ok(()));
        }
        Ok(Err(ValidationError::new(format!(
            "Package {} does not exist on device with serial {}.",
            package,
            self.serial()
        ))))
    }

    /// Launch the main activity of `package`.
    ///
    /// Any stderr output means the package has no launchable activity; the
    /// exit status of `am start` does not tell. adb reports a vanished device
    /// on stderr too, so reachability is checked before blaming the package.
    pub fn start_package(&self, package: &str) -> Result<Verdict<()>> {
        let output = self.transport.issue(
            &shell(["am", "start", package])
                .capture()
                .ignore(ExitCode::FAILURE),
        )?;
        let stderr = output.stderr_str();
        if !output.succeeded() || !stderr.is_empty() {
            if let Err(e) = self.check_connection()? {
                return Ok(Err(e));
            }
        }
        if !stderr.split('\n').next().unwrap_or_default().is_empty() {
            return Ok(Err(ValidationError::new(format!(
                "Cannot start package {0} on device with serial {1} because {0} is a service package, which doesn't implement a MAIN activity.",
                package,
                self.serial()
            ))));
        }
        Ok(Ok(()))
    }

    /// Force-stop `package`
    pub fn force_stop_package(&self, package: &str) -> Result<()> {
        self.transport.issue(&shell(["am", "force-stop", package]))?;
        Ok(())
    }

    /// Pid of `process`, or an empty string when it is not running
    pub fn get_pid(&self, process: &str) -> Result<Verdict<String>> {
        let request = shell(["pidof", process])
            .capture()
            .ignore(ExitCode::FAILURE);
        Ok(self.issue_checked(&request)?.map(|output| {
            let out = output.stdout_str();
            out.split('\n').next().unwrap_or_default().trim().to_string()
        }))
    }

    /// Whether `process` has a pid
    pub fn is_process_running(&self, process: &str) -> Result<Verdict<bool>> {
        Ok(self.get_pid(process)?.map(|pid| !pid.is_empty()))
    }

    /// Kill `process` if it is running
    pub fn kill_process(&self, process: &str) -> Result<Verdict<()>> {
        let pid = match self.get_pid(process)? {
            Ok(pid) => pid,
            Err(e) => return Ok(Err(e)),
        };
        if pid.is_empty() {
            debug!(process, "No pid found, nothing to kill");
            return Ok(Ok(()));
        }
        self.transport.issue(&shell(["kill", "-9", &pid]))?;
        Ok(Ok(()))
    }

    /// Send `signal` (e.g. `TERM`) to every process named `process`
    pub fn send_signal(&self, process: &str, signal: &str) -> Result<()> {
        self.transport
            .issue(&shell(["pkill", "-l", signal, process]))?;
        Ok(())
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// First line of `getprop prop`
    pub fn get_prop(&self, prop: &str) -> Result<String> {
        let out = self.run(shell(["getprop", prop]).capture())?;
        Ok(out.split('\n').next().unwrap_or_default().to_string())
    }

    /// Set a system property
    pub fn set_prop(&self, prop: &str, value: &str) -> Result<()> {
        debug!(prop, value, "Setting property");
        self.transport.issue(&shell(["setprop", prop, value]))?;
        Ok(())
    }

    /// Reset a system property to the empty string
    pub fn clear_prop(&self, prop: &str) -> Result<()> {
        // Quoted so the device shell receives an empty argument
        self.transport.issue(&shell(["setprop", prop, "\"\""]))?;
        Ok(())
    }

    /// `ro.build.version.sdk` as a number
    pub fn get_android_sdk_version(&self) -> Result<u32> {
        let value = self.get_prop("ro.build.version.sdk")?;
        value
            .trim()
            .parse()
            .map_err(|_| self.malformed("getprop ro.build.version.sdk", format!("{:?}", value)))
    }

    // ========================================================================
    // Files
    // ========================================================================

    /// Whether `path` exists on the device
    pub fn file_exists(&self, path: &str) -> Result<Verdict<bool>> {
        let request = shell(["ls", path]).capture().ignore(ExitCode::FAILURE);
        Ok(self.issue_checked(&request)?.map(|output| output.succeeded()))
    }

    /// Remove `path`; false when it did not exist
    pub fn remove_file(&self, path: &str) -> Result<Verdict<bool>> {
        let request = shell(["rm", path]).capture().ignore(ExitCode::FAILURE);
        Ok(self.issue_checked(&request)?.map(|output| output.succeeded()))
    }

    /// Copy `device_path` to `host_path`; false when the device file is missing
    pub fn pull_file(&self, device_path: &str, host_path: &Path) -> Result<Verdict<bool>> {
        let request = CommandRequest::new([
            "pull".to_string(),
            device_path.to_string(),
            host_path.display().to_string(),
        ])
        .capture()
        .ignore(ExitCode::FAILURE);
        Ok(self.issue_checked(&request)?.map(|output| output.succeeded()))
    }

    /// Copy `host_path` to `device_path`; false when the transfer failed
    pub fn push_file(&self, host_path: &Path, device_path: &str) -> Result<Verdict<bool>> {
        let request = CommandRequest::new([
            "push".to_string(),
            host_path.display().to_string(),
            device_path.to_string(),
        ])
        .capture()
        .ignore(ExitCode::FAILURE);
        Ok(self.issue_checked(&request)?.map(|output| output.succeeded()))
    }

    /// `mkdir -p`; must succeed
    pub fn create_directory(&self, path: &str) -> Result<()> {
        self.transport
            .issue(&shell(["mkdir", "-p", path]).capture())?;
        Ok(())
    }

    /// Replace the contents of `path` with `contents`
    pub fn write_to_file(&self, path: &str, contents: &str) -> Result<()> {
        self.transport
            .issue(&shell([format!("cat > {}", path)]).input(contents))?;
        Ok(())
    }

    // ========================================================================
    // Tracing backends
    // ========================================================================

    /// Check that simpleperf is installed and knows every event in `events`
    pub fn simpleperf_event_exists(&self, events: &[String]) -> Result<Verdict<()>> {
        match self.file_exists(SIMPLEPERF_BINARY)? {
            Ok(true) => {}
            Ok(false) => {
                return Ok(Err(ValidationError::with_suggestion(
                    "Simpleperf was not found in the device.",
                    "Push the simpleperf binary to the device.",
                )))
            }
            Err(e) => return Ok(Err(e)),
        }

        let request = shell([
            "simpleperf".to_string(),
            "list".to_string(),
            "|".to_string(),
            simpleperf::grep_command(events),
        ])
        .capture()
        .ignore(ExitCode::FAILURE);
        let output = match self.issue_checked(&request)? {
            Ok(output) => output,
            Err(e) => return Ok(Err(e)),
        };

        let missing = simpleperf::missing_events(events, &output.stdout_str());
        if missing.is_empty() {
            return Ok(Ok(()));
        }
        Ok(Err(ValidationError::with_suggestion(
            format!(
                "The following simpleperf event(s) are invalid: {}.",
                simpleperf::format_event_list(&missing)
            ),
            "Run adb shell simpleperf list to see valid simpleperf events.",
        )))
    }

    /// Start perfetto with a text config fed on stdin
    pub fn start_perfetto_trace(&self, config: &str) -> Result<Box<dyn BackendHandle>> {
        info!(serial = %self.serial(), "Starting perfetto trace");
        let args: Vec<String> = ["shell", "perfetto", "-c", "-", "--txt", "-o", PERFETTO_TRACE_FILE]
            .iter()
            .map(|s| s.to_string())
            .collect();
        self.transport.issue_async(&args, Some(config))
    }

    /// Start a system-wide simpleperf recording of `events`
    pub fn start_simpleperf_trace(
        &self,
        events: &[String],
        dur_ms: Option<u64>,
    ) -> Result<Box<dyn BackendHandle>> {
        info!(serial = %self.serial(), ?events, "Starting simpleperf trace");
        let mut args: Vec<String> = [
            "shell",
            "simpleperf",
            "record",
            "-a",
            "-f",
            "1000",
            "--exclude-perf",
            "--post-unwind=yes",
            "-m",
            "8192",
            "-g",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if let Some(ms) = dur_ms {
            args.push("--duration".to_string());
            args.push(ceil_secs(ms).to_string());
        }
        args.push("-e".to_string());
        args.push(events.join(","));
        args.push("-o".to_string());
        args.push(SIMPLEPERF_TRACE_FILE.to_string());
        self.transport.issue_async(&args, None)
    }

    /// Activate a perfetto trigger by name
    pub fn trigger_perfetto(&self, name: &str) -> Result<()> {
        info!(serial = %self.serial(), trigger = name, "Sending perfetto trigger");
        self.transport.issue(&shell(["trigger_perfetto", name]))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeEvent, FakeTransport};
    use std::time::Duration;
    use tq_core::{CommandOutput, ManualClock};

    const SERIAL: &str = "test-serial";

    fn device(fake: &FakeTransport) -> (AndroidDevice, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let device = AndroidDevice::new(
            Arc::new(fake.clone()),
            clock.clone(),
            HostConfig::default(),
        );
        (device, clock)
    }

    fn users_output() -> CommandOutput {
        CommandOutput::ok("Users:\n\tUserInfo{0:Owner:c13} running\n\tUserInfo{1:Guest:404}\n")
    }

    #[test]
    fn test_root_device_waits_for_reconnect() {
        let fake = FakeTransport::new(SERIAL).reachable_sequence([false, false, true]);
        let (device, clock) = device(&fake);
        device.root_device().unwrap();
        assert_eq!(fake.issued()[0], vec!["root"]);
        assert_eq!(clock.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn test_root_device_timeout_is_fault() {
        let fake = FakeTransport::new(SERIAL).reachable_sequence([false]);
        let (device, _) = device(&fake);
        let err = device.root_device().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Device with serial test-serial took too long to reconnect after being rooted."
        );
    }

    #[test]
    fn test_reboot_waits_for_disconnect() {
        let fake = FakeTransport::new(SERIAL).reachable_sequence([true, false]);
        let (device, _) = device(&fake);
        device.reboot().unwrap();
        assert_eq!(fake.issued()[0], vec!["reboot"]);
    }

    #[test]
    fn test_reboot_timeout_is_fault() {
        let fake = FakeTransport::new(SERIAL).reachable_sequence([true]);
        let (device, _) = device(&fake);
        let err = device.reboot().unwrap_err();
        assert!(err.to_string().contains("took too long to start rebooting"));
    }

    #[test]
    fn test_boot_completed_requires_exact_one() {
        let fake = FakeTransport::new(SERIAL);
        fake.on_sequence(
            ["shell", "getprop", "sys.boot_completed"],
            [CommandOutput::ok("\n"), CommandOutput::ok("0\n"), CommandOutput::ok("1\n")],
        );
        let (device, clock) = device(&fake);
        device.wait_for_boot_completed().unwrap();
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn test_boot_completed_timeout() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(["shell", "getprop", "sys.boot_completed"], CommandOutput::ok("0\n"));
        let (device, clock) = device(&fake);
        let err = device.wait_for_boot_completed().unwrap_err();
        assert!(err.to_string().contains("took too long to finish rebooting"));
        assert!(clock.elapsed() > Duration::from_secs(30));
    }

    #[test]
    fn test_get_all_users() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(["shell", "pm", "list", "users"], users_output());
        let (device, _) = device(&fake);
        assert_eq!(device.get_all_users().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_get_all_users_malformed_is_fault() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(
            ["shell", "pm", "list", "users"],
            CommandOutput::ok("Users:\n\tgarbage\n"),
        );
        let (device, _) = device(&fake);
        assert!(matches!(
            device.get_all_users(),
            Err(Fault::MalformedOutput { .. })
        ));
    }

    #[test]
    fn test_get_all_users_undeclared_exit_is_fault() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(["shell", "pm", "list", "users"], CommandOutput::status(1));
        let (device, _) = device(&fake);
        assert!(matches!(
            device.get_all_users(),
            Err(Fault::UnexpectedExit { code: 1, .. })
        ));
    }

    #[test]
    fn test_user_exists() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(["shell", "pm", "list", "users"], users_output());
        let (device, _) = device(&fake);
        assert!(device.user_exists(1).unwrap().is_ok());

        let err = device.user_exists(3).unwrap().unwrap_err();
        assert_eq!(
            err.message,
            "User ID 3 does not exist on device with serial test-serial."
        );
        assert_eq!(
            err.suggestion.as_deref(),
            Some("Select from one of the following user IDs on device with serial test-serial: 0, 1")
        );
    }

    #[test]
    fn test_get_current_user_and_switch() {
        let fake = FakeTransport::new(SERIAL);
        fake.on_sequence(
            ["shell", "am", "get-current-user"],
            [CommandOutput::ok("0\n"), CommandOutput::ok("10\n")],
        );
        let (device, _) = device(&fake);
        assert_eq!(device.get_current_user().unwrap(), 0);
        device.perform_user_switch(10).unwrap();
        device.wait_for_user(10).unwrap();
        assert!(fake
            .issued()
            .contains(&vec!["shell".to_string(), "am".into(), "switch-user".into(), "10".into()]));
    }

    #[test]
    fn test_get_packages_strips_prefix() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(
            ["shell", "pm", "list", "packages"],
            CommandOutput::ok("package:com.android.settings\npackage:com.example.app\n"),
        );
        let (device, _) = device(&fake);
        assert_eq!(
            device.get_packages().unwrap(),
            vec!["com.android.settings", "com.example.app"]
        );
        assert!(device.package_exists("com.example.app").unwrap().is_ok());
        let err = device.package_exists("com.missing").unwrap().unwrap_err();
        assert_eq!(
            err.message,
            "Package com.missing does not exist on device with serial test-serial."
        );
    }

    #[test]
    fn test_get_pid_absent_is_empty() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(["shell", "pidof"], CommandOutput::status(1));
        let (device, _) = device(&fake);
        assert_eq!(device.get_pid("com.example").unwrap().unwrap(), "");
        assert!(!device.is_process_running("com.example").unwrap().unwrap());
    }

    #[test]
    fn test_kill_process_noop_without_pid() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(["shell", "pidof"], CommandOutput::status(1));
        let (device, _) = device(&fake);
        device.kill_process("com.example").unwrap().unwrap();
        assert!(!fake.issued().iter().any(|args| args.contains(&"kill".to_string())));
    }

    #[test]
    fn test_kill_process_with_pid() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(["shell", "pidof"], CommandOutput::ok("4242\n"));
        let (device, _) = device(&fake);
        device.kill_process("com.example").unwrap().unwrap();
        assert_eq!(
            fake.issued().last().unwrap(),
            &vec!["shell", "kill", "-9", "4242"]
        );
    }

    #[test]
    fn test_start_package_stderr_means_service_package() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(
            ["shell", "am", "start"],
            CommandOutput {
                stdout: Vec::new(),
                stderr: b"Error: Activity not started\n".to_vec(),
                exit_code: 0,
            },
        );
        let (device, _) = device(&fake);
        let err = device.start_package("com.svc").unwrap().unwrap_err();
        assert_eq!(
            err.message,
            "Cannot start package com.svc on device with serial test-serial because com.svc is a service package, which doesn't implement a MAIN activity."
        );
        assert!(err.suggestion.is_none());
    }

    #[test]
    fn test_start_package_ok_with_exit_one_and_empty_stderr() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(["shell", "am", "start"], CommandOutput::status(1));
        let (device, _) = device(&fake);
        assert!(device.start_package("com.app").unwrap().is_ok());
    }

    #[test]
    fn test_file_ops_convert_not_found_to_false() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(["shell", "ls"], CommandOutput::status(1));
        fake.on(["shell", "rm"], CommandOutput::status(1));
        fake.on(["pull"], CommandOutput::status(1));
        let (device, _) = device(&fake);
        assert!(!device.file_exists("/x").unwrap().unwrap());
        assert!(!device.remove_file("/x").unwrap().unwrap());
        assert!(!device.pull_file("/x", Path::new("/tmp/x")).unwrap().unwrap());
    }

    fn gone() -> CommandOutput {
        CommandOutput {
            stdout: Vec::new(),
            stderr: b"adb: device 'test-serial' not found\n".to_vec(),
            exit_code: 1,
        }
    }

    fn assert_not_connected<T: std::fmt::Debug>(verdict: Verdict<T>) {
        assert_eq!(
            verdict.unwrap_err().message,
            "Device with serial test-serial is not connected."
        );
    }

    #[test]
    fn test_vanished_device_is_not_a_negative_answer() {
        let fake = FakeTransport::new(SERIAL).reachable_sequence([false]);
        for prefix in [vec!["shell", "pidof"], vec!["shell", "ls"], vec!["shell", "rm"], vec!["pull"], vec!["push"]] {
            fake.on(prefix, gone());
        }
        let (device, _) = device(&fake);
        assert_not_connected(device.get_pid("perfetto").unwrap());
        assert_not_connected(device.is_process_running("perfetto").unwrap());
        assert_not_connected(device.kill_process("perfetto").unwrap());
        assert_not_connected(device.file_exists("/x").unwrap());
        assert_not_connected(device.remove_file("/x").unwrap());
        assert_not_connected(device.pull_file("/x", Path::new("/tmp/x")).unwrap());
        assert_not_connected(device.push_file(Path::new("/tmp/x"), "/x").unwrap());
        assert!(!fake.issued().iter().any(|args| args.contains(&"kill".to_string())));
    }

    #[test]
    fn test_start_package_on_vanished_device() {
        let fake = FakeTransport::new(SERIAL).reachable_sequence([false]);
        fake.on(["shell", "am", "start"], gone());
        let (device, _) = device(&fake);
        assert_not_connected(device.start_package("com.app").unwrap());
    }

    #[test]
    fn test_simpleperf_check_on_vanished_device() {
        let fake = FakeTransport::new(SERIAL).reachable_sequence([false]);
        fake.on(["shell", "ls"], gone());
        let (device, _) = device(&fake);
        assert_not_connected(
            device
                .simpleperf_event_exists(&["cpu-cycles".to_string()])
                .unwrap(),
        );
    }

    #[test]
    fn test_create_directory_must_succeed() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(["shell", "mkdir"], CommandOutput::status(1));
        let (device, _) = device(&fake);
        assert!(matches!(
            device.create_directory("/data/x"),
            Err(Fault::UnexpectedExit { .. })
        ));
    }

    #[test]
    fn test_props() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(
            ["shell", "getprop", "ro.build.version.sdk"],
            CommandOutput::ok("34\n"),
        );
        let (device, _) = device(&fake);
        assert_eq!(device.get_android_sdk_version().unwrap(), 34);
        device.set_prop("a.b", "1").unwrap();
        device.clear_prop("a.b").unwrap();
        let issued = fake.issued();
        assert_eq!(issued[1], vec!["shell", "setprop", "a.b", "1"]);
        assert_eq!(issued[2], vec!["shell", "setprop", "a.b", "\"\""]);
    }

    #[test]
    fn test_simpleperf_missing_binary_checked_first() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(["shell", "ls"], CommandOutput::status(1));
        let (device, _) = device(&fake);
        let err = device
            .simpleperf_event_exists(&["cpu-cycles".to_string()])
            .unwrap()
            .unwrap_err();
        assert_eq!(err.message, "Simpleperf was not found in the device.");
        assert!(!fake
            .issued()
            .iter()
            .any(|args| args.contains(&"simpleperf".to_string())));
    }

    #[test]
    fn test_simpleperf_events_validated() {
        let fake = FakeTransport::new(SERIAL);
        fake.on(
            ["shell", "simpleperf", "list"],
            CommandOutput::ok("  cpu-clock\n  minor-faults\n  page-faults\n"),
        );
        let (device, _) = device(&fake);
        let requested = vec!["cpu-clock".to_string(), "minor-faults".to_string()];
        assert!(device.simpleperf_event_exists(&requested).unwrap().is_ok());
        assert_eq!(requested.len(), 2);

        let err = device
            .simpleperf_event_exists(&["cpu-clock".to_string(), "List".to_string()])
            .unwrap()
            .unwrap_err();
        assert_eq!(
            err.message,
            "The following simpleperf event(s) are invalid: ['List']."
        );
        assert_eq!(
            err.suggestion.as_deref(),
            Some("Run adb shell simpleperf list to see valid simpleperf events.")
        );
    }

    #[test]
    fn test_simpleperf_record_command() {
        let fake = FakeTransport::new(SERIAL);
        let (device, _) = device(&fake);
        let _handle = device
            .start_simpleperf_trace(&["cpu-cycles".to_string(), "instructions".to_string()], Some(3500))
            .unwrap();
        let spawned = fake.spawned();
        assert_eq!(
            spawned[0].join(" "),
            "shell simpleperf record -a -f 1000 --exclude-perf --post-unwind=yes -m 8192 -g \
             --duration 4 -e cpu-cycles,instructions -o /tmp/simpleperf-traces/perf.data"
        );
    }

    #[test]
    fn test_perfetto_config_goes_to_stdin() {
        let fake = FakeTransport::new(SERIAL);
        let (device, _) = device(&fake);
        let mut handle = device.start_perfetto_trace("duration_ms: 1000").unwrap();
        assert!(handle.is_running().unwrap());
        let started = fake
            .events()
            .into_iter()
            .find_map(|(_, event)| match event {
                FakeEvent::Spawn { input, .. } => input,
                _ => None,
            });
        assert_eq!(started.as_deref(), Some("duration_ms: 1000"));
    }

    #[test]
    fn test_check_connection() {
        let fake = FakeTransport::new(SERIAL).reachable_sequence([false]);
        let (device, _) = device(&fake);
        let err = device.check_connection().unwrap().unwrap_err();
        assert_eq!(err.message, "Device with serial test-serial is not connected.");
    }
}
