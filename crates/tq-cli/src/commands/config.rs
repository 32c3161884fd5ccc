//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success, print_warning};
use tq_core::config::{self, ConfigFile};

fn resolve_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Print the path of the config file in use
pub fn config_path(config_path: Option<&Path>) -> Result<()> {
    println!("{}", resolve_path(config_path).display());
    Ok(())
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
}

/// Follow a dotted key such as `host.adb_path` through nested tables
fn lookup<'a>(table: &'a toml::Table, key: &str) -> Option<&'a toml::Value> {
    let mut parts = key.split('.');
    let first = table.get(parts.next()?)?;
    parts.try_fold(first, |value, part| value.as_table()?.get(part))
}

/// Typed TOML value for a command-line string
fn parse_value(value: &str) -> toml::Value {
    match value {
        "true" => toml::Value::Boolean(true),
        "false" => toml::Value::Boolean(false),
        _ => value
            .parse::<i64>()
            .map(toml::Value::Integer)
            .or_else(|_| value.parse::<f64>().map(toml::Value::Float))
            .unwrap_or_else(|_| toml::Value::String(value.to_string())),
    }
}

/// Print one config value, e.g. `torq config get host.adb_path`
pub fn config_get(config_path: Option<&Path>, key: &str) -> Result<()> {
    let path = resolve_path(config_path);
    if !path.exists() {
        print_error(&format!("Config file not found: {:?}", path));
        print_info("Run 'torq config init' to create one");
        return Ok(());
    }

    let table = read_table(&path)?;
    match lookup(&table, key) {
        Some(toml::Value::String(s)) => println!("{}", s),
        Some(toml::Value::Table(t)) => print!("{}", toml::to_string_pretty(t)?),
        Some(other) => println!("{}", other),
        None => {
            print_error(&format!("Key not found: {}", key));
            print_info("Known sections are [host] and [profiler]; see 'torq config show'");
        }
    }
    Ok(())
}

/// Set one config value.
///
/// The file is only rewritten if it still loads as a torq configuration.
pub fn config_set(config_path: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let path = resolve_path(config_path);
    if !path.exists() {
        print_info("Creating default configuration...");
        config_init(config_path, false)?;
    }

    let mut table = read_table(&path)?;
    let (last_key, parents) = match key.split('.').collect::<Vec<_>>().split_last() {
        Some((last, parents)) if !last.is_empty() => (last.to_string(), parents.to_vec()),
        _ => anyhow::bail!("Invalid key: key path cannot be empty"),
    };

    let mut current = &mut table;
    for part in parents {
        current = current
            .entry(part)
            .or_insert(toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("Cannot navigate to key: {}", key))?;
    }
    current.insert(last_key, parse_value(value));

    let new_content = toml::to_string_pretty(&table)?;
    toml::from_str::<ConfigFile>(&new_content)
        .with_context(|| format!("Refusing to set {} = {}", key, value))?;
    std::fs::write(&path, new_content)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Set {} = {}", key, value));
    Ok(())
}

/// Show current configuration
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = resolve_path(config_path);

    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Using built-in defaults:");
        println!();
        println!("{}", toml::to_string_pretty(&ConfigFile::default())?);
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", path));
    println!();

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    println!("{}", content);

    Ok(())
}

/// Initialize default configuration
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let config_file = resolve_path(config_path);
    let config_dir = config_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_dir);

    if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
        print_success(&format!("Created config directory: {:?}", config_dir));
    }

    if config_file.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", config_file));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    std::fs::write(&config_file, generate_default_config())
        .with_context(|| format!("Failed to write config file: {:?}", config_file))?;

    print_success(&format!("Created configuration file: {:?}", config_file));
    Ok(())
}

/// Generate default configuration content
fn generate_default_config() -> String {
    r#"# torq configuration

[host]
# Path or name of the adb binary
adb_path = "adb"

# Environment variable holding the default device serial
serial_env = "ANDROID_SERIAL"

# Interval between device state polls, in milliseconds
poll_interval_ms = 500

# How long the device may take for each state transition, in seconds
root_timeout_secs = 5
reboot_timeout_secs = 5
boot_timeout_secs = 30
wait_for_device_timeout_secs = 5
user_switch_timeout_secs = 15

[profiler]
# Event duration when --dur-ms is omitted
dur_ms = 10000

# Delay between runs when --between-dur-ms is omitted
between_dur_ms = 10000

# Output directory when --out-dir is omitted
out_dir = "."
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_defaults() {
        let parsed: ConfigFile = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(parsed, ConfigFile::default());
    }

    #[test]
    fn test_lookup_and_parse_value() {
        let table: toml::Table = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(
            lookup(&table, "host.adb_path"),
            Some(&toml::Value::String("adb".into()))
        );
        assert_eq!(lookup(&table, "host.adb_path.deeper"), None);
        assert_eq!(lookup(&table, "profiler.missing"), None);

        assert_eq!(parse_value("true"), toml::Value::Boolean(true));
        assert_eq!(parse_value("5000"), toml::Value::Integer(5000));
        assert_eq!(parse_value("0.5"), toml::Value::Float(0.5));
        assert_eq!(parse_value("/opt/adb"), toml::Value::String("/opt/adb".into()));
    }

    #[test]
    fn test_set_rejects_wrong_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        config_init(Some(&path), false).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        assert!(config_set(Some(&path), "host.boot_timeout_secs", "soon").is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_set_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        config_set(Some(&path), "profiler.dur_ms", "5000").unwrap();

        let loaded: ConfigFile = config::load_config(&path).unwrap();
        assert_eq!(loaded.profiler.dur_ms, 5000);
        assert_eq!(loaded.host, ConfigFile::default().host);
    }
}
