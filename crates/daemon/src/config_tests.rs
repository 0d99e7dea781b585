// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_engine::WorkerMode;
use serial_test::serial;
use std::io::Write;

fn clear_env() {
    std::env::remove_var("FLEET_CONFIG");
    std::env::remove_var("FLEET_STATE_DIR");
}

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn no_file_yields_defaults() {
    clear_env();
    let config = Config::load(None).unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.executor.program, "fleet-apply");
    assert_eq!(config.recover_after(), Duration::from_secs(300));
    assert!(config.log.dir.is_none());
}

#[test]
#[serial]
fn full_file_is_parsed() {
    clear_env();
    let file = write_config(
        r#"
[queue]
buffer = 4
recover_after_secs = 60
drain_timeout_secs = 0

[worker]
mode = "stateless"

[scheduler]
max_backlog = 10

[events]
capacity = 50

[executor]
program = "/usr/bin/apply"
args = ["--check"]
timeout_secs = 5

[log]
dir = "/var/log/fleet"

[[schedule]]
config_path = "web.yaml"
interval_secs = 60
priority = "HIGH"
execution_cost = 5000
host = "web-1"

[[schedule]]
config_path = "db.yaml"
interval_secs = 120
enabled = false
"#,
    );
    let config = Config::load(Some(file.path())).unwrap();

    assert_eq!(config.queue.buffer, 4);
    assert_eq!(config.queue.history, fleet_engine::queue::DEFAULT_HISTORY);
    assert_eq!(config.drain_timeout(), Duration::ZERO);
    assert_eq!(config.worker.mode, WorkerMode::Stateless);
    assert_eq!(config.worker.budget(), Some(1));
    assert_eq!(config.scheduler.max_backlog, 10);
    assert_eq!(config.scheduler.max_execution_cost, 1000);
    assert_eq!(config.events.capacity, 50);
    assert_eq!(config.executor.args, vec!["--check"]);
    assert_eq!(config.log.dir, Some(PathBuf::from("/var/log/fleet")));

    assert_eq!(config.schedules.len(), 2);
    let web = config.schedules[0].options();
    assert_eq!(web.priority, Priority::High);
    assert_eq!(web.interval, Duration::from_secs(60));
    assert_eq!(web.host.as_deref(), Some("web-1"));
    assert!(!config.schedules[1].options().enabled);
}

#[test]
#[serial]
fn env_selects_file_and_state_dir_overrides_logs() {
    clear_env();
    let file = write_config("[events]\ncapacity = 7\n");
    std::env::set_var("FLEET_CONFIG", file.path());
    std::env::set_var("FLEET_STATE_DIR", "/tmp/fleet-state");

    let config = Config::load(None).unwrap();
    clear_env();

    assert_eq!(config.events.capacity, 7);
    assert_eq!(config.log.dir, Some(PathBuf::from("/tmp/fleet-state/logs")));
}

#[test]
#[serial]
fn missing_file_is_read_error() {
    clear_env();
    let err = Config::load(Some(Path::new("/nonexistent/fleet.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
#[serial]
fn malformed_toml_is_parse_error() {
    clear_env();
    let file = write_config("[queue\nbuffer = ");
    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

#[yare::parameterized(
    zero_buffer   = { "[queue]\nbuffer = 0\n" },
    zero_capacity = { "[events]\ncapacity = 0\n" },
    empty_program = { "[executor]\nprogram = \" \"\n" },
    zero_interval = { "[[schedule]]\nconfig_path = \"a\"\ninterval_secs = 0\n" },
    blank_path    = { "[[schedule]]\nconfig_path = \"\"\ninterval_secs = 5\n" },
)]
fn invalid_values_are_rejected(text: &str) {
    let config: Config = toml::from_str(text).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}
