use clap::Parser;
use dirwatch::load_config::load_config;
use dirwatch::Cli;
use dirwatch_core::Mode;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn yaml_file(content: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), content).unwrap();
    file
}

#[test]
fn yaml_settings_load_into_a_watch_config() {
    let file = yaml_file(
        r#"
watch_paths:
  - /srv/drop
  - /srv/tv?category=tv
nzb_dir: /var/nzb
process_min_age: 120
max_archive_size_kb: 0
poll_time_sec: 0
auto_cleanup: true
mode: remote
lock_file: /tmp/dirwatch-test.lock
"#,
    );

    let settings = load_config(file.path()).expect("Config should load");
    let config = settings.watch_config().unwrap();

    assert_eq!(config.watch_paths, vec!["/srv/drop", "/srv/tv?category=tv"]);
    assert_eq!(config.nzb_dir, Some(PathBuf::from("/var/nzb")));
    assert_eq!(config.min_age, Duration::from_secs(120));
    assert_eq!(config.max_archive_size_kb, 0);
    assert_eq!(config.poll_interval, Duration::ZERO);
    assert!(config.auto_cleanup);
    assert_eq!(config.mode, Mode::Remote);
    assert_eq!(config.lock_path, PathBuf::from("/tmp/dirwatch-test.lock"));
}

#[test]
fn unknown_keys_and_missing_files_are_errors() {
    let file = yaml_file("watch_pathz: [/srv]\n");
    assert!(load_config(file.path()).is_err());
    assert!(load_config("/definitely/not/here.yaml").is_err());
}

#[test]
#[serial]
fn layers_apply_file_then_environment_then_flags() {
    let file = yaml_file("nzb_dir: /from/file\npoll_time_sec: 300\nmode: Preview\n");
    env::set_var("NZBPO_PollTimeSec", "0");
    env::set_var("NZBPO_Mode", "Move");

    let cli = Cli::parse_from([
        "dirwatch",
        "--config",
        file.path().to_str().unwrap(),
        "--preview",
    ]);
    let settings = cli.settings(env::vars()).unwrap();

    env::remove_var("NZBPO_PollTimeSec");
    env::remove_var("NZBPO_Mode");

    assert_eq!(settings.nzb_dir, Some(PathBuf::from("/from/file")));
    assert_eq!(settings.poll_time_sec, Some(0));
    assert_eq!(settings.mode.as_deref(), Some("Preview"));
}

#[test]
#[serial]
fn nzbget_server_options_provide_defaults() {
    env::set_var("NZBOP_NZBDIR", "/var/lib/nzbget/nzb");
    env::set_var("NZBOP_CONTROLPORT", "6789");

    let settings = Cli::default().settings(env::vars()).unwrap();

    env::remove_var("NZBOP_NZBDIR");
    env::remove_var("NZBOP_CONTROLPORT");

    assert_eq!(settings.nzb_dir, Some(PathBuf::from("/var/lib/nzbget/nzb")));
    assert_eq!(settings.api_url.as_deref(), Some("http://127.0.0.1:6789/"));
}
