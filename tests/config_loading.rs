use std::fs;

use topic_radar::config::load_from;
use topic_radar::{ConfigError, Orchestrator, PlatformId};

#[test]
fn toml_file_drives_the_orchestrator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("radar.toml");
    fs::write(
        &path,
        r#"
enabled_platforms = ["zhihu", "reddit_programming", "hackernews"]
default_count = 7

[counts]
reddit = 12
"#,
    )
    .unwrap();

    let cfg = load_from(&path).unwrap();
    assert_eq!(cfg.count_for(PlatformId::RedditProgramming), 12);
    assert_eq!(cfg.count_for(PlatformId::Zhihu), 7);

    let orch = Orchestrator::new(cfg).unwrap();
    assert_eq!(
        orch.platforms(),
        &[PlatformId::Zhihu, PlatformId::RedditProgramming, PlatformId::HackerNews]
    );
}

#[test]
fn json_file_is_picked_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("radar.json");
    fs::write(&path, r#"{"enabled_platforms": ["bilibili"], "dedup_window_days": 7}"#).unwrap();

    let cfg = load_from(&path).unwrap();
    assert_eq!(cfg.enabled_platforms, vec!["bilibili".to_string()]);
    assert_eq!(cfg.dedup_window_days, 7);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_from(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn broken_retry_policy_is_rejected_at_construction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("radar.toml");
    fs::write(
        &path,
        r#"
enabled_platforms = ["baidu"]

[http]
max_attempts = 0
"#,
    )
    .unwrap();
    let cfg = load_from(&path).unwrap();
    assert!(matches!(Orchestrator::new(cfg), Err(ConfigError::InvalidRetryPolicy(_))));

    fs::write(
        &path,
        r#"
enabled_platforms = ["baidu"]

[http]
retry_jitter_ms = [900, 100]
"#,
    )
    .unwrap();
    let cfg = load_from(&path).unwrap();
    assert!(matches!(Orchestrator::new(cfg), Err(ConfigError::InvalidRetryPolicy(_))));
}

#[test]
fn unknown_platform_names_the_offender() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("radar.toml");
    fs::write(&path, "enabled_platforms = [\"weibo\", \"geocities\"]\n").unwrap();

    let cfg = load_from(&path).unwrap();
    match Orchestrator::new(cfg) {
        Err(ConfigError::UnknownPlatform(name)) => assert_eq!(name, "geocities"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unknown platform accepted"),
    }
}
