// tests/config_files.rs
use arxiv_watcher::config::{WatcherConfig, ENV_CONFIG_PATH, ENV_OUT_DIR};
use arxiv_watcher::feed::DEFAULT_QUERY;
use std::path::Path;

#[test]
fn shipped_config_matches_builtin_defaults() {
    let shipped = WatcherConfig::load_from(Path::new("config/watcher.toml")).expect("shipped config");
    assert_eq!(shipped, WatcherConfig::default());
    assert_eq!(shipped.feed.query, DEFAULT_QUERY);
}

#[serial_test::serial]
#[test]
fn out_dir_env_override() {
    std::env::remove_var(ENV_CONFIG_PATH);
    std::env::set_var(ENV_OUT_DIR, "/tmp/arxiv_hits");
    let cfg = WatcherConfig::load_default().unwrap();
    std::env::remove_var(ENV_OUT_DIR);
    assert_eq!(cfg.output.out_dir, Path::new("/tmp/arxiv_hits"));
}
