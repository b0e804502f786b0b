use arca_node::NodeConfig;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_env_file_feeds_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("arca.env");
    fs::write(
        &path,
        "ARCA_REPORTER_BPS=1250\nARCA_CHALLENGE_WINDOW=64\n",
    )
    .unwrap();
    // Process environment takes precedence over the file.
    env::set_var("ARCA_CHALLENGE_WINDOW", "32");

    let loaded = NodeConfig::load_env_file(Some(&path)).unwrap();
    assert_eq!(loaded.as_deref(), Some(path.as_path()));

    let mut config = NodeConfig::default();
    config.apply_env_overrides().unwrap();
    assert_eq!(config.market.reporter_bps, 1_250);
    assert_eq!(config.market.challenge.challenge_window, 32);

    let err = NodeConfig::load_env_file(Some(&dir.path().join("absent.env"))).unwrap_err();
    assert!(format!("{err:#}").contains("reading env file"));

    env::remove_var("ARCA_REPORTER_BPS");
    env::remove_var("ARCA_CHALLENGE_WINDOW");
}
