//! Tests for config loading

use foursome::config::Config;
use std::path::Path;

#[test]
fn test_config_file_exists() {
    let config_path = Path::new("config.toml");
    assert!(
        config_path.exists(),
        "config.toml should exist in project root"
    );
}

#[test]
fn test_config_toml_sections() {
    let content =
        std::fs::read_to_string("config.toml").expect("Should be able to read config.toml");

    assert!(
        content.contains("[scheduler]"),
        "config.toml should have [scheduler] section"
    );
    assert!(
        content.contains("[storage]"),
        "config.toml should have [storage] section"
    );
    assert!(
        content.contains("[logging]"),
        "config.toml should have [logging] section"
    );
}

#[test]
fn test_project_config_loads_and_validates() {
    let config = Config::from_file(Path::new("config.toml")).expect("config.toml should parse");
    assert!(config.validate().is_ok());
    assert_eq!(config.scheduler.min_players, 4);
}
