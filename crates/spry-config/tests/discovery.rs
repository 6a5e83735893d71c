//! Tests for config file discovery and loading

use spry_config::{
    ConfigDiscovery, ConfigError, ConfigOverrides, SourceMapMode, TransformSpec,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const FLEXBOX_TOML: &str = r#"
rootPath = "app"
port = 3000
cleanDir = "app/dist"

[[tasks]]
name = "styles"
watch = ["app/*.css"]
transformChain = ["autoprefix", "concat", "minify", { stage = "sourcemap", mode = "external" }]
output = "app/dist/styles.css"

[[tasks]]
name = "html"
watch = ["app/*.html"]
"#;

#[test]
fn discovers_spry_toml() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("spry.toml"), FLEXBOX_TOML).unwrap();

    let discovery = ConfigDiscovery::new(dir.path());
    let found = discovery.find().unwrap();
    assert_eq!(found.file_name().unwrap(), "spry.toml");

    let config = discovery.load(&ConfigOverrides::default()).unwrap();
    assert_eq!(config.root_path, PathBuf::from("app"));
    assert_eq!(config.port, 3000);
    assert_eq!(config.base_dir, dir.path());
    assert_eq!(config.root_dir(), dir.path().join("app"));
    assert_eq!(config.clean_path(), Some(dir.path().join("app/dist")));

    let styles = &config.tasks[0];
    assert_eq!(styles.name, "styles");
    assert_eq!(
        styles.transform_chain,
        vec![
            TransformSpec::Autoprefix,
            TransformSpec::Concat {
                separator: "\n".to_string()
            },
            TransformSpec::Minify,
            TransformSpec::Sourcemap {
                mode: SourceMapMode::External
            },
        ]
    );
    assert_eq!(styles.input_globs(), ["app/*.css".to_string()]);
    assert_eq!(styles.browsers, vec!["defaults".to_string()]);

    let html = &config.tasks[1];
    assert!(html.is_reload_only());
}

#[test]
fn discovers_package_json() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{
  "name": "web-typography",
  "spry": {
    "rootPath": "./",
    "indexDocument": "web-fonts.html"
  }
}"#,
    )
    .unwrap();

    let discovery = ConfigDiscovery::new(dir.path());
    assert_eq!(discovery.find().unwrap().file_name().unwrap(), "package.json");

    let config = discovery.load(&ConfigOverrides::default()).unwrap();
    assert_eq!(config.index_document.as_deref(), Some("web-fonts.html"));
    assert!(config.tasks.is_empty());
}

#[test]
fn package_json_without_spry_field_is_ignored() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("package.json"), r#"{ "name": "forms" }"#).unwrap();

    let discovery = ConfigDiscovery::new(dir.path());
    assert!(discovery.find().is_none());

    let config = discovery.load(&ConfigOverrides::default()).unwrap();
    assert_eq!(config.port, 3000);
    assert_eq!(config.base_dir, dir.path());
}

#[test]
fn cli_overrides_win_over_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("spry.toml"), FLEXBOX_TOML).unwrap();

    let overrides = ConfigOverrides {
        port: Some(4100),
        live_reload: Some(false),
        ..ConfigOverrides::default()
    };
    let config = ConfigDiscovery::new(dir.path()).load(&overrides).unwrap();
    assert_eq!(config.port, 4100);
    assert!(!config.live_reload);
    assert_eq!(config.root_path, PathBuf::from("app"));
}

#[test]
fn explicit_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = ConfigDiscovery::new(dir.path())
        .with_file(&missing)
        .load(&ConfigOverrides::default())
        .unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(path) if path == missing));
}

#[test]
fn unknown_stage_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("spry.toml"),
        r#"
[[tasks]]
name = "styles"
watch = ["*.css"]
transformChain = ["uglify"]
output = "dist/styles.css"
"#,
    )
    .unwrap();

    let err = ConfigDiscovery::new(dir.path())
        .load(&ConfigOverrides::default())
        .unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
    assert!(err.to_string().contains("uglify"));
}

#[test]
fn dependency_cycle_fails_loading() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("spry.toml"),
        r#"
[[tasks]]
name = "a"
dependsOn = ["b"]

[[tasks]]
name = "b"
dependsOn = ["a"]
"#,
    )
    .unwrap();

    let err = ConfigDiscovery::new(dir.path())
        .load(&ConfigOverrides::default())
        .unwrap_err();
    assert!(matches!(err, ConfigError::DependencyCycle { .. }));
}
