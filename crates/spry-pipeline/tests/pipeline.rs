//! End-to-end runs of build tasks against a temporary project.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use spry_config::{SourceMapMode, SpryConfig, TaskConfig, TransformSpec};
use spry_pipeline::{BuildTask, FnTransform, Transform, TransformChain, build_chain};
use tempfile::TempDir;

fn write(root: &Path, file: &str, contents: &str) {
    let path = root.join(file);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app/styles/a.css", ".a {\n  color: red;\n}\n");
    write(dir.path(), "app/styles/b.css", ".b {\n  display: flex;\n}\n");
    dir
}

fn task(dir: &TempDir, chain: &[TransformSpec]) -> BuildTask {
    BuildTask::new(
        "styles",
        dir.path(),
        vec!["app/styles/*.css".into()],
        dir.path().join("app/dist/styles.css"),
        build_chain(chain, &["defaults".to_string()]).unwrap(),
    )
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn identity_copies_input_bytes() {
    let dir = TempDir::new().unwrap();
    let source = "/* ünïcode */\r\n.a{color:red}\n\n";
    write(dir.path(), "app/site.css", source);

    let task = BuildTask::new(
        "copy",
        dir.path(),
        vec!["app/site.css".into()],
        dir.path().join("dist/site.css"),
        build_chain(&[TransformSpec::Identity], &[]).unwrap(),
    );
    let report = task.run().unwrap();

    assert_eq!(read(&report.output), source);
    assert_eq!(report.bytes, source.len());
    assert_eq!(report.inputs, 1);
    assert!(report.source_map.is_none());
}

#[test]
fn concat_uses_configured_separator() {
    let dir = project();
    let separator = TransformSpec::Concat {
        separator: "/* --- */\n".into(),
    };
    let report = task(&dir, &[separator]).run().unwrap();

    assert_eq!(
        read(&report.output),
        ".a {\n  color: red;\n}\n/* --- */\n.b {\n  display: flex;\n}\n"
    );
    assert_eq!(report.inputs, 2);
}

#[test]
fn runs_are_idempotent() {
    let dir = project();
    let task = task(
        &dir,
        &[
            TransformSpec::Autoprefix,
            TransformSpec::concat(),
            TransformSpec::Minify,
            TransformSpec::sourcemap(SourceMapMode::Inline),
        ],
    );

    let first = task.run().unwrap();
    let first_bytes = fs::read(&first.output).unwrap();
    let second = task.run().unwrap();

    assert_eq!(fs::read(&second.output).unwrap(), first_bytes);
}

#[test]
fn inline_source_map_is_appended() {
    let dir = project();
    let report = task(&dir, &[TransformSpec::concat(), TransformSpec::sourcemap(SourceMapMode::Inline)])
        .run()
        .unwrap();

    let css = read(&report.output);
    assert!(css.starts_with(".a {\n  color: red;\n}\n\n.b {"));
    assert!(css.contains("/*# sourceMappingURL=data:application/json"));
    assert!(report.source_map.is_none());
    assert!(!dir.path().join("app/dist/styles.css.map").exists());
}

#[test]
fn external_source_map_is_written_beside_output() {
    let dir = project();
    let report = task(
        &dir,
        &[
            TransformSpec::concat(),
            TransformSpec::Minify,
            TransformSpec::sourcemap(SourceMapMode::External),
        ],
    )
    .run()
    .unwrap();

    let map_path = report.source_map.clone().unwrap();
    assert_eq!(map_path, dir.path().join("app/dist/styles.css.map"));

    let map = read(&map_path);
    assert!(map.contains("app/styles/a.css"));
    assert!(map.contains("app/styles/b.css"));
    assert!(read(&report.output).ends_with("/*# sourceMappingURL=styles.css.map */\n"));
}

#[test]
fn failed_stage_leaves_previous_output() {
    let dir = project();
    let good = task(&dir, &[TransformSpec::concat()]);
    let report = good.run().unwrap();
    let before = read(&report.output);

    let failing: Arc<dyn Transform> = Arc::new(FnTransform::new("explode", |text| {
        if text.contains("flex") {
            anyhow::bail!("cannot handle flexbox")
        }
        Ok(text.to_string())
    }));
    let chain: TransformChain = vec![failing].into();
    let bad = BuildTask::new("styles", dir.path(), good.inputs.clone(), good.output.clone(), chain);

    let err = bad.run().unwrap_err();
    assert_eq!(err.stage, "explode");
    assert_eq!(err.task, "styles");
    assert!(err.file.unwrap().ends_with("app/styles/b.css"));
    assert_eq!(read(&report.output), before);
}

#[test]
fn invalid_css_fails_in_its_stage() {
    let dir = project();
    write(dir.path(), "app/styles/c.css", ".c..d { color: blue; }\n");

    let err = task(&dir, &[TransformSpec::Minify]).run().unwrap_err();
    assert_eq!(err.stage, "minify");
    assert!(err.file.unwrap().ends_with("c.css"));
    assert!(!dir.path().join("app/dist/styles.css").exists());
}

#[test]
fn no_matching_inputs_skips_the_run() {
    let dir = TempDir::new().unwrap();
    let task = task(&dir, &[TransformSpec::concat(), TransformSpec::Minify]);

    let report = task.run().unwrap();
    assert!(report.is_skipped());
    assert_eq!(report.bytes, 0);
    assert!(!task.output.exists());

    // Files created later are picked up by the next run.
    write(dir.path(), "app/styles/a.css", ".a {\n  color: red;\n}\n");
    let report = task.run().unwrap();
    assert!(!report.is_skipped());
    assert_eq!(report.inputs, 1);
    assert!(read(&task.output).starts_with(".a{color:red}"));
}

#[test]
fn failed_write_keeps_previous_map() {
    let dir = project();
    let task = task(&dir, &[TransformSpec::sourcemap(SourceMapMode::External)]);
    write(dir.path(), "app/dist/styles.css.map", "old map");
    // A directory where the output goes makes the final rename fail.
    fs::create_dir_all(&task.output).unwrap();

    let err = task.run().unwrap_err();
    assert_eq!(err.stage, "write");
    assert_eq!(read(&task.map_path()), "old map");
}

#[test]
fn output_inside_input_glob_is_not_read_back() {
    let dir = project();
    let task = BuildTask::new(
        "styles",
        dir.path(),
        vec!["app/**/*.css".into()],
        dir.path().join("app/dist/styles.css"),
        build_chain(&[TransformSpec::concat()], &[]).unwrap(),
    );

    let first = task.run().unwrap();
    let second = task.run().unwrap();
    assert_eq!(second.inputs, 2);
    assert_eq!(read(&first.output), read(&second.output));
}

#[test]
fn configured_task_resolves_against_base_dir() {
    let dir = project();
    let config = SpryConfig {
        base_dir: dir.path().to_path_buf(),
        ..SpryConfig::default()
    };
    let styles = TaskConfig::new("styles")
        .with_watch("app/styles/*.css")
        .with_transform(TransformSpec::Autoprefix)
        .with_transform(TransformSpec::concat())
        .with_output("app/dist/styles.css");

    let task = BuildTask::from_config(&styles, &config).unwrap().unwrap();
    let report = task.run().unwrap();

    assert_eq!(report.output, dir.path().join("app/dist/styles.css"));
    let css = read(&report.output);
    assert!(css.contains(".a"));
    assert!(css.contains(".b"));
}
