mod common;

use std::fs;

use common::*;
use tether_agent::agent::prepare;
use tether_agent::files::{FileIndexProvider, GlobScanner};

#[test]
fn scanner_indexes_script_files_only() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.js"), "const a = 1;\nconst b = 2;\nmodule.exports = a + b;\n").unwrap();
    fs::create_dir_all(dir.path().join("lib/nested")).unwrap();
    fs::write(dir.path().join("lib/nested/util.js"), "exports.x = 1;").unwrap();
    fs::write(dir.path().join("README.md"), "# app\n").unwrap();

    let index = GlobScanner
        .scan(dir.path(), &[".js".to_string()])
        .unwrap();
    assert_eq!(index.len(), 2);
    let main = dir.path().join("index.js");
    let stats = index.get(&main.to_string_lossy()).unwrap();
    assert_eq!(stats.line_count, 4);
    assert_eq!(stats.content_hash.len(), 64);
    assert_eq!(index.with_extension(".md"), Vec::<String>::new());
}

#[test]
fn uniquifier_follows_file_contents() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.js"), "one").unwrap();
    let mut config = AgentConfig {
        work_dir: Some(dir.path().to_path_buf()),
        ..AgentConfig::default()
    };
    config.service.service = Some("api".into());

    let (files, first) = prepare(&config, &GlobScanner).unwrap();
    assert_eq!(files.len(), 1);
    let (_, again) = prepare(&config, &GlobScanner).unwrap();
    assert_eq!(first.uniquifier, again.uniquifier);

    fs::write(dir.path().join("index.js"), "two").unwrap();
    let (_, changed) = prepare(&config, &GlobScanner).unwrap();
    assert_ne!(first.uniquifier, changed.uniquifier);
    assert_eq!(changed.description.as_deref(), Some("api"));
}

#[test]
fn config_loads_from_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.toml");
    fs::write(
        &path,
        r#"
[agent]
work_dir = "/srv/app"
breakpoint_expiration_sec = 600

[service]
name = "api"
version = "v7"

[capture]
max_expand_frames = 2
"#,
    )
    .unwrap();
    let config = AgentConfig::load(&path).unwrap();
    assert_eq!(config.work_dir.as_deref(), Some(std::path::Path::new("/srv/app")));
    assert_eq!(config.breakpoint_expiration, std::time::Duration::from_secs(600));
    assert_eq!(config.service.version.as_deref(), Some("v7"));
    assert_eq!(config.capture.max_expand_frames, 2);

    let missing = AgentConfig::load(dir.path().join("nope.toml")).unwrap_err();
    assert!(missing.to_string().contains("agent.toml"));
}

#[test]
fn engine_refuses_ancient_runtimes() {
    let runtime = SimulatedRuntime::new();
    let err = BreakpointEngine::builder(config())
        .runtime_version("v3.9.0".parse().unwrap())
        .build(&runtime.slot())
        .unwrap_err();
    assert!(matches!(err, tether_agent::AgentError::UnsupportedRuntime(_)));
}

#[test]
fn legacy_runtimes_shift_first_line_breakpoints() {
    let runtime = SimulatedRuntime::new();
    runtime.add_script(CODE_JS, 20);
    let mut fx = Fixture::build(runtime, config(), |builder| {
        builder.runtime_version(tether_agent::RuntimeVersion::new(8, 17, 0))
    });
    assert_eq!(fx.engine().backend(), tether_agent::engine::Backend::Legacy);
    assert!(fx.set(Breakpoint::at("b1", "code.js", 1)));
    assert!(fx.run_line(CODE_JS, 1));
    assert_eq!(fx.only_report().id, "b1");
}
