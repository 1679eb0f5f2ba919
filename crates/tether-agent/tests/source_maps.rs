mod common;

use std::path::Path;

use common::*;
use tether_agent::sourcemap::SourceMapIndex;

/// `src/app.ts` line 3 compiles to `build/out.js` line 10.
const MAP: &str = r#"{
    "version": 3,
    "file": "out.js",
    "sources": ["../src/app.ts"],
    "mappings": ";;;;;;;;;AAEA"
}"#;

fn fixture_with_maps(maps: &[(&str, &str)], scripts: &[(&str, u32)]) -> Fixture {
    let runtime = SimulatedRuntime::new();
    for (path, lines) in scripts {
        runtime.add_script(path, *lines);
    }
    let mut index = SourceMapIndex::new();
    for (path, json) in maps {
        index.add(Path::new(path), json).unwrap();
    }
    Fixture::build(runtime, config(), |builder| builder.source_maps(index))
}

#[test]
fn breakpoints_in_authored_sources_map_to_the_output() {
    let mut fx = fixture_with_maps(
        &[("/app/build/out.js.map", MAP)],
        &[("/app/build/out.js", 30)],
    );
    assert!(fx.set(Breakpoint::at("b1", "src/app.ts", 3)));
    assert_eq!(fx.runtime.native_breakpoint_count(), 1);

    assert!(!fx.run_line("/app/build/out.js", 3));
    assert!(fx.run(vec![Frame::new("render", "/app/build/out.js", 10).local("n", 1.0)]));
    let report = fx.only_report();
    assert_eq!(report.status, None);
    let location = report.location.unwrap();
    assert_eq!(location.path, "src/app.ts");
    assert_eq!(location.line, 3);
    assert_eq!(report.stack_frames[0].location.path, "build/out.js");
}

#[test]
fn unmapped_lines_are_checked_against_the_output() {
    let mut fx = fixture_with_maps(
        &[("/app/build/out.js.map", MAP)],
        &[("/app/build/out.js", 30)],
    );
    assert!(!fx.set(Breakpoint::at("b1", "src/app.ts", 50)));
    assert_eq!(
        status_text(&fx.only_report()),
        messages::invalid_line("src/app.ts", 50)
    );
}

#[test]
fn untranspiled_inputs_without_a_map_are_rejected() {
    let mut fx = fixture_with_maps(
        &[("/app/build/out.js.map", MAP)],
        &[("/app/build/out.js", 30)],
    );
    assert!(!fx.set(Breakpoint::at("b1", "src/other.ts", 1)));
    assert_eq!(
        status_text(&fx.only_report()),
        messages::COULD_NOT_FIND_OUTPUT_FILE
    );
}

#[test]
fn one_input_in_several_maps_is_ambiguous() {
    let mut fx = fixture_with_maps(
        &[("/app/build/out.js.map", MAP), ("/app/dist/out.js.map", MAP)],
        &[("/app/build/out.js", 30), ("/app/dist/out.js", 30)],
    );
    assert!(!fx.set(Breakpoint::at("b1", "src/app.ts", 3)));
    assert_eq!(status_text(&fx.only_report()), messages::SOURCE_FILE_AMBIGUOUS);
}
