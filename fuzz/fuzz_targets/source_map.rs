#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use tether_agent::sourcemap::SourceMapIndex;

const MAX_MAPPINGS_BYTES: usize = 8192;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let line = u32::from(data[0]) + 1;
    let column = u32::from(data[1]) + 1;
    let rest = &data[2..];
    let mappings = String::from_utf8_lossy(&rest[..rest.len().min(MAX_MAPPINGS_BYTES)]);
    let json = json_string(&mappings);
    let map = format!(
        r#"{{"version":3,"file":"out.js","sources":["in.ts","other.ts"],"mappings":{json}}}"#
    );

    let mut index = SourceMapIndex::new();
    if index.add(Path::new("/app/out.js.map"), &map).is_err() {
        return;
    }
    if let Ok(Some(info)) = index.map_input("/app/in.ts") {
        let position = index.map_output(line, column, &info);
        assert_eq!(position.file, "/app/out.js");
        assert!(position.line >= 1);
    }
});

fn json_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            ch if ch.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(ch))),
            ch => out.push(ch),
        }
    }
    out.push('"');
    out
}
