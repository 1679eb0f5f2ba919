#![no_main]

use libfuzzer_sys::fuzz_target;
use tether_syntax::{check, parse, validate, CheckError};

const MAX_SOURCE_BYTES: usize = 4096;

fuzz_target!(|data: &[u8]| {
    let capped = &data[..data.len().min(MAX_SOURCE_BYTES)];
    let source = String::from_utf8_lossy(capped);

    // `check` must agree with running the two stages by hand.
    let staged = parse(&source).map(|program| validate(&program).is_ok());
    match (check(&source), staged) {
        (Ok(_), Ok(true)) | (Err(CheckError::Disallowed(_)), Ok(false)) => {}
        (Err(CheckError::Syntax(_)), Err(_)) => {}
        (checked, staged) => panic!("check disagrees for {source:?}: {checked:?} vs {staged:?}"),
    }
});
