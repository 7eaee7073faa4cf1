#![no_main]

use std::fs;

use libfuzzer_sys::fuzz_target;
use tempfile::tempdir;
use waybill::report::load_summary;

fuzz_target!(|data: &[u8]| {
    let td = match tempdir() {
        Ok(v) => v,
        Err(_) => return,
    };

    let path = td.path().join("summary.json");
    if fs::write(path, data).is_ok() {
        let _ = load_summary(td.path());
    }
});
