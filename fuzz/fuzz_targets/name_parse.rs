//! Fuzz target for status strings and module lists.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vdr_dbus::{Facility, VdrStatus};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    status: String,
    modules: Vec<String>,
}

fuzz_target!(|input: FuzzInput| {
    if input.modules.len() > 64 {
        return;
    }

    if let Ok(status) = input.status.parse::<VdrStatus>() {
        assert_eq!(status.as_str(), input.status);
    }

    if let Ok(facilities) = Facility::parse_list(&input.modules) {
        for facility in facilities {
            assert!(facility.path().starts_with('/'));
        }
    }
});
