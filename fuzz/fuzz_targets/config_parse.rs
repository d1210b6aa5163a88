//! Fuzz target for TOML config parsing.
//!
//! Malformed TOML or bogus module names must be rejected, not panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use vdr_dbus::Config;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = toml::from_str::<Config>(s) {
            let _ = config.validate();
            let _ = config.bus.endpoint().service();
        }
    }
});
