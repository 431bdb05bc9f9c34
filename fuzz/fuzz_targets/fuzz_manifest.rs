#![no_main]

use gempod::parse;
use libfuzzer_sys::fuzz_target;
use std::panic::AssertUnwindSafe;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| parse(content)));

        match result {
            Ok(Ok(record)) => {
                for dep in record
                    .groups
                    .runtime
                    .iter()
                    .chain(record.groups.development.iter())
                {
                    assert!(!dep.name.is_empty(), "empty dependency name");
                    for version in &dep.versions {
                        if let Some(i) = version.find(|c: char| c.is_ascii_digit()) {
                            if i > 0 {
                                assert!(
                                    version[..i].ends_with(' '),
                                    "version missing space at digit boundary"
                                );
                            }
                        }
                    }
                }
                for dep in &record.groups.development {
                    assert!(dep.groups.is_none(), "dev declaration kept groups");
                }
            }
            Ok(Err(_)) => {}
            Err(_) => panic!("parser must not panic"),
        }
    }
});
