//! Watcher library packaged into the binary
//!
//! Builds with the `embedded-module` feature carry the library named by the
//! `DIRSENTRY_EMBEDDED_MODULE` environment variable at compile time. Other
//! builds carry an empty payload, which binds as `ModuleMissing`.

use module::ModuleSource;
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};

/// `module.source` value selecting the packaged library
pub const KEYWORD: &str = "embedded";

#[cfg(feature = "embedded-module")]
const PAYLOAD: &[u8] = include_bytes!(env!("DIRSENTRY_EMBEDDED_MODULE"));

#[cfg(not(feature = "embedded-module"))]
const PAYLOAD: &[u8] = &[];

pub fn is_available() -> bool {
    !PAYLOAD.is_empty()
}

/// Source extracting the packaged library to the temp dir before loading
pub fn source() -> ModuleSource {
    ModuleSource::Embedded {
        file_name: format!("{}dirsentry-watcher{}", DLL_PREFIX, DLL_SUFFIX),
        bytes: PAYLOAD,
    }
}
