//! Native watcher module for integration tests
//!
//! Exports the same C entry points a real module does, records every call,
//! and lets the test fire change events through the registered callback
//! from a native thread.

#![allow(non_snake_case)]

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::Mutex;

type ChangedFn = extern "C" fn(path: *const c_char);

static CALLS: Mutex<Vec<String>> = Mutex::new(Vec::new());
static CALLBACK: Mutex<Option<ChangedFn>> = Mutex::new(None);

fn record(call: String) {
    if let Ok(mut calls) = CALLS.lock() {
        calls.push(call);
    }
}

fn read_path(path: *const c_char) -> String {
    if path.is_null() {
        return String::new();
    }
    // SAFETY: callers pass a NUL-terminated string valid for this call
    unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned()
}

#[no_mangle]
pub extern "C" fn StartListening(path: *const c_char) {
    record(format!("start {}", read_path(path)));
}

#[no_mangle]
pub extern "C" fn StopListening() {
    record("stop".to_string());
}

#[no_mangle]
pub extern "C" fn SetFileChangedCallback(callback: ChangedFn) {
    record("set_callback".to_string());
    if let Ok(mut slot) = CALLBACK.lock() {
        *slot = Some(callback);
    }
}

/// Report `path` as changed, from a thread the host did not create
#[no_mangle]
pub extern "C" fn FixtureEmit(path: *const c_char) {
    let callback = CALLBACK.lock().ok().and_then(|slot| *slot);
    let Some(callback) = callback else {
        return;
    };
    let Ok(path) = CString::new(read_path(path)) else {
        return;
    };
    let _ = std::thread::spawn(move || callback(path.as_ptr())).join();
}

/// Copy the call log, one call per line, into `buf`
///
/// Returns the full log length; nothing is written if `len` is too small.
#[no_mangle]
pub extern "C" fn FixtureCalls(buf: *mut u8, len: usize) -> usize {
    let log = match CALLS.lock() {
        Ok(calls) => calls.join("\n"),
        Err(_) => return 0,
    };
    if !buf.is_null() && log.len() <= len {
        // SAFETY: the caller owns `len` writable bytes at `buf`
        unsafe { std::ptr::copy_nonoverlapping(log.as_ptr(), buf, log.len()) };
    }
    log.len()
}

#[no_mangle]
pub extern "C" fn FixtureReset() {
    if let Ok(mut calls) = CALLS.lock() {
        calls.clear();
    }
}
