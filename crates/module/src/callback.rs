//! Process-wide change-callback slot for native libraries
//!
//! A C function pointer cannot carry a closure, so native modules are handed
//! a single static trampoline. The trampoline forwards to whatever callback
//! currently sits in the slot; registering again replaces it.

use crate::ChangeCallback;
use parking_lot::RwLock;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

/// Signature native modules call back into
pub type NativeCallback = extern "C" fn(path: *const c_char);

static SLOT: RwLock<Option<ChangeCallback>> = parking_lot::const_rwlock(None);

/// Install `callback` as the target of the trampoline
pub fn install(callback: ChangeCallback) {
    *SLOT.write() = Some(callback);
}

/// Remove the installed callback; later native calls are ignored
pub fn clear() {
    *SLOT.write() = None;
}

/// Entry point handed to `SetFileChangedCallback`
pub extern "C" fn trampoline(path: *const c_char) {
    if path.is_null() {
        return;
    }

    // SAFETY: the module contract passes a NUL-terminated string that stays
    // valid for the duration of the call.
    let path = unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned();
    dispatch(PathBuf::from(path));
}

fn dispatch(path: PathBuf) {
    // Clone out so the lock is not held while the host runs
    let callback = SLOT.read().clone();
    let Some(callback) = callback else {
        return;
    };

    // Unwinding into foreign frames is not allowed
    if panic::catch_unwind(AssertUnwindSafe(|| callback(path))).is_err() {
        tracing::error!("Change callback panicked; event dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::ffi::CString;
    use std::sync::Arc;

    // The slot is global, so every scenario lives in one test.
    #[test]
    fn test_trampoline_forwards_to_latest_callback() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let sink = first.clone();
        install(Arc::new(move |p: PathBuf| sink.lock().push(p)));
        let sink = second.clone();
        install(Arc::new(move |p: PathBuf| sink.lock().push(p)));

        let path = CString::new("/tmp/watch/file.txt").unwrap();
        trampoline(path.as_ptr());
        trampoline(std::ptr::null());

        assert!(first.lock().is_empty());
        assert_eq!(second.lock().as_slice(), &[PathBuf::from("/tmp/watch/file.txt")]);

        install(Arc::new(|_: PathBuf| panic!("boom")));
        trampoline(path.as_ptr());

        clear();
        trampoline(path.as_ptr());
        assert_eq!(second.lock().len(), 1);
    }
}
