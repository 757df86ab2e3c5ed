//! A real shared-library module driven through binder, session and relay
//!
//! The callback slot is process-wide, so the whole scenario is one test.

use libloading::Library;
use module::{LoadState, ModuleBinder, ModuleSource};
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::ffi::CString;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use watcher::{NotificationRelay, SessionManager};

type EmitFn = unsafe extern "C" fn(path: *const c_char);
type CallsFn = unsafe extern "C" fn(buf: *mut u8, len: usize) -> usize;
type ResetFn = unsafe extern "C" fn();

/// Build the fixture library into the test scratch dir and return its path
fn build_fixture() -> PathBuf {
    let workspace = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    let target_dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("fixture");

    let status = Command::new(env!("CARGO"))
        .arg("build")
        .arg("--quiet")
        .arg("--manifest-path")
        .arg(workspace.join("Cargo.toml"))
        .args(["-p", "dirlisten-fixture"])
        .arg("--target-dir")
        .arg(&target_dir)
        .status()
        .expect("failed to run cargo");
    assert!(status.success(), "building the fixture module failed");

    target_dir
        .join("debug")
        .join(format!("{}dirlisten_fixture{}", DLL_PREFIX, DLL_SUFFIX))
}

/// Test-side handle on the fixture's inspection exports
struct Hooks {
    emit: EmitFn,
    calls: CallsFn,
    reset: ResetFn,
    // Keeps the library mapped after the binder closes its handle
    _library: Library,
}

impl Hooks {
    fn open(path: &Path) -> Self {
        unsafe {
            let library = Library::new(path).unwrap();
            let emit = *library.get::<EmitFn>(b"FixtureEmit\0").unwrap();
            let calls = *library.get::<CallsFn>(b"FixtureCalls\0").unwrap();
            let reset = *library.get::<ResetFn>(b"FixtureReset\0").unwrap();
            Self {
                emit,
                calls,
                reset,
                _library: library,
            }
        }
    }

    fn emit(&self, path: &Path) {
        let path = CString::new(path.to_str().unwrap()).unwrap();
        unsafe { (self.emit)(path.as_ptr()) };
    }

    fn calls(&self) -> Vec<String> {
        let mut buf = vec![0u8; 64 * 1024];
        let len = unsafe { (self.calls)(buf.as_mut_ptr(), buf.len()) };
        assert!(len <= buf.len());
        buf.truncate(len);
        String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn reset(&self) {
        unsafe { (self.reset)() };
    }
}

#[test]
fn test_native_library_lifecycle() {
    let library_path = build_fixture();
    let hooks = Hooks::open(&library_path);
    hooks.reset();

    let root = TempDir::new().unwrap();
    let first = root.path().join("first");
    let second = root.path().join("second");
    std::fs::create_dir(&first).unwrap();
    std::fs::create_dir(&second).unwrap();

    let (relay, queue) = NotificationRelay::channel();
    let mut binder = ModuleBinder::new();
    binder
        .load(&ModuleSource::Path(library_path.clone()))
        .unwrap();
    assert_eq!(binder.state(), LoadState::Loaded);
    assert!(binder.register_callback(relay.callback()).unwrap());

    let mut manager = SessionManager::new(binder);
    manager.configure(&first).unwrap();
    manager.configure(&second).unwrap();

    assert_eq!(
        hooks.calls(),
        vec![
            "set_callback".to_string(),
            format!("start {}", first.display()),
            "stop".to_string(),
            format!("start {}", second.display()),
        ]
    );

    // Native thread -> trampoline -> relay, in order
    let changed: Vec<PathBuf> = (0..3).map(|i| second.join(format!("f{}.txt", i))).collect();
    for path in &changed {
        hooks.emit(path);
    }
    let delivered: Vec<PathBuf> = std::iter::from_fn(|| queue.try_next())
        .map(|event| event.path)
        .collect();
    assert_eq!(delivered, changed);

    hooks.reset();
    manager.teardown();
    assert_eq!(hooks.calls(), vec!["stop".to_string()]);
    assert!(!manager.is_bound());

    // Unload cleared the host slot; a late native call reaches nobody
    hooks.emit(&second.join("late.txt"));
    assert!(queue.try_next().is_none());
}
