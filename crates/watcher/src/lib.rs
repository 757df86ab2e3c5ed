//! Watch sessions and change notifications for Dirsentry
//!
//! This crate provides:
//! - `SessionManager`: the start/stop/reconfigure protocol over a bound module
//! - `NotificationRelay`: hands change events from module threads to the
//!   presentation thread, in arrival order
//! - `Presenter`: what the presentation shell must implement to display them

pub mod error;
pub mod event;
pub mod relay;
pub mod session;

// Re-exports
pub use error::SessionError;
pub use event::{ChangeEvent, Generation};
pub use relay::{NotificationRelay, PresentationQueue, Presenter};
pub use session::{SessionManager, SessionPhase, WatchSession};

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
