//! Key event sources.
//!
//! On Windows, a `WH_KEYBOARD_LL` hook runs on a dedicated Win32 message-loop
//! thread and forwards every key-down into a tokio channel.  Everywhere else
//! (and in tests) a [`ScriptedKeySource`] replays a fixed key stream.
//!
//! # Windows-specific implementation
//!
//! The hook callback must return within a few hundred milliseconds or Windows
//! silently removes the hook.  The callback therefore does nothing except
//! forward `(vkCode, time)`; assembly happens on the async side.
//!
//! # Testability
//!
//! The [`KeyEventSource`] trait lets the pipeline be driven by synthetic
//! events without a message loop or OS hooks.

use async_trait::async_trait;
use scanwedge_core::KeyEvent;

pub mod scripted;

#[cfg(target_os = "windows")]
pub mod windows;

pub use scripted::ScriptedKeySource;

#[cfg(target_os = "windows")]
pub use windows::WindowsHookSource;

/// Error type for key capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to install keyboard hook: {0}")]
    HookInstallFailed(String),
    #[error("a keyboard hook is already running in this process")]
    AlreadyRunning,
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// Producer of key-down events in arrival order.
#[async_trait]
pub trait KeyEventSource: Send {
    /// Waits for the next key event.
    ///
    /// Returns `None` once the source is exhausted or stopped; after that it
    /// keeps returning `None`.
    async fn next_event(&mut self) -> Option<KeyEvent>;

    /// Stops the source and releases any OS resources.  Idempotent.
    fn stop(&mut self);
}

/// Installs the platform keyboard hook.
///
/// # Errors
///
/// Returns [`CaptureError::UnsupportedPlatform`] on anything but Windows, and
/// the install error from the hook otherwise.
pub fn platform_source() -> Result<Box<dyn KeyEventSource>, CaptureError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(WindowsHookSource::install()?))
    }

    #[cfg(not(target_os = "windows"))]
    {
        Err(CaptureError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        ))
    }
}
