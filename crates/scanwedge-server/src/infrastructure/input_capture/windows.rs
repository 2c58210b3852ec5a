//! Windows low-level keyboard hook.
//!
//! Installs a `WH_KEYBOARD_LL` hook on a dedicated Win32 message-loop thread.
//! The callback forwards `(vkCode, time)` for every key-down into a tokio
//! unbounded channel and always passes the key on, so the focused
//! application still receives the scan as typed text.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::thread;

use async_trait::async_trait;
use scanwedge_core::KeyEvent;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, HC_ACTION, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL,
    WM_KEYDOWN, WM_QUIT, WM_SYSKEYDOWN,
};

use super::{CaptureError, KeyEventSource};

/// Global sender used by the hook callback to deliver events to the runtime.
/// Set once by [`WindowsHookSource::install`]; a second install fails.
static EVENT_SENDER: OnceLock<UnboundedSender<KeyEvent>> = OnceLock::new();

/// Key event source backed by a process-wide low-level keyboard hook.
pub struct WindowsHookSource {
    events: UnboundedReceiver<KeyEvent>,
    /// Hook thread id; `None` once stopped.
    hook_thread: Option<u32>,
}

impl WindowsHookSource {
    /// Spawns the hook thread and waits until the hook is installed.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::AlreadyRunning`] if a hook was installed before in
    ///   this process.
    /// - [`CaptureError::HookInstallFailed`] if the thread cannot be spawned
    ///   or `SetWindowsHookExW` fails.
    pub fn install() -> Result<Self, CaptureError> {
        let (tx, rx) = mpsc::unbounded_channel();
        EVENT_SENDER
            .set(tx)
            .map_err(|_| CaptureError::AlreadyRunning)?;

        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<u32, String>>();
        thread::Builder::new()
            .name("scanwedge-hook-loop".to_string())
            .spawn(move || run_hook_message_loop(ready_tx))
            .map_err(|e| CaptureError::HookInstallFailed(e.to_string()))?;

        let thread_id = ready_rx
            .recv()
            .map_err(|_| CaptureError::HookInstallFailed("hook thread exited".to_string()))?
            .map_err(CaptureError::HookInstallFailed)?;

        info!(thread_id, "keyboard hook installed");
        Ok(Self {
            events: rx,
            hook_thread: Some(thread_id),
        })
    }
}

#[async_trait]
impl KeyEventSource for WindowsHookSource {
    async fn next_event(&mut self) -> Option<KeyEvent> {
        // The global sender outlives this source, so a stopped source must
        // end the stream itself.
        self.hook_thread?;
        self.events.recv().await
    }

    fn stop(&mut self) {
        let Some(thread_id) = self.hook_thread.take() else {
            return;
        };
        // SAFETY: posting WM_QUIT to a thread id we obtained from that
        // thread; a stale id only makes the call fail.
        match unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            Ok(()) => info!("keyboard hook stopping"),
            Err(e) => warn!("failed to post WM_QUIT to hook thread: {e}"),
        }
    }
}

impl Drop for WindowsHookSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Entry point for the dedicated Win32 message loop thread.
fn run_hook_message_loop(ready: std_mpsc::Sender<Result<u32, String>>) {
    // SAFETY: GetModuleHandleW(None) returns the handle of the current
    // executable and has no preconditions.
    let module = unsafe { GetModuleHandleW(None) }.ok().map(HINSTANCE::from);

    // SAFETY: the hook is installed on this thread, which runs a message
    // loop below until WM_QUIT.
    let hook = match unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), module, 0) } {
        Ok(hook) => hook,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    // SAFETY: GetCurrentThreadId has no preconditions.
    let thread_id = unsafe { GetCurrentThreadId() };
    let _ = ready.send(Ok(thread_id));

    let mut msg = MSG::default();
    // SAFETY: standard Win32 GetMessage/TranslateMessage/DispatchMessage loop.
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
        if let Err(e) = UnhookWindowsHookEx(hook) {
            warn!("UnhookWindowsHookEx failed: {e}");
        }
    }
    debug!("keyboard hook message loop exited");
}

/// Low-level keyboard hook callback.
///
/// # Safety
///
/// Called by Windows on the hook thread; must return quickly.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code == HC_ACTION as i32 {
        let message = w_param.0 as u32;
        if message == WM_KEYDOWN || message == WM_SYSKEYDOWN {
            // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code == HC_ACTION.
            let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
            if let Some(sender) = EVENT_SENDER.get() {
                // Receiver gone means we are shutting down.
                let _ = sender.send(KeyEvent::new(kbs.vkCode, u64::from(kbs.time)));
            }
        }
    }

    // SAFETY: always forward to the next hook in the chain.
    CallNextHookEx(None, n_code, w_param, l_param)
}
