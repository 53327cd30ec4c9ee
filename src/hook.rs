//! Global low-level input hooks.
//!
//! Installs process-wide keyboard and mouse hooks and fans the normalized
//! events out to subscribers over channels. The OS invokes the hook
//! callbacks on its own thread and will silently unhook a callback that
//! stalls, so the callbacks only decode the event and perform non-blocking
//! channel sends; all real work happens on the receiving side.
//!
//! The OS hook handles are reference-counted: each category is installed
//! when the first interested subscriber attaches and removed when the last
//! [`HookSubscription`] is dropped. Subscribers never own the handle
//! directly.
//!
//! The thread that first attaches a hook must run a message pump for the
//! callbacks to be delivered; the CLI run and capture loops do this.

#[cfg_attr(not(windows), allow(unused_imports))]
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use once_cell::sync::Lazy;
#[cfg_attr(not(windows), allow(unused_imports))]
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::Result;
use crate::keys;

#[cfg(not(windows))]
use crate::error::HotbarError;

/// A keyboard key-down observed system-wide, with live modifier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub virtual_key: u32,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

/// A mouse button-down observed system-wide.
///
/// `button` is the button's virtual-key code; side buttons arrive as
/// [`keys::VK_XBUTTON1`]/[`keys::VK_XBUTTON2`] (logical buttons 4/5).
/// Modifier state is sampled live at delivery time because the mouse
/// matching services compare it against stored bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub button: u32,
    pub x: i32,
    pub y: i32,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

/// A normalized event from either hook category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
}

#[cfg_attr(not(windows), allow(dead_code))]
struct RefCounts {
    keyboard: usize,
    mouse: usize,
}

#[cfg_attr(not(windows), allow(dead_code))]
static REFS: Lazy<Mutex<RefCounts>> = Lazy::new(|| {
    Mutex::new(RefCounts {
        keyboard: 0,
        mouse: 0,
    })
});

static SUBSCRIBERS: Lazy<Mutex<Vec<(u64, UnboundedSender<HookEvent>)>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

#[cfg_attr(not(windows), allow(dead_code))]
static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Deliver an event to every live subscriber, dropping closed channels.
#[cfg_attr(not(windows), allow(dead_code))]
fn dispatch(event: HookEvent) {
    if let Ok(mut subs) = SUBSCRIBERS.lock() {
        subs.retain(|(_, tx)| tx.send(event).is_ok());
    }
}

/// Decode the X button index from the high word of `mouseData`.
#[cfg_attr(not(windows), allow(dead_code))]
fn xbutton_from_mousedata(mouse_data: u32) -> Option<u32> {
    match (mouse_data >> 16) & 0xFFFF {
        1 => Some(keys::VK_XBUTTON1),
        2 => Some(keys::VK_XBUTTON2),
        _ => None,
    }
}

/// Access point for the global input hooks.
pub struct InputHook;

impl InputHook {
    /// Subscribe to hook events, installing the requested hook categories
    /// if they are not already live.
    ///
    /// Returns a guard that keeps the hooks referenced plus the event
    /// receiver. Dropping the guard detaches the subscriber and removes
    /// each hook once its last subscriber is gone.
    pub fn attach(
        keyboard: bool,
        mouse: bool,
    ) -> Result<(HookSubscription, UnboundedReceiver<HookEvent>)> {
        #[cfg(windows)]
        {
            {
                let mut refs = REFS.lock().unwrap_or_else(|e| e.into_inner());
                if keyboard {
                    if refs.keyboard == 0 {
                        native::install_keyboard()?;
                    }
                    refs.keyboard += 1;
                }
                if mouse {
                    if refs.mouse == 0 {
                        if let Err(e) = native::install_mouse() {
                            // Roll back the keyboard reference taken above.
                            if keyboard {
                                refs.keyboard -= 1;
                                if refs.keyboard == 0 {
                                    native::remove_keyboard();
                                }
                            }
                            return Err(e);
                        }
                    }
                    refs.mouse += 1;
                }
            }

            let (tx, rx) = unbounded_channel();
            let id = NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed);
            if let Ok(mut subs) = SUBSCRIBERS.lock() {
                subs.push((id, tx));
            }
            tracing::debug!(id, keyboard, mouse, "hook subscriber attached");
            Ok((
                HookSubscription {
                    id,
                    keyboard,
                    mouse,
                },
                rx,
            ))
        }

        #[cfg(not(windows))]
        {
            let _ = (keyboard, mouse);
            Err(HotbarError::unsupported_platform(
                "global input hooks require Windows",
            ))
        }
    }
}

/// RAII guard for one hook subscription.
#[cfg_attr(not(windows), allow(dead_code))]
pub struct HookSubscription {
    id: u64,
    keyboard: bool,
    mouse: bool,
}

impl Drop for HookSubscription {
    fn drop(&mut self) {
        if let Ok(mut subs) = SUBSCRIBERS.lock() {
            subs.retain(|(id, _)| *id != self.id);
        }
        #[cfg(windows)]
        {
            let mut refs = REFS.lock().unwrap_or_else(|e| e.into_inner());
            if self.keyboard {
                refs.keyboard = refs.keyboard.saturating_sub(1);
                if refs.keyboard == 0 {
                    native::remove_keyboard();
                }
            }
            if self.mouse {
                refs.mouse = refs.mouse.saturating_sub(1);
                if refs.mouse == 0 {
                    native::remove_mouse();
                }
            }
        }
        tracing::debug!(id = self.id, "hook subscriber detached");
    }
}

#[cfg(windows)]
mod native {
    use std::ptr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use winapi::shared::minwindef::{LPARAM, LRESULT, WPARAM};
    use winapi::shared::windef::HHOOK;
    use winapi::um::libloaderapi::GetModuleHandleW;
    use winapi::um::winuser::{
        CallNextHookEx, GetKeyState, SetWindowsHookExW, UnhookWindowsHookEx, KBDLLHOOKSTRUCT,
        MSLLHOOKSTRUCT, WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_LBUTTONDOWN, WM_MBUTTONDOWN,
        WM_RBUTTONDOWN, WM_SYSKEYDOWN, WM_XBUTTONDOWN,
    };

    use super::{dispatch, xbutton_from_mousedata, HookEvent, KeyEvent, MouseEvent};
    use crate::error::{HotbarError, Result};
    use crate::keys;

    static KEYBOARD_HOOK: AtomicUsize = AtomicUsize::new(0);
    static MOUSE_HOOK: AtomicUsize = AtomicUsize::new(0);

    fn key_held(vk: u32) -> bool {
        // High bit of GetKeyState means the key is currently down.
        unsafe { GetKeyState(vk as i32) < 0 }
    }

    pub(super) fn install_keyboard() -> Result<()> {
        if KEYBOARD_HOOK.load(Ordering::SeqCst) != 0 {
            return Ok(());
        }
        let hook = unsafe {
            SetWindowsHookExW(
                WH_KEYBOARD_LL,
                Some(keyboard_proc),
                GetModuleHandleW(ptr::null()),
                0,
            )
        };
        if hook.is_null() {
            return Err(HotbarError::hook_install(
                "keyboard",
                format!("SetWindowsHookExW failed (os error {})", last_os_error()),
            ));
        }
        KEYBOARD_HOOK.store(hook as usize, Ordering::SeqCst);
        tracing::debug!("low-level keyboard hook installed");
        Ok(())
    }

    pub(super) fn remove_keyboard() {
        let hook = KEYBOARD_HOOK.swap(0, Ordering::SeqCst);
        if hook != 0 {
            unsafe {
                UnhookWindowsHookEx(hook as HHOOK);
            }
            tracing::debug!("low-level keyboard hook removed");
        }
    }

    pub(super) fn install_mouse() -> Result<()> {
        if MOUSE_HOOK.load(Ordering::SeqCst) != 0 {
            return Ok(());
        }
        let hook = unsafe {
            SetWindowsHookExW(
                WH_MOUSE_LL,
                Some(mouse_proc),
                GetModuleHandleW(ptr::null()),
                0,
            )
        };
        if hook.is_null() {
            return Err(HotbarError::hook_install(
                "mouse",
                format!("SetWindowsHookExW failed (os error {})", last_os_error()),
            ));
        }
        MOUSE_HOOK.store(hook as usize, Ordering::SeqCst);
        tracing::debug!("low-level mouse hook installed");
        Ok(())
    }

    pub(super) fn remove_mouse() {
        let hook = MOUSE_HOOK.swap(0, Ordering::SeqCst);
        if hook != 0 {
            unsafe {
                UnhookWindowsHookEx(hook as HHOOK);
            }
            tracing::debug!("low-level mouse hook removed");
        }
    }

    fn last_os_error() -> i32 {
        std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
    }

    // Runs on the OS hook thread. Must return promptly: decode, send, done.
    unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        if code >= 0 {
            let msg = wparam as u32;
            if msg == WM_KEYDOWN || msg == WM_SYSKEYDOWN {
                let kbd = &*(lparam as *const KBDLLHOOKSTRUCT);
                dispatch(HookEvent::Key(KeyEvent {
                    virtual_key: kbd.vkCode,
                    ctrl: key_held(keys::VK_CONTROL),
                    alt: key_held(keys::VK_MENU),
                    shift: key_held(keys::VK_SHIFT),
                }));
            }
        }
        CallNextHookEx(ptr::null_mut(), code, wparam, lparam)
    }

    unsafe extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        if code >= 0 {
            let ms = &*(lparam as *const MSLLHOOKSTRUCT);
            let button = match wparam as u32 {
                WM_LBUTTONDOWN => Some(keys::VK_LBUTTON),
                WM_RBUTTONDOWN => Some(keys::VK_RBUTTON),
                WM_MBUTTONDOWN => Some(keys::VK_MBUTTON),
                WM_XBUTTONDOWN => xbutton_from_mousedata(ms.mouseData),
                _ => None,
            };
            if let Some(button) = button {
                dispatch(HookEvent::Mouse(MouseEvent {
                    button,
                    x: ms.pt.x,
                    y: ms.pt.y,
                    ctrl: key_held(keys::VK_CONTROL),
                    alt: key_held(keys::VK_MENU),
                    shift: key_held(keys::VK_SHIFT),
                }));
            }
        }
        CallNextHookEx(ptr::null_mut(), code, wparam, lparam)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xbutton_decoding() {
        assert_eq!(xbutton_from_mousedata(1 << 16), Some(keys::VK_XBUTTON1));
        assert_eq!(xbutton_from_mousedata(2 << 16), Some(keys::VK_XBUTTON2));
        assert_eq!(xbutton_from_mousedata(0), None);
        // Low word (click coordinates on some messages) must be ignored.
        assert_eq!(xbutton_from_mousedata(0x0000_FFFF), None);
    }

    #[test]
    fn test_dispatch_drops_closed_subscribers() {
        let (tx, rx) = unbounded_channel();
        if let Ok(mut subs) = SUBSCRIBERS.lock() {
            subs.push((u64::MAX, tx));
        }
        drop(rx);
        dispatch(HookEvent::Key(KeyEvent {
            virtual_key: 0x41,
            ctrl: false,
            alt: false,
            shift: false,
        }));
        let closed_still_present = SUBSCRIBERS
            .lock()
            .map(|subs| subs.iter().any(|(id, _)| *id == u64::MAX))
            .unwrap_or(true);
        assert!(!closed_still_present);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_attach_unsupported_off_windows() {
        assert!(InputHook::attach(true, true).is_err());
    }
}
