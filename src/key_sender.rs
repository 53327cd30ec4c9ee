//! Synthetic keyboard input delivery.
//!
//! Four delivery mechanisms with distinct timing and compatibility
//! characteristics, selectable per invocation:
//!
//! - [`InputMethod::SendInput`]: queues a synthetic key event that is
//!   indistinguishable at the API level from physical input.
//! - [`InputMethod::SendInputHardware`]: same queue, but carrying a
//!   hardware scan code for targets that ignore plain virtual-key input.
//! - [`InputMethod::PostMessage`]: posts key messages straight to the
//!   foreground window, bypassing the system input queue.
//! - [`InputMethod::KeybdEvent`]: the legacy injection call, kept as a
//!   fallback for targets incompatible with the others.
//!
//! All delivery is fire-and-forget: the OS calls do not report meaningful
//! failure, nothing is retried, and nothing is surfaced.

use std::thread;
use std::time::Duration;

use tracing::trace;

use crate::profile::InputMethod;

/// Key-down to key-up hold time when the caller does not specify one.
pub const DEFAULT_HOLD_MS: u64 = 10;

/// Synthetic key delivery.
///
/// `press` and `press_repeated` are provided on top of the down/up
/// primitives. `press_repeated` blocks for up to
/// `count * (hold + delay)` wall-clock time and must be scheduled off any
/// latency-sensitive thread.
pub trait KeyInjector: Send + Sync {
    fn key_down(&self, virtual_key: u32, method: InputMethod);

    fn key_up(&self, virtual_key: u32, method: InputMethod);

    /// One key-down/key-up cycle separated by `hold_ms`.
    fn press(&self, virtual_key: u32, method: InputMethod, hold_ms: u64) {
        self.key_down(virtual_key, method);
        thread::sleep(Duration::from_millis(hold_ms));
        self.key_up(virtual_key, method);
    }

    /// `count` presses with `delay_ms` between presses, not after the last.
    fn press_repeated(&self, virtual_key: u32, count: u32, delay_ms: u64, method: InputMethod) {
        for i in 0..count {
            self.press(virtual_key, method, DEFAULT_HOLD_MS);
            if i + 1 < count {
                thread::sleep(Duration::from_millis(delay_ms));
            }
        }
    }
}

/// The OS-backed injector.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeySender;

impl KeySender {
    pub fn new() -> Self {
        Self
    }
}

impl KeyInjector for KeySender {
    fn key_down(&self, virtual_key: u32, method: InputMethod) {
        trace!(virtual_key, %method, "key down");
        send(virtual_key, method, false);
    }

    fn key_up(&self, virtual_key: u32, method: InputMethod) {
        trace!(virtual_key, %method, "key up");
        send(virtual_key, method, true);
    }
}

#[cfg(windows)]
fn send(virtual_key: u32, method: InputMethod, up: bool) {
    match method {
        InputMethod::SendInput => send_input_key(virtual_key, up, false),
        InputMethod::SendInputHardware => send_input_key(virtual_key, up, true),
        InputMethod::PostMessage => post_message_key(virtual_key, up),
        InputMethod::KeybdEvent => keybd_event_key(virtual_key, up),
    }
}

#[cfg(not(windows))]
fn send(_virtual_key: u32, _method: InputMethod, _up: bool) {
    // Fire-and-forget contract: off Windows this is a logged no-op.
}

#[cfg(windows)]
fn send_input_key(virtual_key: u32, up: bool, scan_code: bool) {
    use std::mem;

    use winapi::um::winuser::{
        MapVirtualKeyW, SendInput, INPUT, INPUT_KEYBOARD, KEYEVENTF_KEYUP, KEYEVENTF_SCANCODE,
        MAPVK_VK_TO_VSC,
    };

    unsafe {
        let mut input: INPUT = mem::zeroed();
        input.type_ = INPUT_KEYBOARD;
        let ki = input.u.ki_mut();
        if scan_code {
            // Hardware-flagged path: vk 0, scan code only.
            ki.wVk = 0;
            ki.wScan = MapVirtualKeyW(virtual_key, MAPVK_VK_TO_VSC) as u16;
            ki.dwFlags = KEYEVENTF_SCANCODE | if up { KEYEVENTF_KEYUP } else { 0 };
        } else {
            ki.wVk = virtual_key as u16;
            ki.wScan = 0;
            ki.dwFlags = if up { KEYEVENTF_KEYUP } else { 0 };
        }
        let sent = SendInput(1, &mut input, mem::size_of::<INPUT>() as i32);
        if sent == 0 {
            trace!(virtual_key, "SendInput injected no events");
        }
    }
}

#[cfg(windows)]
fn post_message_key(virtual_key: u32, up: bool) {
    use winapi::shared::minwindef::WPARAM;
    use winapi::um::winuser::{GetForegroundWindow, PostMessageW, WM_KEYDOWN, WM_KEYUP};

    unsafe {
        let hwnd = GetForegroundWindow();
        if hwnd.is_null() {
            return;
        }
        let msg = if up { WM_KEYUP } else { WM_KEYDOWN };
        PostMessageW(hwnd, msg, virtual_key as WPARAM, 0);
    }
}

#[cfg(windows)]
fn keybd_event_key(virtual_key: u32, up: bool) {
    use winapi::um::winuser::{keybd_event, KEYEVENTF_KEYUP};

    unsafe {
        keybd_event(
            virtual_key as u8,
            0,
            if up { KEYEVENTF_KEYUP } else { 0 },
            0,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Instant;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<(u32, bool)>>,
    }

    impl KeyInjector for Recorder {
        fn key_down(&self, virtual_key: u32, _method: InputMethod) {
            self.log.lock().unwrap().push((virtual_key, false));
        }

        fn key_up(&self, virtual_key: u32, _method: InputMethod) {
            self.log.lock().unwrap().push((virtual_key, true));
        }
    }

    #[test]
    fn test_press_is_one_down_up_pair() {
        let recorder = Recorder::default();
        recorder.press(0x41, InputMethod::SendInput, 0);
        let log = recorder.log.lock().unwrap();
        assert_eq!(*log, vec![(0x41, false), (0x41, true)]);
    }

    #[test]
    fn test_press_repeated_counts_and_alternates() {
        let recorder = Recorder::default();
        recorder.press_repeated(0x31, 3, 0, InputMethod::PostMessage);
        let log = recorder.log.lock().unwrap();
        assert_eq!(log.len(), 6);
        for (i, (vk, up)) in log.iter().enumerate() {
            assert_eq!(*vk, 0x31);
            assert_eq!(*up, i % 2 == 1);
        }
    }

    #[test]
    fn test_press_repeated_delays_between_not_after() {
        let recorder = Recorder::default();
        let start = Instant::now();
        recorder.press_repeated(0x31, 3, 30, InputMethod::SendInput);
        let elapsed = start.elapsed();
        // 3 holds of 10 ms plus 2 inter-press delays of 30 ms.
        assert!(elapsed >= Duration::from_millis(85), "elapsed {elapsed:?}");
    }
}
