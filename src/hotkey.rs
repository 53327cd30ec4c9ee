//! Single-binding hotkey services.
//!
//! Two symmetric variants. The keyboard variant registers its binding with
//! the OS global-hotkey facility and reacts to trigger signals delivered by
//! id. The mouse variant cannot go through that facility (it does not
//! express arbitrary mouse buttons), so it stores the binding and matches
//! hook-delivered mouse events against it directly.
//!
//! Both variants support a transient capture mode in which the next
//! qualifying hook event becomes "the binding the user just pressed"
//! instead of a trigger. Left and right mouse buttons are rejected as
//! candidates since they conflict with normal UI interaction; rejection
//! deactivates capture cleanly so the caller can retry.
//!
//! The services are synchronous state machines: the owner feeds hook
//! events and trigger signals in and acts on the returned [`HotkeyEvent`].
//! They do not own the hook subscription.

use std::sync::Arc;

use tracing::debug;

use crate::hook::{KeyEvent, MouseEvent};
use crate::keys;
use crate::profile::HotkeyBinding;
use crate::registry::{pack_modifiers, RegistrarBackend, WindowRef};

/// Reserved registration id for the single keyboard binding, outside the
/// multi-registry's monotonic range.
pub const SINGLE_HOTKEY_ID: i32 = 9001;

/// Outcome of feeding an event into a hotkey service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// Capture mode consumed the event as the new binding.
    Captured(HotkeyBinding),
    /// Capture rejected a reserved mouse button; capture mode is inactive.
    CaptureRejected(u32),
    /// The registered binding fired.
    Triggered,
}

/// Keyboard-bound single hotkey with OS registration.
pub struct KeyboardHotkeyService {
    backend: Arc<dyn RegistrarBackend>,
    capturing: bool,
    registered: Option<(WindowRef, HotkeyBinding)>,
    ignore_next: bool,
}

impl KeyboardHotkeyService {
    pub fn new(backend: Arc<dyn RegistrarBackend>) -> Self {
        Self {
            backend,
            capturing: false,
            registered: None,
            ignore_next: false,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn is_registered(&self) -> bool {
        self.registered.is_some()
    }

    /// The currently registered binding, if any.
    pub fn binding(&self) -> Option<HotkeyBinding> {
        self.registered.map(|(_, b)| b)
    }

    /// Arm capture mode; the next key event becomes the binding. Idempotent.
    pub fn start_capture(&mut self) {
        self.capturing = true;
    }

    /// Leave capture mode without capturing. Idempotent.
    pub fn stop_capture(&mut self) {
        self.capturing = false;
    }

    /// Feed a hook key event. Only meaningful while capturing.
    pub fn on_key_event(&mut self, event: &KeyEvent) -> Option<HotkeyEvent> {
        if !self.capturing {
            return None;
        }
        self.capturing = false;
        if keys::is_reserved_button(event.virtual_key) {
            return Some(HotkeyEvent::CaptureRejected(event.virtual_key));
        }
        let binding = HotkeyBinding::new(event.virtual_key, event.ctrl, event.alt, event.shift);
        debug!(trigger = %binding.display(), "keyboard binding captured");
        Some(HotkeyEvent::Captured(binding))
    }

    /// Register `binding` with the OS, superseding any previous
    /// registration of this service. Returns false when the OS call fails
    /// (the combination is typically owned by another process); the caller
    /// decides whether to report it, nothing is retried.
    pub fn register(&mut self, window: WindowRef, binding: HotkeyBinding) -> bool {
        self.unregister();
        if !binding.is_set() {
            return false;
        }
        let modifiers = pack_modifiers(&binding, false);
        let ok = self
            .backend
            .register_hotkey(window, SINGLE_HOTKEY_ID, modifiers, binding.virtual_key);
        if ok {
            self.registered = Some((window, binding));
            // The OS facility can echo a spurious trigger right after
            // registration; forwarding it would execute immediately after
            // the user finishes configuring the binding.
            self.ignore_next = true;
            debug!(trigger = %binding.display(), "keyboard hotkey registered");
        } else {
            debug!(trigger = %binding.display(), "keyboard hotkey registration failed");
        }
        ok
    }

    /// Remove the live registration. Idempotent.
    pub fn unregister(&mut self) {
        if let Some((window, _)) = self.registered.take() {
            self.backend.unregister_hotkey(window, SINGLE_HOTKEY_ID);
            self.ignore_next = false;
        }
    }

    /// Feed an OS trigger signal by id.
    pub fn on_hotkey_signal(&mut self, id: i32) -> Option<HotkeyEvent> {
        if self.registered.is_none() || id != SINGLE_HOTKEY_ID {
            return None;
        }
        if self.ignore_next {
            self.ignore_next = false;
            return None;
        }
        Some(HotkeyEvent::Triggered)
    }
}

/// Mouse-bound single hotkey matched against the hook stream.
#[derive(Debug, Default)]
pub struct MouseHotkeyService {
    capturing: bool,
    registered: Option<HotkeyBinding>,
    ignore_next: bool,
}

impl MouseHotkeyService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn is_registered(&self) -> bool {
        self.registered.is_some()
    }

    pub fn binding(&self) -> Option<HotkeyBinding> {
        self.registered
    }

    pub fn start_capture(&mut self) {
        self.capturing = true;
    }

    pub fn stop_capture(&mut self) {
        self.capturing = false;
    }

    /// Store `binding` and start matching. No OS registration is involved.
    /// Left/right buttons and unset bindings are refused.
    pub fn register(&mut self, binding: HotkeyBinding) -> bool {
        if !binding.is_set() || keys::is_reserved_button(binding.virtual_key) {
            return false;
        }
        self.registered = Some(binding);
        // Same rule as the OS facility: the click that finishes
        // configuration must not count as the first trigger.
        self.ignore_next = true;
        debug!(trigger = %binding.display(), "mouse hotkey registered");
        true
    }

    /// Stop matching. Idempotent.
    pub fn unregister(&mut self) {
        self.registered = None;
        self.ignore_next = false;
    }

    /// Feed a hook mouse event; capture takes precedence over matching.
    pub fn on_mouse_event(&mut self, event: &MouseEvent) -> Option<HotkeyEvent> {
        if self.capturing {
            self.capturing = false;
            if keys::is_reserved_button(event.button) {
                return Some(HotkeyEvent::CaptureRejected(event.button));
            }
            let binding = HotkeyBinding::new(event.button, event.ctrl, event.alt, event.shift);
            debug!(trigger = %binding.display(), "mouse binding captured");
            return Some(HotkeyEvent::Captured(binding));
        }

        let registered = self.registered?;
        // Field-by-field: the button and all three modifier states must
        // match exactly.
        if event.button == registered.virtual_key
            && event.ctrl == registered.ctrl
            && event.alt == registered.alt
            && event.shift == registered.shift
        {
            if self.ignore_next {
                self.ignore_next = false;
                return None;
            }
            return Some(HotkeyEvent::Triggered);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    struct RecordingBackend {
        registered: Mutex<Vec<i32>>,
        unregistered: AtomicUsize,
        accept: bool,
    }

    impl RecordingBackend {
        fn new(accept: bool) -> Arc<Self> {
            Arc::new(Self {
                registered: Mutex::new(Vec::new()),
                unregistered: AtomicUsize::new(0),
                accept,
            })
        }
    }

    impl RegistrarBackend for RecordingBackend {
        fn register_hotkey(&self, _window: WindowRef, id: i32, _modifiers: u32, _vk: u32) -> bool {
            if self.accept {
                self.registered.lock().unwrap().push(id);
            }
            self.accept
        }

        fn unregister_hotkey(&self, _window: WindowRef, id: i32) -> bool {
            assert_eq!(id, SINGLE_HOTKEY_ID);
            self.unregistered.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn key_event(vk: u32) -> KeyEvent {
        KeyEvent {
            virtual_key: vk,
            ctrl: true,
            alt: false,
            shift: false,
        }
    }

    fn mouse_event(button: u32, ctrl: bool) -> MouseEvent {
        MouseEvent {
            button,
            x: 10,
            y: 20,
            ctrl,
            alt: false,
            shift: false,
        }
    }

    #[test]
    fn test_keyboard_capture_is_one_shot() {
        let mut service = KeyboardHotkeyService::new(RecordingBackend::new(true));
        assert_eq!(service.on_key_event(&key_event(0x70)), None);

        service.start_capture();
        let captured = service.on_key_event(&key_event(0x70));
        assert_eq!(
            captured,
            Some(HotkeyEvent::Captured(HotkeyBinding::new(
                0x70, true, false, false
            )))
        );
        assert!(!service.is_capturing());
        // Capture deactivated; the next event is not consumed.
        assert_eq!(service.on_key_event(&key_event(0x71)), None);
    }

    #[test]
    fn test_keyboard_first_signal_after_registration_is_discarded() {
        let mut service = KeyboardHotkeyService::new(RecordingBackend::new(true));
        assert!(service.register(0, HotkeyBinding::new(0x70, true, false, false)));

        assert_eq!(service.on_hotkey_signal(SINGLE_HOTKEY_ID), None);
        assert_eq!(
            service.on_hotkey_signal(SINGLE_HOTKEY_ID),
            Some(HotkeyEvent::Triggered)
        );
        assert_eq!(
            service.on_hotkey_signal(SINGLE_HOTKEY_ID),
            Some(HotkeyEvent::Triggered)
        );
    }

    #[test]
    fn test_keyboard_register_supersedes_previous() {
        let backend = RecordingBackend::new(true);
        let mut service = KeyboardHotkeyService::new(backend.clone());
        assert!(service.register(0, HotkeyBinding::new(0x70, false, false, false)));
        assert!(service.register(0, HotkeyBinding::new(0x71, false, false, false)));

        // Re-registering unregistered the old binding first.
        assert_eq!(backend.unregistered.load(Ordering::SeqCst), 1);
        assert_eq!(
            service.binding(),
            Some(HotkeyBinding::new(0x71, false, false, false))
        );
    }

    #[test]
    fn test_keyboard_registration_failure_reported_once() {
        let mut service = KeyboardHotkeyService::new(RecordingBackend::new(false));
        assert!(!service.register(0, HotkeyBinding::new(0x70, false, false, false)));
        assert!(!service.is_registered());
        assert_eq!(service.on_hotkey_signal(SINGLE_HOTKEY_ID), None);
    }

    #[test]
    fn test_keyboard_unset_binding_never_registers() {
        let backend = RecordingBackend::new(true);
        let mut service = KeyboardHotkeyService::new(backend.clone());
        assert!(!service.register(0, HotkeyBinding::default()));
        assert!(backend.registered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_mouse_capture_rejects_left_and_right() {
        let mut service = MouseHotkeyService::new();

        service.start_capture();
        assert_eq!(
            service.on_mouse_event(&mouse_event(keys::VK_LBUTTON, false)),
            Some(HotkeyEvent::CaptureRejected(keys::VK_LBUTTON))
        );
        assert!(!service.is_capturing());

        // Capture can be retried immediately.
        service.start_capture();
        assert_eq!(
            service.on_mouse_event(&mouse_event(keys::VK_RBUTTON, false)),
            Some(HotkeyEvent::CaptureRejected(keys::VK_RBUTTON))
        );
        assert!(!service.is_capturing());

        service.start_capture();
        assert_eq!(
            service.on_mouse_event(&mouse_event(keys::VK_XBUTTON1, true)),
            Some(HotkeyEvent::Captured(HotkeyBinding::new(
                keys::VK_XBUTTON1,
                true,
                false,
                false
            )))
        );
    }

    #[test]
    fn test_mouse_matching_is_field_by_field() {
        let mut service = MouseHotkeyService::new();
        assert!(service.register(HotkeyBinding::new(keys::VK_XBUTTON1, true, false, false)));

        // First matching click after registration is discarded.
        assert_eq!(
            service.on_mouse_event(&mouse_event(keys::VK_XBUTTON1, true)),
            None
        );
        // Wrong modifiers do not match (and do not consume the discard).
        assert_eq!(
            service.on_mouse_event(&mouse_event(keys::VK_XBUTTON1, false)),
            None
        );
        assert_eq!(
            service.on_mouse_event(&mouse_event(keys::VK_MBUTTON, true)),
            None
        );
        assert_eq!(
            service.on_mouse_event(&mouse_event(keys::VK_XBUTTON1, true)),
            Some(HotkeyEvent::Triggered)
        );
    }

    #[test]
    fn test_mouse_register_refuses_reserved_buttons() {
        let mut service = MouseHotkeyService::new();
        assert!(!service.register(HotkeyBinding::new(keys::VK_LBUTTON, false, false, false)));
        assert!(!service.register(HotkeyBinding::new(keys::VK_RBUTTON, false, false, false)));
        assert!(!service.is_registered());
    }
}
