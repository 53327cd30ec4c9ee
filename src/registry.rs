//! Multi-binding global hotkey registration.
//!
//! Wraps the OS global-hotkey facility. The registry holds many
//! simultaneous keyboard registrations, allocates process-unique ids
//! monotonically (never reused, even for failed attempts) and relays raw
//! trigger signals by id; it does not know what an id means. The slot
//! engine owns the id-to-slot mapping.
//!
//! Registration failure usually means another process already owns the
//! combination. It is reported to the caller once and never retried.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::profile::HotkeyBinding;

/// Modifier bits of the OS registration call.
pub const MOD_ALT: u32 = 0x0001;
pub const MOD_CONTROL: u32 = 0x0002;
pub const MOD_SHIFT: u32 = 0x0004;
/// Suppresses re-fire while the key is held; a physical key-repeat must
/// not re-trigger a slot.
pub const MOD_NOREPEAT: u32 = 0x4000;

/// Window reference the OS addresses trigger messages to.
///
/// A raw HWND value; `0` registers against the calling thread's message
/// queue instead of a window.
pub type WindowRef = isize;

/// Pack a binding's modifier flags into the OS bitmask.
pub fn pack_modifiers(binding: &HotkeyBinding, no_repeat: bool) -> u32 {
    let mut modifiers = 0;
    if binding.ctrl {
        modifiers |= MOD_CONTROL;
    }
    if binding.alt {
        modifiers |= MOD_ALT;
    }
    if binding.shift {
        modifiers |= MOD_SHIFT;
    }
    if no_repeat {
        modifiers |= MOD_NOREPEAT;
    }
    modifiers
}

/// The raw OS registration calls, seamed out so the registration logic and
/// the engine can be exercised without touching the OS.
pub trait RegistrarBackend: Send + Sync {
    /// Register `vk` + `modifiers` under `id`; false when the combination
    /// is already owned system-wide.
    fn register_hotkey(&self, window: WindowRef, id: i32, modifiers: u32, vk: u32) -> bool;

    fn unregister_hotkey(&self, window: WindowRef, id: i32) -> bool;
}

/// Backend calling the real OS facility.
pub struct NativeBackend;

#[cfg(windows)]
impl RegistrarBackend for NativeBackend {
    fn register_hotkey(&self, window: WindowRef, id: i32, modifiers: u32, vk: u32) -> bool {
        use winapi::shared::windef::HWND;
        use winapi::um::winuser::RegisterHotKey;
        unsafe { RegisterHotKey(window as HWND, id, modifiers, vk) != 0 }
    }

    fn unregister_hotkey(&self, window: WindowRef, id: i32) -> bool {
        use winapi::shared::windef::HWND;
        use winapi::um::winuser::UnregisterHotKey;
        unsafe { UnregisterHotKey(window as HWND, id) != 0 }
    }
}

#[cfg(not(windows))]
impl RegistrarBackend for NativeBackend {
    fn register_hotkey(&self, _window: WindowRef, _id: i32, _modifiers: u32, _vk: u32) -> bool {
        false
    }

    fn unregister_hotkey(&self, _window: WindowRef, _id: i32) -> bool {
        false
    }
}

/// Holds the live multi-binding registrations.
pub struct HotkeyRegistry {
    backend: Arc<dyn RegistrarBackend>,
    live: HashSet<i32>,
    next_id: i32,
}

impl HotkeyRegistry {
    pub fn new(backend: Arc<dyn RegistrarBackend>) -> Self {
        Self {
            backend,
            live: HashSet::new(),
            next_id: 1,
        }
    }

    /// Register a binding, returning its id, or `None` when the OS call
    /// fails. Ids are consumed even by failed attempts so they are never
    /// reused within the process lifetime.
    pub fn register(&mut self, window: WindowRef, binding: &HotkeyBinding) -> Option<i32> {
        let id = self.next_id;
        self.next_id += 1;

        let modifiers = pack_modifiers(binding, true);
        if self
            .backend
            .register_hotkey(window, id, modifiers, binding.virtual_key)
        {
            debug!(id, trigger = %binding.display(), "hotkey registered");
            self.live.insert(id);
            Some(id)
        } else {
            warn!(trigger = %binding.display(), "hotkey registration failed");
            None
        }
    }

    /// Unregister one id. Idempotent; unknown ids are ignored.
    pub fn unregister(&mut self, window: WindowRef, id: i32) {
        if self.live.remove(&id) {
            self.backend.unregister_hotkey(window, id);
            debug!(id, "hotkey unregistered");
        }
    }

    /// Unregister every live id. Idempotent.
    pub fn unregister_all(&mut self, window: WindowRef) {
        for id in self.live.drain() {
            self.backend.unregister_hotkey(window, id);
        }
    }

    /// Whether a trigger signal for `id` belongs to a live registration.
    pub fn accepts(&self, id: i32) -> bool {
        self.live.contains(&id)
    }

    /// Number of live registrations.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    struct FakeBackend {
        accept: AtomicBool,
    }

    impl FakeBackend {
        fn new(accept: bool) -> Arc<Self> {
            Arc::new(Self {
                accept: AtomicBool::new(accept),
            })
        }
    }

    impl RegistrarBackend for FakeBackend {
        fn register_hotkey(&self, _window: WindowRef, _id: i32, _modifiers: u32, _vk: u32) -> bool {
            self.accept.load(Ordering::SeqCst)
        }

        fn unregister_hotkey(&self, _window: WindowRef, _id: i32) -> bool {
            true
        }
    }

    fn binding(vk: u32) -> HotkeyBinding {
        HotkeyBinding::new(vk, true, false, false)
    }

    #[test]
    fn test_pack_modifiers() {
        let b = HotkeyBinding::new(0x70, true, true, true);
        assert_eq!(
            pack_modifiers(&b, false),
            MOD_CONTROL | MOD_ALT | MOD_SHIFT
        );
        assert_eq!(
            pack_modifiers(&b, true),
            MOD_CONTROL | MOD_ALT | MOD_SHIFT | MOD_NOREPEAT
        );
        assert_eq!(pack_modifiers(&HotkeyBinding::new(0x70, false, false, false), false), 0);
    }

    #[test]
    fn test_ids_are_monotonic_and_never_reused() {
        let backend = FakeBackend::new(true);
        let mut registry = HotkeyRegistry::new(backend.clone());

        let a = registry.register(0, &binding(0x70)).unwrap();
        let b = registry.register(0, &binding(0x71)).unwrap();
        assert!(b > a);

        // A failed attempt still consumes an id.
        backend.accept.store(false, Ordering::SeqCst);
        assert!(registry.register(0, &binding(0x72)).is_none());
        backend.accept.store(true, Ordering::SeqCst);
        let c = registry.register(0, &binding(0x73)).unwrap();
        assert_eq!(c, b + 2);
    }

    #[test]
    fn test_accepts_only_live_ids() {
        let mut registry = HotkeyRegistry::new(FakeBackend::new(true));
        let id = registry.register(0, &binding(0x70)).unwrap();
        assert!(registry.accepts(id));
        assert!(!registry.accepts(id + 1));

        registry.unregister(0, id);
        assert!(!registry.accepts(id));
        // Unregistering again is a no-op.
        registry.unregister(0, id);
    }

    #[test]
    fn test_unregister_all_invalidates_en_masse() {
        let mut registry = HotkeyRegistry::new(FakeBackend::new(true));
        let ids: Vec<i32> = (0..4)
            .map(|i| registry.register(0, &binding(0x70 + i)).unwrap())
            .collect();
        assert_eq!(registry.live_count(), 4);

        registry.unregister_all(0);
        assert_eq!(registry.live_count(), 0);
        for id in ids {
            assert!(!registry.accepts(id));
        }
        registry.unregister_all(0);
    }
}
