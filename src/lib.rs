//! # Hotbar
//!
//! A focus-gated macro engine: bind global keyboard or mouse trigger
//! combinations to synthetic key sequences that only execute while a chosen
//! target process owns input focus.
//!
//! ## Features
//!
//! - Global hotkey triggers (keyboard via the OS facility, mouse buttons
//!   matched from a low-level hook stream)
//! - Hook-based capture mode for recording trigger bindings
//! - Focus gating with a cached foreground check
//! - Four synthetic-input delivery methods for differently behaved targets
//! - Ordered macro slots with per-slot press count and inter-press delay
//! - JSON profile files
//!
//! Windows is the supported platform; the pure slot/profile logic builds
//! and tests everywhere.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hotbar::{FocusCheck, FocusGate, Hotbar, KeySender, NativeBackend};
//!
//! // Wire the engine to the real OS seams.
//! let focus = Arc::new(FocusGate::new());
//! let hotbar = Hotbar::new(Arc::new(KeySender::new()), focus.clone(), Arc::new(NativeBackend));
//!
//! // Target a process and arm the configured slots.
//! focus.set_target_by_name("notepad");
//! let failed = hotbar.register_all(0);
//! assert!(failed.is_empty());
//! ```
//!
//! ## Profiles
//!
//! Profiles are plain JSON:
//!
//! ```json
//! {
//!   "name": "Default",
//!   "target_process_name": "game.exe",
//!   "input_method": "SendInput",
//!   "focus_poll_ms": 100,
//!   "slots": [
//!     {
//!       "slot_number": 1,
//!       "virtual_key": 49,
//!       "key_name": "1",
//!       "press_count": 3,
//!       "delay_ms": 50,
//!       "trigger": { "virtual_key": 112, "ctrl": true, "alt": false, "shift": false },
//!       "enabled": true
//!     }
//!   ]
//! }
//! ```

pub mod engine;
pub mod error;
pub mod focus;
pub mod hook;
pub mod hotkey;
pub mod key_sender;
pub mod keys;
pub mod profile;
pub mod registry;

pub use engine::{Hotbar, SlotEvent};
pub use error::{HotbarError, Result};
pub use focus::{list_processes, FocusCheck, FocusGate};
pub use hook::{HookEvent, HookSubscription, InputHook, KeyEvent, MouseEvent};
pub use hotkey::{HotkeyEvent, KeyboardHotkeyService, MouseHotkeyService};
pub use key_sender::{KeyInjector, KeySender};
pub use profile::{HotkeyBinding, InputMethod, MacroProfile, MacroSlot, SlotStatus};
pub use registry::{HotkeyRegistry, NativeBackend, RegistrarBackend, WindowRef};
