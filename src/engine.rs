//! The macro slot engine.
//!
//! [`Hotbar`] owns the profile's slots, maps OS hotkey ids back to logical
//! slots, gates every execution through the focus check and drives the
//! synthetic input injector. Slot execution-state transitions are published
//! over a channel for the presentation layer.
//!
//! Per-slot state machine:
//!
//! ```text
//! NoFocus --(focus regained)--> Ready --(trigger, enabled)--> Executing
//! Executing --(injection done)--> Ready | NoFocus   (re-evaluated)
//! ```
//!
//! The periodic focus-poll tick drives the NoFocus/Ready edges and never
//! touches a slot that is currently Executing. A trigger for a slot that is
//! already Executing is ignored; overlapping synthetic sequences on the
//! same key are never useful.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::focus::FocusCheck;
use crate::hook::MouseEvent;
use crate::hotkey::{HotkeyEvent, MouseHotkeyService};
use crate::key_sender::KeyInjector;
use crate::keys;
use crate::profile::{HotkeyBinding, MacroProfile, MacroSlot, SlotStatus};
use crate::registry::{HotkeyRegistry, RegistrarBackend, WindowRef};

/// A slot execution-state transition, published to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEvent {
    pub slot: u32,
    pub status: SlotStatus,
}

struct EngineState {
    profile: MacroProfile,
    registry: HotkeyRegistry,
    id_to_slot: HashMap<i32, u32>,
    /// Hook-stream matchers for mouse-triggered slots, one per slot.
    mouse_matchers: Vec<(u32, MouseHotkeyService)>,
}

/// The slot engine. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Hotbar {
    state: Arc<Mutex<EngineState>>,
    injector: Arc<dyn KeyInjector>,
    focus: Arc<dyn FocusCheck>,
    events: UnboundedSender<SlotEvent>,
    events_rx: Arc<Mutex<Option<UnboundedReceiver<SlotEvent>>>>,
}

impl Hotbar {
    /// Build an engine around the given seams, starting from the stock
    /// profile layout.
    pub fn new(
        injector: Arc<dyn KeyInjector>,
        focus: Arc<dyn FocusCheck>,
        backend: Arc<dyn RegistrarBackend>,
    ) -> Self {
        let (events, events_rx) = unbounded_channel();
        Self {
            state: Arc::new(Mutex::new(EngineState {
                profile: MacroProfile::default_profile(),
                registry: HotkeyRegistry::new(backend),
                id_to_slot: HashMap::new(),
                mouse_matchers: Vec::new(),
            })),
            injector,
            focus,
            events,
            events_rx: Arc::new(Mutex::new(Some(events_rx))),
        }
    }

    /// Hand out the slot event receiver. Yields `Some` exactly once.
    pub fn take_events(&self) -> Option<UnboundedReceiver<SlotEvent>> {
        self.events_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    fn emit(&self, slot: u32, status: SlotStatus) {
        let _ = self.events.send(SlotEvent { slot, status });
    }

    /// Snapshot of the current profile with the target fields refreshed
    /// from the focus gate, ready for serialization.
    pub fn profile(&self) -> MacroProfile {
        let mut profile = match self.state.lock() {
            Ok(state) => state.profile.clone(),
            Err(_) => MacroProfile::default(),
        };
        profile.target_process_id = self.focus.target_pid();
        profile.target_process_name = self.focus.target_name();
        profile
    }

    /// Replace the profile wholesale and re-resolve the target process.
    ///
    /// Slot statuses reset to `NoFocus` and stale trigger ids are dropped.
    /// Hotkeys are NOT re-registered; callers run their own
    /// `unregister_all`/`register_all` cycle when they want the new
    /// bindings live.
    pub fn load_profile(&self, mut profile: MacroProfile) {
        profile.renumber();
        for slot in &mut profile.slots {
            slot.status = SlotStatus::NoFocus;
            slot.trigger_display = slot.trigger.display();
        }
        let target_id = profile.target_process_id;
        let target_name = profile.target_process_name.clone();
        if let Ok(mut state) = self.state.lock() {
            state.profile = profile;
            state.id_to_slot.clear();
            state.mouse_matchers.clear();
        }
        if let Some(pid) = target_id {
            self.focus.set_target(pid);
        } else if let Some(name) = target_name.as_deref() {
            if !name.is_empty() {
                self.focus.set_target_by_name(name);
            }
        }
    }

    /// Target a process by id.
    pub fn set_target_process(&self, pid: u32) {
        self.focus.set_target(pid);
    }

    /// Target a process by name substring.
    pub fn set_target_process_by_name(&self, name: &str) {
        self.focus.set_target_by_name(name);
    }

    /// Target a process by window-title substring.
    pub fn set_target_process_by_window_title(&self, title: &str) {
        self.focus.set_target_by_window_title(title);
    }

    /// Append a slot; it takes the next slot number.
    pub fn add_slot(&self, mut slot: MacroSlot) -> u32 {
        let Ok(mut state) = self.state.lock() else {
            return 0;
        };
        slot.status = SlotStatus::NoFocus;
        slot.trigger_display = slot.trigger.display();
        state.profile.slots.push(slot);
        state.profile.renumber();
        state.profile.slots.len() as u32
    }

    /// Replace the slot with the given number, keeping its position.
    pub fn update_slot(&self, slot_number: u32, mut slot: MacroSlot) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let Some(index) = state
            .profile
            .slots
            .iter()
            .position(|s| s.slot_number == slot_number)
        else {
            return false;
        };
        slot.slot_number = slot_number;
        slot.trigger_display = slot.trigger.display();
        state.profile.slots[index] = slot;
        true
    }

    /// Remove the slot with the given number and renumber the rest.
    pub fn remove_slot(&self, slot_number: u32) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let before = state.profile.slots.len();
        state.profile.slots.retain(|s| s.slot_number != slot_number);
        let removed = state.profile.slots.len() != before;
        if removed {
            state.profile.renumber();
        }
        removed
    }

    /// Move a slot between 0-based positions and renumber. Out-of-range
    /// indices are a no-op.
    pub fn move_slot(&self, from_index: usize, to_index: usize) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let len = state.profile.slots.len();
        if from_index >= len || to_index >= len {
            return false;
        }
        let slot = state.profile.slots.remove(from_index);
        state.profile.slots.insert(to_index, slot);
        state.profile.renumber();
        true
    }

    /// Enable or disable a slot.
    pub fn set_slot_enabled(&self, slot_number: u32, enabled: bool) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        match state.profile.slot_mut(slot_number) {
            Some(slot) => {
                slot.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Assign a trigger binding to a slot.
    pub fn set_slot_trigger(&self, slot_number: u32, binding: HotkeyBinding) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        match state.profile.slot_mut(slot_number) {
            Some(slot) => {
                slot.set_trigger(binding);
                true
            }
            None => false,
        }
    }

    /// Look up a slot by number.
    pub fn get_slot(&self, slot_number: u32) -> Option<MacroSlot> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.profile.slot(slot_number).cloned())
    }

    /// All slots in order.
    pub fn slots(&self) -> Vec<MacroSlot> {
        self.state
            .lock()
            .map(|state| state.profile.slots.clone())
            .unwrap_or_default()
    }

    /// Register every enabled slot with a set trigger binding: keyboard
    /// triggers with the OS facility, mouse triggers as hook-stream
    /// matchers. Previous registrations are torn down first so the rebuild
    /// starts clean.
    ///
    /// Returns the slot numbers whose registration failed (typically a
    /// combination owned by another process). Failures are not retried.
    pub fn register_all(&self, window: WindowRef) -> Vec<u32> {
        let Ok(mut guard) = self.state.lock() else {
            return Vec::new();
        };
        let state = &mut *guard;
        state.registry.unregister_all(window);
        state.id_to_slot.clear();
        state.mouse_matchers.clear();

        let mut failed = Vec::new();
        let wanted: Vec<(u32, HotkeyBinding)> = state
            .profile
            .slots
            .iter()
            .filter(|s| s.enabled && s.trigger.is_set())
            .map(|s| (s.slot_number, s.trigger))
            .collect();

        for (slot_number, trigger) in wanted {
            if keys::is_mouse_button(trigger.virtual_key) {
                let mut matcher = MouseHotkeyService::new();
                if matcher.register(trigger) {
                    state.mouse_matchers.push((slot_number, matcher));
                } else {
                    warn!(slot = slot_number, "mouse trigger refused");
                    failed.push(slot_number);
                }
            } else {
                match state.registry.register(window, &trigger) {
                    Some(id) => {
                        state.id_to_slot.insert(id, slot_number);
                    }
                    None => failed.push(slot_number),
                }
            }
        }
        debug!(
            registered = state.id_to_slot.len() + state.mouse_matchers.len(),
            failed = failed.len(),
            "hotkey registration rebuilt"
        );
        failed
    }

    /// Tear down every registration and the id map. Idempotent.
    pub fn unregister_all(&self, window: WindowRef) {
        if let Ok(mut state) = self.state.lock() {
            state.registry.unregister_all(window);
            state.id_to_slot.clear();
            state.mouse_matchers.clear();
        }
    }

    /// Whether any registered slot is matched from the mouse hook stream.
    pub fn has_mouse_bindings(&self) -> bool {
        self.state
            .lock()
            .map(|state| !state.mouse_matchers.is_empty())
            .unwrap_or(false)
    }

    /// Route an OS trigger signal to its slot.
    ///
    /// Returns the slot to execute, or `None` when the id is stale or the
    /// target is not focused. An unfocused trigger is dropped outright,
    /// never queued: acting on stale input after refocus would surprise
    /// the user.
    pub fn dispatch_hotkey(&self, id: i32) -> Option<u32> {
        if !self.focus.is_target_focused() {
            debug!(id, "hotkey trigger dropped, target not focused");
            return None;
        }
        let state = self.state.lock().ok()?;
        if !state.registry.accepts(id) {
            return None;
        }
        state.id_to_slot.get(&id).copied()
    }

    /// Feed a hook mouse event into the matchers.
    ///
    /// Returns the slots to execute; empty when nothing matched or the
    /// target is not focused (matched-but-unfocused triggers are dropped,
    /// same as the keyboard path).
    pub fn on_mouse_event(&self, event: &MouseEvent) -> Vec<u32> {
        let mut triggered = Vec::new();
        if let Ok(mut state) = self.state.lock() {
            for (slot_number, matcher) in &mut state.mouse_matchers {
                if matcher.on_mouse_event(event) == Some(HotkeyEvent::Triggered) {
                    triggered.push(*slot_number);
                }
            }
        }
        if triggered.is_empty() {
            return triggered;
        }
        if !self.focus.is_target_focused() {
            debug!("mouse trigger dropped, target not focused");
            return Vec::new();
        }
        triggered
    }

    /// Execute a slot's synthetic key sequence.
    ///
    /// No-op for unknown or disabled slots and for slots already
    /// `Executing`. Focus is re-checked immediately before any work (the
    /// trigger may be stale by the time execution starts) and once more
    /// after the injection finishes, whatever its outcome; focus can change
    /// at any point during the injection's wall-clock time.
    pub async fn execute_slot(&self, slot_number: u32) {
        let job = {
            let Ok(mut guard) = self.state.lock() else {
                return;
            };
            let state = &mut *guard;
            let input_method = state.profile.input_method;
            let Some(slot) = state.profile.slot_mut(slot_number) else {
                return;
            };
            if !slot.enabled {
                return;
            }
            if slot.status == SlotStatus::Executing {
                debug!(slot = slot_number, "re-entrant trigger ignored");
                return;
            }
            if !self.focus.is_target_focused() {
                slot.status = SlotStatus::NoFocus;
                self.emit(slot_number, SlotStatus::NoFocus);
                return;
            }
            slot.status = SlotStatus::Executing;
            let job = (slot.virtual_key, slot.press_count, slot.delay_ms, input_method);
            self.emit(slot_number, SlotStatus::Executing);
            job
        };

        let (virtual_key, press_count, delay_ms, method) = job;
        debug!(
            slot = slot_number,
            virtual_key, press_count, delay_ms, %method,
            "executing slot"
        );
        let injector = self.injector.clone();
        let result = tokio::task::spawn_blocking(move || {
            injector.press_repeated(virtual_key, press_count, delay_ms, method)
        })
        .await;
        if let Err(e) = result {
            warn!(slot = slot_number, error = %e, "injection task failed");
        }

        // Final re-evaluation regardless of the injection outcome.
        let focused = self.focus.is_target_focused();
        let status = if focused {
            SlotStatus::Ready
        } else {
            SlotStatus::NoFocus
        };
        if let Ok(mut state) = self.state.lock() {
            // The slot may have been removed or renumbered meanwhile.
            if let Some(slot) = state.profile.slot_mut(slot_number) {
                slot.status = status;
            } else {
                return;
            }
        }
        self.emit(slot_number, status);
    }

    /// One focus-poll tick: refresh NoFocus/Ready on every slot that is
    /// not currently executing. Emits events only for actual transitions.
    pub fn poll_tick(&self) {
        let focused = self.focus.is_target_focused();
        let next = if focused {
            SlotStatus::Ready
        } else {
            SlotStatus::NoFocus
        };
        let mut changed = Vec::new();
        if let Ok(mut state) = self.state.lock() {
            for slot in &mut state.profile.slots {
                // Never clobber an in-flight execution.
                if slot.status == SlotStatus::Executing {
                    continue;
                }
                if slot.status != next {
                    slot.status = next;
                    changed.push(slot.slot_number);
                }
            }
        }
        for slot_number in changed {
            self.emit(slot_number, next);
        }
    }
}
