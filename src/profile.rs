//! Profile data model.
//!
//! A [`MacroProfile`] is an ordered list of [`MacroSlot`]s plus the
//! profile-wide execution settings. Slot order is the source of truth for
//! slot numbering: slot number always equals the 1-indexed position, and
//! every structural mutation renumbers the sequence to keep it dense.

use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::{HotbarError, Result};
use crate::keys;

/// A trigger combination: one virtual key plus modifier states.
///
/// Equality is structural; two bindings are the same trigger iff all four
/// fields match. A binding with virtual key 0 is "unset" and is never
/// registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyBinding {
    #[serde(default)]
    pub virtual_key: u32,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub shift: bool,
}

impl HotkeyBinding {
    /// Create a binding from its parts.
    pub fn new(virtual_key: u32, ctrl: bool, alt: bool, shift: bool) -> Self {
        Self {
            virtual_key,
            ctrl,
            alt,
            shift,
        }
    }

    /// True if a virtual key has been assigned.
    pub fn is_set(&self) -> bool {
        self.virtual_key != 0
    }

    /// Human-readable form, e.g. `Ctrl+Alt+F1` or `MB4`.
    pub fn display(&self) -> String {
        if !self.is_set() {
            return "Not set".to_string();
        }
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl".to_string());
        }
        if self.alt {
            parts.push("Alt".to_string());
        }
        if self.shift {
            parts.push("Shift".to_string());
        }
        parts.push(keys::vk_display(self.virtual_key));
        parts.join("+")
    }
}

/// Execution state of a single slot.
///
/// Transitions follow the engine's state machine; nothing else writes this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SlotStatus {
    /// The target process does not own the foreground window.
    #[default]
    NoFocus,
    /// Focused and waiting for a trigger.
    Ready,
    /// A synthetic key sequence is currently being delivered.
    Executing,
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SlotStatus::NoFocus => "NoFocus",
            SlotStatus::Ready => "Ready",
            SlotStatus::Executing => "Executing",
        };
        f.write_str(s)
    }
}

/// Synthetic-input delivery method, selectable per profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputMethod {
    /// SendInput with a virtual key. Most broadly compatible.
    #[default]
    SendInput,
    /// SendInput with a hardware scan code, for targets that discriminate
    /// against plain virtual-key input.
    SendInputHardware,
    /// PostMessage key messages straight to the foreground window. Fastest,
    /// but only works for apps that read input from window messages.
    PostMessage,
    /// Legacy keybd_event injection, kept as a fallback.
    KeybdEvent,
}

impl std::fmt::Display for InputMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InputMethod::SendInput => "SendInput",
            InputMethod::SendInputHardware => "SendInputHardware",
            InputMethod::PostMessage => "PostMessage",
            InputMethod::KeybdEvent => "KeybdEvent",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for InputMethod {
    type Err = HotbarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sendinput" => Ok(Self::SendInput),
            "sendinputhardware" | "hardware" => Ok(Self::SendInputHardware),
            "postmessage" => Ok(Self::PostMessage),
            "keybdevent" | "legacy" => Ok(Self::KeybdEvent),
            other => Err(HotbarError::invalid_key(
                other,
                "expected one of: sendinput, hardware, postmessage, legacy",
            )),
        }
    }
}

fn default_press_count() -> u32 {
    1
}

fn default_delay_ms() -> u64 {
    50
}

fn default_trigger_display() -> String {
    "Not set".to_string()
}

/// One configured trigger-to-key-sequence mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroSlot {
    /// 1-indexed position within the profile.
    pub slot_number: u32,
    /// Virtual key to inject when triggered.
    pub virtual_key: u32,
    /// Display name of the injected key.
    pub key_name: String,
    /// Number of presses per trigger, at least 1.
    #[serde(default = "default_press_count")]
    pub press_count: u32,
    /// Delay between presses in milliseconds (not applied after the last).
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Trigger combination; unset until captured.
    #[serde(default)]
    pub trigger: HotkeyBinding,
    /// Human-readable trigger string, derived from `trigger`.
    #[serde(default = "default_trigger_display")]
    pub trigger_display: String,
    #[serde(default)]
    pub enabled: bool,
    /// Runtime execution state; never persisted.
    #[serde(skip)]
    pub status: SlotStatus,
}

impl MacroSlot {
    /// Create a slot for the given key with default press settings.
    ///
    /// The slot number is assigned when the slot is added to a profile.
    pub fn new(virtual_key: u32, key_name: impl Into<String>) -> Self {
        Self {
            slot_number: 0,
            virtual_key,
            key_name: key_name.into(),
            press_count: default_press_count(),
            delay_ms: default_delay_ms(),
            trigger: HotkeyBinding::default(),
            trigger_display: default_trigger_display(),
            enabled: false,
            status: SlotStatus::NoFocus,
        }
    }

    /// Assign a trigger binding and refresh the derived display string.
    pub fn set_trigger(&mut self, binding: HotkeyBinding) {
        self.trigger = binding;
        self.trigger_display = binding.display();
    }
}

fn default_focus_poll_ms() -> u64 {
    100
}

fn default_profile_name() -> String {
    "Default".to_string()
}

/// A complete hotbar configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroProfile {
    #[serde(default = "default_profile_name")]
    pub name: String,
    /// Ordered slots; order is significant and persisted.
    #[serde(default)]
    pub slots: Vec<MacroSlot>,
    #[serde(default)]
    pub input_method: InputMethod,
    #[serde(default)]
    pub always_on_top: bool,
    #[serde(default)]
    pub target_process_name: Option<String>,
    #[serde(default)]
    pub target_process_id: Option<u32>,
    /// Focus poll interval for the slot status refresh, in milliseconds.
    #[serde(default = "default_focus_poll_ms")]
    pub focus_poll_ms: u64,
}

impl Default for MacroProfile {
    fn default() -> Self {
        Self {
            name: default_profile_name(),
            slots: Vec::new(),
            input_method: InputMethod::default(),
            always_on_top: false,
            target_process_name: None,
            target_process_id: None,
            focus_poll_ms: default_focus_poll_ms(),
        }
    }
}

impl MacroProfile {
    /// The stock layout: slots 1-8 on keys '1'..'8', slots 9-12 on F1-F4,
    /// one press each, 50 ms delay, disabled until configured.
    pub fn default_profile() -> Self {
        let mut profile = Self::default();
        for i in 1..=8u32 {
            let mut slot = MacroSlot::new(0x30 + i, i.to_string());
            slot.slot_number = i;
            profile.slots.push(slot);
        }
        for i in 1..=4u32 {
            let mut slot = MacroSlot::new(0x6F + i, format!("F{i}"));
            slot.slot_number = 8 + i;
            profile.slots.push(slot);
        }
        profile
    }

    /// Rewrite slot numbers to match 1-indexed positions.
    pub fn renumber(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.slot_number = i as u32 + 1;
        }
    }

    /// Find a slot by number.
    pub fn slot(&self, slot_number: u32) -> Option<&MacroSlot> {
        self.slots.iter().find(|s| s.slot_number == slot_number)
    }

    /// Find a slot by number, mutably.
    pub fn slot_mut(&mut self, slot_number: u32) -> Option<&mut MacroSlot> {
        self.slots.iter_mut().find(|s| s.slot_number == slot_number)
    }

    /// Load a profile from a JSON file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| HotbarError::profile_load(path, e.to_string()))?;
        let mut profile: MacroProfile = serde_json::from_str(&contents)
            .map_err(|e| HotbarError::profile_load(path, e.to_string()))?;
        // Persisted numbering may predate a reorder; position wins.
        profile.renumber();
        for slot in &mut profile.slots {
            slot.trigger_display = slot.trigger.display();
        }
        Ok(profile)
    }

    /// Save the profile as pretty-printed JSON.
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| HotbarError::profile_save(path, e.to_string()))?;
        fs::write(path, json).map_err(|e| HotbarError::profile_save(path, e.to_string()))?;
        Ok(())
    }

    /// Validate profile invariants.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(HotbarError::profile_validation("name cannot be empty"));
        }
        if self.focus_poll_ms == 0 {
            return Err(HotbarError::profile_validation(
                "focus_poll_ms must be greater than 0",
            ));
        }
        for (i, slot) in self.slots.iter().enumerate() {
            let expected = i as u32 + 1;
            if slot.slot_number != expected {
                return Err(HotbarError::profile_validation(format!(
                    "slot at position {} has number {}, expected {}",
                    i + 1,
                    slot.slot_number,
                    expected
                )));
            }
            if slot.virtual_key == 0 {
                return Err(HotbarError::profile_validation(format!(
                    "slot {} has no key assigned",
                    slot.slot_number
                )));
            }
            if slot.press_count == 0 {
                return Err(HotbarError::profile_validation(format!(
                    "slot {} press_count must be at least 1",
                    slot.slot_number
                )));
            }
        }
        Ok(())
    }
}
