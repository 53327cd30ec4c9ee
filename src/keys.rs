//! Virtual-key code tables.
//!
//! Maps between Windows virtual-key codes and the display names used in
//! profiles and trigger strings. The codes are plain integers so this
//! module builds on every platform.

/// Left mouse button.
pub const VK_LBUTTON: u32 = 0x01;
/// Right mouse button.
pub const VK_RBUTTON: u32 = 0x02;
/// Middle mouse button.
pub const VK_MBUTTON: u32 = 0x04;
/// First extended mouse button (MB4).
pub const VK_XBUTTON1: u32 = 0x05;
/// Second extended mouse button (MB5).
pub const VK_XBUTTON2: u32 = 0x06;

/// Shift modifier key.
pub const VK_SHIFT: u32 = 0x10;
/// Control modifier key.
pub const VK_CONTROL: u32 = 0x11;
/// Alt modifier key (VK_MENU).
pub const VK_MENU: u32 = 0x12;

/// True for any mouse-button virtual key (left, right, middle, MB4, MB5).
pub fn is_mouse_button(vk: u32) -> bool {
    matches!(
        vk,
        VK_LBUTTON | VK_RBUTTON | VK_MBUTTON | VK_XBUTTON1 | VK_XBUTTON2
    )
}

/// True for the buttons that may never be used as a trigger binding.
///
/// Left and right click conflict with normal UI interaction, so capture
/// rejects them outright.
pub fn is_reserved_button(vk: u32) -> bool {
    matches!(vk, VK_LBUTTON | VK_RBUTTON)
}

/// Resolve a display name to a virtual-key code.
///
/// Accepts the same names `vk_name` produces, case-insensitively.
pub fn name_to_vk(name: &str) -> Option<u32> {
    let lower = name.trim().to_lowercase();

    // Single letters and digits map straight to their vk codes.
    if lower.len() == 1 {
        let c = lower.chars().next()?;
        if c.is_ascii_lowercase() {
            return Some(c.to_ascii_uppercase() as u32);
        }
        if c.is_ascii_digit() {
            return Some(c as u32);
        }
    }

    let vk = match lower.as_str() {
        // Function keys
        "f1" => 0x70,
        "f2" => 0x71,
        "f3" => 0x72,
        "f4" => 0x73,
        "f5" => 0x74,
        "f6" => 0x75,
        "f7" => 0x76,
        "f8" => 0x77,
        "f9" => 0x78,
        "f10" => 0x79,
        "f11" => 0x7A,
        "f12" => 0x7B,

        // Special keys
        "space" => 0x20,
        "enter" | "return" => 0x0D,
        "tab" => 0x09,
        "escape" | "esc" => 0x1B,
        "backspace" => 0x08,
        "delete" => 0x2E,
        "insert" => 0x2D,
        "home" => 0x24,
        "end" => 0x23,
        "pageup" => 0x21,
        "pagedown" => 0x22,

        // Arrow keys
        "up" => 0x26,
        "down" => 0x28,
        "left" => 0x25,
        "right" => 0x27,

        // Numpad
        "num0" => 0x60,
        "num1" => 0x61,
        "num2" => 0x62,
        "num3" => 0x63,
        "num4" => 0x64,
        "num5" => 0x65,
        "num6" => 0x66,
        "num7" => 0x67,
        "num8" => 0x68,
        "num9" => 0x69,

        // Mouse buttons (MB1/MB2 resolve but are rejected at capture)
        "mb1" => VK_LBUTTON,
        "mb2" => VK_RBUTTON,
        "mb3" => VK_MBUTTON,
        "mb4" => VK_XBUTTON1,
        "mb5" => VK_XBUTTON2,

        _ => return None,
    };

    Some(vk)
}

/// Display name for a virtual-key code, or `None` for codes without one.
pub fn vk_name(vk: u32) -> Option<String> {
    // Letters and digits
    if (0x41..=0x5A).contains(&vk) || (0x30..=0x39).contains(&vk) {
        return char::from_u32(vk).map(|c| c.to_string());
    }
    // Function keys
    if (0x70..=0x7B).contains(&vk) {
        return Some(format!("F{}", vk - 0x6F));
    }
    // Numpad
    if (0x60..=0x69).contains(&vk) {
        return Some(format!("Num{}", vk - 0x60));
    }

    let name = match vk {
        VK_LBUTTON => "MB1",
        VK_RBUTTON => "MB2",
        VK_MBUTTON => "MB3",
        VK_XBUTTON1 => "MB4",
        VK_XBUTTON2 => "MB5",

        0x20 => "Space",
        0x0D => "Enter",
        0x09 => "Tab",
        0x1B => "Escape",
        0x08 => "Backspace",
        0x2E => "Delete",
        0x2D => "Insert",
        0x24 => "Home",
        0x23 => "End",
        0x21 => "PageUp",
        0x22 => "PageDown",

        0x26 => "Up",
        0x28 => "Down",
        0x25 => "Left",
        0x27 => "Right",

        _ => return None,
    };

    Some(name.to_string())
}

/// Display name for a virtual-key code, falling back to the hex code.
pub fn vk_display(vk: u32) -> String {
    vk_name(vk).unwrap_or_else(|| format!("0x{vk:02X}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_common_keys() {
        for name in ["a", "z", "0", "9", "f1", "f12", "space", "enter", "mb4"] {
            let vk = name_to_vk(name).unwrap();
            let display = vk_name(vk).unwrap();
            assert_eq!(name_to_vk(&display), Some(vk), "roundtrip failed for {name}");
        }
    }

    #[test]
    fn test_mouse_button_classification() {
        assert!(is_mouse_button(VK_LBUTTON));
        assert!(is_mouse_button(VK_XBUTTON2));
        assert!(!is_mouse_button(0x41));
        // 0x03 is VK_CANCEL, not a mouse button
        assert!(!is_mouse_button(0x03));

        assert!(is_reserved_button(VK_LBUTTON));
        assert!(is_reserved_button(VK_RBUTTON));
        assert!(!is_reserved_button(VK_MBUTTON));
    }

    #[test]
    fn test_vk_display_fallback() {
        assert_eq!(vk_display(0x41), "A");
        assert_eq!(vk_display(0xE7), "0xE7");
    }
}
