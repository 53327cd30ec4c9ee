//! Custom error types for hotbar.
//!
//! This module provides structured error types using `thiserror` for better
//! error handling and more informative error messages.

use std::io;
use thiserror::Error;

/// Main error type for hotbar operations.
#[derive(Error, Debug)]
pub enum HotbarError {
    /// Target process could not be resolved.
    #[error("process '{name}' not found")]
    ProcessNotFound { name: String },

    /// The specified key is invalid or unsupported.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Profile validation error.
    #[error("profile error: {0}")]
    ProfileValidation(String),

    /// Error reading or parsing a profile file.
    #[error("failed to load profile from '{path}': {reason}")]
    ProfileLoad { path: String, reason: String },

    /// Error writing a profile file.
    #[error("failed to save profile to '{path}': {reason}")]
    ProfileSave { path: String, reason: String },

    /// Installing a low-level input hook with the OS failed.
    #[error("failed to install {kind} hook: {reason}")]
    HookInstall { kind: &'static str, reason: String },

    /// Left/right mouse buttons cannot be used as trigger bindings.
    #[error("mouse button 0x{virtual_key:02X} is reserved for UI interaction and cannot be a hotkey")]
    ReservedButton { virtual_key: u32 },

    /// Platform-specific operation is not supported.
    #[error("operation not supported on this platform: {0}")]
    UnsupportedPlatform(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for hotbar operations.
pub type Result<T> = std::result::Result<T, HotbarError>;

impl HotbarError {
    /// Create a new ProcessNotFound error.
    pub fn process_not_found(name: impl Into<String>) -> Self {
        Self::ProcessNotFound { name: name.into() }
    }

    /// Create a new InvalidKey error.
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a new ProfileValidation error.
    pub fn profile_validation(message: impl Into<String>) -> Self {
        Self::ProfileValidation(message.into())
    }

    /// Create a new ProfileLoad error.
    pub fn profile_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProfileLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new ProfileSave error.
    pub fn profile_save(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProfileSave {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new HookInstall error.
    pub fn hook_install(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::HookInstall {
            kind,
            reason: reason.into(),
        }
    }

    /// Create a new UnsupportedPlatform error.
    pub fn unsupported_platform(message: impl Into<String>) -> Self {
        Self::UnsupportedPlatform(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HotbarError::process_not_found("game.exe");
        assert_eq!(err.to_string(), "process 'game.exe' not found");

        let err = HotbarError::invalid_key("xyz", "unknown key");
        assert_eq!(err.to_string(), "invalid key 'xyz': unknown key");

        let err = HotbarError::profile_validation("press_count must be at least 1");
        assert_eq!(
            err.to_string(),
            "profile error: press_count must be at least 1"
        );

        let err = HotbarError::ReservedButton { virtual_key: 0x01 };
        assert!(err.to_string().contains("0x01"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let hb_err: HotbarError = io_err.into();
        assert!(matches!(hb_err, HotbarError::Io(_)));
    }
}
