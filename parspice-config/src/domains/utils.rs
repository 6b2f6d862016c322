//! Utility functions and helpers for configuration

/// Default functions for serde
pub fn default_false() -> bool {
    false
}
