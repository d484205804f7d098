//! Revision tokens.
//!
//! Clients send revisions either as JSON numbers or as strings. Every value is
//! folded into one canonical string form on entry, so `1`, `1.0`, `"1"` and
//! `"01"` all name the same revision and compare equal afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical revision token. Integer-looking tokens are stored as their
/// decimal digits; anything else is an opaque, trimmed string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Revision(String);

impl Revision {
    /// Canonicalize a string token: trim it, and fold integer spellings
    /// (`"07"`, `"+7"`) to plain digits.
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        let trimmed = token.trim();
        if let Ok(n) = trimmed.parse::<i128>() {
            return Self(n.to_string());
        }
        if trimmed.len() == token.len() {
            Self(token)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// The zero revision reported for projects that never received an update.
    pub fn zero() -> Self {
        Self("0".to_string())
    }

    /// Generate a fresh opaque token for updates that did not carry one.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Canonicalize a JSON number.
    ///
    /// Integral values (including `3.0`) become their integer digits. Values
    /// with a fractional part keep their JSON spelling.
    pub fn from_number(number: &serde_json::Number) -> Self {
        if let Some(i) = number.as_i64() {
            return Self(i.to_string());
        }
        if let Some(u) = number.as_u64() {
            return Self(u.to_string());
        }
        match number.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Self((f as i64).to_string())
            }
            _ => Self(number.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Revision {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Revision {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Revision {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<i64> for Revision {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
