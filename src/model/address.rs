//! Email addresses: header mailbox parsing and envelope address normalization.

use serde::{Deserialize, Serialize};

/// A mailbox parsed from a decoded header value (RFC 5322 §3.4).
///
/// # Examples
/// - `"Jürgen Müller <juergen@example.de>"` → `display_name = "Jürgen Müller"`, `address = "juergen@example.de"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Parse a single mailbox from a decoded header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    ///
    /// Anything without angle brackets is kept whole as `address`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start + 1 {
                    return Self {
                        display_name: strip_quotes(&trimmed[..angle_start]),
                        address: trimmed[angle_start + 1..angle_end].trim().to_string(),
                    };
                }
            }
        }

        Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Whether the address part looks like something a mail server would accept.
    pub fn is_routable(&self) -> bool {
        match self.address.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && !domain.is_empty() && !self.address.contains(char::is_whitespace)
            }
            None => false,
        }
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// An envelope address as delivered by the inbound notification.
///
/// Receivers send either a single string or a list; only the first entry
/// is ever used downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Address {
    Single(String),
    Many(Vec<String>),
}

impl Address {
    /// The primary (first) address, or an empty string for an empty list.
    pub fn primary(&self) -> &str {
        match self {
            Self::Single(addr) => addr,
            Self::Many(list) => list.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// Collapse to `Single` holding the primary address.
    pub fn into_single(self) -> Self {
        match self {
            Self::Single(_) => self,
            Self::Many(mut list) => {
                if list.is_empty() {
                    Self::Single(String::new())
                } else {
                    Self::Single(list.swap_remove(0))
                }
            }
        }
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::Single(String::new())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(addr) => f.write_str(addr),
            Self::Many(list) => f.write_str(&list.join(", ")),
        }
    }
}
