//! Caller identities.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{DERIVED_ADDRESS_HEX_LEN, DERIVED_ADDRESS_PREFIX, MAX_ADDRESS_LEN};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a string is rejected as an identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The identity string was empty.
    #[error("address must not be empty")]
    Empty,

    /// The identity string exceeded [`MAX_ADDRESS_LEN`] bytes.
    #[error("address is {len} bytes long, maximum is {max}")]
    TooLong {
        /// Actual byte length.
        len: usize,
        /// Maximum allowed byte length.
        max: usize,
    },

    /// The identity string contained whitespace or a control character.
    #[error("address contains whitespace or control characters: {0:?}")]
    InvalidCharacter(String),
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A caller identity.
///
/// Guaranteed non-empty, at most [`MAX_ADDRESS_LEN`] bytes, and free of
/// whitespace and control characters. Serializes as a plain string.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Validates `value` and wraps it as an identity.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] when the string is empty, too long, or
    /// contains whitespace/control characters.
    pub fn new(value: impl Into<String>) -> Result<Self, AddressError> {
        let value = value.into();
        if value.is_empty() {
            return Err(AddressError::Empty);
        }
        if value.len() > MAX_ADDRESS_LEN {
            return Err(AddressError::TooLong {
                len: value.len(),
                max: MAX_ADDRESS_LEN,
            });
        }
        if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(AddressError::InvalidCharacter(value));
        }
        Ok(Self(value))
    }

    /// Derives a deterministic development address from a label.
    ///
    /// ```text
    /// label -> BLAKE3(label) -> hex -> "kh1" + first 40 hex chars
    /// ```
    ///
    /// The same label always yields the same address, which keeps demo
    /// deployments reproducible.
    pub fn derive(label: &str) -> Self {
        let digest = blake3::hash(label.as_bytes());
        let hex = hex::encode(digest.as_bytes());
        Self(format!(
            "{}{}",
            DERIVED_ADDRESS_PREFIX,
            &hex[..DERIVED_ADDRESS_HEX_LEN]
        ))
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the address and returns the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Address {
    type Error = AddressError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Address {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}
