use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of one minted token. Tokens are minted sequentially, so ids
/// form a dense range 0..total_supply.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TokenId(pub u64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must not be empty")]
    Empty,
    #[error("address must be 0x-prefixed 40-digit hex, got '{0}'")]
    Malformed(String),
}

/// An account or contract address, normalized to lowercase `0x…` hex.
///
/// The all-zero address is the unset sentinel: it can never own or receive
/// tokens, and user input that resolves to it is treated as missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AddressError::Empty);
        }
        let digits = raw
            .strip_prefix("0x")
            .ok_or_else(|| AddressError::Malformed(raw.to_string()))?;
        if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AddressError::Malformed(raw.to_string()));
        }
        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    pub fn zero() -> Self {
        Self(format!("0x{}", "0".repeat(40)))
    }

    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Base units per whole native coin (18 decimals, ether-style).
pub const BASE_UNITS_PER_COIN: u128 = 1_000_000_000_000_000_000;

/// An amount of the chain's native currency, in base units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NativeAmount(pub u128);

impl NativeAmount {
    pub const ZERO: Self = Self(0);

    /// Whole-coin constructor: `NativeAmount::coins(1)` is one native unit.
    pub fn coins(whole: u64) -> Self {
        Self(u128::from(whole) * BASE_UNITS_PER_COIN)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl fmt::Display for NativeAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / BASE_UNITS_PER_COIN;
        let frac = self.0 % BASE_UNITS_PER_COIN;
        if frac == 0 {
            write!(f, "{whole}")
        } else {
            let frac = format!("{frac:018}");
            write!(f, "{whole}.{}", frac.trim_end_matches('0'))
        }
    }
}
