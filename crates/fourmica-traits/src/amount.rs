use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reasons a user-typed amount cannot be turned into base units.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountError {
    /// Nothing was typed
    #[error("Enter an amount")]
    Empty,
    /// The text is not a plain decimal number
    #[error("Amount must be a number")]
    NotANumber,
    /// Zero or negative
    #[error("Amount must be greater than zero")]
    NotPositive,
    /// More fractional digits than the asset supports
    #[error("Amount supports at most {max} decimal places")]
    TooManyDecimals {
        /// Decimals of the selected asset
        max: u8,
    },
    /// Does not fit in a uint256
    #[error("Amount is too large")]
    Overflow,
}

/// An amount of an asset, held in base units (wei, or the token's smallest unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// The value in base units
    pub value: U256,
    /// Decimal precision of the asset (18 for ETH, 6 for USDC)
    pub decimals: u8,
}

impl Amount {
    /// Creates an amount from a base-unit value
    pub fn from_base_units(value: U256, decimals: u8) -> Self {
        Self { value, decimals }
    }

    /// Returns a zero amount with the given precision
    pub fn zero(decimals: u8) -> Self {
        Self {
            value: U256::ZERO,
            decimals,
        }
    }

    /// Checks if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Parses a human decimal string ("0.5", "12", ".25") into base units.
    ///
    /// The result must be strictly positive and exactly representable at
    /// `decimals`; extra fractional digits are rejected rather than rounded.
    pub fn parse(text: &str, decimals: u8) -> Result<Self, AmountError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AmountError::Empty);
        }
        if let Some(rest) = text.strip_prefix('-') {
            return match Self::parse(rest, decimals) {
                Ok(_) | Err(AmountError::NotPositive) => Err(AmountError::NotPositive),
                Err(e) => Err(e),
            };
        }

        let (int_part, frac_part) = match text.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (text, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(AmountError::NotANumber);
        }
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) {
            return Err(AmountError::NotANumber);
        }
        if frac_part.len() > decimals as usize {
            return Err(AmountError::TooManyDecimals { max: decimals });
        }

        let mut digits = String::with_capacity(int_part.len() + decimals as usize);
        digits.push_str(int_part);
        digits.push_str(frac_part);
        digits.extend(std::iter::repeat('0').take(decimals as usize - frac_part.len()));

        let value = U256::from_str_radix(&digits, 10).map_err(|_| AmountError::Overflow)?;
        if value.is_zero() {
            return Err(AmountError::NotPositive);
        }
        Ok(Self { value, decimals })
    }
}

impl fmt::Display for Amount {
    /// Formats in whole units, without trailing fractional zeros.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_units(self.value, self.decimals))
    }
}

/// Formats a base-unit value as a decimal string in whole units.
pub fn format_units(value: U256, decimals: u8) -> String {
    let raw = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return raw;
    }
    let padded = if raw.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - raw.len()), raw)
    } else {
        raw
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}
