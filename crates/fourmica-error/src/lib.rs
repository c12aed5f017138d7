//! # 4mica Error
//!
//! This crate provides the closed error taxonomy shared by the 4mica
//! registration SDK. Every failure coming out of a wallet, an RPC node or a
//! contract call is mapped into one of a small set of [`ErrorKind`]s at the
//! chain-client boundary, before it reaches the registration controller.
//!
//! Raw provider text is never shown to a user directly. [`Error::user_message`]
//! turns any error into a short, user-safe sentence.
//!
//! ## Example
//!
//! ```
//! use fourmica_error::{Error, ErrorKind};
//!
//! let err = Error::from_rpc_response("eth_sendTransaction", 4001, "User denied transaction signature");
//! assert_eq!(err.kind(), ErrorKind::UserRejected);
//! assert_eq!(err.user_message(), "Transaction rejected in wallet");
//!
//! let err = Error::rpc("eth_call", "error sending request for url (http://127.0.0.1:8545/)");
//! assert_eq!(err.user_message(), "RPC error, try again");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::fmt;
use thiserror::Error;

/// Message shown whenever the underlying failure is transport or RPC noise.
pub const GENERIC_RPC_MESSAGE: &str = "RPC error, try again";

/// Raw messages longer than this are replaced by [`GENERIC_RPC_MESSAGE`].
pub const MAX_USER_MESSAGE_LEN: usize = 140;

/// Lowercase fragments that mark a message as leaking transport internals.
const INTERNAL_MARKERS: &[&str] = &[
    "rpc",
    "http",
    "transport",
    "json",
    "alloy",
    "reqwest",
    "connection",
    "0x",
];

/// EIP-1193 code for a request the user rejected in the wallet.
pub const CODE_USER_REJECTED: i64 = 4001;
/// EIP-1193 code for `wallet_switchEthereumChain` on a chain the wallet does not know.
pub const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;
/// JSON-RPC code most nodes use for `execution reverted`.
pub const CODE_EXECUTION_REVERTED: i64 = 3;

/// The main error type for registration SDK operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The user declined the request in their wallet
    #[error("User rejected the request: {0}")]
    UserRejected(String),

    /// The transaction was mined but reverted, or the call reverted on simulation
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// The RPC node or transport failed
    #[error("RPC request failed: {method} - {reason}")]
    Rpc {
        /// RPC method or contract function name
        method: String,
        /// Raw failure text
        reason: String,
    },

    /// Waiting for a response or receipt timed out
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The wallet has no network registered for the requested chain id
    #[error("Network {chain_id} is not registered with the wallet")]
    NetworkNotRegistered {
        /// Requested chain id
        chain_id: u64,
    },

    /// A required configuration value is missing
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Caller supplied an invalid value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

/// Convenient Result type using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of error kinds, for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// User rejected the request
    UserRejected,
    /// Execution reverted
    Reverted,
    /// RPC or transport failure
    Rpc,
    /// Timed out
    Timeout,
    /// Unknown network for the wallet
    NetworkNotRegistered,
    /// Missing configuration
    NotConfigured,
    /// Invalid caller input
    InvalidInput,
    /// Uncategorised
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UserRejected => "user_rejected",
            ErrorKind::Reverted => "reverted",
            ErrorKind::Rpc => "rpc",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NetworkNotRegistered => "network_not_registered",
            ErrorKind::NotConfigured => "not_configured",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Builds an [`Error::Rpc`]
    pub fn rpc(method: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::Rpc {
            method: method.into(),
            reason: reason.to_string(),
        }
    }

    /// Classifies a JSON-RPC / EIP-1193 error response.
    ///
    /// Code 4001 is a wallet rejection, code 3 or an `execution reverted`
    /// message is a revert. A 4902 carries no chain id, so callers that know
    /// the requested chain should map it to [`Error::NetworkNotRegistered`]
    /// themselves.
    pub fn from_rpc_response(method: &str, code: i64, message: &str) -> Self {
        let lower = message.to_lowercase();
        if code == CODE_USER_REJECTED
            || lower.contains("user rejected")
            || lower.contains("user denied")
        {
            return Error::UserRejected(message.to_string());
        }
        if code == CODE_EXECUTION_REVERTED || lower.contains("execution reverted") {
            let reason = message
                .split_once("execution reverted")
                .map(|(_, rest)| rest.trim_start_matches(':').trim())
                .unwrap_or(message);
            return Error::Reverted(reason.to_string());
        }
        Error::rpc(method, format!("code={code}, message={message}"))
    }

    /// Returns the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UserRejected(_) => ErrorKind::UserRejected,
            Error::Reverted(_) => ErrorKind::Reverted,
            Error::Rpc { .. } => ErrorKind::Rpc,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::NetworkNotRegistered { .. } => ErrorKind::NetworkNotRegistered,
            Error::NotConfigured(_) => ErrorKind::NotConfigured,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Short message that is safe to render next to the action that failed.
    pub fn user_message(&self) -> String {
        match self {
            Error::UserRejected(_) => "Transaction rejected in wallet".to_string(),
            Error::Reverted(reason) => {
                let reason = reason.trim();
                if reason.is_empty() || leaks_internals(reason) {
                    "Transaction reverted".to_string()
                } else {
                    format!("Transaction reverted: {reason}")
                }
            }
            Error::Rpc { .. } | Error::Timeout(_) => GENERIC_RPC_MESSAGE.to_string(),
            Error::NetworkNotRegistered { chain_id } => {
                format!("Network {chain_id} is not available in the connected wallet")
            }
            Error::NotConfigured(msg) | Error::InvalidInput(msg) | Error::Other(msg) => {
                sanitize(msg)
            }
        }
    }
}

/// Replaces raw provider text with [`GENERIC_RPC_MESSAGE`] when it mentions
/// transport internals, is empty, or is longer than [`MAX_USER_MESSAGE_LEN`].
pub fn sanitize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || leaks_internals(trimmed) {
        GENERIC_RPC_MESSAGE.to_string()
    } else {
        trimmed.to_string()
    }
}

fn leaks_internals(msg: &str) -> bool {
    if msg.chars().count() > MAX_USER_MESSAGE_LEN {
        return true;
    }
    let lower = msg.to_lowercase();
    INTERNAL_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Extension trait for adding context to foreign errors
pub trait ErrorContext<T> {
    /// Wraps the error as [`Error::Other`] prefixed with `ctx`
    fn context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T, E: std::error::Error> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Other(format!("{}: {}", ctx.into(), e)))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| Error::Other(ctx.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_rejection_by_code() {
        let err = Error::from_rpc_response("eth_sendTransaction", 4001, "denied");
        assert_eq!(err.kind(), ErrorKind::UserRejected);
        assert_eq!(err.user_message(), "Transaction rejected in wallet");
    }

    #[test]
    fn test_user_rejection_by_message() {
        let err = Error::from_rpc_response("eth_sendTransaction", -32000, "User rejected the request.");
        assert_eq!(err.kind(), ErrorKind::UserRejected);
    }

    #[test]
    fn test_revert_reason_extracted() {
        let err = Error::from_rpc_response("eth_estimateGas", 3, "execution reverted: amount too low");
        assert_eq!(err, Error::Reverted("amount too low".to_string()));
        assert_eq!(err.user_message(), "Transaction reverted: amount too low");
    }

    #[test]
    fn test_revert_with_hex_payload_is_hidden() {
        let err = Error::Reverted("custom error 0x08c379a0".to_string());
        assert_eq!(err.user_message(), "Transaction reverted");
    }

    #[test]
    fn test_unknown_code_is_rpc() {
        let err = Error::from_rpc_response("eth_call", -32603, "internal error");
        assert_eq!(err.kind(), ErrorKind::Rpc);
        assert_eq!(err.user_message(), GENERIC_RPC_MESSAGE);
        assert!(err.to_string().contains("-32603"));
    }

    #[test]
    fn test_timeout_is_generic() {
        let err = Error::Timeout("receipt".to_string());
        assert_eq!(err.user_message(), GENERIC_RPC_MESSAGE);
    }

    #[test]
    fn test_network_not_registered_names_chain() {
        let err = Error::NetworkNotRegistered { chain_id: 80002 };
        assert!(err.user_message().contains("80002"));
        assert_eq!(err.kind(), ErrorKind::NetworkNotRegistered);
    }

    #[test]
    fn test_sanitize_keeps_short_plain_text() {
        assert_eq!(sanitize("  Insufficient funds  "), "Insufficient funds");
    }

    #[test]
    fn test_sanitize_hides_transport_details() {
        assert_eq!(sanitize("HTTP error: connection refused"), GENERIC_RPC_MESSAGE);
        assert_eq!(sanitize("deserialization error: json"), GENERIC_RPC_MESSAGE);
        assert_eq!(sanitize(""), GENERIC_RPC_MESSAGE);
    }

    #[test]
    fn test_sanitize_hides_long_text() {
        let long = "a".repeat(MAX_USER_MESSAGE_LEN + 1);
        assert_eq!(sanitize(&long), GENERIC_RPC_MESSAGE);
        let boundary = "a".repeat(MAX_USER_MESSAGE_LEN);
        assert_eq!(sanitize(&boundary), boundary);
    }

    #[test]
    fn test_other_message_sanitized() {
        let err = Error::Other("alloy transport error: 502".to_string());
        assert_eq!(err.user_message(), GENERIC_RPC_MESSAGE);
    }

    #[test]
    fn test_error_context() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        let err = result.context("Failed to load env").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert!(err.to_string().contains("Failed to load env"));

        let none: Option<u8> = None;
        assert!(none.context("absent").is_err());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::NetworkNotRegistered.to_string(), "network_not_registered");
    }
}
