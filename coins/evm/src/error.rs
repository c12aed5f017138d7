//! Maps alloy failures into the SDK error taxonomy.
//!
//! Nothing above this crate ever sees an alloy error type.

use alloy::providers::PendingTransactionError;
use alloy::transports::{RpcError, TransportError};
use fourmica_error::Error;

pub(crate) fn from_transport(method: &str, err: TransportError) -> Error {
    let mapped = match err {
        RpcError::ErrorResp(payload) => {
            Error::from_rpc_response(method, payload.code, &payload.message)
        }
        other => Error::rpc(method, other),
    };
    tracing::debug!(method, kind = %mapped.kind(), "chain call failed");
    mapped
}

pub(crate) fn from_contract(method: &str, err: alloy::contract::Error) -> Error {
    match err {
        alloy::contract::Error::TransportError(e) => from_transport(method, e),
        other => {
            let mapped = Error::rpc(method, other);
            tracing::debug!(method, kind = %mapped.kind(), "contract call failed");
            mapped
        }
    }
}

pub(crate) fn from_pending(method: &str, err: PendingTransactionError) -> Error {
    match err {
        PendingTransactionError::TransportError(e) => from_transport(method, e),
        PendingTransactionError::TxWatcher(e) => Error::Timeout(format!("{method}: {e}")),
        other => Error::rpc(method, other),
    }
}
