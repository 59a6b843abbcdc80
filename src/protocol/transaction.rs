//! Transaction IDs and response correlation

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::{CdeRequest, CdeResponse};

/// Number of hex characters in a generated transaction ID (120 bits)
pub const TRANSACTION_ID_LEN: usize = 30;

/// Token tying a response to the request that caused it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Draw a fresh random ID, rendered as 30 lowercase hex digits
    pub fn generate() -> Self {
        let bits: u128 = rand::thread_rng().gen::<u128>() >> 8;
        Self(format!("{:0width$x}", bits, width = TRANSACTION_ID_LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TransactionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A response whose correlation fields do not match the request
///
/// Never retry after one of these: the server or the data is wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("Mismatched transaction ID returned. Sent {sent}, received {received}")]
    TransactionId { sent: String, received: String },

    #[error("Received incorrect DCRN in response. Sent {sent}, received {received}")]
    Dcrn { sent: u32, received: u32 },

    #[error("Received incorrect DCID in response. Sent {sent:?}, received {received:?}")]
    Dcid { sent: String, received: String },
}

impl CorrelationError {
    /// Wire name of the mismatched field
    pub fn field(&self) -> &'static str {
        match self {
            CorrelationError::TransactionId { .. } => "trans_id",
            CorrelationError::Dcrn { .. } => "dcrn",
            CorrelationError::Dcid { .. } => "node_dcid",
        }
    }
}

/// Check that `response` answers `request`
pub fn correlate(request: &CdeRequest, response: &CdeResponse) -> Result<(), CorrelationError> {
    if response.trans_id != request.trans_id {
        return Err(CorrelationError::TransactionId {
            sent: request.trans_id.to_string(),
            received: response.trans_id.to_string(),
        });
    }

    if response.dcrn != request.dcrn {
        return Err(CorrelationError::Dcrn {
            sent: request.dcrn,
            received: response.dcrn,
        });
    }

    if response.node_dcid != request.node_dcid {
        return Err(CorrelationError::Dcid {
            sent: request.node_dcid.clone(),
            received: response.node_dcid.clone(),
        });
    }

    Ok(())
}
