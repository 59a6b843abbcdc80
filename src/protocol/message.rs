//! Protocol message definitions
//!
//! Requests and responses share the same correlation header (transaction
//! ID, DCRN, DCID) and carry exactly one operation-specific body.

use serde::{Deserialize, Serialize};

use super::{DeviceIdentifier, TransactionId};

/// Node activation payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateMessage {
    /// DNA of the unit being activated
    pub node_dna: DeviceIdentifier,
    /// Human-readable node name, optional but saves a later rename
    pub node_name: Option<String>,
}

/// Operation carried by a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestBody {
    Activate(ActivateMessage),
}

/// A message sent to the CDE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdeRequest {
    pub trans_id: TransactionId,
    pub dcrn: u32,
    pub node_dcid: String,
    pub body: RequestBody,
}

/// Outcome of a node activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateResponse {
    pub accepted: bool,
    pub error_code: u32,
    pub error_message: String,
}

impl ActivateResponse {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            error_code: 0,
            error_message: String::new(),
        }
    }

    pub fn rejected(error_code: u32, error_message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            error_code,
            error_message: error_message.into(),
        }
    }
}

/// Outcome of a node deactivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateResponse {
    pub accepted: bool,
    pub error_code: u32,
    pub error_message: String,
}

/// Outcome carried by a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseBody {
    ActivateResponse(ActivateResponse),
    DeactivateResponse(DeactivateResponse),
    /// No outcome at all
    Empty,
}

impl ResponseBody {
    /// Number of outcome variants this client can decode
    pub const KNOWN_VARIANTS: u32 = 3;

    /// Variant name, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseBody::ActivateResponse(_) => "activate_response",
            ResponseBody::DeactivateResponse(_) => "deactivate_response",
            ResponseBody::Empty => "empty",
        }
    }
}

/// A message received from the CDE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdeResponse {
    pub trans_id: TransactionId,
    pub dcrn: u32,
    pub node_dcid: String,
    pub body: ResponseBody,
}

impl CdeResponse {
    /// Build a response echoing the correlation fields of `request`
    pub fn reply_to(request: &CdeRequest, body: ResponseBody) -> Self {
        Self {
            trans_id: request.trans_id.clone(),
            dcrn: request.dcrn,
            node_dcid: request.node_dcid.clone(),
            body,
        }
    }
}

/// Leading fields of a response, read before the body
///
/// Lets a response for an operation this client does not know be told apart
/// from a corrupt one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResponseHeader {
    pub trans_id: TransactionId,
    pub dcrn: u32,
    pub node_dcid: String,
    /// Wire index of the body variant
    pub body_tag: u32,
}

impl ResponseHeader {
    pub fn has_known_body(&self) -> bool {
        self.body_tag < ResponseBody::KNOWN_VARIANTS
    }
}

/// Error codes reported by the CDE
pub mod error_codes {
    pub const UNKNOWN_DCRN: u32 = 1;
    pub const DUPLICATE_DCID: u32 = 7;
    pub const INTERNAL_ERROR: u32 = 100;
}
