//! UDTX - Device registration protocol client
//!
//! Talks to the CDE (the UDTX registration authority) over length-prefixed
//! binary frames: builds a request, sends it, and validates the response
//! against the request before reporting the outcome.

pub mod config;
pub mod network;
pub mod protocol;

pub use network::{
    ActivateNode, Activated, CdeClient, ErrorKind, NetworkConfig, UdtxError, UdtxResult,
};
pub use protocol::{DeviceIdentifier, MalformedIdentifier, TransactionId};
