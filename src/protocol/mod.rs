//! Protocol module - Defines the wire protocol for CDE communication
//!
//! Every message travels in a frame:
//! - 4 bytes payload length (big-endian)
//! - Variable length payload (a serialized request or response envelope)
//!
//! The same framing is used in both directions.

mod codec;
mod dna;
mod message;
mod transaction;

pub use codec::*;
pub use dna::*;
pub use message::*;
pub use transaction::*;

/// Host of the public CDE inbound message service
pub const DEFAULT_HOST: &str = "cde.udtx.com";

/// Default port for inbound CDE messages
pub const DEFAULT_PORT: u16 = 3886;

/// Registration number reserved for test mode: requests succeed, nothing is performed
pub const TEST_DCRN: u32 = 0;

/// Maximum length of a data consumer ID, in bytes
pub const MAX_DCID_LEN: usize = 64;

/// Node name used by the command line when none is given
pub const DEFAULT_NODE_NAME: &str = "Node 1";
