//! CDE Client
//!
//! Builds node requests, exchanges them with the CDE over a fresh
//! connection and validates what comes back.
//!
//! None of the validation failures here are retried. A response of the
//! wrong type or with mismatched correlation fields means the server or the
//! data is wrong, and sending the request again could duplicate its effect.

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use super::connection::{Connection, ConnectionError};
use super::NetworkConfig;
use crate::protocol::{
    correlate, decode_message, decode_message_prefix, ActivateMessage, CdeRequest, CdeResponse,
    CodecError, CorrelationError, DeviceIdentifier, MalformedIdentifier, RequestBody,
    ResponseBody, ResponseHeader, TransactionId, MAX_DCID_LEN, TEST_DCRN,
};

/// Client errors
#[derive(Error, Debug)]
pub enum UdtxError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    MalformedIdentifier(#[from] MalformedIdentifier),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timed out while {stage}")]
    Timeout { stage: &'static str },

    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("Incorrect message was returned in response to {expected}: got {received}")]
    UnexpectedResponseType {
        expected: &'static str,
        received: String,
    },

    #[error("{0}")]
    Correlation(#[from] CorrelationError),

    #[error("Failed to activate node. Server returned error {code}: {message}")]
    ServerRejected { code: u32, message: String },
}

/// Discriminant of [`UdtxError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    Connection,
    Timeout,
    Protocol,
    UnexpectedResponseType,
    Correlation,
    ServerRejected,
}

impl UdtxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UdtxError::InvalidArgument(_) | UdtxError::MalformedIdentifier(_) => {
                ErrorKind::InvalidArgument
            }
            UdtxError::Connection(_) => ErrorKind::Connection,
            UdtxError::Timeout { .. } => ErrorKind::Timeout,
            UdtxError::Protocol(_) => ErrorKind::Protocol,
            UdtxError::UnexpectedResponseType { .. } => ErrorKind::UnexpectedResponseType,
            UdtxError::Correlation(_) => ErrorKind::Correlation,
            UdtxError::ServerRejected { .. } => ErrorKind::ServerRejected,
        }
    }

    /// Whether the client may transparently resend the same request.
    ///
    /// Always false. A caller wanting another attempt starts over with a
    /// new transaction ID.
    pub fn is_retriable(&self) -> bool {
        false
    }

    fn from_connection(err: ConnectionError, stage: &'static str) -> Self {
        match err {
            ConnectionError::Timeout => UdtxError::Timeout { stage },
            ConnectionError::Protocol(e) => UdtxError::Protocol(e),
            ConnectionError::Closed => {
                UdtxError::Connection(format!("connection closed while {}", stage))
            }
            ConnectionError::Io(e) => UdtxError::Connection(format!("{} while {}", e, stage)),
        }
    }
}

pub type UdtxResult<T> = Result<T, UdtxError>;

/// Lifecycle of a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Built,
    Sent,
    AwaitingResponse,
    Validated,
    Completed,
    Failed,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Built => "built",
            RequestState::Sent => "sent",
            RequestState::AwaitingResponse => "awaiting response",
            RequestState::Validated => "validated",
            RequestState::Completed => "completed",
            RequestState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Run `step`, failing with a timeout for `stage` once `timeout` passes
async fn within<T, F>(timeout: Duration, stage: &'static str, step: F) -> UdtxResult<T>
where
    F: Future<Output = UdtxResult<T>>,
{
    match tokio::time::timeout(timeout, step).await {
        Ok(result) => result,
        Err(_) => Err(UdtxError::Timeout { stage }),
    }
}

fn transition(trans_id: &TransactionId, state: &mut RequestState, next: RequestState) {
    tracing::debug!(%trans_id, "request {} -> {}", state, next);
    *state = next;
}

/// Parameters of a node activation
#[derive(Debug, Clone)]
pub struct ActivateNode {
    dna: String,
    dcid: String,
    dcrn: u32,
    node_name: Option<String>,
}

impl ActivateNode {
    /// Activate the unit with DNA `dna` under the consumer ID `dcid`, in test mode
    pub fn new(dna: impl Into<String>, dcid: impl Into<String>) -> Self {
        Self {
            dna: dna.into(),
            dcid: dcid.into(),
            dcrn: TEST_DCRN,
            node_name: None,
        }
    }

    pub fn dcrn(mut self, dcrn: u32) -> Self {
        self.dcrn = dcrn;
        self
    }

    pub fn node_name(mut self, name: impl Into<String>) -> Self {
        self.node_name = Some(name.into());
        self
    }

    /// Validate arguments and build the request envelope
    pub fn build(&self) -> UdtxResult<CdeRequest> {
        if self.dcid.len() > MAX_DCID_LEN {
            return Err(UdtxError::InvalidArgument(format!(
                "DCID cannot be longer than {} bytes (got {})",
                MAX_DCID_LEN,
                self.dcid.len()
            )));
        }

        let node_dna = DeviceIdentifier::parse(&self.dna)?;

        Ok(CdeRequest {
            trans_id: TransactionId::generate(),
            dcrn: self.dcrn,
            node_dcid: self.dcid.clone(),
            body: RequestBody::Activate(ActivateMessage {
                node_dna,
                node_name: self.node_name.clone(),
            }),
        })
    }
}

/// Successful activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activated {
    pub trans_id: TransactionId,
    pub dcrn: u32,
    pub node_dna: DeviceIdentifier,
    /// The request used the test DCRN, so the CDE performed no action
    pub test_mode: bool,
}

/// CDE Client
pub struct CdeClient {
    /// Client configuration
    config: NetworkConfig,
}

impl CdeClient {
    /// Create a new client
    pub fn new(config: NetworkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Activate a node with no name attached
    pub async fn activate_node(&self, dna: &str, dcid: &str, dcrn: u32) -> UdtxResult<Activated> {
        self.activate(ActivateNode::new(dna, dcid).dcrn(dcrn)).await
    }

    /// Activate a node
    pub async fn activate(&self, params: ActivateNode) -> UdtxResult<Activated> {
        let request = params.build()?;
        let node_dna = match &request.body {
            RequestBody::Activate(msg) => msg.node_dna,
        };

        let resolve = async {
            super::resolve_host(&self.config.host, self.config.port)
                .await
                .map_err(|e| UdtxError::Connection(format!("{} while resolving", e)))
        };
        let addr = within(self.config.connect_timeout, "resolving", resolve).await?;

        tracing::info!(
            trans_id = %request.trans_id,
            dcrn = request.dcrn,
            "Activating node {} as {:?} via {}",
            node_dna,
            request.node_dcid,
            addr
        );

        let mut conn = Connection::connect(
            addr,
            self.config.connect_timeout,
            self.config.max_frame_size,
        )
        .await
        .map_err(|e| UdtxError::from_connection(e, "connecting"))?;

        let result = self.exchange(&mut conn, &request).await;

        if let Err(e) = conn.close().await {
            tracing::debug!("Error closing connection to {}: {}", addr, e);
        }

        match &result {
            Ok(_) => tracing::info!(trans_id = %request.trans_id, "Node {} activated", node_dna),
            Err(e) => tracing::warn!(trans_id = %request.trans_id, "Node activation failed: {}", e),
        }

        result.map(|()| Activated {
            trans_id: request.trans_id.clone(),
            dcrn: request.dcrn,
            node_dna,
            test_mode: request.dcrn == TEST_DCRN,
        })
    }

    /// Send `request` over `conn` and validate the activation response
    pub async fn exchange<S>(
        &self,
        conn: &mut Connection<S>,
        request: &CdeRequest,
    ) -> UdtxResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut state = RequestState::Built;
        let result = self.run_exchange(conn, request, &mut state).await;

        let last = if result.is_ok() {
            RequestState::Completed
        } else {
            RequestState::Failed
        };
        transition(&request.trans_id, &mut state, last);

        result
    }

    async fn run_exchange<S>(
        &self,
        conn: &mut Connection<S>,
        request: &CdeRequest,
        state: &mut RequestState,
    ) -> UdtxResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        conn.send_timeout(request, self.config.io_timeout)
            .await
            .map_err(|e| UdtxError::from_connection(e, "sending request"))?;
        transition(&request.trans_id, state, RequestState::Sent);

        transition(&request.trans_id, state, RequestState::AwaitingResponse);
        let payload = conn
            .recv_frame_timeout(self.config.io_timeout)
            .await
            .map_err(|e| UdtxError::from_connection(e, "awaiting response"))?;

        let max_frame_size = self.config.max_frame_size;
        let header: ResponseHeader = decode_message_prefix(&payload, max_frame_size)?;
        if !header.has_known_body() {
            return Err(UdtxError::UnexpectedResponseType {
                expected: "node activate",
                received: format!("unknown variant {}", header.body_tag),
            });
        }
        let response: CdeResponse = decode_message(&payload, max_frame_size)?;

        let outcome = match &response.body {
            ResponseBody::ActivateResponse(outcome) => outcome,
            other => {
                return Err(UdtxError::UnexpectedResponseType {
                    expected: "node activate",
                    received: other.kind().to_string(),
                });
            }
        };

        correlate(request, &response)?;
        transition(&request.trans_id, state, RequestState::Validated);

        if outcome.accepted {
            Ok(())
        } else {
            Err(UdtxError::ServerRejected {
                code: outcome.error_code,
                message: outcome.error_message.clone(),
            })
        }
    }
}
