//! Connection handling for the CDE
//!
//! Manages a single framed connection, including:
//! - Envelope encoding/decoding
//! - Send and receive deadlines
//! - Traffic statistics

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::{decode_message, encode_message, CodecError, Decoder, Encoder};

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("Connection closed")]
    Closed,

    #[error("Connection timeout")]
    Timeout,
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Connection statistics
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Frames sent
    pub frames_sent: u64,
    /// Frames received
    pub frames_received: u64,
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
}

/// A framed connection to a remote peer
pub struct Connection<S = TcpStream> {
    /// The byte stream
    stream: S,
    /// Frame encoder
    encoder: Encoder,
    /// Frame decoder
    decoder: Decoder,
    /// Read buffer
    read_buf: BytesMut,
    /// Write buffer
    write_buf: BytesMut,
    /// Largest payload accepted in either direction
    max_frame_size: usize,
    /// Statistics
    stats: ConnectionStats,
}

impl Connection<TcpStream> {
    /// Open a TCP connection, giving up after `timeout`
    pub async fn connect(
        addr: SocketAddr,
        timeout: Duration,
        max_frame_size: usize,
    ) -> ConnectionResult<Self> {
        tracing::debug!("Connecting to {}", addr);

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ConnectionError::Io(e)),
            Err(_) => return Err(ConnectionError::Timeout),
        };
        stream.set_nodelay(true)?;

        Ok(Self::new(stream, max_frame_size))
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an established stream
    pub fn new(stream: S, max_frame_size: usize) -> Self {
        Self {
            stream,
            encoder: Encoder::new(max_frame_size),
            decoder: Decoder::new(max_frame_size),
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::with_capacity(4096),
            max_frame_size,
            stats: ConnectionStats::default(),
        }
    }

    /// Get connection statistics
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Send a message as one frame
    pub async fn send<T: Serialize>(&mut self, message: &T) -> ConnectionResult<()> {
        let payload = encode_message(message, self.max_frame_size)?;

        self.write_buf.clear();
        self.encoder.encode(&payload, &mut self.write_buf)?;

        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;

        self.stats.frames_sent += 1;
        self.stats.bytes_sent += self.write_buf.len() as u64;

        Ok(())
    }

    /// Send a message, failing if it is not written within `timeout`
    pub async fn send_timeout<T: Serialize>(
        &mut self,
        message: &T,
        timeout: Duration,
    ) -> ConnectionResult<()> {
        match tokio::time::timeout(timeout, self.send(message)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    /// Receive the next frame's raw payload
    pub async fn recv_frame(&mut self) -> ConnectionResult<Bytes> {
        loop {
            if let Some(payload) = self.decoder.decode(&mut self.read_buf)? {
                self.stats.frames_received += 1;
                return Ok(payload);
            }

            let mut buf = [0u8; 4096];
            let n = self.stream.read(&mut buf).await?;

            if n == 0 {
                if !self.read_buf.is_empty() || self.decoder.is_mid_frame() {
                    tracing::debug!(
                        "Peer closed mid-frame with {} bytes buffered",
                        self.read_buf.len()
                    );
                }
                return Err(ConnectionError::Closed);
            }

            self.read_buf.extend_from_slice(&buf[..n]);
            self.stats.bytes_received += n as u64;
        }
    }

    /// Receive and decode the next message
    pub async fn recv<T: DeserializeOwned>(&mut self) -> ConnectionResult<T> {
        let payload = self.recv_frame().await?;
        let message = decode_message(&payload, self.max_frame_size)?;
        Ok(message)
    }

    /// Receive a message, failing if none completes within `timeout`
    pub async fn recv_timeout<T: DeserializeOwned>(
        &mut self,
        timeout: Duration,
    ) -> ConnectionResult<T> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    /// Receive a raw frame payload, failing if none completes within `timeout`
    pub async fn recv_frame_timeout(&mut self, timeout: Duration) -> ConnectionResult<Bytes> {
        match tokio::time::timeout(timeout, self.recv_frame()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    /// Shut down the write half of the connection
    pub async fn close(&mut self) -> ConnectionResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
