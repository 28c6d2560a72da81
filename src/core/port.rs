//! Byte channel and sink interfaces consumed by the exchange engine
//!
//! The engine sits above an arbitrary push-only byte channel. The channel
//! implementation owns the physical configuration (port name, baud rate,
//! framing); the engine only writes frames, inspects the inbound buffer and
//! reacts to the channel's no-payload "bytes ready" notification.

use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// No-payload notification fired by a channel when inbound bytes become
/// available. Payload is pulled by the receiver via
/// [`ByteStreamPort::read_available`].
pub type DataReadyHook = Arc<dyn Fn() + Send + Sync>;

/// Channel error types
#[derive(Debug, Error)]
pub enum PortError {
    /// Operation attempted on a closed channel
    #[error("port is not open")]
    NotOpen,

    /// Port not found
    #[error("port not found: {0}")]
    NotFound(String),

    /// Permission denied
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A shared, non-seekable byte channel.
///
/// Methods take `&self`; implementations synchronize internally so the
/// channel can be polled by an exchange on one thread while its notification
/// hook fires on another.
#[cfg_attr(test, mockall::automock)]
pub trait ByteStreamPort: Send + Sync {
    /// Open the underlying channel.
    fn open(&self) -> Result<(), PortError>;

    /// Close the underlying channel.
    fn close(&self);

    /// Check whether the channel is currently open.
    fn is_open(&self) -> bool;

    /// Write the full frame to the channel.
    fn write_all(&self, bytes: &[u8]) -> Result<(), PortError>;

    /// Number of inbound bytes currently buffered.
    fn bytes_available(&self) -> Result<usize, PortError>;

    /// Drain up to `max` buffered inbound bytes.
    fn read_available(&self, max: usize) -> Result<Vec<u8>, PortError>;

    /// Throw away everything currently buffered inbound.
    fn discard_inbound(&self) -> Result<(), PortError>;

    /// Register the no-payload "inbound bytes ready" callback.
    fn set_data_ready_hook(&self, hook: DataReadyHook);
}

/// Consumer of bytes that arrive outside any command exchange.
pub trait DataSink: Send + Sync {
    /// Called with a non-empty batch of unsolicited bytes.
    ///
    /// Runs on the channel's notification thread under the arbitration lock;
    /// implementations must hand the payload off (e.g. over a channel)
    /// rather than start a new exchange inline.
    fn on_data_available(&self, payload: Bytes);
}

/// Deliver unsolicited payloads over a crossbeam channel.
impl DataSink for crossbeam_channel::Sender<Bytes> {
    fn on_data_available(&self, payload: Bytes) {
        if self.send(payload).is_err() {
            tracing::warn!("unsolicited data dropped: receiver disconnected");
        }
    }
}

/// Sink that discards unsolicited data, for links used only for exchanges.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DataSink for NullSink {
    fn on_data_available(&self, _payload: Bytes) {}
}

/// Recipient of recoverable error reports.
///
/// Stands in for the historical UI surface (dialogs, alert sounds); the
/// engine reports through it before deciding whether to propagate.
#[cfg_attr(test, mockall::automock)]
pub trait ErrorSink: Send + Sync {
    /// Report a recoverable error.
    fn report(&self, message: &str);
}

/// Default error sink: reports through `tracing::warn!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers() {
        let (tx, rx) = crossbeam_channel::unbounded::<Bytes>();
        tx.on_data_available(Bytes::from_static(b"hello"));
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_channel_sink_survives_disconnect() {
        let (tx, rx) = crossbeam_channel::unbounded::<Bytes>();
        drop(rx);
        // Must not panic.
        tx.on_data_available(Bytes::from_static(b"late"));
    }
}
