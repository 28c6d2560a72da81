//! # Sertalk
//!
//! A blocking command/response exchange engine for half-duplex byte links
//! (RS-232/RS-485 instruments, USB-serial devices), with:
//! - Arbitration between unsolicited device chatter and command replies on
//!   one shared channel
//! - Deterministic deadline handling (timeout is an outcome, not an error)
//! - CRC-16/MODBUS and additive-sum frame integrity helpers
//! - Hex-text frame parsing in both legacy conventions
//! - A `serialport`-backed channel and an in-memory loopback for tests
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sertalk::{ByteStreamPort, ExchangeLink, LoopbackPort, NullSink};
//!
//! let port = Arc::new(LoopbackPort::new());
//! port.open().expect("loopback always opens");
//!
//! let link = ExchangeLink::attach(port, Arc::new(NullSink));
//! let outcome = link
//!     .send_command_bytes(b"\x01\x02", b"\x01\x02", Duration::from_millis(500))
//!     .expect("loopback transport cannot fail");
//! assert!(outcome.is_matched());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod core;

// Re-exports for convenience
pub use crate::core::arbiter::{LinkState, ReceiveArbiter, DEFAULT_SETTLE_DELAY};
pub use crate::core::checksum::{additive_sum, crc16_legacy, crc16_modbus, ChecksumKind};
pub use crate::core::codec::{
    append_checksum, decode_packed, decode_packed_lenient, decode_spaced, encode,
    is_hex_digits_only, HexError,
};
pub use crate::core::exchange::{
    contains_subsequence, ExchangeLink, ExchangeOptions, ExchangeOutcome, LinkError, MatchPolicy,
    DEFAULT_DEADLINE, POLL_INTERVAL,
};
pub use crate::core::port::{
    ByteStreamPort, DataReadyHook, DataSink, ErrorSink, LogErrorSink, NullSink, PortError,
};
pub use crate::core::transport::{available_ports, SerialChannel, SerialConfig, SerialParity};
pub use crate::core::virtual_port::LoopbackPort;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
