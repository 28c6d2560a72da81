//! Core module containing the exchange engine
//!
//! This module provides:
//! - Frame integrity algorithms (CRC-16/MODBUS, additive sum)
//! - Hex-text frame codec with the legacy parse conventions
//! - Byte channel and sink interfaces
//! - Inbound arbitration between unsolicited data and command replies
//! - The blocking command/response exchange engine
//! - Serial and in-memory channel implementations

pub mod arbiter;
pub mod checksum;
pub mod codec;
pub mod exchange;
pub mod port;
pub mod transport;
pub mod virtual_port;
