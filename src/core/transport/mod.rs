//! Physical byte channels
//!
//! Implementations of [`crate::core::port::ByteStreamPort`] over real
//! hardware. The exchange engine itself is transport-agnostic; anything that
//! can push bytes and report its inbound buffer can carry it.

pub mod serial;

pub use serial::{available_ports, SerialChannel, SerialConfig, SerialParity};
