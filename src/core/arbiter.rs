//! Inbound arbitration
//!
//! One channel carries both unsolicited device chatter and the replies to
//! commands in flight. The arbiter owns the state that decides where inbound
//! bytes go: while `Idle` they are drained and handed to the unsolicited
//! consumer, while `Exchanging` they are left in the channel buffer for the
//! active exchange's poll loop to evaluate.

use crate::core::port::{ByteStreamPort, DataSink, ErrorSink};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Settle delay applied before draining a notification batch.
///
/// Sized so the expected bytes have physically arrived at common baud rates
/// before the read (about 20 bytes at 9600 baud per 20 ms).
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(20);

/// Routing state of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Inbound bytes are delivered to the unsolicited consumer
    Idle,
    /// A command exchange is in flight; unsolicited delivery is suppressed
    Exchanging,
}

/// Arbitrates the shared inbound buffer between the unsolicited path and the
/// command-exchange path.
pub struct ReceiveArbiter {
    state: Mutex<LinkState>,
    settle_delay: Duration,
    port: Arc<dyn ByteStreamPort>,
    sink: Arc<dyn DataSink>,
    errors: Arc<dyn ErrorSink>,
}

impl ReceiveArbiter {
    /// Create an arbiter over `port` delivering unsolicited data to `sink`.
    pub fn new(
        port: Arc<dyn ByteStreamPort>,
        sink: Arc<dyn DataSink>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            state: Mutex::new(LinkState::Idle),
            settle_delay: DEFAULT_SETTLE_DELAY,
            port,
            sink,
            errors,
        }
    }

    /// Set the settle delay applied before draining a notification batch.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Current routing state.
    pub fn state(&self) -> LinkState {
        *self.state.lock()
    }

    /// Check whether an exchange is currently in flight.
    pub fn is_exchanging(&self) -> bool {
        self.state() == LinkState::Exchanging
    }

    /// Enter `Exchanging`; the returned guard restores `Idle` when dropped,
    /// on every exit path.
    ///
    /// Precondition: no other exchange is in flight on this link. Violations
    /// are a caller error with undefined exchange outcome; they are logged
    /// and trip a debug assertion.
    pub(crate) fn begin_exchange(&self) -> ExchangeGuard<'_> {
        let mut state = self.state.lock();
        if *state == LinkState::Exchanging {
            tracing::warn!("exchange started while another is in flight; outcome is undefined");
            debug_assert!(false, "concurrent exchanges on one link");
        }
        *state = LinkState::Exchanging;
        ExchangeGuard { arbiter: self }
    }

    /// Handle the channel's "bytes ready" notification.
    ///
    /// While `Idle`: waits the settle delay, drains everything available as
    /// one batch and delivers it to the unsolicited consumer. A zero-byte
    /// drain (spurious notification) delivers nothing. While `Exchanging`
    /// (checked both before and after the settle sleep): returns without
    /// touching the buffer, leaving the bytes for the exchange poll loop.
    ///
    /// Drain failures are reported to the error sink and suppressed; they
    /// never propagate into the exchange path.
    pub fn on_data_ready(&self) {
        if self.is_exchanging() {
            return;
        }

        thread::sleep(self.settle_delay);

        // Holding the state lock through the drain and delivery keeps an
        // exchange from starting mid-delivery; begin_exchange blocks until
        // the sink returns.
        let state = self.state.lock();
        if *state == LinkState::Exchanging {
            return;
        }

        let available = match self.port.bytes_available() {
            Ok(n) => n,
            Err(err) => {
                self.errors.report(&format!("unsolicited receive failed: {err}"));
                return;
            }
        };
        if available == 0 {
            return;
        }

        let payload = match self.port.read_available(available) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.errors.report(&format!("unsolicited receive failed: {err}"));
                return;
            }
        };
        if payload.is_empty() {
            return;
        }

        tracing::trace!("delivering {} unsolicited byte(s)", payload.len());
        self.sink.on_data_available(Bytes::from(payload));
    }
}

/// RAII guard for the `Exchanging` state; dropping it restores `Idle`.
pub(crate) struct ExchangeGuard<'a> {
    arbiter: &'a ReceiveArbiter,
}

impl Drop for ExchangeGuard<'_> {
    fn drop(&mut self) {
        *self.arbiter.state.lock() = LinkState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::port::{MockByteStreamPort, NullSink};
    use crate::core::port::LogErrorSink;

    fn arbiter_with(port: MockByteStreamPort) -> ReceiveArbiter {
        ReceiveArbiter::new(Arc::new(port), Arc::new(NullSink), Arc::new(LogErrorSink))
            .with_settle_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_guard_restores_idle() {
        let mut port = MockByteStreamPort::new();
        port.expect_bytes_available().never();
        let arbiter = arbiter_with(port);

        {
            let _guard = arbiter.begin_exchange();
            assert_eq!(arbiter.state(), LinkState::Exchanging);
        }
        assert_eq!(arbiter.state(), LinkState::Idle);
    }

    #[test]
    fn test_notification_suppressed_while_exchanging() {
        let mut port = MockByteStreamPort::new();
        // The buffer must not be touched while an exchange is in flight.
        port.expect_bytes_available().never();
        port.expect_read_available().never();
        let arbiter = arbiter_with(port);

        let _guard = arbiter.begin_exchange();
        arbiter.on_data_ready();
    }

    #[test]
    fn test_spurious_notification_delivers_nothing() {
        let (tx, rx) = crossbeam_channel::unbounded::<Bytes>();
        let mut port = MockByteStreamPort::new();
        port.expect_bytes_available().return_once(|| Ok(0));
        port.expect_read_available().never();

        let arbiter = ReceiveArbiter::new(Arc::new(port), Arc::new(tx), Arc::new(LogErrorSink))
            .with_settle_delay(Duration::from_millis(1));
        arbiter.on_data_ready();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_drain_error_reported_and_suppressed() {
        let mut port = MockByteStreamPort::new();
        port.expect_bytes_available()
            .return_once(|| Err(crate::core::port::PortError::NotOpen));

        let mut errors = crate::core::port::MockErrorSink::new();
        errors.expect_report().times(1).return_const(());

        let arbiter = ReceiveArbiter::new(Arc::new(port), Arc::new(NullSink), Arc::new(errors))
            .with_settle_delay(Duration::from_millis(1));
        arbiter.on_data_ready();
        assert_eq!(arbiter.state(), LinkState::Idle);
    }
}
