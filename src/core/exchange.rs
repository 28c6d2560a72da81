//! Command exchange engine
//!
//! Drives one blocking request/response cycle over a shared byte channel:
//! discard stale inbound bytes, write the request, poll for a matching reply
//! until the deadline, and restore arbitration state on every exit path.

use crate::core::arbiter::ReceiveArbiter;
use crate::core::codec::{self, HexError};
use crate::core::port::{ByteStreamPort, DataSink, ErrorSink, LogErrorSink, PortError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Fixed poll cadence of the exchange loop.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Historical default reply deadline.
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(500);

/// Link error types
#[derive(Debug, Error)]
pub enum LinkError {
    /// Exchange or send attempted on a closed channel
    #[error("port is not open")]
    NotOpen,

    /// A send was attempted while an exchange is in flight
    #[error("a command exchange is in progress")]
    Busy,

    /// Transport failure during an exchange or send
    #[error("transport failure: {0}")]
    Transport(#[from] PortError),

    /// Malformed hex text handed to a hex-mode send
    #[error("malformed hex text: {0}")]
    Format(#[from] HexError),
}

/// How the accumulated reply bytes are judged against the expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Succeed once the reply bytes occur as a contiguous run anywhere in
    /// the received batch.
    Bytes(Vec<u8>),
    /// Decode the batch as text; succeed on exact equality, or on substring
    /// containment when `substring` is set.
    Text {
        /// Expected reply text
        expected: String,
        /// Accept the expected text anywhere within the decoded batch
        substring: bool,
    },
    /// Succeed once at least this many bytes have accumulated.
    MinLength(usize),
}

impl MatchPolicy {
    /// Expect this exact byte pattern in the reply.
    pub fn bytes(expected: impl Into<Vec<u8>>) -> Self {
        MatchPolicy::Bytes(expected.into())
    }

    /// Expect the reply text to equal `expected`.
    pub fn exact_text(expected: impl Into<String>) -> Self {
        MatchPolicy::Text {
            expected: expected.into(),
            substring: false,
        }
    }

    /// Expect the reply text to contain `expected`.
    pub fn text_contains(expected: impl Into<String>) -> Self {
        MatchPolicy::Text {
            expected: expected.into(),
            substring: true,
        }
    }

    /// Minimum byte count the reply must reach before a match is attempted.
    ///
    /// The poll loop does not evaluate a batch shorter than this, so a
    /// partial reply is never judged against the full expectation.
    pub fn min_len(&self) -> usize {
        match self {
            MatchPolicy::Bytes(expected) => expected.len(),
            MatchPolicy::Text { expected, .. } => expected.len(),
            MatchPolicy::MinLength(n) => *n,
        }
    }

    /// Judge a received batch.
    ///
    /// Text is decoded lossily; the historical comparison used a permissive
    /// platform decode, and replies are treated the same way here.
    pub fn matches(&self, received: &[u8]) -> bool {
        match self {
            MatchPolicy::Bytes(expected) => contains_subsequence(received, expected),
            MatchPolicy::Text { expected, substring } => {
                let text = String::from_utf8_lossy(received);
                if *substring {
                    text.contains(expected.as_str())
                } else {
                    text == expected.as_str()
                }
            }
            MatchPolicy::MinLength(n) => received.len() >= *n,
        }
    }
}

/// Check whether `pattern` occurs as a contiguous run inside `source`.
///
/// Brute-force scan: every candidate offset is compared against the full
/// pattern, first full match wins. An empty pattern matches everything.
pub fn contains_subsequence(source: &[u8], pattern: &[u8]) -> bool {
    if pattern.is_empty() {
        return true;
    }
    if source.len() < pattern.len() {
        return false;
    }
    source.windows(pattern.len()).any(|window| window == pattern)
}

/// Result of one completed exchange.
///
/// `TimedOut` is an ordinary outcome, not an error: it distinguishes "no
/// match within budget" from transport failures, which surface as
/// [`LinkError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The reply matched; carries the batch that satisfied the policy.
    Matched(Vec<u8>),
    /// The deadline elapsed without a matching reply.
    TimedOut,
}

impl ExchangeOutcome {
    /// Check whether the exchange matched.
    pub fn is_matched(&self) -> bool {
        matches!(self, ExchangeOutcome::Matched(_))
    }

    /// The matched batch, if any.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            ExchangeOutcome::Matched(bytes) => Some(bytes),
            ExchangeOutcome::TimedOut => None,
        }
    }
}

/// Tuning knobs of the exchange poll loop.
#[derive(Debug, Clone, Copy)]
pub struct ExchangeOptions {
    /// Poll cadence; the deadline is quantized to whole intervals.
    pub poll_interval: Duration,
    /// Accumulate drained bytes across polls instead of judging each poll's
    /// batch in isolation.
    ///
    /// Off by default: historically each poll drained the buffer, judged
    /// that batch alone and discarded it, so a reply split across two polls
    /// after a first over-threshold batch could never match. That behavior
    /// is preserved as the default; turning this on buffers across polls.
    pub cumulative: bool,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            cumulative: false,
        }
    }
}

/// Blocking command/response engine over one byte channel.
///
/// Owns the channel handle, the [`ReceiveArbiter`] routing inbound bytes and
/// the exchange options. At most one exchange may be in flight per link;
/// concurrent callers must serialize themselves (see [`ReceiveArbiter`]'s
/// precondition).
pub struct ExchangeLink {
    port: Arc<dyn ByteStreamPort>,
    arbiter: Arc<ReceiveArbiter>,
    errors: Arc<dyn ErrorSink>,
    options: ExchangeOptions,
}

impl ExchangeLink {
    /// Assemble a link over `port`, wiring the channel's data-ready hook to
    /// the arbiter and delivering unsolicited data to `sink`.
    ///
    /// Errors are reported through [`LogErrorSink`]; use [`Self::with_parts`]
    /// to inject a different sink or a pre-configured arbiter.
    pub fn attach(port: Arc<dyn ByteStreamPort>, sink: Arc<dyn DataSink>) -> Self {
        let errors: Arc<dyn ErrorSink> = Arc::new(LogErrorSink);
        let arbiter = Arc::new(ReceiveArbiter::new(
            Arc::clone(&port),
            sink,
            Arc::clone(&errors),
        ));
        // The hook holds the arbiter weakly; the channel also lives inside
        // the arbiter, and a strong reference here would tie the two into a
        // cycle that never drops.
        let hooked = Arc::downgrade(&arbiter);
        port.set_data_ready_hook(Arc::new(move || {
            if let Some(arbiter) = hooked.upgrade() {
                arbiter.on_data_ready();
            }
        }));
        Self {
            port,
            arbiter,
            errors,
            options: ExchangeOptions::default(),
        }
    }

    /// Assemble a link from explicitly constructed parts.
    ///
    /// The caller is responsible for wiring the channel's data-ready hook to
    /// `arbiter` (or for leaving it unwired when no unsolicited delivery is
    /// wanted).
    pub fn with_parts(
        port: Arc<dyn ByteStreamPort>,
        arbiter: Arc<ReceiveArbiter>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            port,
            arbiter,
            errors,
            options: ExchangeOptions::default(),
        }
    }

    /// Set the exchange options.
    #[must_use]
    pub fn with_options(mut self, options: ExchangeOptions) -> Self {
        self.options = options;
        self
    }

    /// The arbiter routing this link's inbound bytes.
    pub fn arbiter(&self) -> &Arc<ReceiveArbiter> {
        &self.arbiter
    }

    /// Check whether the underlying channel is open.
    pub fn is_open(&self) -> bool {
        self.port.is_open()
    }

    /// Write a frame outside any exchange.
    ///
    /// Refused with [`LinkError::Busy`] while an exchange is in flight; the
    /// channel buffer belongs to the exchange until it completes.
    pub fn send(&self, frame: &[u8]) -> Result<(), LinkError> {
        if self.arbiter.is_exchanging() {
            return Err(LinkError::Busy);
        }
        if !self.port.is_open() {
            return Err(LinkError::NotOpen);
        }
        self.port.write_all(frame)?;
        Ok(())
    }

    /// Write text as raw bytes outside any exchange.
    pub fn send_text(&self, text: &str) -> Result<(), LinkError> {
        self.send(text.as_bytes())
    }

    /// Parse hex text (lenient packed convention, `0x` markers and
    /// whitespace stripped, odd tail padded) and write the bytes.
    pub fn send_hex_text(&self, text: &str) -> Result<(), LinkError> {
        let frame = codec::decode_packed_lenient(text)?;
        self.send(&frame)
    }

    /// Send a command and wait for a reply containing `expected` as a
    /// contiguous byte run.
    pub fn send_command_bytes(
        &self,
        outbound: &[u8],
        expected: &[u8],
        deadline: Duration,
    ) -> Result<ExchangeOutcome, LinkError> {
        self.execute(outbound, &MatchPolicy::bytes(expected), deadline)
    }

    /// Send a command as text and wait for the expected reply text; `exact`
    /// demands full equality, otherwise substring containment suffices.
    pub fn send_command_text(
        &self,
        outbound: &str,
        expected: &str,
        deadline: Duration,
        exact: bool,
    ) -> Result<ExchangeOutcome, LinkError> {
        let policy = if exact {
            MatchPolicy::exact_text(expected)
        } else {
            MatchPolicy::text_contains(expected)
        };
        self.execute(outbound.as_bytes(), &policy, deadline)
    }

    /// Drive one blocking request/response cycle.
    ///
    /// Fails fast with [`LinkError::NotOpen`] on a closed channel. Otherwise
    /// enters `Exchanging`, discards stale inbound bytes, writes `outbound`
    /// in full and polls at the configured interval until the policy matches
    /// or `ceil(deadline / interval)` polls have elapsed. Arbitration state
    /// is restored on every exit path; transport failures are reported to
    /// the error sink and re-raised.
    pub fn execute(
        &self,
        outbound: &[u8],
        policy: &MatchPolicy,
        deadline: Duration,
    ) -> Result<ExchangeOutcome, LinkError> {
        if !self.port.is_open() {
            return Err(LinkError::NotOpen);
        }

        let _guard = self.arbiter.begin_exchange();
        match self.drive(outbound, policy, deadline) {
            Ok(outcome) => {
                tracing::debug!(
                    "exchange finished: {}",
                    if outcome.is_matched() { "matched" } else { "timed out" }
                );
                Ok(outcome)
            }
            Err(err) => {
                self.errors.report(&format!("command exchange aborted: {err}"));
                Err(err)
            }
        }
    }

    fn drive(
        &self,
        outbound: &[u8],
        policy: &MatchPolicy,
        deadline: Duration,
    ) -> Result<ExchangeOutcome, LinkError> {
        // Never match against bytes that were already buffered before this
        // request went out.
        self.port.discard_inbound()?;

        tracing::debug!("writing command frame: {}", hex::encode(outbound));
        self.port.write_all(outbound)?;

        let interval = self.options.poll_interval.max(Duration::from_millis(1));
        let polls = deadline.as_millis().div_ceil(interval.as_millis().max(1));
        let min_len = policy.min_len();
        let mut window: Vec<u8> = Vec::new();

        for _ in 0..polls {
            thread::sleep(interval);
            let available = self.port.bytes_available()?;

            if self.options.cumulative {
                if available > 0 {
                    window.extend(self.port.read_available(available)?);
                }
                if window.len() >= min_len && policy.matches(&window) {
                    return Ok(ExchangeOutcome::Matched(window));
                }
            } else if available >= min_len {
                let batch = self.port.read_available(available)?;
                if policy.matches(&batch) {
                    return Ok(ExchangeOutcome::Matched(batch));
                }
                // Historical behavior: a non-matching batch is dropped, not
                // carried into the next poll.
            }
        }

        Ok(ExchangeOutcome::TimedOut)
    }
}
