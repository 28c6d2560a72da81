//! In-memory byte channel
//!
//! A loopback implementation of [`ByteStreamPort`] for tests, simulations and
//! examples. In echo mode every written frame is immediately queued back on
//! the inbound side; in silent mode the test script plays the device and
//! injects replies with [`LoopbackPort::push_inbound`].

use crate::core::port::{ByteStreamPort, DataReadyHook, PortError};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// In-memory byte channel with optional write echo.
pub struct LoopbackPort {
    inner: Mutex<Inner>,
    hook: Mutex<Option<DataReadyHook>>,
}

struct Inner {
    open: bool,
    echo: bool,
    inbound: VecDeque<u8>,
    written: Vec<u8>,
}

impl LoopbackPort {
    /// Create an echoing loopback: written bytes come straight back.
    pub fn new() -> Self {
        Self::with_echo(true)
    }

    /// Create a silent loopback: nothing comes back unless the test injects
    /// it with [`Self::push_inbound`].
    pub fn silent() -> Self {
        Self::with_echo(false)
    }

    fn with_echo(echo: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                open: false,
                echo,
                inbound: VecDeque::new(),
                written: Vec::new(),
            }),
            hook: Mutex::new(None),
        }
    }

    /// Queue bytes on the inbound side, as if the device had sent them, and
    /// fire the data-ready hook.
    ///
    /// An empty `bytes` fires the hook without queueing anything, simulating
    /// a spurious notification.
    pub fn push_inbound(&self, bytes: &[u8]) {
        {
            let mut inner = self.inner.lock();
            inner.inbound.extend(bytes.iter().copied());
        }
        self.fire_hook();
    }

    /// Take everything written to the channel so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.lock().written)
    }

    fn fire_hook(&self) {
        let hook = self.hook.lock().clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl Default for LoopbackPort {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteStreamPort for LoopbackPort {
    fn open(&self) -> Result<(), PortError> {
        self.inner.lock().open = true;
        Ok(())
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        inner.open = false;
        inner.inbound.clear();
    }

    fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    fn write_all(&self, bytes: &[u8]) -> Result<(), PortError> {
        let echoed = {
            let mut inner = self.inner.lock();
            if !inner.open {
                return Err(PortError::NotOpen);
            }
            inner.written.extend_from_slice(bytes);
            if inner.echo {
                inner.inbound.extend(bytes.iter().copied());
                true
            } else {
                false
            }
        };
        if echoed {
            self.fire_hook();
        }
        Ok(())
    }

    fn bytes_available(&self) -> Result<usize, PortError> {
        let inner = self.inner.lock();
        if !inner.open {
            return Err(PortError::NotOpen);
        }
        Ok(inner.inbound.len())
    }

    fn read_available(&self, max: usize) -> Result<Vec<u8>, PortError> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(PortError::NotOpen);
        }
        let take = max.min(inner.inbound.len());
        Ok(inner.inbound.drain(..take).collect())
    }

    fn discard_inbound(&self) -> Result<(), PortError> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(PortError::NotOpen);
        }
        inner.inbound.clear();
        Ok(())
    }

    fn set_data_ready_hook(&self, hook: DataReadyHook) {
        *self.hook.lock() = Some(hook);
    }
}
