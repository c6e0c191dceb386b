//! Single-shot ready signal for replicas
//!
//! Two ways to observe it: a callback installed before the first snapshot,
//! or a watch receiver that resolves as soon as (or if already) it fired.

use std::fmt;
use tokio::sync::watch;

/// Callback run when a replica receives its first snapshot
pub type ReadyHandler = Box<dyn FnOnce() + Send + 'static>;

/// Holds at most one handler and fires at most once
pub struct ReadySignal {
    handler: Option<ReadyHandler>,
    fired: bool,
    notify: watch::Sender<bool>,
}

impl ReadySignal {
    pub fn new() -> Self {
        let (notify, _rx) = watch::channel(false);
        ReadySignal {
            handler: None,
            fired: false,
            notify,
        }
    }

    /// Receiver that flips to `true` when the signal fires
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.notify.subscribe()
    }

    /// Install a handler, replacing any previous one
    ///
    /// Returns false if the signal already fired, in which case the handler
    /// is dropped without being called.
    pub fn set(&mut self, handler: ReadyHandler) -> bool {
        if self.fired {
            return false;
        }
        self.handler = Some(handler);
        true
    }

    pub fn is_set(&self) -> bool {
        self.handler.is_some()
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Fire the signal
    ///
    /// Only the first call has an effect. Returns whether a handler ran.
    pub fn fire(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        self.notify.send_replace(true);
        match self.handler.take() {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReadySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadySignal")
            .field("handler", &self.handler.is_some())
            .field("fired", &self.fired)
            .finish()
    }
}
