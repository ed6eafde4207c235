//! Ephemeral user-facing errors.
//!
//! A notice is shown until its display window passes, then it clears itself.
//! Raising a new notice replaces the current one and restarts the window.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub raised_at: Instant,
}

#[derive(Default)]
struct Slot {
    current: Option<Notice>,
    expiry: Option<CancellationToken>,
}

/// Holds at most one notice. Must be used inside a tokio runtime.
#[derive(Clone)]
pub struct NoticeBoard {
    window: Duration,
    slot: Arc<Mutex<Slot>>,
}

impl NoticeBoard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn raise(&self, message: impl Into<String>) {
        let notice = Notice {
            message: message.into(),
            raised_at: Instant::now(),
        };
        let cancel = CancellationToken::new();

        {
            let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(previous) = slot.expiry.replace(cancel.clone()) {
                previous.cancel();
            }
            slot.current = Some(notice);
        }

        let slot = Arc::clone(&self.slot);
        let window = self.window;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(window) => {
                    let mut slot = slot.lock().unwrap_or_else(|p| p.into_inner());
                    slot.current = None;
                    slot.expiry = None;
                }
            }
        });
    }

    pub fn current(&self) -> Option<Notice> {
        self.slot
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .current
            .clone()
    }

    /// Clears the notice now and stops its timer.
    pub fn dismiss(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(expiry) = slot.expiry.take() {
            expiry.cancel();
        }
        slot.current = None;
    }
}
