// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Level-triggered wake-up event.
//!
//! `wait` resolves only while the event is set; `set` while nobody waits
//! is not lost. This is the primitive behind "queue non-empty" and "a free
//! worker was announced".

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct Event {
    state: Mutex<bool>,
    notify: Notify,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        *self.state.lock() = true;
        self.notify.notify_waiters();
    }

    pub fn clear(&self) {
        *self.state.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.state.lock()
    }

    /// Block until the event is set.
    pub async fn wait(&self) {
        loop {
            // Register interest before checking, so a concurrent `set`
            // between the check and the await is not missed.
            let notified = self.notify.notified();
            if *self.state.lock() {
                return;
            }
            notified.await;
        }
    }
}
