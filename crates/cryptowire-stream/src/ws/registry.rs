/*
[INPUT]:  Channel names, subscriber callbacks, decoded payloads
[OUTPUT]: Ordered, isolated fan-out of payloads to channel subscribers
[POS]:    WebSocket layer - subscription bookkeeping and dispatch
[UPDATE]: When changing delivery ordering or callback isolation rules
*/

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

/// Subscriber callback. Identity is the `Arc` allocation, not the closure body.
pub type Callback = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Wrap a closure as a [`Callback`]
pub fn callback<F>(f: F) -> Callback
where
    F: Fn(&serde_json::Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Outcome of a single dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Channel name to ordered subscriber list.
///
/// Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    channels: Arc<Mutex<HashMap<String, Vec<Callback>>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback` to `channel`. Returns `true` when the channel entry was created.
    ///
    /// The same callback registered twice is invoked twice per dispatch.
    pub fn subscribe(&self, channel: &str, callback: Callback) -> bool {
        let mut channels = self.lock();
        match channels.get_mut(channel) {
            Some(subscribers) => {
                subscribers.push(callback);
                false
            }
            None => {
                channels.insert(channel.to_string(), vec![callback]);
                true
            }
        }
    }

    /// Remove the first registration of `callback` on `channel`.
    pub fn unsubscribe(&self, channel: &str, callback: &Callback) -> bool {
        let mut channels = self.lock();
        let Some(subscribers) = channels.get_mut(channel) else {
            return false;
        };
        match subscribers.iter().position(|existing| Arc::ptr_eq(existing, callback)) {
            Some(index) => {
                subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Deliver `payload` to every subscriber of `channel` in registration order.
    ///
    /// Iterates a snapshot taken before the first call, so callbacks may (un)subscribe
    /// re-entrantly. A panicking callback is counted as failed and delivery continues.
    pub fn dispatch(&self, channel: &str, payload: &serde_json::Value) -> DispatchReport {
        let snapshot: Vec<Callback> = match self.lock().get(channel) {
            Some(subscribers) => subscribers.clone(),
            None => return DispatchReport::default(),
        };

        let mut report = DispatchReport::default();
        for (index, subscriber) in snapshot.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| subscriber(payload))) {
                Ok(()) => report.delivered += 1,
                Err(panic) => {
                    report.failed += 1;
                    warn!(
                        channel,
                        subscriber_index = index,
                        reason = %panic_message(panic.as_ref()),
                        "subscriber callback panicked"
                    );
                }
            }
        }
        report
    }

    /// Drop every channel and subscriber
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Channel names with an entry, sorted
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.lock().get(channel).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Callback>>> {
        // Callbacks never run under the lock, so a poisoned map is still consistent.
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = self.lock();
        let mut map = f.debug_map();
        for (channel, subscribers) in channels.iter() {
            map.entry(channel, &subscribers.len());
        }
        map.finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
