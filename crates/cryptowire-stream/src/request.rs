/*
[INPUT]:  In-flight snapshot requests
[OUTPUT]: Monotonic request tokens; stale results filtered out
[POS]:    Request facade - client-side disregard of superseded results
[UPDATE]: When changing how overlapping requests are reconciled
*/

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one issued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

/// Issues tokens for one logical query so only the newest result is applied.
///
/// Facade calls cannot be cancelled once started; callers compare tokens instead.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    latest: Arc<AtomicU64>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding all earlier tokens
    pub fn issue(&self) -> RequestToken {
        RequestToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }

    /// Await `request`; `None` if a newer request was issued meanwhile.
    pub async fn run_latest<F, T>(&self, request: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let token = self.issue();
        let output = request.await;
        self.is_current(token).then_some(output)
    }
}
