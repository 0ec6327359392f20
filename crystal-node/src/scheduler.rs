//one deferred propagation per actor, scheduling replaces whatever was pending and a replaced or
//cancelled action never runs

use parking_lot::Mutex;
use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::oneshot, time::Instant};

struct Pending {
    id: u64,
    //dropping or firing this wakes the timer task so it can exit early
    _cancel: oneshot::Sender<()>,
}

#[derive(Default)]
pub struct PropagationScheduler {
    slot: Arc<Mutex<Option<Pending>>>,
    generation: AtomicU64,
}

impl std::fmt::Debug for PropagationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropagationScheduler")
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl PropagationScheduler {
    pub fn new() -> Self {
        PropagationScheduler::default()
    }

    pub fn schedule<F, Fut>(&self, delay: Duration, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        //the previous sender is dropped here, which wakes and retires its task
        *self.slot.lock() = Some(Pending { id, _cancel: tx });

        let slot = Arc::clone(&self.slot);
        tokio::spawn(async move {
            tokio::select! {
                _ = rx => return,
                _ = tokio::time::sleep(delay) => {}
            }
            {
                let mut pending = slot.lock();
                match pending.as_ref() {
                    Some(p) if p.id == id => *pending = None,
                    //cancelled or superseded between the wakeup and now
                    _ => return,
                }
            }
            action().await;
        });
    }

    pub fn cancel(&self) {
        self.slot.lock().take();
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Now,
    Defer(Duration),
}

//debounce policy shared by both stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub window: Duration,
    pub flush_delay: Duration,
}

impl RateLimit {
    pub fn new(window: Duration, flush_delay: Duration) -> Self {
        RateLimit {
            window,
            flush_delay,
        }
    }

    pub fn decide(&self, last: Option<Instant>, now: Instant) -> Decision {
        match last {
            Some(at) if now.saturating_duration_since(at) <= self.window => {
                Decision::Defer(self.flush_delay)
            }
            _ => Decision::Now,
        }
    }
}
