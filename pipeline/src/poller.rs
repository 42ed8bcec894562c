use crate::snapshot::{
    Counters,
    Gauges,
    Snapshot,
};
use std::{
    fmt,
    sync::{
        Mutex,
        PoisonError,
        RwLock,
    },
};
use tokio::sync::watch;

/// Fills a source's live maps.
///
/// Gauges are overwritten, counters are added to. A sampler never fails: a
/// metric that cannot be read is simply left out. The maps must not be kept
/// beyond the call.
pub trait Sampler: Send {
    fn sample(&mut self, gauges: &mut Gauges, counters: &mut Counters);
}

impl<F> Sampler for F
where
    F: FnMut(&mut Gauges, &mut Counters) + Send,
{
    fn sample(&mut self, gauges: &mut Gauges, counters: &mut Counters) {
        self(gauges, counters)
    }
}

#[derive(Default)]
struct Live {
    polls: u64,
    snapshot: Snapshot,
}

/// Owns the live snapshot of one metric source.
///
/// `poll` takes the write lock only for the duration of the sampler call,
/// `get` copies under the read lock. The ready signal flips to `true` once the
/// first poll has finished and never flips back.
pub struct Poller {
    name: String,
    sampler: Mutex<Box<dyn Sampler>>,
    live: RwLock<Live>,
    ready: watch::Sender<bool>,
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("name", &self.name)
            .field("ready", &*self.ready.borrow())
            .finish_non_exhaustive()
    }
}

impl Poller {
    pub fn new(name: impl Into<String>, sampler: impl Sampler + 'static) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            name: name.into(),
            sampler: Mutex::new(Box::new(sampler)),
            live: RwLock::new(Live::default()),
            ready,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the sampler against the live maps and returns the new poll count.
    pub fn poll(&self) -> u64 {
        // A sampler that panicked leaves plain maps behind, they stay usable.
        let mut sampler = self.sampler.lock().unwrap_or_else(PoisonError::into_inner);
        let polls = {
            let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
            let Live { polls, snapshot } = &mut *live;
            sampler.sample(&mut snapshot.gauges, &mut snapshot.counters);
            *polls += 1;
            *polls
        };
        self.ready.send_replace(true);
        polls
    }

    /// The current poll count and an independent copy of the live maps.
    pub fn get(&self) -> (u64, Snapshot) {
        let live = self.live.read().unwrap_or_else(PoisonError::into_inner);
        (live.polls, live.snapshot.clone())
    }

    pub fn ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }
}
