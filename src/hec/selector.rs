use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use tracing::warn;

use crate::hec::destination::{Destination, DestinationPool};

/// Selection policy, parsed once at startup and fixed for the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BalanceStrategy {
    FirstAvailable,
    Sticky,
    Random,
    RoundRobin,
}

impl BalanceStrategy {
    /// Unknown names fall back to first-available with a warning.
    pub fn parse(name: &str) -> Self {
        match name {
            "first_available" => BalanceStrategy::FirstAvailable,
            "sticky" => BalanceStrategy::Sticky,
            "random" => BalanceStrategy::Random,
            "roundrobin" => BalanceStrategy::RoundRobin,
            other => {
                warn!("Unknown load balance strategy: {}. Using first_available", other);
                BalanceStrategy::FirstAvailable
            }
        }
    }
}

struct SelectorState {
    cursor: usize,
    sticky_down_since: Option<Instant>,
}

/// Picks the destination for the next batch from current pool health plus
/// internal cursor state. Selection never performs I/O.
pub struct DestinationSelector {
    strategy: BalanceStrategy,
    sticky_ttl: Duration,
    state: Mutex<SelectorState>,
}

impl DestinationSelector {
    pub fn new(strategy: BalanceStrategy, sticky_ttl: Duration) -> Self {
        DestinationSelector {
            strategy,
            sticky_ttl,
            state: Mutex::new(SelectorState {
                cursor: 0,
                sticky_down_since: None,
            }),
        }
    }

    pub fn strategy(&self) -> BalanceStrategy {
        self.strategy
    }

    pub fn select(&self, pool: &DestinationPool) -> Option<Arc<Destination>> {
        let destinations = pool.destinations();
        if destinations.is_empty() {
            return None;
        }

        match self.strategy {
            BalanceStrategy::FirstAvailable => Self::first_available(destinations),
            BalanceStrategy::Sticky => self.sticky(destinations),
            BalanceStrategy::Random => Self::random(destinations),
            BalanceStrategy::RoundRobin => self.round_robin(destinations),
        }
    }

    fn first_available(destinations: &[Arc<Destination>]) -> Option<Arc<Destination>> {
        destinations.iter().find(|d| d.is_healthy()).cloned()
    }

    /// The cursor holds its position while the pinned destination is healthy
    /// or only briefly down; it advances one slot after the TTL of observed
    /// downtime has elapsed.
    fn sticky(&self, destinations: &[Arc<Destination>]) -> Option<Arc<Destination>> {
        let mut state = self.state.lock().unwrap();
        if state.cursor >= destinations.len() {
            state.cursor = 0;
        }

        let current = &destinations[state.cursor];
        if current.is_healthy() {
            state.sticky_down_since = None;
            return Some(Arc::clone(current));
        }

        match state.sticky_down_since {
            None => {
                state.sticky_down_since = Some(Instant::now());
                None
            }
            Some(since) if since.elapsed() >= self.sticky_ttl => {
                state.cursor = (state.cursor + 1) % destinations.len();
                state.sticky_down_since = None;

                let next = &destinations[state.cursor];
                if next.is_healthy() {
                    Some(Arc::clone(next))
                } else {
                    None
                }
            }
            Some(_) => None,
        }
    }

    fn random(destinations: &[Arc<Destination>]) -> Option<Arc<Destination>> {
        let healthy: Vec<&Arc<Destination>> =
            destinations.iter().filter(|d| d.is_healthy()).collect();

        healthy
            .choose(&mut rand::thread_rng())
            .map(|d| Arc::clone(d))
    }

    /// Advance the shared cursor on every call, skipping unhealthy slots for
    /// at most one full lap.
    fn round_robin(&self, destinations: &[Arc<Destination>]) -> Option<Arc<Destination>> {
        let mut state = self.state.lock().unwrap();
        if state.cursor >= destinations.len() {
            state.cursor = 0;
        }

        for _ in 0..destinations.len() {
            let index = state.cursor;
            state.cursor = (state.cursor + 1) % destinations.len();

            if destinations[index].is_healthy() {
                return Some(Arc::clone(&destinations[index]));
            }
        }

        None
    }
}
