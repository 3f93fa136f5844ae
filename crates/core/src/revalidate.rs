//! Revalidation gating.
//!
//! Every stimulus, automatic or manual, goes through one gate: a key is
//! fetched only if it has never been fetched or if its last fetch started at
//! least `deduping_interval` ago. Manual refreshes get no bypass.

use std::time::Duration;

use tokio::time::Instant;

use crate::cache::CacheEntry;
use crate::config::SwrOptions;

/// What asked for a revalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stimulus {
    /// A consumer bound to the key for the first time.
    Mount,
    /// The polling timer fired.
    AutomaticTick,
    /// Explicit refresh or retry.
    ManualTrigger,
    /// The consumer regained foreground.
    Focus,
}

/// Per-key revalidation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Never fetched.
    Idle,
    /// Fetched, outside the dedupe window.
    Fresh,
    /// Fetched, inside the dedupe window.
    Cooling,
    /// A fetch is in flight.
    Validating,
}

/// Controller verdict for one stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Start a new fetch.
    Fetch,
    /// Attach to the fetch already in flight.
    Join,
    /// Inside the dedupe window: keep the cached entry.
    Dedupe,
    /// The stimulus is disabled by configuration.
    Ignore,
}

#[derive(Debug, Clone, Copy)]
pub struct RevalidationController {
    options: SwrOptions,
}

impl RevalidationController {
    pub fn new(options: SwrOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SwrOptions {
        &self.options
    }

    /// Whether `stimulus` takes part in revalidation at all.
    pub fn accepts(&self, stimulus: Stimulus) -> bool {
        match stimulus {
            Stimulus::Focus => self.options.revalidate_on_focus,
            Stimulus::Mount | Stimulus::AutomaticTick | Stimulus::ManualTrigger => true,
        }
    }

    pub fn state<T>(&self, entry: Option<&CacheEntry<T>>, in_flight: bool, now: Instant) -> KeyState {
        if in_flight {
            return KeyState::Validating;
        }
        match entry.and_then(|e| e.last_fetch_started_at) {
            None => KeyState::Idle,
            Some(started) if now.saturating_duration_since(started) < self.options.deduping_interval => {
                KeyState::Cooling
            }
            Some(_) => KeyState::Fresh,
        }
    }

    pub fn decide(&self, stimulus: Stimulus, state: KeyState) -> Decision {
        if !self.accepts(stimulus) {
            return Decision::Ignore;
        }
        match state {
            KeyState::Idle | KeyState::Fresh => Decision::Fetch,
            KeyState::Validating => Decision::Join,
            KeyState::Cooling => Decision::Dedupe,
        }
    }

    /// Time left in the dedupe window, zero once it has passed.
    pub fn cooldown_remaining<T>(&self, entry: Option<&CacheEntry<T>>, now: Instant) -> Duration {
        entry
            .and_then(|e| e.last_fetch_started_at)
            .map(|started| self.options.deduping_interval.saturating_sub(now.saturating_duration_since(started)))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> RevalidationController {
        RevalidationController::new(SwrOptions::default())
    }

    fn fetched_at(at: Instant) -> CacheEntry<u32> {
        CacheEntry { last_fetch_started_at: Some(at), ..Default::default() }
    }

    #[test]
    fn test_idle_always_fetches() {
        let c = controller();
        let state = c.state::<u32>(None, false, Instant::now());
        assert_eq!(state, KeyState::Idle);
        assert_eq!(c.decide(Stimulus::Mount, state), Decision::Fetch);
        assert_eq!(c.decide(Stimulus::ManualTrigger, state), Decision::Fetch);
    }

    #[test]
    fn test_entry_without_fetch_is_idle() {
        let entry = CacheEntry::<u32>::default();
        assert_eq!(controller().state(Some(&entry), false, Instant::now()), KeyState::Idle);
    }

    #[test]
    fn test_manual_trigger_inside_window_is_deduped() {
        let c = controller();
        let start = Instant::now();
        let entry = fetched_at(start);
        let state = c.state(Some(&entry), false, start + Duration::from_secs(2));
        assert_eq!(state, KeyState::Cooling);
        assert_eq!(c.decide(Stimulus::ManualTrigger, state), Decision::Dedupe);
        assert_eq!(c.decide(Stimulus::AutomaticTick, state), Decision::Dedupe);
    }

    #[test]
    fn test_window_boundary_is_fresh() {
        let c = controller();
        let start = Instant::now();
        let entry = fetched_at(start);
        assert_eq!(c.state(Some(&entry), false, start + Duration::from_millis(9_999)), KeyState::Cooling);
        assert_eq!(c.state(Some(&entry), false, start + Duration::from_secs(10)), KeyState::Fresh);
        assert_eq!(c.decide(Stimulus::ManualTrigger, KeyState::Fresh), Decision::Fetch);
    }

    #[test]
    fn test_in_flight_joins() {
        let c = controller();
        let start = Instant::now();
        let entry = fetched_at(start);
        let state = c.state(Some(&entry), true, start);
        assert_eq!(state, KeyState::Validating);
        assert_eq!(c.decide(Stimulus::ManualTrigger, state), Decision::Join);
    }

    #[test]
    fn test_focus_ignored_unless_enabled() {
        assert_eq!(controller().decide(Stimulus::Focus, KeyState::Fresh), Decision::Ignore);

        let c = RevalidationController::new(SwrOptions { revalidate_on_focus: true, ..Default::default() });
        assert_eq!(c.decide(Stimulus::Focus, KeyState::Fresh), Decision::Fetch);
        assert_eq!(c.decide(Stimulus::Focus, KeyState::Cooling), Decision::Dedupe);
    }

    #[test]
    fn test_cooldown_remaining() {
        let c = controller();
        let start = Instant::now();
        let entry = fetched_at(start);
        assert_eq!(c.cooldown_remaining(Some(&entry), start + Duration::from_secs(4)), Duration::from_secs(6));
        assert_eq!(c.cooldown_remaining(Some(&entry), start + Duration::from_secs(12)), Duration::ZERO);
        assert_eq!(c.cooldown_remaining::<u32>(None, start), Duration::ZERO);
    }
}
