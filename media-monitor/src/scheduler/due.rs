//! Per-server next-due bookkeeping.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::ServerId;

/// Sleep used when no server is enabled.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(15);

/// Shortest sleep between two loop iterations while servers are scheduled.
pub const DEFAULT_MIN_WAKE_DELAY: Duration = Duration::from_secs(1);

/// Map from enabled server to the instant its next refresh is due.
///
/// Entries exist only for servers in the last reconciled enabled set. A
/// server seen for the first time is due immediately.
#[derive(Debug, Clone)]
pub struct DueSchedule {
    entries: HashMap<ServerId, Instant>,
    idle_interval: Duration,
    min_wake_delay: Duration,
}

impl DueSchedule {
    pub fn new(idle_interval: Duration, min_wake_delay: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            idle_interval,
            min_wake_delay,
        }
    }

    /// Align the schedule with the currently enabled servers.
    ///
    /// Entries for servers no longer enabled (disabled or deleted) are
    /// dropped; servers without an entry become due at `now`. Existing
    /// entries keep their due time.
    pub fn reconcile(&mut self, enabled: impl IntoIterator<Item = ServerId>, now: Instant) {
        let enabled: HashSet<ServerId> = enabled.into_iter().collect();
        self.entries.retain(|id, _| enabled.contains(id));
        for id in enabled {
            self.entries.entry(id).or_insert(now);
        }
    }

    /// Servers whose due time is at or before `now`, soonest first.
    pub fn due(&self, now: Instant) -> Vec<ServerId> {
        let mut due: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(id, at)| (*id, *at))
            .collect();
        due.sort_by_key(|(_, at)| *at);
        due.into_iter().map(|(id, _)| id).collect()
    }

    /// Push a server's next refresh a full interval past `now`.
    ///
    /// Applied after failed refreshes too. Ignored for servers that are not
    /// scheduled.
    pub fn advance(&mut self, id: ServerId, interval: Duration, now: Instant) {
        if let Some(at) = self.entries.get_mut(&id) {
            *at = now + interval;
        }
    }

    /// How long the loop may sleep before its next decision point.
    pub fn next_wake(&self, now: Instant) -> Duration {
        match self.entries.values().min() {
            None => self.idle_interval,
            Some(earliest) => earliest
                .saturating_duration_since(now)
                .max(self.min_wake_delay),
        }
    }

    pub fn due_at(&self, id: ServerId) -> Option<Instant> {
        self.entries.get(&id).copied()
    }

    pub fn contains(&self, id: ServerId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DueSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_INTERVAL, DEFAULT_MIN_WAKE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_new_servers_are_due_immediately() {
        let now = Instant::now();
        let a = ServerId::new();
        let b = ServerId::new();
        let mut schedule = DueSchedule::default();

        schedule.reconcile([a, b], now);

        assert_eq!(schedule.len(), 2);
        let mut due = schedule.due(now);
        due.sort_by_key(|id| id.to_string());
        let mut expected = vec![a, b];
        expected.sort_by_key(|id| id.to_string());
        assert_eq!(due, expected);
    }

    #[test]
    fn test_reconcile_drops_missing_and_keeps_existing() {
        let now = Instant::now();
        let kept = ServerId::new();
        let dropped = ServerId::new();
        let mut schedule = DueSchedule::default();
        schedule.reconcile([kept, dropped], now);
        schedule.advance(kept, MINUTE, now);

        let later = now + Duration::from_secs(5);
        schedule.reconcile([kept], later);

        assert!(!schedule.contains(dropped));
        assert_eq!(schedule.due_at(kept), Some(now + MINUTE));
    }

    #[test]
    fn test_reenabled_server_is_due_again() {
        let now = Instant::now();
        let id = ServerId::new();
        let mut schedule = DueSchedule::default();
        schedule.reconcile([id], now);
        schedule.advance(id, MINUTE, now);

        schedule.reconcile(Vec::<ServerId>::new(), now);
        assert!(schedule.is_empty());

        let later = now + Duration::from_secs(1);
        schedule.reconcile([id], later);
        assert_eq!(schedule.due(later), vec![id]);
    }

    #[test]
    fn test_advance_moves_past_now() {
        let now = Instant::now();
        let id = ServerId::new();
        let mut schedule = DueSchedule::default();
        schedule.reconcile([id], now);

        schedule.advance(id, MINUTE, now);

        assert!(schedule.due(now).is_empty());
        assert!(schedule.due(now + MINUTE - Duration::from_millis(1)).is_empty());
        assert_eq!(schedule.due(now + MINUTE), vec![id]);
    }

    #[test]
    fn test_advance_ignores_unscheduled() {
        let now = Instant::now();
        let mut schedule = DueSchedule::default();
        schedule.advance(ServerId::new(), MINUTE, now);
        assert!(schedule.is_empty());
    }

    #[test]
    fn test_due_is_soonest_first() {
        let now = Instant::now();
        let early = ServerId::new();
        let late = ServerId::new();
        let mut schedule = DueSchedule::default();
        schedule.reconcile([early, late], now);
        schedule.advance(late, Duration::from_secs(20), now);
        schedule.advance(early, Duration::from_secs(10), now);

        assert_eq!(schedule.due(now + MINUTE), vec![early, late]);
    }

    #[test]
    fn test_idle_wake_when_nothing_scheduled() {
        let schedule = DueSchedule::default();
        assert_eq!(schedule.next_wake(Instant::now()), DEFAULT_IDLE_INTERVAL);
    }

    #[rstest]
    #[case::far_future(Duration::from_secs(90), Duration::from_secs(90))]
    #[case::just_ahead(Duration::from_millis(200), DEFAULT_MIN_WAKE_DELAY)]
    #[case::already_due(Duration::ZERO, DEFAULT_MIN_WAKE_DELAY)]
    fn test_next_wake_is_floored(#[case] ahead: Duration, #[case] expected: Duration) {
        let now = Instant::now();
        let id = ServerId::new();
        let mut schedule = DueSchedule::default();
        schedule.reconcile([id], now);
        schedule.advance(id, ahead, now);

        assert_eq!(schedule.next_wake(now), expected);
    }

    #[test]
    fn test_next_wake_uses_earliest_entry() {
        let now = Instant::now();
        let a = ServerId::new();
        let b = ServerId::new();
        let mut schedule = DueSchedule::default();
        schedule.reconcile([a, b], now);
        schedule.advance(a, Duration::from_secs(120), now);
        schedule.advance(b, Duration::from_secs(30), now);

        assert_eq!(schedule.next_wake(now), Duration::from_secs(30));
    }

    #[test]
    fn test_past_due_entry_clamps_to_floor() {
        let now = Instant::now();
        let id = ServerId::new();
        let mut schedule = DueSchedule::new(DEFAULT_IDLE_INTERVAL, Duration::from_millis(250));
        schedule.reconcile([id], now);

        // Refresh latency put us well past the due time.
        let later = now + Duration::from_secs(10);
        assert_eq!(schedule.next_wake(later), Duration::from_millis(250));
    }
}
