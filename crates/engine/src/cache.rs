//! In-process caches for the write path.
//!
//! Both caches are bounded and expire entries after ten minutes. Account
//! currencies are dropped on any account mutation. Gap-free ranges are only
//! replaced by a range that covers more days.

use std::time::Duration;

use chrono::NaiveDate;
use moka::sync::Cache;

const CAPACITY: u64 = 1000;
const TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone)]
pub(crate) struct Caches {
    account_currency: Cache<i32, String>,
    gap_free: Cache<i32, (NaiveDate, NaiveDate)>,
}

impl Default for Caches {
    fn default() -> Self {
        Self {
            account_currency: Cache::builder()
                .max_capacity(CAPACITY)
                .time_to_live(TTL)
                .build(),
            gap_free: Cache::builder()
                .max_capacity(CAPACITY)
                .time_to_live(TTL)
                .build(),
        }
    }
}

impl std::fmt::Debug for Caches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caches")
            .field("account_currency", &self.account_currency.entry_count())
            .field("gap_free", &self.gap_free.entry_count())
            .finish()
    }
}

impl Caches {
    pub(crate) fn account_currency(&self, account_id: i32) -> Option<String> {
        self.account_currency.get(&account_id)
    }

    pub(crate) fn remember_account_currency(&self, account_id: i32, currency: &str) {
        self.account_currency
            .insert(account_id, currency.to_string());
    }

    pub(crate) fn invalidate_account(&self, account_id: i32) {
        self.account_currency.invalidate(&account_id);
        self.gap_free.invalidate(&account_id);
    }

    /// `true` when daily snapshots for `account_id` are known to exist for
    /// every day in `from..=to`.
    pub(crate) fn is_gap_free(&self, account_id: i32, from: NaiveDate, to: NaiveDate) -> bool {
        self.gap_free
            .get(&account_id)
            .is_some_and(|(start, end)| start <= from && end >= to)
    }

    pub(crate) fn record_gap_free(&self, account_id: i32, from: NaiveDate, to: NaiveDate) {
        let range = match self.gap_free.get(&account_id) {
            Some((start, end)) if start <= from && end >= to => return,
            // Only merge when the ranges touch; otherwise the new one wins.
            Some((start, end)) if from <= end && to >= start => (start.min(from), end.max(to)),
            _ => (from, to),
        };
        self.gap_free.insert(account_id, range);
    }

    pub(crate) fn clear(&self) {
        self.account_currency.invalidate_all();
        self.gap_free.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn gap_free_ranges_only_grow() {
        let caches = Caches::default();
        caches.record_gap_free(1, day(10), day(20));
        assert!(caches.is_gap_free(1, day(12), day(20)));
        assert!(!caches.is_gap_free(1, day(9), day(20)));

        caches.record_gap_free(1, day(12), day(15));
        assert!(caches.is_gap_free(1, day(10), day(20)));

        caches.record_gap_free(1, day(5), day(12));
        assert!(caches.is_gap_free(1, day(5), day(20)));
    }

    #[test]
    fn invalidate_account_drops_both_entries() {
        let caches = Caches::default();
        caches.remember_account_currency(3, "UAH");
        caches.record_gap_free(3, day(1), day(2));
        assert_eq!(caches.account_currency(3), Some("UAH".to_string()));
        caches.invalidate_account(3);
        assert_eq!(caches.account_currency(3), None);
        assert!(!caches.is_gap_free(3, day(1), day(2)));
    }
}
