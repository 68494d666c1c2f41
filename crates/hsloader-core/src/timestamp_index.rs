//! Exact-timestamp lookup table built once from a finite record stream

use chrono::NaiveDateTime;
use rustc_hash::FxHashMap;

/// Record carrying a zone-less sample timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> &NaiveDateTime;
}

/// Immutable map from timestamp to an optional payload.
///
/// Only records that pass the predicate are indexed. Lookups use exact
/// equality; when several selected records share a timestamp the first one
/// wins.
#[derive(Debug, Clone)]
pub struct TimestampIndex<P = ()> {
    entries: FxHashMap<NaiveDateTime, P>,
}

impl<P> TimestampIndex<P> {
    pub fn build<'a, R>(
        records: impl IntoIterator<Item = &'a R>,
        predicate: impl Fn(&R) -> bool,
        payload: impl Fn(&R) -> P,
    ) -> Self
    where
        R: Timestamped + 'a,
    {
        let mut entries = FxHashMap::default();
        for record in records {
            if predicate(record) {
                entries
                    .entry(*record.timestamp())
                    .or_insert_with(|| payload(record));
            }
        }
        Self { entries }
    }

    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        self.entries.contains_key(ts)
    }

    pub fn get(&self, ts: &NaiveDateTime) -> Option<&P> {
        self.entries.get(ts)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TimestampIndex<()> {
    /// Index without payload: membership only.
    pub fn marks<'a, R>(
        records: impl IntoIterator<Item = &'a R>,
        predicate: impl Fn(&R) -> bool,
    ) -> Self
    where
        R: Timestamped + 'a,
    {
        Self::build(records, predicate, |_| ())
    }
}

impl<P> Default for TimestampIndex<P> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}
