use itertools::Itertools;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::record::{StepSolveRecord, Timed};
use crate::step_timer::CfopStep;
use crate::store::{self, KeyValueStore};
use crate::util::mean_duration;

/// Averages that drop the single best and worst value before averaging
pub const TRIMMED_WINDOWS: [usize; 2] = [5, 12];

/// Store keys for a collection and its id counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryKeys {
    pub records: &'static str,
    pub next_id: &'static str,
}

/// Chronological record collection with personal-best tracking and rolling averages
#[derive(Debug, Clone)]
pub struct History<R> {
    keys: HistoryKeys,
    records: Vec<R>,
    next_id: u64,
}

impl<R: Timed> History<R> {
    pub fn new(keys: HistoryKeys) -> Self {
        Self {
            keys,
            records: Vec::new(),
            next_id: 1,
        }
    }

    /// Build from loaded data, repairing ids and the personal-best flag
    pub fn from_parts(keys: HistoryKeys, records: Vec<R>, next_id: u64) -> Self {
        let max_id = records.iter().map(|r| r.id()).max().unwrap_or(0);
        let next_id = if next_id <= max_id {
            warn!(
                key = keys.next_id,
                stored = next_id,
                max_id,
                "next id behind stored records, advancing"
            );
            max_id + 1
        } else {
            next_id
        };

        let mut history = Self {
            keys,
            records,
            next_id,
        };
        history.recompute_personal_best();
        history
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn last(&self) -> Option<&R> {
        self.records.last()
    }

    pub fn get(&self, id: u64) -> Option<&R> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn personal_best(&self) -> Option<&R> {
        self.records.iter().find(|r| r.is_personal_best())
    }

    /// Assign the next id, append, and move the personal-best flag if needed
    pub fn append(&mut self, mut record: R) -> &R {
        record.set_id(self.next_id);
        self.next_id += 1;
        self.records.push(record);
        self.recompute_personal_best();
        debug!(key = self.keys.records, len = self.records.len(), "record appended");
        // Just pushed, so the collection is non-empty.
        &self.records[self.records.len() - 1]
    }

    /// Remove the record with `id`. Returns false when no such record exists.
    pub fn delete(&mut self, id: u64) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id() != id);
        if self.records.len() == before {
            return false;
        }
        self.recompute_personal_best();
        debug!(key = self.keys.records, id, "record deleted");
        true
    }

    pub fn clear_all(&mut self) {
        self.records.clear();
        self.next_id = 1;
        debug!(key = self.keys.records, "history cleared");
    }

    /// Exactly one flag, on the earliest minimum; none when empty
    fn recompute_personal_best(&mut self) {
        let best = self.records.iter().position_min_by_key(|r| r.time());
        for (idx, record) in self.records.iter_mut().enumerate() {
            record.set_personal_best(Some(idx) == best);
        }
    }

    pub fn best(&self) -> Option<Duration> {
        self.records.iter().map(|r| r.time()).min()
    }

    pub fn worst(&self) -> Option<Duration> {
        self.records.iter().map(|r| r.time()).max()
    }

    /// Mean of every record in the collection
    pub fn mean(&self) -> Option<Duration> {
        mean_duration(&self.records.iter().map(|r| r.time()).collect::<Vec<_>>())
    }

    /// Average of the `n` most recent records, None when fewer exist.
    /// Ao5 and Ao12 drop one best and one worst time first.
    pub fn average_of(&self, n: usize) -> Option<Duration> {
        if n == 0 || self.records.len() < n {
            return None;
        }

        let recent: Vec<Duration> = self.records[self.records.len() - n..]
            .iter()
            .map(|r| r.time())
            .collect();

        if TRIMMED_WINDOWS.contains(&n) {
            let sorted: Vec<Duration> = recent.into_iter().sorted().collect();
            mean_duration(&sorted[1..sorted.len() - 1])
        } else {
            mean_duration(&recent)
        }
    }
}

impl<R: Timed + Serialize + DeserializeOwned> History<R> {
    /// Load a collection, skipping records that cannot be decoded
    pub fn load<S: KeyValueStore + ?Sized>(store: &S, keys: HistoryKeys) -> Self {
        let records: Vec<R> = store::load_each(store, keys.records);
        let next_id: u64 = store::load_or(store, keys.next_id, 1);
        Self::from_parts(keys, records, next_id)
    }

    /// Write the collection and its id counter
    pub fn persist<S: KeyValueStore + ?Sized>(&self, store: &S) -> StoreResult<()> {
        store::save_as(store, self.keys.records, &self.records)?;
        store::save_as(store, self.keys.next_id, &self.next_id)
    }
}

impl History<StepSolveRecord> {
    fn splits(&self, step: CfopStep) -> Vec<Duration> {
        self.records.iter().filter_map(|r| r.split(step)).collect()
    }

    /// Mean time of one step across every recorded step solve
    pub fn step_average(&self, step: CfopStep) -> Option<Duration> {
        mean_duration(&self.splits(step))
    }

    pub fn step_best(&self, step: CfopStep) -> Option<Duration> {
        self.splits(step).into_iter().min()
    }
}
