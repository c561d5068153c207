//!
//! The PerfCounters module contains everything associated with the "perf_counters" feature
//!

#[cfg(feature = "perf_counters")]
use core::cell::Cell;

/// All of the performance counters to measure the behavior of the system
///
/// NOTE: In order to get valid data, you must enable the `perf_counters` feature in the `Cargo.toml` file
/// with an entry similar to this:
///
/// ```toml
/// [dependencies]
/// book_registry = { version = "0.1.0", features = ["perf_counters"] }
/// ```
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PerfCounterFields {

    /// The number of point reads issued against the database
    pub db_read_count : usize,

    /// The number of write batches committed.  Every successful mutation commits exactly one
    pub batch_commit_count : usize,

    /// The number of times a deletion moved the last book in the index into the vacated slot
    ///
    /// Deleting the book in the last position doesn't move anything, so this is at most the number of
    /// deletions.
    pub compaction_move_count : usize,

    /// The number of calls rejected with `NotOwner` or `NotAdmin`
    pub rejected_call_count : usize,
}

impl PerfCounterFields {
    pub fn new() -> Self {
        Self {
            db_read_count : 0,
            batch_commit_count : 0,
            compaction_move_count : 0,
            rejected_call_count : 0,
        }
    }
}

/// Performance counters for measuring [Registry](crate::Registry) activity.
///
/// These counters don't reflect stats and totals across the whole database, rather they can
/// be reset and therefore used to measure individual operations or sequences of operations.
#[cfg(feature = "perf_counters")]
pub struct PerfCounters(Cell<PerfCounterFields>);

#[cfg(feature = "perf_counters")]
impl PerfCounters {
    pub fn new() -> Self {
        Self(Cell::new(PerfCounterFields::new()))
    }
    pub fn reset(&self) {
        self.set(PerfCounterFields::new())
    }
    pub fn update<F : Fn(&mut PerfCounterFields)>(&self, func : F) {
        let mut fields = self.get();
        func(&mut fields);
        self.set(fields);
    }
    pub fn get(&self) -> PerfCounterFields {
        self.0.get()
    }
    pub fn set(&self, fields : PerfCounterFields) {
        self.0.set(fields);
    }
}

#[cfg(not(feature = "perf_counters"))]
pub struct PerfCounters();

#[cfg(not(feature = "perf_counters"))]
impl PerfCounters {
    pub fn new() -> Self {
        Self()
    }
    pub fn reset(&self) {
    }
    pub fn update<F : Fn(&mut PerfCounterFields)>(&self, _func : F) {
    }
    pub fn get(&self) -> PerfCounterFields {
        PerfCounterFields::new()
    }
}
