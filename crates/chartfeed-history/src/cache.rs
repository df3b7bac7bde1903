//! Last historical bar per symbol.

use chartfeed_core::Bar;
use dashmap::DashMap;

/// Most recent historical bar keyed by the symbol's full name.
///
/// Entries are overwritten on each write and live for the process lifetime.
#[derive(Debug, Default)]
pub struct LastBarCache {
    bars: DashMap<String, Bar>,
}

impl LastBarCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, full_name: &str) -> Option<Bar> {
        self.bars.get(full_name).map(|entry| *entry)
    }

    pub fn set(&self, full_name: impl Into<String>, bar: Bar) {
        self.bars.insert(full_name.into(), bar);
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
