use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the extraction loop and every load task
#[derive(Default, Debug)]
pub struct EtlStats {
    pub pages_read: AtomicU64,
    pub read_failures: AtomicU64,
    pub records_extracted: AtomicU64,
    pub batches_loaded: AtomicU64,
    pub records_loaded: AtomicU64,
    pub failed_writes: AtomicU64,
    pub failed_units: AtomicU64,
}

/// Point-in-time copy of [`EtlStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_read: u64,
    pub read_failures: u64,
    pub records_extracted: u64,
    pub batches_loaded: u64,
    pub records_loaded: u64,
    pub failed_writes: u64,
    pub failed_units: u64,
}

impl EtlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_pages(&self) {
        self.pages_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_read_failures(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records_extracted(&self, count: u64) {
        self.records_extracted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_loaded(&self, records: u64) {
        self.batches_loaded.fetch_add(1, Ordering::Relaxed);
        self.records_loaded.fetch_add(records, Ordering::Relaxed);
    }

    pub fn inc_failed_writes(&self) {
        self.failed_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed_units(&self) {
        self.failed_units.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pages(&self) -> u64 {
        self.pages_read.load(Ordering::Relaxed)
    }

    pub fn read_failures(&self) -> u64 {
        self.read_failures.load(Ordering::Relaxed)
    }

    pub fn records_extracted(&self) -> u64 {
        self.records_extracted.load(Ordering::Relaxed)
    }

    pub fn batches_loaded(&self) -> u64 {
        self.batches_loaded.load(Ordering::Relaxed)
    }

    pub fn records_loaded(&self) -> u64 {
        self.records_loaded.load(Ordering::Relaxed)
    }

    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }

    pub fn failed_units(&self) -> u64 {
        self.failed_units.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            pages_read: self.pages(),
            read_failures: self.read_failures(),
            records_extracted: self.records_extracted(),
            batches_loaded: self.batches_loaded(),
            records_loaded: self.records_loaded(),
            failed_writes: self.failed_writes(),
            failed_units: self.failed_units(),
        }
    }
}
