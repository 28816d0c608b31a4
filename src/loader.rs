use crate::record::Batch;
use crate::serializer::Serializer;
use crate::stats::EtlStats;
use crate::writer::Writer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, warn};

/// Serializes batches and appends them to a shared sink.
///
/// Safe to call from many tasks at once. Two separate guards are involved:
///
/// - `header_written` decides which caller is first. `swap` makes the
///   check-and-set a single atomic step, so exactly one `load` ever sees
///   `false`, whatever the interleaving.
/// - `writer` is locked only around the sink call itself. Serialization runs
///   outside it, in parallel across callers.
///
/// Neither is held while acquiring the other.
pub struct Loader<S, W> {
    serializer: S,
    writer: Mutex<W>,
    header_written: AtomicBool,
    finished: AtomicBool,
    stats: Arc<EtlStats>,
}

impl<S: Serializer, W: Writer> Loader<S, W> {
    pub fn new(writer: W, serializer: S) -> Self {
        Self {
            serializer,
            writer: Mutex::new(writer),
            header_written: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            stats: Arc::new(EtlStats::new()),
        }
    }

    pub(crate) fn with_stats(mut self, stats: Arc<EtlStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Writes `batch`, with the serializer's header if this is the first load.
    ///
    /// A failed write is logged along with the lost fragment and otherwise
    /// ignored; other loads and the run carry on.
    pub fn load(&self, batch: &Batch) {
        let first = !self.header_written.swap(true, Ordering::AcqRel);

        let fragment = if first {
            self.serializer.serialize_first(batch)
        } else {
            self.serializer.serialize(batch)
        };

        let result = self.lock_writer().write(&fragment);
        match result {
            Ok(()) => {
                self.stats.add_loaded(batch.len() as u64);
                debug!(records = batch.len(), first, "Batch loaded");
            }
            Err(e) => {
                self.stats.inc_failed_writes();
                error!(error = %e, records = batch.len(), "Failed to write batch");
                error!("Lost data: {fragment}");
            }
        }
    }

    /// Writes the terminal fragment and closes the sink.
    ///
    /// Only the first call does anything. A failed terminal write is ignored;
    /// the sink is closed regardless.
    pub fn finish(&self) {
        if self.finished.swap(true, Ordering::AcqRel) {
            warn!("Loader already finished, ignoring repeated finish");
            return;
        }

        let terminal = self.serializer.terminal_fragment();
        let mut writer = self.lock_writer();
        if !terminal.is_empty() {
            if let Err(e) = writer.write(&terminal) {
                warn!(error = %e, "Failed to write terminal fragment");
            }
        }
        writer.close();
    }

    pub fn header_written(&self) -> bool {
        self.header_written.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> &Arc<EtlStats> {
        &self.stats
    }

    /// Consumes the loader and hands back the sink.
    pub fn into_writer(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // A panic while holding the lock leaves the sink itself intact.
    fn lock_writer(&self) -> MutexGuard<'_, W> {
        self.writer.lock().unwrap_or_else(|poisoned| {
            warn!("Output lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
