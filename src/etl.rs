use crate::extractor::Extractor;
use crate::loader::Loader;
use crate::parser::StringParser;
use crate::reader::Reader;
use crate::serializer::Serializer;
use crate::stats::{EtlStats, RunSummary};
use crate::transform::Transformation;
use crate::writer::Writer;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Drives one extract → transform → load run.
///
/// Extraction is sequential on the calling task. Each extracted page is
/// handed to the blocking pool as an independent transform+load unit, so
/// the next page is fetched while earlier ones are still being written.
/// Once extraction stops, every unit is joined and the loader is finished
/// exactly once.
pub struct Etl<R, P, T, S, W> {
    extractor: Extractor<R, P>,
    transformation: Arc<T>,
    loader: Arc<Loader<S, W>>,
    stats: Arc<EtlStats>,
    progress: Option<ProgressBar>,
}

impl<R, P, T, S, W> Etl<R, P, T, S, W>
where
    R: Reader,
    P: StringParser,
    T: Transformation + 'static,
    S: Serializer + 'static,
    W: Writer + 'static,
{
    pub fn new(extractor: Extractor<R, P>, loader: Loader<S, W>, transformation: T) -> Self {
        let stats = Arc::new(EtlStats::new());
        Self {
            extractor: extractor.with_stats(Arc::clone(&stats)),
            transformation: Arc::new(transformation),
            loader: Arc::new(loader.with_stats(Arc::clone(&stats))),
            stats,
            progress: None,
        }
    }

    /// Ticks `pb` once per extracted page.
    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    pub async fn run(mut self) -> RunSummary {
        let start = Instant::now();
        let mut in_flight = FuturesUnordered::new();
        let mut pages = 0u64;

        while self.extractor.can_extract() {
            let Some(batch) = self.extractor.extract().await else {
                continue;
            };
            pages += 1;
            debug!(page = pages, records = batch.len(), "Dispatching page");
            if let Some(pb) = &self.progress {
                pb.inc(1);
                pb.set_message(format!("{} records", self.stats.records_extracted()));
            }

            let transformation = Arc::clone(&self.transformation);
            let loader = Arc::clone(&self.loader);
            let handle = tokio::task::spawn_blocking(move || {
                let batch = transformation.apply_batch(batch);
                loader.load(&batch);
            });
            let page = pages;
            in_flight.push(async move { (page, handle.await) });
        }

        info!(
            pages,
            pending = in_flight.len(),
            "Extraction finished, waiting for loads"
        );

        while let Some((page, joined)) = in_flight.next().await {
            if let Err(e) = joined {
                self.stats.inc_failed_units();
                error!(page, error = %e, "Transform/load task failed");
            }
        }

        self.loader.finish();

        if let Some(pb) = self.progress.take() {
            pb.finish_and_clear();
        }

        let summary = self.stats.summary();
        info!(
            duration_secs = start.elapsed().as_secs_f64(),
            pages = summary.pages_read,
            records = summary.records_loaded,
            failed_writes = summary.failed_writes,
            failed_units = summary.failed_units,
            "Run complete"
        );
        summary
    }
}
