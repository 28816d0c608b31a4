use crate::parser::StringParser;
use crate::reader::Reader;
use crate::record::Batch;
use crate::stats::EtlStats;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Reads and parses source pages, retrying transient read failures.
///
/// Two kinds of failure are distinguished:
///
/// - **Read failures** are transient. Each consumes one slot of the attempt
///   budget and is retried after `retry_delay` while budget remains. A
///   successful read refills the budget.
/// - **Parse failures** are permanent: the payload does not match the
///   expected encoding, so retrying cannot help. Extraction stops for good.
///
/// [`Extractor::can_extract`] folds both together with the reader's own
/// pagination state, so a single check drives the caller's loop.
pub struct Extractor<R, P> {
    reader: R,
    parser: P,
    max_attempts: u32,
    retry_delay: Duration,
    attempts_used: u32,
    permanent_failure: bool,
    stats: Arc<EtlStats>,
}

impl<R: Reader, P: StringParser> Extractor<R, P> {
    pub fn new(reader: R, parser: P, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            reader,
            parser,
            max_attempts,
            retry_delay,
            attempts_used: 0,
            permanent_failure: false,
            stats: Arc::new(EtlStats::new()),
        }
    }

    /// Shares run counters with the rest of the pipeline.
    pub(crate) fn with_stats(mut self, stats: Arc<EtlStats>) -> Self {
        self.stats = stats;
        self
    }

    /// True while there is budget left, no permanent failure, and the
    /// reader reports more pages.
    pub fn can_extract(&self) -> bool {
        !self.permanent_failure
            && self.attempts_used < self.max_attempts
            && self.reader.is_data_left()
    }

    /// Reads and parses the next page.
    ///
    /// Returns `None` when nothing can be extracted: the source is exhausted,
    /// the retry budget ran out, or the payload failed to parse. The cause has
    /// already been logged. An empty `Some` batch is a legal page.
    pub async fn extract(&mut self) -> Option<Batch> {
        loop {
            if !self.can_extract() {
                debug!(
                    attempts_used = self.attempts_used,
                    permanent_failure = self.permanent_failure,
                    "Nothing left to extract"
                );
                return None;
            }

            match self.reader.read().await {
                Ok(raw) => {
                    self.attempts_used = 0;
                    self.stats.inc_pages();
                    return match self.parser.parse_string(&raw) {
                        Ok(batch) => {
                            self.stats.add_records_extracted(batch.len() as u64);
                            Some(batch)
                        }
                        Err(e) => {
                            error!(
                                reader = %self.reader.describe(),
                                error = %e,
                                "Payload does not match the expected format, stopping extraction"
                            );
                            self.permanent_failure = true;
                            None
                        }
                    };
                }
                Err(e) => {
                    self.attempts_used += 1;
                    self.stats.inc_read_failures();
                    warn!(
                        reader = %self.reader.describe(),
                        attempt = self.attempts_used,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Read failed"
                    );

                    if !self.can_extract() {
                        error!(
                            reader = %self.reader.describe(),
                            "Cannot recover failed read"
                        );
                        return None;
                    }
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    pub fn has_permanent_failure(&self) -> bool {
        self.permanent_failure
    }

    pub fn stats(&self) -> &Arc<EtlStats> {
        &self.stats
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }
}
