use crate::record::{Batch, Record};
use csv::{Terminator, WriterBuilder};
use tracing::warn;

/// Renders batches into output-format fragments.
///
/// `serialize_first` is used for exactly one batch per run and carries any
/// header; `terminal_fragment` is written once when the run finishes.
pub trait Serializer: Send + Sync {
    fn serialize_first(&self, batch: &Batch) -> String;

    fn serialize(&self, batch: &Batch) -> String;

    fn terminal_fragment(&self) -> String;
}

/// CSV rows, one per record, cells in record order.
///
/// Every row is newline-terminated so fragments concatenate into a valid file.
#[derive(Debug, Clone, Copy)]
pub struct CsvSerializer {
    delimiter: u8,
}

impl Default for CsvSerializer {
    fn default() -> Self {
        Self::new(b',')
    }
}

impl CsvSerializer {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    fn rows<I>(&self, rows: I) -> String
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .terminator(Terminator::Any(b'\n'))
            .flexible(true)
            .from_writer(Vec::new());

        for row in rows {
            if let Err(e) = writer.write_record(&row) {
                // Writing into a Vec only fails on malformed input; keep the
                // rest of the fragment.
                warn!(error = %e, "Failed to serialize CSV row");
            }
        }

        match writer.into_inner() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(error = %e, "Failed to flush CSV fragment");
                String::new()
            }
        }
    }

    fn cells(record: &Record) -> Vec<String> {
        record.values().map(ToString::to_string).collect()
    }

    // A record with no fields has no cells to write.
    fn body(batch: &Batch) -> impl Iterator<Item = Vec<String>> + '_ {
        batch.iter().filter(|r| !r.is_empty()).map(Self::cells)
    }
}

impl Serializer for CsvSerializer {
    fn serialize_first(&self, batch: &Batch) -> String {
        let Some(first) = batch.iter().find(|r| !r.is_empty()) else {
            return String::new();
        };
        let header = first.keys().map(str::to_string).collect::<Vec<_>>();
        self.rows(std::iter::once(header).chain(Self::body(batch)))
    }

    fn serialize(&self, batch: &Batch) -> String {
        self.rows(Self::body(batch))
    }

    fn terminal_fragment(&self) -> String {
        String::new()
    }
}
