use crate::record::{Batch, Record};
use std::collections::HashSet;

/// Pure per-record rewrite. No I/O, no shared state.
pub trait Transformation: Send + Sync {
    fn apply(&self, record: Record) -> Record;

    /// Applies [`Transformation::apply`] to every record, keeping batch order.
    fn apply_batch(&self, batch: Batch) -> Batch {
        batch.into_iter().map(|r| self.apply(r)).collect()
    }
}

/// Keeps only the wanted attributes, in the record's own order.
#[derive(Debug, Clone)]
pub struct AttributesFilter {
    wanted: HashSet<String>,
}

impl AttributesFilter {
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            wanted: attributes.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transformation for AttributesFilter {
    fn apply(&self, record: Record) -> Record {
        record
            .into_iter()
            .filter(|(k, _)| self.wanted.contains(k))
            .collect()
    }
}

/// Moves the listed attributes to the front, in list order. Unlisted
/// attributes follow in their original relative order.
#[derive(Debug, Clone)]
pub struct AttributesSort {
    order: Vec<String>,
}

impl AttributesSort {
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            order: attributes.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transformation for AttributesSort {
    fn apply(&self, mut record: Record) -> Record {
        let mut sorted = Record::with_capacity(record.len());
        for attr in &self.order {
            if let Some(value) = record.remove(attr) {
                sorted.insert(attr.clone(), value);
            }
        }
        for (k, v) in record {
            sorted.insert(k, v);
        }
        sorted
    }
}

/// Filter then sort against the same attribute list, so output columns
/// follow the list exactly.
#[derive(Debug, Clone)]
pub struct FilterAndSort {
    filter: AttributesFilter,
    sort: AttributesSort,
}

impl FilterAndSort {
    pub fn new<S: AsRef<str>>(attributes: &[S]) -> Self {
        let attrs = attributes.iter().map(|a| a.as_ref().to_string());
        Self {
            filter: AttributesFilter::new(attrs.clone()),
            sort: AttributesSort::new(attrs),
        }
    }
}

impl Transformation for FilterAndSort {
    fn apply(&self, record: Record) -> Record {
        self.sort.apply(self.filter.apply(record))
    }
}
