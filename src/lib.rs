//! Pageflow: paginated extract, transform and load pipeline
//!
//! This crate fetches pages of JSON from a remote endpoint, flattens each
//! object into a flat record, keeps and orders the wanted attributes, and
//! appends the result to a CSV file as pages arrive:
//!
//! 1. **Extraction** -- Read one page at a time, following `Link: rel="next"`
//!    pagination, retrying transport failures with a fixed backoff and a
//!    bounded attempt budget
//! 2. **Transformation** -- Filter and reorder the attributes of every record
//!    in the page, preserving record order
//! 3. **Loading** -- Serialize the page and append it to the sink; the first
//!    page loaded also carries the header row
//!
//! # Architecture
//!
//! - **Single producer** -- Pages are extracted sequentially on one async task,
//!   since the reader's cursor and the retry budget are not shared
//! - **Fan-out units** -- Each page's transform+load runs on tokio's blocking
//!   pool, overlapping with the next page's download
//! - **Two guards in the loader** -- An atomic flag decides which load writes
//!   the header; a mutex around the sink keeps fragments from interleaving
//! - **Finalize once** -- After every unit is joined, the sink gets its terminal
//!   fragment and is closed exactly once
//! - **Atomic counters** -- Lock-free statistics shared by every stage
//!
//! # Key Modules
//!
//! - [`record`] -- `Value`, `Record` and `Batch`
//! - [`reader`] -- `Reader` trait and the paginating `HttpReader`
//! - [`parser`] -- `StringParser` trait and JSON flattening
//! - [`transform`] -- Attribute filter and sort transformations
//! - [`serializer`] -- `Serializer` trait and `CsvSerializer`
//! - [`writer`] -- `Writer` trait and `LocalFileWriter`
//! - [`extractor`] -- Read/parse/retry loop
//! - [`loader`] -- Thread-safe header-once loading
//! - [`etl`] -- The pipeline driver
//! - [`stats`] -- Thread-safe atomic counters for run metrics
//! - [`config`] -- Defaults and TOML settings
//! - [`error`] -- Error types for each collaborator
//!
//! # Example Usage
//!
//! ```bash
//! # Suggestions for "Berlin" into GoEuroTest.csv, with info logging
//! pageflow Berlin -v
//!
//! # Custom settings file and output path
//! pageflow Leipzig --config prod.toml --output leipzig.csv
//! ```

pub mod config;
pub mod error;
pub mod etl;
pub mod extractor;
pub mod loader;
pub mod parser;
pub mod reader;
pub mod record;
pub mod serializer;
pub mod stats;
pub mod transform;
pub mod writer;
