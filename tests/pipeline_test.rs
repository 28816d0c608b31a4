//! End-to-end tests for the extract → transform → load pipeline.
//!
//! - **Scripted runs** -- In-memory readers and a recording writer drive the
//!   orchestrator deterministically (success, total read failure)
//! - **HTTP runs** -- A `wiremock` server serves paginated JSON; output goes to
//!   a real CSV file in a temp directory
//! - **CLI** -- The binary's exit status for each fatal startup class
//!
//! Batches from different pages may land in any order, so assertions on file
//! content compare the header separately and the data lines as a sorted set.

use async_trait::async_trait;
use pageflow::config::Settings;
use pageflow::error::{ReadError, WriteError};
use pageflow::etl::Etl;
use pageflow::extractor::Extractor;
use pageflow::loader::Loader;
use pageflow::parser::JsonStringParser;
use pageflow::reader::{HttpReader, Reader};
use pageflow::serializer::CsvSerializer;
use pageflow::transform::FilterAndSort;
use pageflow::writer::{LocalFileWriter, Writer};
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Replays pages; `None` entries fail the read.
struct ScriptedReader(VecDeque<Option<&'static str>>);

#[async_trait]
impl Reader for ScriptedReader {
    async fn read(&mut self) -> Result<String, ReadError> {
        match self.0.pop_front() {
            Some(Some(page)) => Ok(page.to_string()),
            _ => Err(ReadError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            ))),
        }
    }

    fn is_data_left(&self) -> bool {
        !self.0.is_empty()
    }
}

#[derive(Clone, Default)]
struct RecordingWriter {
    fragments: Arc<Mutex<Vec<String>>>,
    closes: Arc<Mutex<u32>>,
}

impl RecordingWriter {
    fn content(&self) -> String {
        self.fragments.lock().unwrap().concat()
    }

    fn closes(&self) -> u32 {
        *self.closes.lock().unwrap()
    }
}

impl Writer for RecordingWriter {
    fn write(&mut self, fragment: &str) -> Result<(), WriteError> {
        self.fragments.lock().unwrap().push(fragment.to_string());
        Ok(())
    }

    fn close(&mut self) {
        *self.closes.lock().unwrap() += 1;
    }
}

/// Splits CSV output into its first line and the sorted remaining lines.
fn header_and_rows(content: &str) -> (String, Vec<String>) {
    let mut lines = content.lines().map(str::to_string);
    let header = lines.next().unwrap_or_default();
    let mut rows: Vec<String> = lines.collect();
    rows.sort();
    (header, rows)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_pages_one_header() {
    let reader = ScriptedReader(
        vec![
            Some(r#"[{"id":1,"name":"A"},{"id":2,"name":"B"}]"#),
            Some(r#"[{"id":3,"name":"C"}]"#),
        ]
        .into(),
    );
    let sink = RecordingWriter::default();

    let extractor = Extractor::new(reader, JsonStringParser::default(), 3, Duration::ZERO);
    let loader = Loader::new(sink.clone(), CsvSerializer::new(b','));
    let summary = Etl::new(extractor, loader, FilterAndSort::new(&["id", "name"]))
        .run()
        .await;

    let content = sink.content();
    let (header, rows) = header_and_rows(&content);
    assert_eq!(header, "id,name");
    assert_eq!(rows, vec!["1,A", "2,B", "3,C"]);
    assert_eq!(content.matches("id,name").count(), 1);
    assert_eq!(sink.closes(), 1);
    assert_eq!(summary.pages_read, 2);
    assert_eq!(summary.records_loaded, 3);
}

#[tokio::test]
async fn test_first_read_fails_with_single_attempt() {
    let reader = ScriptedReader(vec![None, Some(r#"{"id":1}"#)].into());
    let sink = RecordingWriter::default();

    let extractor = Extractor::new(reader, JsonStringParser::default(), 1, Duration::ZERO);
    let loader = Loader::new(sink.clone(), CsvSerializer::default());
    let summary = Etl::new(extractor, loader, FilterAndSort::new(&["id"]))
        .run()
        .await;

    assert_eq!(summary.batches_loaded, 0);
    assert_eq!(summary.read_failures, 1);
    assert_eq!(sink.content(), "");
    assert_eq!(sink.closes(), 1);
}

#[tokio::test]
async fn test_http_pagination_to_csv_file() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/suggest/leipzig"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", format!("<{}/pages/2>; rel=\"next\"", server.uri()).as_str())
                .set_body_string(
                    r#"[{"_id":377078,"key":null,"name":"Leipzig","type":"location",
                        "geo_position":{"latitude":51.33962,"longitude":12.37129}}]"#,
                ),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/pages/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"_id":314826,"name":"Leipzig Hbf","type":"station",
                "geo_position":{"latitude":51.3452,"longitude":12.38305}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let settings = Settings {
        api_url: format!("{}/suggest/", server.uri()),
        csv_path: dir.path().join("out.csv"),
        reconnection_delay: 0,
        ..Settings::default()
    };

    let reader = HttpReader::new(
        settings.source_url("leipzig").unwrap(),
        settings.request_timeout(),
    )
    .unwrap();
    let extractor = Extractor::new(
        reader,
        JsonStringParser::new(settings.attributes_delimiter.clone()),
        settings.max_attempts(),
        settings.retry_delay(),
    );
    let writer = LocalFileWriter::create(&settings.csv_path).unwrap();
    let loader = Loader::new(writer, CsvSerializer::new(settings.csv_delimiter_byte().unwrap()));
    let summary = Etl::new(
        extractor,
        loader,
        FilterAndSort::new(&settings.attributes_wanted),
    )
    .run()
    .await;

    assert_eq!(summary.pages_read, 2);
    let content = fs::read_to_string(&settings.csv_path).unwrap();
    let (header, rows) = header_and_rows(&content);
    assert_eq!(
        header,
        "_id,name,type,geo_position.latitude,geo_position.longitude"
    );
    assert_eq!(
        rows,
        vec![
            "314826,Leipzig Hbf,station,51.3452,12.38305",
            "377078,Leipzig,location,51.33962,12.37129",
        ]
    );
}

#[tokio::test]
async fn test_http_server_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/suggest/berlin"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/suggest/berlin"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"_id":1,"name":"Berlin"}]"#))
        .mount(&server)
        .await;

    let url = format!("{}/suggest/berlin", server.uri()).parse().unwrap();
    let reader = HttpReader::new(url, Duration::from_secs(5)).unwrap();
    let extractor = Extractor::new(reader, JsonStringParser::default(), 3, Duration::ZERO);
    let sink = RecordingWriter::default();
    let loader = Loader::new(sink.clone(), CsvSerializer::default());

    let summary = Etl::new(extractor, loader, FilterAndSort::new(&["_id", "name"]))
        .run()
        .await;

    assert_eq!(summary.read_failures, 2);
    assert_eq!(summary.pages_read, 1);
    assert_eq!(sink.content(), "_id,name\n1,Berlin\n");
    assert_eq!(sink.closes(), 1);
}

#[tokio::test]
async fn test_http_non_json_payload_stops_run() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/suggest/paris", server.uri()).parse().unwrap();
    let reader = HttpReader::new(url, Duration::from_secs(5)).unwrap();
    let extractor = Extractor::new(reader, JsonStringParser::default(), 3, Duration::ZERO);
    let sink = RecordingWriter::default();
    let loader = Loader::new(sink.clone(), CsvSerializer::default());

    let summary = Etl::new(extractor, loader, FilterAndSort::new(&["_id"]))
        .run()
        .await;

    assert_eq!(summary.pages_read, 1);
    assert_eq!(summary.batches_loaded, 0);
    assert_eq!(sink.closes(), 1);
}

fn pageflow() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pageflow"))
}

#[test]
fn test_cli_missing_query_exits_1() {
    let dir = TempDir::new().unwrap();
    let status = pageflow()
        .current_dir(dir.path())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn test_cli_bad_config_exits_2() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bad.toml");
    fs::write(&config, "connection_attempts = \"three\"\n").unwrap();

    let status = pageflow()
        .current_dir(dir.path())
        .arg("Berlin")
        .arg("--config")
        .arg(&config)
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(2));
}

#[test]
fn test_cli_unwritable_output_exits_3() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("missing").join("out.csv");

    let status = pageflow()
        .current_dir(dir.path())
        .arg("Berlin")
        .arg("--output")
        .arg(&output)
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(3));
}

#[test]
fn test_cli_zero_request_timeout_exits_2() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("pageflow.toml");
    fs::write(&config, "request_timeout = 0\n").unwrap();

    let status = pageflow()
        .current_dir(dir.path())
        .arg("Berlin")
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(2));
}
