use crate::config::DEFAULT_ATTRIBUTES_DELIMITER;
use crate::error::ParseError;
use crate::record::{Batch, Record, Value};
use serde_json::{Map, Value as Json};

/// Turns one raw page into flat records.
///
/// Nested levels become `delimiter`-joined key paths, e.g.
/// `{"a":"x","b":{"c":1}}` flattens to `a = "x"`, `b.c = 1`.
pub trait StringParser: Send {
    /// An empty payload is an empty batch, not an error.
    fn parse_string(&self, raw: &str) -> Result<Batch, ParseError>;
}

/// Parses a JSON object or array of objects, one record per object.
#[derive(Debug, Clone)]
pub struct JsonStringParser {
    delimiter: String,
}

impl Default for JsonStringParser {
    fn default() -> Self {
        Self::new(DEFAULT_ATTRIBUTES_DELIMITER)
    }
}

impl JsonStringParser {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Flattens a single top-level element.
    pub fn flatten(&self, json: &Json) -> Record {
        let mut record = Record::new();
        match json {
            Json::Object(map) => self.flatten_object(&mut record, "", map),
            Json::Array(items) => self.flatten_array(&mut record, "", items),
            scalar => {
                let key = match scalar {
                    Json::String(s) => s.clone(),
                    other => other.to_string(),
                };
                record.insert(key, scalar_value(scalar));
            }
        }
        record
    }

    fn flatten_object(&self, record: &mut Record, prefix: &str, map: &Map<String, Json>) {
        for (key, value) in map {
            self.flatten_value(record, format!("{prefix}{key}"), value);
        }
    }

    fn flatten_array(&self, record: &mut Record, prefix: &str, items: &[Json]) {
        for (i, value) in items.iter().enumerate() {
            self.flatten_value(record, format!("{prefix}{i}"), value);
        }
    }

    fn flatten_value(&self, record: &mut Record, path: String, value: &Json) {
        match value {
            Json::Object(map) => {
                let prefix = format!("{path}{}", self.delimiter);
                self.flatten_object(record, &prefix, map);
            }
            Json::Array(items) => {
                let prefix = format!("{path}{}", self.delimiter);
                self.flatten_array(record, &prefix, items);
            }
            scalar => {
                record.insert(path, scalar_value(scalar));
            }
        }
    }
}

impl StringParser for JsonStringParser {
    fn parse_string(&self, raw: &str) -> Result<Batch, ParseError> {
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let json: Json = serde_json::from_str(raw)
            .map_err(|_| ParseError::new("Error parsing the raw JSON string"))?;

        match json {
            Json::Array(items) => Ok(items.iter().map(|item| self.flatten(item)).collect()),
            obj @ Json::Object(_) => Ok(vec![self.flatten(&obj)]),
            _ => Err(ParseError::new("Error parsing the raw JSON string")),
        }
    }
}

fn scalar_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(_) | Json::Object(_) => Value::Null,
    }
}
