use crate::error::ReadError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, Url};
use std::io;
use std::time::Duration;
use tracing::debug;

/// One `<target>; params` entry of an RFC 8288 `Link` header.
static LINK_ENTRY_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^>]*)>([^,]*)").unwrap());

static REL_NEXT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i);\s*rel\s*=\s*"?(?:[^";,]*\s)?next\b"#).unwrap());

/// Page-at-a-time access to a remote source.
///
/// The reader owns the pagination cursor: each successful `read` advances it,
/// and `is_data_left` reports whether another `read` is worth issuing. A
/// failed `read` leaves the cursor where it was so the same page can be
/// retried.
#[async_trait]
pub trait Reader: Send {
    async fn read(&mut self) -> Result<String, ReadError>;

    fn is_data_left(&self) -> bool;

    /// Short label for log lines.
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// GETs a URL and follows `Link: <...>; rel="next"` headers for pagination.
///
/// An endpoint that sends no `Link` header is a one-page source.
pub struct HttpReader {
    client: Client,
    first_url: Url,
    next_url: Option<Url>,
}

impl HttpReader {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: Client, url: Url) -> Self {
        Self {
            client,
            first_url: url.clone(),
            next_url: Some(url),
        }
    }

    pub fn next_url(&self) -> Option<&Url> {
        self.next_url.as_ref()
    }
}

#[async_trait]
impl Reader for HttpReader {
    async fn read(&mut self) -> Result<String, ReadError> {
        let url = match &self.next_url {
            Some(url) => url.clone(),
            None => {
                return Err(ReadError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("no pages left at {}", self.first_url),
                )))
            }
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| ReadError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let next = next_page(&url, response.headers());
        let body = response
            .text()
            .await
            .map_err(|source| ReadError::Transport {
                url: url.to_string(),
                source,
            })?;

        if !status.is_success() {
            return Err(ReadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(
            url = %url,
            bytes = body.len(),
            has_next = next.is_some(),
            "Read page"
        );
        self.next_url = next;
        Ok(body)
    }

    fn is_data_left(&self) -> bool {
        self.next_url.is_some()
    }

    fn describe(&self) -> String {
        format!("HttpReader({})", self.first_url)
    }
}

/// Resolves the `rel="next"` target of any `Link` header against `current`.
fn next_page(current: &Url, headers: &HeaderMap) -> Option<Url> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| {
            LINK_ENTRY_REGEX
                .captures_iter(value)
                .find(|caps| REL_NEXT_REGEX.is_match(&caps[2]))
                .and_then(|caps| current.join(caps[1].trim()).ok())
        })
}
