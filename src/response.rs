use std::time::Duration;

use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER},
    StatusCode,
};
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// A buffered HTTP response.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    url: String,
    body: Bytes,
}

impl Response {
    /// Builds a response, e.g. from a custom [`Transport`](crate::Transport).
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            url: String::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Reads the whole body of a `reqwest` response.
    pub(crate) async fn from_reqwest(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = response.bytes().await.map_err(Error::Transport)?;
        Ok(Self {
            status,
            headers,
            url,
            body,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Final URL, after redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|err| BodyPreview(&self.body).decode_error(err))
    }

    /// `Retry-After` value, when given in whole seconds.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get(RETRY_AFTER)?
            .to_str()
            .ok()?
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }

    /// Returns an [`Error::Http`] for 4XX and 5XX statuses.
    pub fn raise_for_status(self) -> Result<Self> {
        if self.status.is_client_error() || self.status.is_server_error() {
            return Err(Error::Http {
                status: self.status.as_u16(),
                body: self.text(),
            });
        }
        Ok(self)
    }
}

struct BodyPreview<'a>(&'a [u8]);

impl BodyPreview<'_> {
    const LIMIT: usize = 256;

    fn decode_error(&self, err: serde_json::Error) -> Error {
        let end = self.0.len().min(Self::LIMIT);
        let body = String::from_utf8_lossy(&self.0[..end]);
        Error::Decode(format!("invalid JSON response body: {err}; body: {body}"))
    }
}
