//! Fully buffered HTTP responses
//!
//! A `reqwest::Response` body can only be consumed once, so dispatched calls
//! buffer it into a `FetchedResponse`, which both the caller and the cache
//! adapter can read.

use serde::de::DeserializeOwned;

/// An HTTP response whose body has been read into memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResponse {
    /// Final URL of the request
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Response headers as (name, value) pairs
    pub headers: Vec<(String, String)>,
    /// Raw body bytes
    pub body: Vec<u8>,
    /// Whether the body was served from the on-disk cache
    pub from_cache: bool,
}

impl FetchedResponse {
    /// Buffers a live reqwest response
    pub async fn from_reqwest(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(Self {
            url,
            status,
            headers,
            body,
            from_cache: false,
        })
    }

    /// Builds a response from a cached body.
    ///
    /// Status and headers are not cached, so a hit always reports 200.
    pub fn from_cache(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            headers: Vec::new(),
            body,
            from_cache: true,
        }
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Looks up a header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
