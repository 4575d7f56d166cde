use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_LENGTH;
use tracing::debug;

use crate::{CatalogError, RemoteSource};

/// Remote byte source over plain HTTP GET/HEAD.
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    /// Only the connect phase is bounded: audio bodies are consumed for as
    /// long as the reader keeps reading.
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self { client })
    }

    fn checked(response: Response) -> Result<Response, CatalogError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let reason = status.canonical_reason().unwrap_or("");
            Err(CatalogError::from_status(status.as_u16(), reason))
        }
    }
}

impl RemoteSource for HttpSource {
    fn content_length(&self, url: &str) -> Result<u64, CatalogError> {
        let response = Self::checked(self.client.head(url).send()?)?;
        // The body of a HEAD response is empty, so the header is the only
        // reliable source of the length.
        let length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .ok_or_else(|| CatalogError::Protocol("missing content-length".to_string()))?;
        debug!("Probed {} bytes at {}", length, url);
        Ok(length)
    }

    fn fetch(&self, url: &str) -> Result<Bytes, CatalogError> {
        let response = Self::checked(self.client.get(url).send()?)?;
        Ok(response.bytes()?)
    }

    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, CatalogError> {
        let response = Self::checked(self.client.get(url).send()?)?;
        Ok(Box::new(response))
    }
}
