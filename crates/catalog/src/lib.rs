//! Collaborators on the far side of the network: the catalog service that
//! lists tracks and playlists, and the byte source that serves audio and art.

use std::io::Read;

use bytes::Bytes;
use common::{AlbumInfo, ArtistInfo, PlaylistRecord, TrackRecord};

mod http;
mod source;

pub use http::HttpCatalog;
pub use source::HttpSource;

#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// An authenticated session. Passed explicitly to every catalog call.
#[derive(Clone, Debug)]
pub struct Session {
    pub token: String,
}

pub trait CatalogService: Send + Sync {
    fn authenticate(&self, credentials: &Credentials) -> Result<Session, CatalogError>;

    fn list_all_tracks(&self, session: &Session) -> Result<Vec<TrackRecord>, CatalogError>;

    fn list_all_playlists(&self, session: &Session) -> Result<Vec<PlaylistRecord>, CatalogError>;

    fn album_info(&self, session: &Session, album_id: &str) -> Result<AlbumInfo, CatalogError>;

    fn artist_info(&self, session: &Session, artist_id: &str) -> Result<ArtistInfo, CatalogError>;

    fn stream_url(
        &self,
        session: &Session,
        track_id: &str,
        device_id: &str,
    ) -> Result<String, CatalogError>;
}

/// Forward-only access to remote bytes.
pub trait RemoteSource: Send + Sync {
    /// Length of the resource without downloading it.
    fn content_length(&self, url: &str) -> Result<u64, CatalogError>;

    /// Downloads the whole resource.
    fn fetch(&self, url: &str) -> Result<Bytes, CatalogError>;

    /// Opens a sequential stream over the resource.
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, CatalogError>;
}

#[derive(Debug)]
pub enum CatalogError {
    Auth(String),
    Unavailable(String),
    NotFound,
    Protocol(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Auth(message) => write!(f, "authentication failed: {}", message),
            CatalogError::Unavailable(message) => write!(f, "catalog unavailable: {}", message),
            CatalogError::NotFound => write!(f, "not found"),
            CatalogError::Protocol(message) => write!(f, "protocol error: {}", message),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return CatalogError::from_status(status.as_u16(), &err.to_string());
        }
        if err.is_decode() {
            CatalogError::Protocol(err.to_string())
        } else {
            CatalogError::Unavailable(err.to_string())
        }
    }
}

impl CatalogError {
    pub fn from_status(status: u16, message: &str) -> Self {
        match status {
            401 | 403 => CatalogError::Auth(format!("http {}", status)),
            404 | 410 => CatalogError::NotFound,
            _ => CatalogError::Unavailable(format!("http {}: {}", status, message)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound)
    }
}
