use std::time::Duration;

use common::{AlbumInfo, ArtistInfo, PlaylistRecord, TrackRecord};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{CatalogError, CatalogService, Credentials, Session};

const PAGE_SIZE: usize = 500;

/// Catalog service speaking JSON over HTTP.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct ListResponse<T> {
    items: Vec<T>,
    total: usize,
}

#[derive(Deserialize)]
struct StreamResponse {
    url: String,
}

impl HttpCatalog {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, CatalogError> {
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("");
            return Err(CatalogError::from_status(status.as_u16(), reason));
        }
        Ok(response.json()?)
    }

    fn list_paged<T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
    ) -> Result<Vec<T>, CatalogError> {
        let mut items = Vec::new();
        let mut offset = 0usize;
        loop {
            let request = self
                .client
                .get(self.url(path))
                .bearer_auth(&session.token)
                .query(&[("offset", offset), ("limit", PAGE_SIZE)]);
            let page: ListResponse<T> = self.get_json(request)?;
            let fetched = page.items.len();
            items.extend(page.items);
            offset += fetched;
            debug!("Fetched {} of {} from {}", offset, page.total, path);
            if fetched == 0 || offset >= page.total {
                break;
            }
        }
        Ok(items)
    }
}

impl CatalogService for HttpCatalog {
    fn authenticate(&self, credentials: &Credentials) -> Result<Session, CatalogError> {
        info!("Logging in as {}", credentials.username);
        let request = self.client.post(self.url("auth/login")).json(&LoginRequest {
            username: &credentials.username,
            password: &credentials.password,
        });
        let response: LoginResponse = self.get_json(request).map_err(|err| match err {
            CatalogError::NotFound => CatalogError::Auth("login endpoint missing".to_string()),
            other => other,
        })?;
        if response.token.trim().is_empty() {
            return Err(CatalogError::Auth("empty token".to_string()));
        }
        info!("Login successful");
        Ok(Session {
            token: response.token,
        })
    }

    fn list_all_tracks(&self, session: &Session) -> Result<Vec<TrackRecord>, CatalogError> {
        self.list_paged(session, "tracks")
    }

    fn list_all_playlists(&self, session: &Session) -> Result<Vec<PlaylistRecord>, CatalogError> {
        self.list_paged(session, "playlists")
    }

    fn album_info(&self, session: &Session, album_id: &str) -> Result<AlbumInfo, CatalogError> {
        let request = self
            .client
            .get(self.url(&format!("albums/{}", album_id)))
            .bearer_auth(&session.token);
        self.get_json(request)
    }

    fn artist_info(&self, session: &Session, artist_id: &str) -> Result<ArtistInfo, CatalogError> {
        let request = self
            .client
            .get(self.url(&format!("artists/{}", artist_id)))
            .bearer_auth(&session.token);
        self.get_json(request)
    }

    fn stream_url(
        &self,
        session: &Session,
        track_id: &str,
        device_id: &str,
    ) -> Result<String, CatalogError> {
        let request = self
            .client
            .get(self.url(&format!("tracks/{}/stream", track_id)))
            .bearer_auth(&session.token)
            .query(&[("device_id", device_id)]);
        let response: StreamResponse = self.get_json(request)?;
        Ok(response.url)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::join_url;

    #[test]
    fn joins_without_double_slashes() {
        assert_eq!(join_url("http://host/api/", "/tracks"), "http://host/api/tracks");
        assert_eq!(join_url("http://host/api", "tracks"), "http://host/api/tracks");
    }
}
