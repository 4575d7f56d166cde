use serde::{Deserialize, Serialize};

mod lenient;
pub mod names;

pub use names::{format_name, name_key};

/// A track as the catalog service reports it. Every field is optional; the
/// library applies defaults when it ingests the record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    #[serde(deserialize_with = "lenient::opt_u32")]
    pub year: Option<u32>,
    #[serde(deserialize_with = "lenient::opt_u16")]
    pub disc_number: Option<u16>,
    #[serde(deserialize_with = "lenient::opt_u16")]
    pub track_number: Option<u16>,
    pub genre: Option<String>,
    #[serde(deserialize_with = "lenient::opt_u64")]
    pub estimated_size: Option<u64>,
    #[serde(deserialize_with = "lenient::opt_u64")]
    pub exact_size: Option<u64>,
    pub album_art_ref: Vec<ArtRef>,
    pub album_id: Option<String>,
    pub artist_id: Vec<String>,
    #[serde(deserialize_with = "lenient::opt_u64")]
    pub creation_timestamp: Option<u64>,
    #[serde(deserialize_with = "lenient::opt_u64")]
    pub recent_timestamp: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ArtRef {
    pub url: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistRecord {
    pub id: Option<String>,
    pub name: String,
    pub tracks: Vec<PlaylistEntry>,
}

/// One playlist slot. When `track` is present the entry carries its own
/// payload; otherwise `track_id` refers to a track of the library.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistEntry {
    pub track_id: String,
    pub track: Option<TrackRecord>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlbumInfo {
    pub name: Option<String>,
    pub album_artist: Option<String>,
    #[serde(deserialize_with = "lenient::opt_u32")]
    pub year: Option<u32>,
    pub artist_id: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtistInfo {
    pub name: Option<String>,
}

pub fn stable_id(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex().to_string()
}
