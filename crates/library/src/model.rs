use std::collections::BTreeMap;
use std::sync::OnceLock;

use bytes::Bytes;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackKey(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlbumKey(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtKey(pub(crate) usize);

/// Byte layout of a synthesized track file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sizing {
    pub header: u64,
    pub body: u64,
    pub trailer: u64,
}

impl Sizing {
    pub fn total(&self) -> u64 {
        self.header + self.body + self.trailer
    }
}

/// One track, stored once in the index arena. Albums, playlists and the
/// ID map all refer to it by [`TrackKey`], so the size cache is shared by
/// every view.
#[derive(Debug)]
pub struct Track {
    pub remote_id: Option<String>,
    pub title: String,
    /// Individual performers, used for tags.
    pub artists: Vec<String>,
    /// Performer string as shown in playlist file names.
    pub artist_name: String,
    pub album_title: String,
    pub album_artist: Option<String>,
    pub year: u32,
    pub disc_no: Option<u16>,
    pub track_no: u16,
    pub genre: Option<String>,
    pub estimated_size: u64,
    pub exact_size: Option<u64>,
    pub art: Option<ArtKey>,
    pub created_secs: u64,
    pub accessed_secs: u64,
    pub(crate) album: Option<AlbumKey>,
    pub(crate) sizing: OnceLock<Sizing>,
}

impl Track {
    pub fn album(&self) -> Option<AlbumKey> {
        self.album
    }

    pub fn sizing(&self) -> Option<Sizing> {
        self.sizing.get().copied()
    }

    /// Stores a computed layout. When another caller got there first its
    /// value wins and is returned, so every caller observes the same sizing.
    pub fn cache_sizing(&self, sizing: Sizing) -> Sizing {
        *self.sizing.get_or_init(|| sizing)
    }
}

#[derive(Debug)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub dirname: String,
    pub artist: String,
    pub art: Option<ArtKey>,
    pub show_disc_number: bool,
    pub(crate) tracks: Vec<TrackKey>,
    pub(crate) discs: Vec<u16>,
    pub(crate) year: u32,
}

impl Album {
    /// Tracks ordered by disc and track number.
    pub fn tracks(&self) -> &[TrackKey] {
        &self.tracks
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn discs(&self) -> &[u16] {
        &self.discs
    }

    pub fn disc_count(&self) -> usize {
        self.discs.len()
    }

    /// Most common non-zero year among the tracks, 0 when none has one.
    pub fn year(&self) -> u32 {
        self.year
    }
}

#[derive(Debug)]
pub struct Artist {
    pub name: String,
    pub dirname: String,
    pub(crate) albums: BTreeMap<String, AlbumKey>,
}

impl Artist {
    pub fn albums(&self) -> impl Iterator<Item = AlbumKey> + '_ {
        self.albums.values().copied()
    }

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }

    /// Looks up an album by its directory title, ignoring case.
    pub fn album(&self, title: &str) -> Option<AlbumKey> {
        self.albums.get(&title.to_lowercase()).copied()
    }
}

#[derive(Debug)]
pub struct Playlist {
    pub name: String,
    pub dirname: String,
    pub(crate) tracks: Vec<TrackKey>,
}

impl Playlist {
    pub fn tracks(&self) -> &[TrackKey] {
        &self.tracks
    }

    /// Track at a 1-based playlist position.
    pub fn track_at(&self, position: usize) -> Option<TrackKey> {
        position
            .checked_sub(1)
            .and_then(|index| self.tracks.get(index))
            .copied()
    }
}

/// Cover art shared by every album and track pointing at the same URL.
#[derive(Debug)]
pub struct Art {
    pub url: String,
    size: OnceLock<Option<u64>>,
    data: OnceLock<Bytes>,
}

impl Art {
    pub(crate) fn new(url: String) -> Self {
        Self {
            url,
            size: OnceLock::new(),
            data: OnceLock::new(),
        }
    }

    /// Probed size; `Some(None)` records that the art cannot be embedded.
    pub fn size(&self) -> Option<Option<u64>> {
        self.size.get().copied()
    }

    pub fn cache_size(&self, size: Option<u64>) -> Option<u64> {
        *self.size.get_or_init(|| size)
    }

    pub fn data(&self) -> Option<Bytes> {
        self.data.get().cloned()
    }

    pub fn cache_data(&self, data: Bytes) -> Bytes {
        self.data.get_or_init(|| data).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{Art, Sizing};
    use bytes::Bytes;

    #[test]
    fn sizing_total_adds_zones() {
        let sizing = Sizing {
            header: 200,
            body: 1000,
            trailer: 128,
        };
        assert_eq!(sizing.total(), 1328);
    }

    #[test]
    fn art_cache_keeps_first_value() {
        let art = Art::new("http://art".to_string());
        assert_eq!(art.size(), None);
        assert_eq!(art.cache_size(Some(10)), Some(10));
        assert_eq!(art.cache_size(Some(20)), Some(10));
        assert_eq!(art.size(), Some(Some(10)));

        let first = art.cache_data(Bytes::from_static(b"abc"));
        let second = art.cache_data(Bytes::from_static(b"xyz"));
        assert_eq!(first, second);
    }
}
