use std::collections::{BTreeMap, HashMap};

use catalog::{CatalogError, CatalogService, Session};
use common::{PlaylistRecord, TrackRecord};
use serde::{Deserialize, Serialize};
use tracing::info;

mod build;
pub mod cleanup;
pub mod model;

pub use build::Enrichment;
pub use model::{Album, AlbumKey, Art, ArtKey, Artist, Playlist, Sizing, Track, TrackKey};

use build::Builder;

/// The artist/album/track tree of one catalog. Built wholesale and
/// read-only afterwards, apart from the lazily filled size caches.
#[derive(Debug)]
pub struct CatalogIndex {
    tracks: Vec<Track>,
    albums: Vec<Album>,
    arts: Vec<Art>,
    artists: BTreeMap<String, Artist>,
    by_id: HashMap<String, TrackKey>,
    playlists: BTreeMap<String, Playlist>,
    stats: LibraryStats,
}

impl CatalogIndex {
    /// Builds an index from records already fetched, without enrichment.
    pub fn build(tracks: Vec<TrackRecord>, playlists: Vec<PlaylistRecord>) -> Self {
        Self::build_with(tracks, playlists, None)
    }

    pub fn build_with(
        tracks: Vec<TrackRecord>,
        playlists: Vec<PlaylistRecord>,
        enrichment: Option<Enrichment<'_>>,
    ) -> Self {
        let mut builder = Builder::new(enrichment);
        for record in tracks {
            builder.add_track(record);
        }
        builder.finish(playlists)
    }

    /// Fetches the whole catalog and builds an index from it. Any catalog
    /// failure aborts the build.
    pub fn load(
        service: &dyn CatalogService,
        session: &Session,
        enrich: bool,
    ) -> Result<Self, LibraryError> {
        let tracks = service.list_all_tracks(session)?;
        info!("Fetched {} track records", tracks.len());
        let playlists = service.list_all_playlists(session)?;
        info!("Fetched {} playlists", playlists.len());

        let enrichment = enrich.then_some(Enrichment { service, session });
        let index = Self::build_with(tracks, playlists, enrichment);
        let stats = index.stats();
        info!(
            "Index built: {} artists, {} albums, {} tracks, {} playlists",
            stats.artists, stats.albums, stats.tracks, stats.playlists
        );
        Ok(index)
    }

    pub fn stats(&self) -> LibraryStats {
        self.stats.clone()
    }

    /// Artists in name order.
    pub fn artists(&self) -> impl Iterator<Item = &Artist> + '_ {
        self.artists.values()
    }

    pub fn artist(&self, dirname: &str) -> Option<&Artist> {
        self.artists.get(&dirname.to_lowercase())
    }

    pub fn album(&self, key: AlbumKey) -> &Album {
        &self.albums[key.0]
    }

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }

    pub fn track(&self, key: TrackKey) -> &Track {
        &self.tracks[key.0]
    }

    pub fn track_by_id(&self, id: &str) -> Option<TrackKey> {
        self.by_id.get(id).copied()
    }

    pub fn art(&self, key: ArtKey) -> &Art {
        &self.arts[key.0]
    }

    /// Playlists in name order.
    pub fn playlists(&self) -> impl Iterator<Item = &Playlist> + '_ {
        self.playlists.values()
    }

    pub fn playlist(&self, dirname: &str) -> Option<&Playlist> {
        self.playlists.get(&dirname.to_lowercase())
    }

    /// Albums of an artist ordered by year, then title.
    pub fn albums_of(&self, artist: &Artist) -> Vec<AlbumKey> {
        let mut keys: Vec<AlbumKey> = artist.albums().collect();
        keys.sort_by(|a, b| {
            let (a, b) = (self.album(*a), self.album(*b));
            (a.year(), a.dirname.to_lowercase()).cmp(&(b.year(), b.dirname.to_lowercase()))
        });
        keys
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
    pub playlists: usize,
}

#[derive(Debug)]
pub enum LibraryError {
    Catalog(CatalogError),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Catalog(err) => write!(f, "catalog error: {}", err),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<CatalogError> for LibraryError {
    fn from(err: CatalogError) -> Self {
        LibraryError::Catalog(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ArtRef, PlaylistEntry};

    fn record(id: &str, title: &str, artist: &str, album: &str) -> TrackRecord {
        TrackRecord {
            id: Some(id.to_string()),
            title: Some(title.to_string()),
            artist: Some(artist.to_string()),
            album: Some(album.to_string()),
            estimated_size: Some(1000),
            ..TrackRecord::default()
        }
    }

    fn with_disc(mut record: TrackRecord, disc: u16, track: u16) -> TrackRecord {
        record.disc_number = Some(disc);
        record.track_number = Some(track);
        record
    }

    fn playlist(name: &str, ids: &[&str]) -> PlaylistRecord {
        PlaylistRecord {
            id: None,
            name: name.to_string(),
            tracks: ids
                .iter()
                .map(|id| PlaylistEntry {
                    track_id: id.to_string(),
                    track: None,
                })
                .collect(),
        }
    }

    #[test]
    fn builds_normalized_tree() {
        let mut song = record("t1", "Song: One", "Foo & Bar", "Best/Of");
        song.year = Some(2001);
        song.disc_number = Some(1);
        song.track_number = Some(1);
        let index = CatalogIndex::build(vec![song], Vec::new());

        let artist = index.artist("foo & bar").expect("artist");
        assert_eq!(artist.dirname, "Foo & Bar");
        let album = index.album(artist.album("best-of").expect("album"));
        assert_eq!(album.dirname, "Best-Of");
        assert_eq!(album.year(), 2001);
        assert_eq!(album.track_count(), 1);

        let track = index.track(album.tracks()[0]);
        assert_eq!(track.title, "Song: One");
        assert_eq!(track.artists, vec!["Foo", "Bar"]);
        assert_eq!(track.album(), artist.album("Best-Of"));
    }

    #[test]
    fn splits_albums_with_several_discs() {
        let tracks = vec![
            with_disc(record("a", "One", "Band", "Live"), 1, 1),
            with_disc(record("b", "Two", "Band", "Live"), 2, 1),
        ];
        let index = CatalogIndex::build(tracks, Vec::new());
        let artist = index.artist("band").expect("artist");

        assert!(artist.album("live").is_none());
        assert_eq!(artist.album_count(), 2);
        for title in ["Live - Disc 1", "Live - Disc 2"] {
            let album = index.album(artist.album(title).expect(title));
            assert_eq!(album.track_count(), 1);
            assert_eq!(album.disc_count(), 1);
            assert!(album.show_disc_number);
        }
    }

    #[test]
    fn split_keeps_every_track_once() {
        let tracks = vec![
            with_disc(record("a", "A", "Band", "Box"), 1, 2),
            with_disc(record("b", "B", "Band", "Box"), 1, 1),
            with_disc(record("c", "C", "Band", "Box"), 2, 1),
            with_disc(record("d", "D", "Band", "Box"), 3, 1),
            record("e", "E", "Band", "Single"),
        ];
        let index = CatalogIndex::build(tracks, Vec::new());
        let artist = index.artist("Band").expect("artist");

        let mut total = 0;
        for key in artist.albums() {
            let album = index.album(key);
            assert!(album.disc_count() <= 1, "{} has several discs", album.title);
            total += album.track_count();
            for track in album.tracks() {
                assert_eq!(index.track(*track).album(), Some(key));
            }
        }
        assert_eq!(total, 5);

        let disc_one = index.album(artist.album("Box - Disc 1").expect("disc 1"));
        let titles: Vec<&str> = disc_one
            .tracks()
            .iter()
            .map(|key| index.track(*key).title.as_str())
            .collect();
        assert_eq!(titles, vec!["B", "A"]);
    }

    #[test]
    fn split_albums_share_art_reference() {
        let art = vec![ArtRef {
            url: "http://art/1".to_string(),
        }];
        let mut first = with_disc(record("a", "A", "Band", "Box"), 1, 1);
        first.album_art_ref = art.clone();
        let mut second = with_disc(record("b", "B", "Band", "Box"), 2, 1);
        second.album_art_ref = art;
        let index = CatalogIndex::build(vec![first, second], Vec::new());
        let artist = index.artist("band").expect("artist");

        let arts: Vec<Option<ArtKey>> = artist.albums().map(|key| index.album(key).art).collect();
        assert_eq!(arts.len(), 2);
        assert!(arts[0].is_some());
        assert_eq!(arts[0], arts[1]);
    }

    #[test]
    fn album_year_uses_majority() {
        let mut tracks = Vec::new();
        for (id, year) in [("a", 1999), ("b", 2001), ("c", 2001), ("d", 0)] {
            let mut track = record(id, id, "Band", "Album");
            track.year = Some(year);
            tracks.push(track);
        }
        let index = CatalogIndex::build(tracks, Vec::new());
        let artist = index.artist("band").expect("artist");
        let album = index.album(artist.album("album").expect("album"));
        assert_eq!(album.year(), 2001);
    }

    #[test]
    fn album_artist_groups_compilations() {
        let mut a = record("a", "A", "Singer", "Hits");
        a.album_artist = Some("Various Artists".to_string());
        let mut b = record("b", "B", "Other", "Hits");
        b.album_artist = Some("Various Artists".to_string());
        let index = CatalogIndex::build(vec![a, b], Vec::new());

        assert_eq!(index.stats().artists, 1);
        let artist = index.artist("various artists").expect("artist");
        let album = index.album(artist.album("hits").expect("album"));
        assert_eq!(album.track_count(), 2);
    }

    #[test]
    fn missing_fields_get_defaults() {
        let index = CatalogIndex::build(vec![TrackRecord::default()], Vec::new());
        let artist = index.artist("unknown").expect("artist");
        let album = index.album(artist.album("unknown album").expect("album"));
        let track = index.track(album.tracks()[0]);
        assert_eq!(track.title, "Untitled");
        assert_eq!(track.year, 0);
        assert_eq!(track.estimated_size, 0);
        assert!(track.artists.is_empty());
        assert!(track.remote_id.is_none());
        assert_eq!(index.stats().tracks, 1);
    }

    #[test]
    fn id_map_and_album_view_share_one_track() {
        let index = CatalogIndex::build(vec![record("t1", "Song", "Band", "Album")], Vec::new());
        let by_id = index.track_by_id("t1").expect("track");
        let artist = index.artist("band").expect("artist");
        let album = index.album(artist.album("album").expect("album"));
        assert_eq!(album.tracks()[0], by_id);

        let sizing = Sizing {
            header: 10,
            body: 1000,
            trailer: 128,
        };
        index.track(by_id).cache_sizing(sizing);
        assert_eq!(index.track(album.tracks()[0]).sizing(), Some(sizing));
    }

    #[test]
    fn playlists_skip_unknown_entries() {
        let tracks = vec![
            record("a", "A", "Band", "Album"),
            record("b", "B", "Band", "Album"),
        ];
        let playlists = vec![playlist("Mix", &["b", "missing", "a"])];
        let index = CatalogIndex::build(tracks, playlists);

        let mix = index.playlist("mix").expect("playlist");
        assert_eq!(mix.tracks().len(), 2);
        assert_eq!(mix.track_at(1), index.track_by_id("b"));
        assert_eq!(mix.track_at(2), index.track_by_id("a"));
        assert_eq!(mix.track_at(0), None);
        assert_eq!(mix.track_at(3), None);
    }

    #[test]
    fn playlists_keep_inline_payloads_out_of_albums() {
        let inline = PlaylistRecord {
            id: None,
            name: "Radio".to_string(),
            tracks: vec![PlaylistEntry {
                track_id: "x".to_string(),
                track: Some(record("x", "Guest", "Someone", "Elsewhere")),
            }],
        };
        let index = CatalogIndex::build(Vec::new(), vec![inline]);

        let radio = index.playlist("radio").expect("playlist");
        let key = radio.track_at(1).expect("entry");
        assert_eq!(index.track(key).title, "Guest");
        assert_eq!(index.track(key).album(), None);
        assert!(index.track_by_id("x").is_none());
        assert_eq!(index.stats().artists, 0);
    }

    #[test]
    fn duplicate_playlist_names_get_suffixes() {
        let playlists = vec![playlist("Mix", &[]), playlist("mix", &[]), playlist("MIX", &[])];
        let index = CatalogIndex::build(Vec::new(), playlists);
        let names: Vec<&str> = index.playlists().map(|p| p.dirname.as_str()).collect();
        assert_eq!(names, vec!["Mix", "mix (2)", "MIX (3)"]);
    }

    #[test]
    fn albums_of_orders_by_year() {
        let mut late = record("a", "A", "Band", "Zebra");
        late.year = Some(2010);
        let mut early = record("b", "B", "Band", "Yak");
        early.year = Some(1990);
        let index = CatalogIndex::build(vec![late, early], Vec::new());
        let artist = index.artist("band").expect("artist");
        let titles: Vec<&str> = index
            .albums_of(artist)
            .into_iter()
            .map(|key| index.album(key).title.as_str())
            .collect();
        assert_eq!(titles, vec!["Yak", "Zebra"]);
    }
}
