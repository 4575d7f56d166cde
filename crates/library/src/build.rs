use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use catalog::{CatalogService, Session};
use common::{format_name, name_key, stable_id, AlbumInfo, ArtistInfo, PlaylistRecord, TrackRecord};
use tracing::{debug, warn};

use crate::cleanup::{clean_artist, clean_title, split_artists};
use crate::model::{Album, AlbumKey, Art, ArtKey, Artist, Playlist, Track, TrackKey};
use crate::{CatalogIndex, LibraryStats};

const UNKNOWN_ARTIST: &str = "Unknown";
const UNTITLED: &str = "Untitled";
const MAX_YEAR: u32 = 9999;

/// Album-level lookups done while ingesting. Optional: an index can be
/// built from records alone.
pub struct Enrichment<'a> {
    pub service: &'a dyn CatalogService,
    pub session: &'a Session,
}

struct AlbumDraft {
    id: String,
    title: String,
    artist: String,
    tracks: Vec<TrackKey>,
    sorted: bool,
    discs: Vec<u16>,
    art: Option<ArtKey>,
    show_disc_number: bool,
}

struct ArtistDraft {
    name: String,
    albums: BTreeMap<String, usize>,
}

pub(crate) struct Builder<'a> {
    tracks: Vec<Track>,
    drafts: Vec<AlbumDraft>,
    arts: Vec<Art>,
    art_by_url: HashMap<String, ArtKey>,
    artists: BTreeMap<String, ArtistDraft>,
    by_id: HashMap<String, TrackKey>,
    enrichment: Option<Enrichment<'a>>,
    album_infos: HashMap<String, Option<AlbumInfo>>,
    artist_infos: HashMap<String, Option<ArtistInfo>>,
}

impl<'a> Builder<'a> {
    pub(crate) fn new(enrichment: Option<Enrichment<'a>>) -> Self {
        Self {
            tracks: Vec::new(),
            drafts: Vec::new(),
            arts: Vec::new(),
            art_by_url: HashMap::new(),
            artists: BTreeMap::new(),
            by_id: HashMap::new(),
            enrichment,
            album_infos: HashMap::new(),
            artist_infos: HashMap::new(),
        }
    }

    pub(crate) fn add_track(&mut self, mut record: TrackRecord) {
        self.enrich(&mut record);
        let album_id = record.album_id.clone();
        let track = self.track_from_record(record, None);

        let artist_name = track
            .album_artist
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| Some(track.artist_name.clone()).filter(|name| name != UNKNOWN_ARTIST))
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
        let artist_key = name_key(&artist_name);
        let album_key = name_key(&track.album_title);
        let album_title = track.album_title.clone();
        let disc_no = track.disc_no;
        let art = track.art;
        let remote_id = track.remote_id.clone();

        let key = TrackKey(self.tracks.len());
        self.tracks.push(track);
        if let Some(id) = remote_id {
            if self.by_id.insert(id.clone(), key).is_some() {
                debug!("Duplicate track id {}; keeping the later record", id);
            }
        }

        let artist = self
            .artists
            .entry(artist_key)
            .or_insert_with(|| ArtistDraft {
                name: format_name(&artist_name),
                albums: BTreeMap::new(),
            });
        let draft_index = match artist.albums.get(&album_key) {
            Some(index) => *index,
            None => {
                let index = self.drafts.len();
                let id = album_id
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(|| stable_id(&format!("{}|||{}", artist_name, album_title)));
                self.drafts.push(AlbumDraft {
                    id,
                    title: album_title,
                    artist: artist_name,
                    tracks: Vec::new(),
                    sorted: true,
                    discs: Vec::new(),
                    art: None,
                    show_disc_number: false,
                });
                artist.albums.insert(album_key, index);
                index
            }
        };

        let draft = &mut self.drafts[draft_index];
        draft.tracks.push(key);
        draft.sorted = false;
        if let Some(disc) = disc_no {
            if !draft.discs.contains(&disc) {
                draft.discs.push(disc);
            }
        }
        if draft.art.is_none() {
            draft.art = art;
        }
    }

    /// Ingests a payload carried inline by a playlist. The track joins no
    /// album and is not reachable through the ID map.
    pub(crate) fn add_playlist_track(&mut self, record: TrackRecord, track_id: &str) -> TrackKey {
        let track = self.track_from_record(record, Some(track_id));
        let key = TrackKey(self.tracks.len());
        self.tracks.push(track);
        key
    }

    pub(crate) fn lookup(&self, track_id: &str) -> Option<TrackKey> {
        self.by_id.get(track_id).copied()
    }

    pub(crate) fn finish(mut self, playlists: Vec<PlaylistRecord>) -> CatalogIndex {
        self.split_multi_disc();

        let mut albums = Vec::with_capacity(self.drafts.len());
        let mut artists = BTreeMap::new();
        let artist_drafts = std::mem::take(&mut self.artists);
        for (artist_key, artist_draft) in artist_drafts {
            let mut album_map = BTreeMap::new();
            for (album_key, draft_index) in artist_draft.albums {
                let key = AlbumKey(albums.len());
                let album = self.finish_album(draft_index, key);
                albums.push(album);
                album_map.insert(album_key, key);
            }
            artists.insert(
                artist_key,
                Artist {
                    dirname: artist_draft.name.clone(),
                    name: artist_draft.name,
                    albums: album_map,
                },
            );
        }

        let playlist_map = self.build_playlists(playlists);

        let stats = LibraryStats {
            artists: artists.len(),
            albums: albums.len(),
            tracks: albums.iter().map(Album::track_count).sum(),
            playlists: playlist_map.len(),
        };

        CatalogIndex {
            tracks: self.tracks,
            albums,
            arts: self.arts,
            artists,
            by_id: self.by_id,
            playlists: playlist_map,
            stats,
        }
    }

    fn split_multi_disc(&mut self) {
        for artist in self.artists.values_mut() {
            let multi_disc: Vec<(String, usize)> = artist
                .albums
                .iter()
                .filter(|(_, index)| self.drafts[**index].discs.len() > 1)
                .map(|(key, index)| (key.clone(), *index))
                .collect();

            for (parent_key, parent_index) in multi_disc {
                artist.albums.remove(&parent_key);
                let parent_tracks = std::mem::take(&mut self.drafts[parent_index].tracks);
                let discs = self.drafts[parent_index].discs.clone();
                let first_disc = discs[0];
                debug!(
                    "Splitting {:?} into {} discs",
                    self.drafts[parent_index].title,
                    discs.len()
                );

                for disc in discs {
                    let parent = &self.drafts[parent_index];
                    let title = format!("{} - Disc {}", parent.title, disc);
                    let members: Vec<TrackKey> = parent_tracks
                        .iter()
                        .copied()
                        .filter(|key| self.tracks[key.0].disc_no.unwrap_or(first_disc) == disc)
                        .collect();
                    let split_key = name_key(&title);

                    if let Some(existing) = artist.albums.get(&split_key) {
                        let existing = &mut self.drafts[*existing];
                        existing.tracks.extend(members);
                        existing.sorted = false;
                        existing.show_disc_number = true;
                        continue;
                    }

                    let draft = AlbumDraft {
                        id: stable_id(&format!("{}#disc{}", parent.id, disc)),
                        title,
                        artist: parent.artist.clone(),
                        tracks: members,
                        sorted: false,
                        discs: vec![disc],
                        art: parent.art,
                        show_disc_number: true,
                    };
                    artist.albums.insert(split_key, self.drafts.len());
                    self.drafts.push(draft);
                }
            }
        }
    }

    fn finish_album(&mut self, draft_index: usize, key: AlbumKey) -> Album {
        let draft = &mut self.drafts[draft_index];
        let year = majority_year(draft.tracks.iter().map(|k| self.tracks[k.0].year));
        if !draft.sorted {
            let tracks = &self.tracks;
            draft.tracks.sort_by_key(|k| {
                let track = &tracks[k.0];
                (track.disc_no.unwrap_or(0), track.track_no)
            });
            draft.sorted = true;
        }
        for track_key in &draft.tracks {
            self.tracks[track_key.0].album = Some(key);
        }
        Album {
            id: draft.id.clone(),
            dirname: format_name(&draft.title),
            title: draft.title.clone(),
            artist: draft.artist.clone(),
            art: draft.art,
            show_disc_number: draft.show_disc_number,
            tracks: std::mem::take(&mut draft.tracks),
            discs: draft.discs.clone(),
            year,
        }
    }

    fn build_playlists(&mut self, records: Vec<PlaylistRecord>) -> BTreeMap<String, Playlist> {
        let mut playlists = BTreeMap::new();
        for record in records {
            let mut tracks = Vec::with_capacity(record.tracks.len());
            for entry in record.tracks {
                match entry.track {
                    Some(payload) => tracks.push(self.add_playlist_track(payload, &entry.track_id)),
                    None => match self.lookup(&entry.track_id) {
                        Some(key) => tracks.push(key),
                        None => warn!(
                            "Playlist {:?} references unknown track {}; skipping entry",
                            record.name, entry.track_id
                        ),
                    },
                }
            }

            let base = format_name(&record.name);
            let mut dirname = base.clone();
            let mut suffix = 2;
            while playlists.contains_key(&dirname.to_lowercase()) {
                dirname = format!("{} ({})", base, suffix);
                suffix += 1;
            }
            debug!("Playlist {:?}: {} tracks", dirname, tracks.len());
            playlists.insert(
                dirname.to_lowercase(),
                Playlist {
                    name: record.name,
                    dirname,
                    tracks,
                },
            );
        }
        playlists
    }

    fn track_from_record(&mut self, record: TrackRecord, id_override: Option<&str>) -> Track {
        let raw_artist = record.artist.clone().unwrap_or_default();
        let mut artists = split_artists(&raw_artist);
        let title = record
            .title
            .as_deref()
            .map(|title| clean_title(title, &mut artists))
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());
        let artist_name = Some(clean_artist(&raw_artist))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
        let album_title = record
            .album
            .clone()
            .filter(|album| !album.trim().is_empty())
            .unwrap_or_else(|| "Unknown Album".to_string());
        let art = record
            .album_art_ref
            .first()
            .map(|art| art.url.clone())
            .filter(|url| !url.trim().is_empty())
            .map(|url| self.art_key(url));
        let remote_id = id_override
            .map(|id| id.to_string())
            .or(record.id)
            .filter(|id| !id.trim().is_empty());

        Track {
            remote_id,
            title,
            artists,
            artist_name,
            album_title,
            album_artist: record
                .album_artist
                .filter(|name| !name.trim().is_empty()),
            year: usable_year(record.year),
            disc_no: record.disc_number,
            track_no: record.track_number.unwrap_or(0),
            genre: record.genre.filter(|genre| !genre.trim().is_empty()),
            estimated_size: record.estimated_size.unwrap_or(0),
            exact_size: record.exact_size,
            art,
            created_secs: record.creation_timestamp.unwrap_or(0) / 1_000_000,
            accessed_secs: record.recent_timestamp.unwrap_or(0) / 1_000_000,
            album: None,
            sizing: OnceLock::new(),
        }
    }

    fn art_key(&mut self, url: String) -> ArtKey {
        if let Some(key) = self.art_by_url.get(&url) {
            return *key;
        }
        let key = ArtKey(self.arts.len());
        self.arts.push(Art::new(url.clone()));
        self.art_by_url.insert(url, key);
        key
    }

    /// Fills gaps in a record from the provider's album and artist info.
    fn enrich(&mut self, record: &mut TrackRecord) {
        let Some(album_id) = record.album_id.clone().filter(|id| !id.is_empty()) else {
            return;
        };
        let Some(album_info) = self.album_info(&album_id) else {
            return;
        };

        if record.album.as_deref().map(str::trim).unwrap_or("").is_empty() {
            record.album = album_info.name.clone();
        }
        if usable_year(record.year) == 0 {
            record.year = album_info.year;
        }

        let artist_info = album_info
            .artist_id
            .first()
            .filter(|id| !id.is_empty())
            .cloned()
            .and_then(|id| self.artist_info(&id));
        let provider_name = artist_info
            .and_then(|info| info.name)
            .or(album_info.album_artist)
            .filter(|name| !name.trim().is_empty());
        let Some(provider_name) = provider_name else {
            return;
        };

        match record.album_artist.as_deref().map(str::trim) {
            None | Some("") => record.album_artist = Some(provider_name.clone()),
            Some(current) if current.eq_ignore_ascii_case(&provider_name) => {
                record.album_artist = Some(provider_name.clone());
            }
            Some(_) => {}
        }
        if let Some(artist) = record.artist.as_deref() {
            if artist.eq_ignore_ascii_case(&provider_name) {
                record.artist = Some(provider_name);
            }
        }
    }

    fn album_info(&mut self, album_id: &str) -> Option<AlbumInfo> {
        let enrichment = self.enrichment.as_ref()?;
        if let Some(cached) = self.album_infos.get(album_id) {
            return cached.clone();
        }
        debug!("Fetching album info for {}", album_id);
        let info = match enrichment.service.album_info(enrichment.session, album_id) {
            Ok(info) => Some(info),
            Err(err) => {
                if !err.is_not_found() {
                    warn!("Album info for {} unavailable: {}", album_id, err);
                }
                None
            }
        };
        self.album_infos.insert(album_id.to_string(), info.clone());
        info
    }

    fn artist_info(&mut self, artist_id: &str) -> Option<ArtistInfo> {
        let enrichment = self.enrichment.as_ref()?;
        if let Some(cached) = self.artist_infos.get(artist_id) {
            return cached.clone();
        }
        debug!("Fetching artist info for {}", artist_id);
        let info = match enrichment.service.artist_info(enrichment.session, artist_id) {
            Ok(info) => Some(info),
            Err(err) => {
                if !err.is_not_found() {
                    warn!("Artist info for {} unavailable: {}", artist_id, err);
                }
                None
            }
        };
        self.artist_infos.insert(artist_id.to_string(), info.clone());
        info
    }
}

/// Years that do not fit four digits are treated as missing.
fn usable_year(year: Option<u32>) -> u32 {
    year.filter(|year| *year <= MAX_YEAR).unwrap_or(0)
}

/// Most frequent non-zero year; ties go to the year seen first.
fn majority_year(years: impl Iterator<Item = u32>) -> u32 {
    let mut counts: Vec<(u32, usize)> = Vec::new();
    for year in years.filter(|year| *year != 0) {
        match counts.iter_mut().find(|(seen, _)| *seen == year) {
            Some((_, count)) => *count += 1,
            None => counts.push((year, 1)),
        }
    }
    let mut best: Option<(u32, usize)> = None;
    for (year, count) in counts {
        if best.map(|(_, top)| count > top).unwrap_or(true) {
            best = Some((year, count));
        }
    }
    best.map(|(year, _)| year).unwrap_or(0)
}
