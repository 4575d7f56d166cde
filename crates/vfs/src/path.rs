//! Path grammar of the mounted tree.
//!
//! ```text
//! /artists/<Artist>/<Album> (<YYYY>)/<NN> - <Title>.mp3
//! /artists/<Artist>/<Album> (<YYYY>)/cover.jpg
//! /playlists/<Playlist>/<NNN> - <Artist> - <Album> - <Title>.mp3
//! ```
//!
//! Every segment kind has a parser and a formatter; a path resolves only
//! when formatting the matched entity gives back the same segment, so
//! emitted names always resolve to what they were derived from.

use common::format_name;
use library::{Album, AlbumKey, ArtKey, Artist, CatalogIndex, Playlist, TrackKey};

pub const ARTISTS_DIR: &str = "artists";
pub const PLAYLISTS_DIR: &str = "playlists";
pub const COVER_FILE: &str = "cover.jpg";

const AUDIO_EXT: &str = ".mp3";
const SEPARATOR: &str = " - ";

#[derive(Clone, Copy, Debug)]
pub enum Node<'a> {
    Root,
    ArtistsRoot,
    PlaylistsRoot,
    ArtistDir {
        artist: &'a Artist,
    },
    AlbumDir {
        artist: &'a Artist,
        album: AlbumKey,
    },
    TrackFile {
        album: AlbumKey,
        track: TrackKey,
    },
    CoverFile {
        album: AlbumKey,
        art: ArtKey,
    },
    PlaylistDir {
        playlist: &'a Playlist,
    },
    PlaylistTrackFile {
        playlist: &'a Playlist,
        position: usize,
        track: TrackKey,
    },
    NotFound,
}

impl Node<'_> {
    pub fn is_dir(&self) -> bool {
        matches!(
            self,
            Node::Root
                | Node::ArtistsRoot
                | Node::PlaylistsRoot
                | Node::ArtistDir { .. }
                | Node::AlbumDir { .. }
                | Node::PlaylistDir { .. }
        )
    }
}

/// `"<Title> (<YYYY>)"`
struct AlbumSegment<'s> {
    title: &'s str,
    year: u32,
}

impl<'s> AlbumSegment<'s> {
    fn parse(segment: &'s str) -> Option<Self> {
        let (title, year) = segment.strip_suffix(')')?.rsplit_once(" (")?;
        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            title,
            year: year.parse().ok()?,
        })
    }

    fn format(title: &str, year: u32) -> String {
        format!("{} ({:04})", title, year)
    }
}

/// `"<NN> - <Title>.mp3"`
struct TrackSegment {
    number: u16,
}

impl TrackSegment {
    fn parse(segment: &str) -> Option<Self> {
        let stem = strip_suffix_ignore_case(segment, AUDIO_EXT)?;
        let (number, _title) = stem.split_once(SEPARATOR)?;
        Some(Self {
            number: parse_counter(number, 2)?.try_into().ok()?,
        })
    }

    fn format(number: u16, title: &str) -> String {
        format!("{:02}{}{}{}", number, SEPARATOR, title, AUDIO_EXT)
    }
}

/// `"<NNN> - <Artist> - <Album> - <Title>.mp3"`
struct PlaylistTrackSegment {
    position: usize,
}

impl PlaylistTrackSegment {
    fn parse(segment: &str) -> Option<Self> {
        let stem = strip_suffix_ignore_case(segment, AUDIO_EXT)?;
        let (position, _rest) = stem.split_once(SEPARATOR)?;
        Some(Self {
            position: parse_counter(position, 3)?,
        })
    }

    fn format(position: usize, artist: &str, album: &str, title: &str) -> String {
        format!(
            "{:03}{sep}{}{sep}{}{sep}{}{}",
            position,
            artist,
            album,
            title,
            AUDIO_EXT,
            sep = SEPARATOR
        )
    }
}

/// Digits of a zero-padded counter, at least `width` of them.
fn parse_counter(value: &str, width: usize) -> Option<usize> {
    if value.len() < width || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

fn strip_suffix_ignore_case<'s>(value: &'s str, suffix: &str) -> Option<&'s str> {
    let split = value.len().checked_sub(suffix.len())?;
    let tail = value.get(split..)?;
    if tail.eq_ignore_ascii_case(suffix) {
        Some(&value[..split])
    } else {
        None
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Resolves paths against one index snapshot and formats the names it
/// lists.
pub struct PathResolver<'a> {
    index: &'a CatalogIndex,
    lowercase: bool,
}

impl<'a> PathResolver<'a> {
    pub fn new(index: &'a CatalogIndex, lowercase: bool) -> Self {
        Self { index, lowercase }
    }

    pub fn resolve(&self, path: &str) -> Node<'a> {
        if !path.starts_with('/') {
            return Node::NotFound;
        }
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Node::Root,
            [top, rest @ ..] if top.eq_ignore_ascii_case(ARTISTS_DIR) => self.resolve_artists(rest),
            [top, rest @ ..] if top.eq_ignore_ascii_case(PLAYLISTS_DIR) => {
                self.resolve_playlists(rest)
            }
            _ => Node::NotFound,
        }
    }

    fn resolve_artists(&self, segments: &[&str]) -> Node<'a> {
        let artist = match segments.first() {
            None => return Node::ArtistsRoot,
            Some(name) => match self.index.artist(name) {
                Some(artist) => artist,
                None => return Node::NotFound,
            },
        };
        match segments {
            [_] => Node::ArtistDir { artist },
            [_, album] => match self.match_album(artist, album) {
                Some(album) => Node::AlbumDir { artist, album },
                None => Node::NotFound,
            },
            [_, album, file] => match self.match_album(artist, album) {
                Some(album) => self.match_album_file(album, file),
                None => Node::NotFound,
            },
            _ => Node::NotFound,
        }
    }

    fn resolve_playlists(&self, segments: &[&str]) -> Node<'a> {
        match segments {
            [] => Node::PlaylistsRoot,
            [name] => match self.index.playlist(name) {
                Some(playlist) => Node::PlaylistDir { playlist },
                None => Node::NotFound,
            },
            [name, file] => {
                let Some(playlist) = self.index.playlist(name) else {
                    return Node::NotFound;
                };
                let Some(parsed) = PlaylistTrackSegment::parse(file) else {
                    return Node::NotFound;
                };
                match playlist.track_at(parsed.position) {
                    Some(track)
                        if same_name(&self.playlist_track_segment(parsed.position, track), file) =>
                    {
                        Node::PlaylistTrackFile {
                            playlist,
                            position: parsed.position,
                            track,
                        }
                    }
                    _ => Node::NotFound,
                }
            }
            _ => Node::NotFound,
        }
    }

    fn match_album(&self, artist: &Artist, segment: &str) -> Option<AlbumKey> {
        let parsed = AlbumSegment::parse(segment)?;
        let key = artist.album(parsed.title)?;
        (self.index.album(key).year() == parsed.year).then_some(key)
    }

    fn match_album_file(&self, key: AlbumKey, segment: &str) -> Node<'a> {
        let album = self.index.album(key);
        if segment.eq_ignore_ascii_case(COVER_FILE) {
            return match album.art {
                Some(art) => Node::CoverFile { album: key, art },
                None => Node::NotFound,
            };
        }
        let Some(parsed) = TrackSegment::parse(segment) else {
            return Node::NotFound;
        };
        album
            .tracks()
            .iter()
            .copied()
            .find(|track| {
                let candidate = self.index.track(*track);
                candidate.track_no == parsed.number
                    && same_name(&self.track_segment(*track), segment)
            })
            .map(|track| Node::TrackFile { album: key, track })
            .unwrap_or(Node::NotFound)
    }

    /// Entry names of a directory node, without `.` and `..`. `None` for
    /// files and unmatched paths.
    pub fn list(&self, node: &Node<'a>) -> Option<Vec<String>> {
        let names = match node {
            Node::Root => vec![ARTISTS_DIR.to_string(), PLAYLISTS_DIR.to_string()],
            Node::ArtistsRoot => self
                .index
                .artists()
                .map(|artist| self.artist_segment(artist))
                .collect(),
            Node::ArtistDir { artist } => self
                .index
                .albums_of(artist)
                .into_iter()
                .map(|album| self.album_segment(album))
                .collect(),
            Node::AlbumDir { album, .. } => {
                let album = self.index.album(*album);
                let mut names: Vec<String> = album
                    .tracks()
                    .iter()
                    .map(|track| self.track_segment(*track))
                    .collect();
                if album.art.is_some() {
                    names.push(COVER_FILE.to_string());
                }
                names
            }
            Node::PlaylistsRoot => self
                .index
                .playlists()
                .map(|playlist| self.emit(playlist.dirname.clone()))
                .collect(),
            Node::PlaylistDir { playlist } => playlist
                .tracks()
                .iter()
                .enumerate()
                .map(|(index, track)| self.playlist_track_segment(index + 1, *track))
                .collect(),
            Node::TrackFile { .. }
            | Node::CoverFile { .. }
            | Node::PlaylistTrackFile { .. }
            | Node::NotFound => return None,
        };
        Some(names)
    }

    pub fn artist_segment(&self, artist: &Artist) -> String {
        self.emit(artist.dirname.clone())
    }

    pub fn album_segment(&self, key: AlbumKey) -> String {
        let album = self.index.album(key);
        self.emit(AlbumSegment::format(&album.dirname, album.year()))
    }

    pub fn track_segment(&self, key: TrackKey) -> String {
        let track = self.index.track(key);
        self.emit(TrackSegment::format(track.track_no, &format_name(&track.title)))
    }

    pub fn playlist_track_segment(&self, position: usize, key: TrackKey) -> String {
        let track = self.index.track(key);
        self.emit(PlaylistTrackSegment::format(
            position,
            &format_name(&track.artist_name),
            &format_name(&track.album_title),
            &format_name(&track.title),
        ))
    }

    /// Absolute path of an album directory.
    pub fn album_path(&self, key: AlbumKey) -> Option<String> {
        let album = self.index.album(key);
        let artist = self.album_artist(album)?;
        Some(format!(
            "/{}/{}/{}",
            ARTISTS_DIR,
            self.artist_segment(artist),
            self.album_segment(key)
        ))
    }

    /// Absolute path of a track inside its album, `None` for playlist-only
    /// tracks.
    pub fn track_path(&self, key: TrackKey) -> Option<String> {
        let album = self.index.track(key).album()?;
        Some(format!("{}/{}", self.album_path(album)?, self.track_segment(key)))
    }

    pub fn playlist_track_path(&self, playlist: &Playlist, position: usize) -> Option<String> {
        let track = playlist.track_at(position)?;
        Some(format!(
            "/{}/{}/{}",
            PLAYLISTS_DIR,
            self.emit(playlist.dirname.clone()),
            self.playlist_track_segment(position, track)
        ))
    }

    fn album_artist(&self, album: &Album) -> Option<&'a Artist> {
        self.index.artist(&format_name(&album.artist))
    }

    fn emit(&self, name: String) -> String {
        if self.lowercase {
            name.to_lowercase()
        } else {
            name
        }
    }
}

/// Track the node points at, if it is a track file.
pub fn node_track(node: &Node<'_>) -> Option<TrackKey> {
    match node {
        Node::TrackFile { track, .. } | Node::PlaylistTrackFile { track, .. } => Some(*track),
        _ => None,
    }
}
