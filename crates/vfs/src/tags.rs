use library::{CatalogIndex, Track};
use metadata::{CoverArt, TagFields};

/// Tag fields for a track. The same fields feed the size estimate and the
/// real render, so both produce tags of the same shape.
pub fn track_fields(index: &CatalogIndex, track: &Track, cover: Option<CoverArt>) -> TagFields {
    let year = match track.year {
        0 => track.album().map(|key| index.album(key).year()).unwrap_or(0),
        year => year,
    };
    let album_artist = track.album_artist.clone().filter(|album_artist| {
        !(track.artists.len() == 1 && track.artists[0].eq_ignore_ascii_case(album_artist))
    });

    TagFields {
        title: Some(track.title.clone()),
        artists: track.artists.clone(),
        album: Some(track.album_title.clone()),
        album_artist,
        genre: track.genre.clone(),
        year: Some(year).filter(|year| *year > 0),
        track_no: Some(track.track_no).filter(|n| *n > 0),
        disc_no: track.disc_no.filter(|n| *n > 0),
        cover,
    }
}
