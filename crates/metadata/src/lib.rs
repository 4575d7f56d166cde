use lofty::config::WriteOptions;
use lofty::error::LoftyError;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::{Accessor, ItemKey, TagExt};
use lofty::tag::{Tag, TagType};

/// Structured metadata for one synthesized file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TagFields {
    pub title: Option<String>,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub year: Option<u32>,
    pub track_no: Option<u16>,
    pub disc_no: Option<u16>,
    pub cover: Option<CoverArt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverArt {
    pub data: Vec<u8>,
    pub mime: Option<String>,
}

impl CoverArt {
    /// Zero-filled stand-in for an image of `len` bytes. With the same mime
    /// type it renders to exactly as many bytes as the real image would.
    pub fn placeholder(len: usize, mime: &str) -> Self {
        Self {
            data: vec![0u8; len],
            mime: Some(mime.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFormat {
    /// ID3v2.4, placed before the audio.
    Id3v24,
    /// ID3v1.1, the fixed 128 byte block after the audio.
    Id3v11,
}

/// Renders structured metadata into a tag blob. Implementations must be
/// deterministic: identical fields give identical bytes.
pub trait TagEncoder: Send + Sync {
    fn render(&self, fields: &TagFields, format: TagFormat) -> Result<Vec<u8>, MetadataError>;
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

/// ID3 encoder backed by lofty.
#[derive(Debug, Default, Clone, Copy)]
pub struct Id3Encoder;

impl TagEncoder for Id3Encoder {
    fn render(&self, fields: &TagFields, format: TagFormat) -> Result<Vec<u8>, MetadataError> {
        let tag_type = match format {
            TagFormat::Id3v24 => TagType::Id3v2,
            TagFormat::Id3v11 => TagType::Id3v1,
        };
        let mut tag = Tag::new(tag_type);

        if let Some(title) = &fields.title {
            tag.set_title(title.clone());
        }
        if !fields.artists.is_empty() {
            tag.set_artist(fields.artists.join(" / "));
        }
        if let Some(album) = &fields.album {
            tag.set_album(album.clone());
        }
        if let Some(genre) = &fields.genre {
            tag.set_genre(genre.clone());
        }
        if let Some(track_no) = fields.track_no.filter(|n| *n > 0) {
            tag.set_track(u32::from(track_no));
        }
        if let Some(year) = fields.year.filter(|y| *y > 0) {
            let key = match format {
                TagFormat::Id3v24 => ItemKey::RecordingDate,
                TagFormat::Id3v11 => ItemKey::Year,
            };
            tag.insert_text(key, year.to_string());
        }

        // ID3v1 has no room for these.
        if format == TagFormat::Id3v24 {
            if let Some(album_artist) = &fields.album_artist {
                tag.insert_text(ItemKey::AlbumArtist, album_artist.clone());
            }
            if let Some(disc_no) = fields.disc_no.filter(|n| *n > 0) {
                tag.set_disk(u32::from(disc_no));
            }
            if let Some(cover) = &fields.cover {
                tag.push_picture(Picture::new_unchecked(
                    PictureType::CoverFront,
                    Some(mime_type(cover.mime.as_deref())),
                    Some("Front cover".to_string()),
                    cover.data.clone(),
                ));
            }
        }

        let mut out = Vec::new();
        tag.dump_to(&mut out, WriteOptions::default())?;
        Ok(out)
    }
}

pub fn guess_mime(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg".to_string())
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("image/png".to_string())
    } else {
        None
    }
}

fn mime_type(mime: Option<&str>) -> MimeType {
    match mime {
        Some("image/png") => MimeType::Png,
        _ => MimeType::Jpeg,
    }
}
