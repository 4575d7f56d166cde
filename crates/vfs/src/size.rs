use std::sync::Arc;

use bytes::Bytes;
use catalog::{CatalogService, RemoteSource, Session};
use library::{Art, CatalogIndex, Sizing, Track, TrackKey};
use metadata::{guess_mime, CoverArt, TagEncoder, TagFields, TagFormat};
use tracing::{debug, warn};

use crate::config::TagLayout;
use crate::tags::track_fields;
use crate::VfsError;

/// Works out the layout of synthesized track files and renders their tags.
pub struct SizeCalculator {
    catalog: Arc<dyn CatalogService>,
    source: Arc<dyn RemoteSource>,
    encoder: Arc<dyn TagEncoder>,
    layout: TagLayout,
    true_size: bool,
    device_id: String,
}

impl SizeCalculator {
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        source: Arc<dyn RemoteSource>,
        encoder: Arc<dyn TagEncoder>,
        layout: TagLayout,
        true_size: bool,
        device_id: String,
    ) -> Self {
        Self {
            catalog,
            source,
            encoder,
            layout,
            true_size,
            device_id,
        }
    }

    /// Exact layout of a track file. Computed once per track; later calls,
    /// from any view of the track, return the cached value.
    pub fn size_of(
        &self,
        index: &CatalogIndex,
        key: TrackKey,
        session: Option<&Session>,
    ) -> Result<Sizing, VfsError> {
        let track = index.track(key);
        if let Some(sizing) = track.sizing() {
            return Ok(sizing);
        }

        let cover = track.art.and_then(|art| {
            let art = index.art(art);
            self.art_size(art)
                .map(|len| CoverArt::placeholder(len as usize, &mime_hint(&art.url)))
        });
        let fields = track_fields(index, track, cover);
        let header = self.encoder.render(&fields, TagFormat::Id3v24)?.len() as u64;
        let trailer = self.render_trailer(&fields)?.len() as u64;
        let body = self.body_len(track, session);

        let sizing = track.cache_sizing(Sizing {
            header,
            body,
            trailer,
        });
        debug!(
            "Sized {:?}: header {} body {} trailer {}",
            track.title, sizing.header, sizing.body, sizing.trailer
        );
        Ok(sizing)
    }

    /// Probed byte length of a cover image, `None` when it cannot be
    /// embedded. Probed at most once per image.
    pub fn art_size(&self, art: &Art) -> Option<u64> {
        if let Some(size) = art.size() {
            return size;
        }
        let size = match self.source.content_length(&art.url) {
            Ok(0) => None,
            Ok(len) => Some(len),
            Err(err) => {
                debug!("Art probe for {} failed: {}", art.url, err);
                None
            }
        };
        art.cache_size(size)
    }

    pub fn art_bytes(&self, art: &Art) -> Result<Bytes, VfsError> {
        if let Some(data) = art.data() {
            return Ok(data);
        }
        let data = self.source.fetch(&art.url)?;
        Ok(art.cache_data(data))
    }

    /// Advertised length of a `cover.jpg` file: the probed size, else the
    /// fetched length.
    pub fn cover_len(&self, art: &Art) -> Result<u64, VfsError> {
        match self.art_size(art) {
            Some(size) => Ok(size),
            None => Ok(self.art_bytes(art)?.len() as u64),
        }
    }

    /// Cover bytes cut or zero-padded to [`Self::cover_len`].
    pub fn cover_bytes(&self, art: &Art) -> Result<Bytes, VfsError> {
        let len = self.cover_len(art)?;
        let data = self.art_bytes(art)?;
        if data.len() as u64 == len {
            return Ok(data);
        }
        let mut buf = data.to_vec();
        fit(&mut buf, len, &art.url, "cover");
        Ok(Bytes::from(buf))
    }

    /// Header and trailer bytes for an open file. Their lengths always equal
    /// the ones in `sizing`.
    pub fn render_zones(
        &self,
        index: &CatalogIndex,
        key: TrackKey,
        sizing: Sizing,
    ) -> Result<(Vec<u8>, Vec<u8>), VfsError> {
        let track = index.track(key);
        let probed = track.art.and_then(|art| {
            let art = index.art(art);
            self.art_size(art).map(|len| (art, len))
        });

        let mut header = match probed {
            Some((art, len)) => match self.art_bytes(art) {
                Ok(data) if data.len() as u64 == len => {
                    self.cover_header(index, track, art, data, sizing.header)?
                }
                Ok(data) => {
                    warn!(
                        "Art at {} is {} bytes, expected {}; embedding a blank image",
                        art.url,
                        data.len(),
                        len
                    );
                    self.placeholder_header(index, track, art, len)?
                }
                Err(err) => {
                    warn!("Art fetch from {} failed: {}; embedding a blank image", art.url, err);
                    self.placeholder_header(index, track, art, len)?
                }
            },
            None => self
                .encoder
                .render(&track_fields(index, track, None), TagFormat::Id3v24)?,
        };
        fit(&mut header, sizing.header, &track.title, "header");

        let mut trailer = self.render_trailer(&track_fields(index, track, None))?;
        fit(&mut trailer, sizing.trailer, &track.title, "trailer");
        Ok((header, trailer))
    }

    /// Opens the audio stream of a track.
    pub fn open_body(
        &self,
        track: &Track,
        session: &Session,
    ) -> Result<Box<dyn std::io::Read + Send>, VfsError> {
        let url = self.stream_url(track, session)?;
        debug!("Streaming {:?} from {}", track.title, url);
        Ok(self.source.open(&url)?)
    }

    fn stream_url(&self, track: &Track, session: &Session) -> Result<String, VfsError> {
        let id = track.remote_id.as_deref().ok_or(VfsError::NotFound)?;
        Ok(self.catalog.stream_url(session, id, &self.device_id)?)
    }

    /// Header embedding the real image. The sniffed mime type is used when
    /// it keeps the sized header length, else the one the size was computed
    /// with; if neither fits the image is blanked.
    fn cover_header(
        &self,
        index: &CatalogIndex,
        track: &Track,
        art: &Art,
        data: Bytes,
        expected: u64,
    ) -> Result<Vec<u8>, VfsError> {
        let hint = mime_hint(&art.url);
        let mut mimes = Vec::with_capacity(2);
        if let Some(sniffed) = guess_mime(&data).filter(|mime| *mime != hint) {
            mimes.push(sniffed);
        }
        mimes.push(hint);

        for mime in mimes {
            let cover = CoverArt {
                data: data.to_vec(),
                mime: Some(mime),
            };
            let header = self
                .encoder
                .render(&track_fields(index, track, Some(cover)), TagFormat::Id3v24)?;
            if header.len() as u64 == expected {
                return Ok(header);
            }
        }
        debug!("Real art for {:?} changes the header size; blanking it", track.title);
        self.placeholder_header(index, track, art, data.len() as u64)
    }

    fn placeholder_header(
        &self,
        index: &CatalogIndex,
        track: &Track,
        art: &Art,
        len: u64,
    ) -> Result<Vec<u8>, VfsError> {
        let cover = CoverArt::placeholder(len as usize, &mime_hint(&art.url));
        let fields = track_fields(index, track, Some(cover));
        Ok(self.encoder.render(&fields, TagFormat::Id3v24)?)
    }

    fn render_trailer(&self, fields: &TagFields) -> Result<Vec<u8>, VfsError> {
        if !self.layout.has_trailer() {
            return Ok(Vec::new());
        }
        let mut fields = fields.clone();
        fields.cover = None;
        Ok(self.encoder.render(&fields, TagFormat::Id3v11)?)
    }

    fn body_len(&self, track: &Track, session: Option<&Session>) -> u64 {
        if !self.true_size {
            return track.estimated_size;
        }
        if let Some(exact) = track.exact_size {
            return exact;
        }
        let Some(session) = session else {
            return track.estimated_size;
        };
        match self
            .stream_url(track, session)
            .and_then(|url| Ok(self.source.content_length(&url)?))
        {
            Ok(len) => len,
            Err(err) => {
                warn!(
                    "Length probe for {:?} failed: {}; using the estimate",
                    track.title, err
                );
                track.estimated_size
            }
        }
    }
}

/// Mime type assumed for an image before its bytes are fetched.
fn mime_hint(url: &str) -> String {
    mime_from_url(url).unwrap_or_else(|| "image/jpeg".to_string())
}

fn mime_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    mime_guess::from_path(path)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .map(|mime| mime.essence_str().to_string())
}

/// Pads with zeros or truncates so the advertised size always holds.
fn fit(buf: &mut Vec<u8>, len: u64, title: &str, zone: &str) {
    if buf.len() as u64 != len {
        warn!(
            "Rendered {} for {:?} is {} bytes, expected {}",
            zone,
            title,
            buf.len(),
            len
        );
        buf.resize(len as usize, 0);
    }
}
