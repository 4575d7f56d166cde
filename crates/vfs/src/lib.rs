//! Read-only filesystem view of a remote music catalog.
//!
//! [`CatalogFs`] implements the operations a host filesystem layer needs
//! (`getattr`, `open`, `read`, `release`, `readdir`) on top of a published
//! [`CatalogIndex`]. Track files are synthesized: a rendered tag header,
//! the remote audio body and an optional rendered trailer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use catalog::{CatalogService, Credentials, HttpCatalog, HttpSource, RemoteSource, Session};
use library::{CatalogIndex, LibraryStats, TrackKey};
use metadata::{Id3Encoder, TagEncoder};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub mod compose;
pub mod config;
pub mod error;
pub mod path;
pub mod size;
pub mod state;
pub mod tags;

pub use compose::{BodyOpener, ReadCompositor, Zone};
pub use config::{FsConfig, TagLayout};
pub use error::VfsError;
pub use path::{Node, PathResolver};
pub use size::SizeCalculator;
pub use state::{IndexState, IndexStatus};

const DIR_MODE: u32 = 0o555;
const FILE_MODE: u32 = 0o444;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Directory,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub kind: FileKind,
    pub size: u64,
    /// Permission bits only; the type comes from `kind`.
    pub mode: u32,
    pub nlink: u32,
    pub mtime: u64,
    pub atime: u64,
}

impl FileStat {
    fn directory(mtime: u64) -> Self {
        Self {
            kind: FileKind::Directory,
            size: 0,
            mode: DIR_MODE,
            nlink: 2,
            mtime,
            atime: mtime,
        }
    }

    fn file(size: u64, mtime: u64, atime: u64) -> Self {
        Self {
            kind: FileKind::File,
            size,
            mode: FILE_MODE,
            nlink: 1,
            mtime,
            atime,
        }
    }
}

enum Content {
    Track(ReadCompositor),
    Cover(Bytes),
}

struct OpenFile {
    /// Snapshot the handle was opened against; a rescan does not affect it.
    index: Arc<CatalogIndex>,
    track: Option<TrackKey>,
    content: Content,
}

impl OpenFile {
    fn read(&mut self, offset: u64, length: u64) -> Result<Vec<u8>, VfsError> {
        match &mut self.content {
            Content::Track(compositor) => compositor.read(offset, length),
            Content::Cover(data) => {
                let len = data.len() as u64;
                if offset >= len {
                    return Ok(Vec::new());
                }
                let end = offset.saturating_add(length).min(len);
                Ok(data[offset as usize..end as usize].to_vec())
            }
        }
    }

    fn release(&mut self) {
        if let Content::Track(compositor) = &mut self.content {
            compositor.release();
        }
        if let Some(track) = self.track {
            debug!("Closed {:?}", self.index.track(track).title);
        }
    }
}

pub struct CatalogFs {
    catalog: Arc<dyn CatalogService>,
    sizes: Arc<SizeCalculator>,
    credentials: Credentials,
    session: RwLock<Option<Session>>,
    state: IndexState,
    enrich: bool,
    lowercase: bool,
    scan_on_start: bool,
    handles: Mutex<HashMap<u64, Arc<Mutex<OpenFile>>>>,
    next_handle: AtomicU64,
}

impl CatalogFs {
    pub fn new(
        config: &FsConfig,
        catalog: Arc<dyn CatalogService>,
        source: Arc<dyn RemoteSource>,
        encoder: Arc<dyn TagEncoder>,
    ) -> Self {
        let sizes = SizeCalculator::new(
            catalog.clone(),
            source,
            encoder,
            config.tag_layout,
            config.true_file_size,
            config.device_id.clone(),
        );
        Self {
            catalog,
            sizes: Arc::new(sizes),
            credentials: Credentials {
                username: config.username.clone(),
                password: config.password.clone(),
            },
            session: RwLock::new(None),
            state: IndexState::new(),
            enrich: config.enrich_metadata,
            lowercase: config.lowercase,
            scan_on_start: config.scan_on_start,
            handles: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Wires up the HTTP catalog, the HTTP byte source and the ID3 encoder.
    pub fn from_config(config: &FsConfig) -> Result<Self, VfsError> {
        let timeout = Duration::from_secs(config.http_timeout_secs);
        let catalog = HttpCatalog::new(&config.catalog_url, &config.user_agent, timeout)?;
        let source = HttpSource::new(&config.user_agent, timeout)?;
        Ok(Self::new(
            config,
            Arc::new(catalog),
            Arc::new(source),
            Arc::new(Id3Encoder),
        ))
    }

    pub fn status(&self) -> IndexStatus {
        self.state.status()
    }

    pub fn index(&self) -> Option<Arc<CatalogIndex>> {
        self.state.current()
    }

    /// Runs the initial scan unless `scan_on_start` is off, in which case
    /// nothing is served until [`Self::rescan`] is called.
    pub fn start(&self) -> Result<Option<LibraryStats>, VfsError> {
        if !self.scan_on_start {
            info!("Initial catalog scan disabled; waiting for a rescan");
            return Ok(None);
        }
        self.rescan().map(Some)
    }

    /// Logs in and rebuilds the index from the catalog. On failure the
    /// previously published index stays in place.
    pub fn rescan(&self) -> Result<LibraryStats, VfsError> {
        self.state.begin_scan();
        match self.build_index() {
            Ok(index) => {
                let stats = self.state.publish(index);
                info!(
                    "Catalog ready: {} artists, {} albums, {} tracks, {} playlists",
                    stats.artists, stats.albums, stats.tracks, stats.playlists
                );
                Ok(stats)
            }
            Err(err) => {
                let message = err.to_string();
                warn!("Catalog scan failed: {}", message);
                self.state.fail(message);
                Err(err)
            }
        }
    }

    fn build_index(&self) -> Result<CatalogIndex, VfsError> {
        let session = self.catalog.authenticate(&self.credentials)?;
        let index = CatalogIndex::load(self.catalog.as_ref(), &session, self.enrich)?;
        *self.session.write() = Some(session);
        Ok(index)
    }

    pub fn getattr(&self, path: &str) -> Result<FileStat, VfsError> {
        let index = self.snapshot()?;
        let resolver = PathResolver::new(&index, self.lowercase);
        let published = self.state.published_secs();
        let session = self.session.read().clone();

        match resolver.resolve(path) {
            Node::NotFound => Err(VfsError::NotFound),
            node if node.is_dir() => Ok(FileStat::directory(published)),
            Node::TrackFile { track, .. } | Node::PlaylistTrackFile { track, .. } => {
                let sizing = self.sizes.size_of(&index, track, session.as_ref())?;
                let entry = index.track(track);
                let mtime = match entry.created_secs {
                    0 => published,
                    secs => secs,
                };
                let atime = entry.accessed_secs.max(mtime);
                Ok(FileStat::file(sizing.total(), mtime, atime))
            }
            Node::CoverFile { art, .. } => {
                let size = self.sizes.cover_len(index.art(art))?;
                Ok(FileStat::file(size, published, published))
            }
            _ => Err(VfsError::NotFound),
        }
    }

    /// Directory entries, starting with `.` and `..`.
    pub fn readdir(&self, path: &str) -> Result<Vec<String>, VfsError> {
        let index = self.snapshot()?;
        let resolver = PathResolver::new(&index, self.lowercase);
        let node = resolver.resolve(path);
        if matches!(node, Node::NotFound) {
            return Err(VfsError::NotFound);
        }
        let names = resolver.list(&node).ok_or(VfsError::NotADirectory)?;
        let mut entries = Vec::with_capacity(names.len() + 2);
        entries.push(".".to_string());
        entries.push("..".to_string());
        entries.extend(names);
        Ok(entries)
    }

    /// Opens a file and returns its handle. Renders the tags (fetching
    /// cover art when embedded) but leaves the audio stream closed until a
    /// read reaches the body.
    pub fn open(&self, path: &str) -> Result<u64, VfsError> {
        let index = self.snapshot()?;
        let resolver = PathResolver::new(&index, self.lowercase);
        let node = resolver.resolve(path);

        let (track, content) = match node {
            Node::NotFound => return Err(VfsError::NotFound),
            node if node.is_dir() => return Err(VfsError::IsDirectory),
            Node::TrackFile { track, .. } | Node::PlaylistTrackFile { track, .. } => {
                (Some(track), Content::Track(self.compose(&index, track)?))
            }
            Node::CoverFile { art, .. } => (None, Content::Cover(self.sizes.cover_bytes(index.art(art))?)),
            _ => return Err(VfsError::NotFound),
        };

        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let file = OpenFile {
            index,
            track,
            content,
        };
        self.handles.lock().insert(handle, Arc::new(Mutex::new(file)));
        debug!("Opened {} as handle {}", path, handle);
        Ok(handle)
    }

    pub fn read(&self, handle: u64, offset: u64, length: u64) -> Result<Vec<u8>, VfsError> {
        let file = self
            .handles
            .lock()
            .get(&handle)
            .cloned()
            .ok_or(VfsError::BadHandle)?;
        let mut file = file.lock();
        file.read(offset, length)
    }

    /// Drops a handle. Unknown or already released handles are ignored.
    pub fn release(&self, handle: u64) {
        let file = self.handles.lock().remove(&handle);
        match file {
            Some(file) => file.lock().release(),
            None => debug!("Handle {} already released", handle),
        }
    }

    pub fn open_handles(&self) -> usize {
        self.handles.lock().len()
    }

    fn snapshot(&self) -> Result<Arc<CatalogIndex>, VfsError> {
        self.state.current().ok_or(VfsError::NotReady)
    }

    fn compose(&self, index: &Arc<CatalogIndex>, track: TrackKey) -> Result<ReadCompositor, VfsError> {
        let session = self.session.read().clone().ok_or(VfsError::NotReady)?;
        let sizing = self.sizes.size_of(index, track, Some(&session))?;
        let (header, trailer) = self.sizes.render_zones(index, track, sizing)?;

        let sizes = self.sizes.clone();
        let snapshot = index.clone();
        let opener: BodyOpener =
            Box::new(move || sizes.open_body(snapshot.track(track), &session));
        Ok(ReadCompositor::new(header, sizing.body, trailer, opener))
    }
}
