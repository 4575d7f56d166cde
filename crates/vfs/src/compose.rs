use std::io::{ErrorKind, Read};

use tracing::{debug, warn};

use crate::VfsError;

/// Opens the audio body on first use.
pub type BodyOpener = Box<dyn FnOnce() -> Result<Box<dyn Read + Send>, VfsError> + Send>;

/// Half-open byte range `[start, end)` of a synthesized file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zone {
    pub start: u64,
    pub end: u64,
}

impl Zone {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The part of `[start, end)` inside this zone, relative to the zone.
    fn overlap(&self, start: u64, end: u64) -> Option<(u64, u64)> {
        let from = start.max(self.start);
        let to = end.min(self.end);
        (from < to).then(|| (from - self.start, to - self.start))
    }
}

enum Body {
    Pending(BodyOpener),
    Streaming(Box<dyn Read + Send>),
    Failed,
    Released,
}

/// Serves reads of one open track file from three zones: the rendered
/// header, the remote audio body and the rendered trailer.
///
/// The body comes from a forward-only stream, so body bytes must be read in
/// order. A read that skips ahead or goes back fails with
/// [`VfsError::StreamConsistency`]; the handle has to be reopened.
pub struct ReadCompositor {
    header: Vec<u8>,
    trailer: Vec<u8>,
    header_zone: Zone,
    body_zone: Zone,
    trailer_zone: Zone,
    body: Body,
    consumed: u64,
}

impl ReadCompositor {
    pub fn new(header: Vec<u8>, body_len: u64, trailer: Vec<u8>, opener: BodyOpener) -> Self {
        let header_len = header.len() as u64;
        let body_end = header_len + body_len;
        let trailer_end = body_end + trailer.len() as u64;
        Self {
            header,
            trailer,
            header_zone: Zone {
                start: 0,
                end: header_len,
            },
            body_zone: Zone {
                start: header_len,
                end: body_end,
            },
            trailer_zone: Zone {
                start: body_end,
                end: trailer_end,
            },
            body: Body::Pending(opener),
            consumed: 0,
        }
    }

    pub fn total_len(&self) -> u64 {
        self.trailer_zone.end
    }

    pub fn zones(&self) -> (Zone, Zone, Zone) {
        (self.header_zone, self.body_zone, self.trailer_zone)
    }

    /// Returns exactly `min(length, total - offset)` bytes starting at
    /// `offset`.
    pub fn read(&mut self, offset: u64, length: u64) -> Result<Vec<u8>, VfsError> {
        if matches!(self.body, Body::Released) {
            return Err(VfsError::BadHandle);
        }
        let total = self.total_len();
        if offset >= total || length == 0 {
            return Ok(Vec::new());
        }
        let end = offset.saturating_add(length).min(total);
        let mut out = Vec::with_capacity((end - offset) as usize);

        if let Some((from, to)) = self.header_zone.overlap(offset, end) {
            out.extend_from_slice(&self.header[from as usize..to as usize]);
        }
        if let Some((from, to)) = self.body_zone.overlap(offset, end) {
            self.read_body(from, to - from, &mut out)?;
        }
        if let Some((from, to)) = self.trailer_zone.overlap(offset, end) {
            out.extend_from_slice(&self.trailer[from as usize..to as usize]);
        }
        Ok(out)
    }

    /// Closes the stream. Releasing twice does nothing.
    pub fn release(&mut self) {
        if !matches!(self.body, Body::Released) {
            debug!("Releasing stream after {} body bytes", self.consumed);
        }
        self.body = Body::Released;
    }

    fn read_body(&mut self, offset: u64, length: u64, out: &mut Vec<u8>) -> Result<(), VfsError> {
        if matches!(self.body, Body::Failed) {
            return Err(VfsError::StreamFailed);
        }
        if offset != self.consumed {
            return Err(VfsError::StreamConsistency {
                expected: self.consumed,
                requested: offset,
            });
        }

        let start = out.len();
        out.resize(start + length as usize, 0);
        let filled = match self.fill(&mut out[start..]) {
            Ok(filled) => filled,
            Err(err) => {
                // Stream position is unknown from here on.
                out.truncate(start);
                self.body = Body::Failed;
                return Err(err);
            }
        };
        if filled < length as usize {
            // The buffer is already zeroed past `filled`.
            warn!(
                "Audio stream ended {} bytes early at body offset {}; padding with zeros",
                length as usize - filled,
                offset + filled as u64
            );
        }
        self.consumed += length;
        Ok(())
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, VfsError> {
        let stream = self.stream()?;
        let mut filled = 0usize;
        while filled < buf.len() {
            match stream.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(VfsError::Io(err)),
            }
        }
        Ok(filled)
    }

    fn stream(&mut self) -> Result<&mut Box<dyn Read + Send>, VfsError> {
        if let Body::Pending(_) = self.body {
            let Body::Pending(opener) = std::mem::replace(&mut self.body, Body::Failed) else {
                return Err(VfsError::StreamFailed);
            };
            self.body = Body::Streaming(opener()?);
        }
        match &mut self.body {
            Body::Streaming(stream) => Ok(stream),
            Body::Released => Err(VfsError::BadHandle),
            _ => Err(VfsError::StreamFailed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Hands out at most `chunk` bytes per read call.
    struct Trickle {
        data: Cursor<Vec<u8>>,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let len = buf.len().min(self.chunk);
            self.data.read(&mut buf[..len])
        }
    }

    fn body_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|n| (n % 251) as u8 + 1).collect()
    }

    fn compositor(body: Vec<u8>, body_len: u64, opens: Arc<AtomicUsize>) -> ReadCompositor {
        let opener: BodyOpener = Box::new(move || {
            opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Trickle {
                data: Cursor::new(body),
                chunk: 7,
            }) as Box<dyn Read + Send>)
        });
        ReadCompositor::new(vec![0xAA; 10], body_len, vec![0xBB; 4], opener)
    }

    fn expected(body: &[u8]) -> Vec<u8> {
        let mut all = vec![0xAA; 10];
        all.extend_from_slice(body);
        all.extend_from_slice(&[0xBB; 4]);
        all
    }

    #[test]
    fn whole_file_in_one_read() {
        let body = body_bytes(50);
        let opens = Arc::new(AtomicUsize::new(0));
        let mut file = compositor(body.clone(), 50, opens.clone());
        assert_eq!(file.total_len(), 64);

        let bytes = file.read(0, 64).unwrap();
        assert_eq!(bytes, expected(&body));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sequential_chunks_match_slices() {
        let body = body_bytes(50);
        let all = expected(&body);
        let mut file = compositor(body, 50, Arc::new(AtomicUsize::new(0)));

        let mut offset = 0u64;
        for size in [3u64, 9, 20, 1, 30, 100] {
            let chunk = file.read(offset, size).unwrap();
            let end = (offset + size).min(64) as usize;
            assert_eq!(chunk, all[offset as usize..end]);
            offset = end as u64;
        }
        assert!(file.read(64, 10).unwrap().is_empty());
        assert!(file.read(1000, 10).unwrap().is_empty());
    }

    #[test]
    fn header_reads_do_not_open_the_stream() {
        let opens = Arc::new(AtomicUsize::new(0));
        let mut file = compositor(body_bytes(50), 50, opens.clone());
        assert_eq!(file.read(0, 5).unwrap(), vec![0xAA; 5]);
        assert_eq!(file.read(5, 5).unwrap(), vec![0xAA; 5]);
        assert_eq!(opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn trailer_reads_after_body() {
        let body = body_bytes(50);
        let mut file = compositor(body, 50, Arc::new(AtomicUsize::new(0)));
        file.read(0, 60).unwrap();
        assert_eq!(file.read(60, 4).unwrap(), vec![0xBB; 4]);
        assert_eq!(file.read(62, 10).unwrap(), vec![0xBB; 2]);
    }

    #[test]
    fn short_stream_is_padded_with_zeros() {
        let body = body_bytes(30);
        let mut file = compositor(body.clone(), 50, Arc::new(AtomicUsize::new(0)));
        let bytes = file.read(0, 64).unwrap();
        assert_eq!(bytes.len(), 64);
        assert_eq!(&bytes[10..40], &body[..]);
        assert!(bytes[40..60].iter().all(|b| *b == 0));
        assert_eq!(&bytes[60..], &[0xBB; 4]);
    }

    #[test]
    fn long_stream_is_cut_at_body_end() {
        let body = body_bytes(80);
        let mut file = compositor(body.clone(), 50, Arc::new(AtomicUsize::new(0)));
        let bytes = file.read(0, 100).unwrap();
        assert_eq!(bytes.len(), 64);
        assert_eq!(&bytes[10..60], &body[..50]);
        assert_eq!(&bytes[60..], &[0xBB; 4]);
    }

    #[test]
    fn non_sequential_body_reads_fail() {
        let mut file = compositor(body_bytes(50), 50, Arc::new(AtomicUsize::new(0)));
        file.read(0, 20).unwrap();
        match file.read(40, 5) {
            Err(VfsError::StreamConsistency {
                expected,
                requested,
            }) => {
                assert_eq!(expected, 10);
                assert_eq!(requested, 30);
            }
            other => panic!("expected stream consistency error, got {:?}", other),
        }
        match file.read(12, 5) {
            Err(VfsError::StreamConsistency { .. }) => {}
            other => panic!("expected stream consistency error, got {:?}", other),
        }
        // Header and trailer stay readable.
        assert_eq!(file.read(0, 2).unwrap(), vec![0xAA; 2]);
        assert_eq!(file.read(60, 4).unwrap(), vec![0xBB; 4]);
    }

    #[test]
    fn release_is_idempotent() {
        let mut file = compositor(body_bytes(50), 50, Arc::new(AtomicUsize::new(0)));
        file.read(0, 30).unwrap();
        file.release();
        file.release();
        assert!(matches!(file.read(0, 5), Err(VfsError::BadHandle)));
    }

    #[test]
    fn empty_trailer_zone() {
        let body = body_bytes(5);
        let opener: BodyOpener = {
            let body = body.clone();
            Box::new(move || Ok(Box::new(Cursor::new(body)) as Box<dyn Read + Send>))
        };
        let mut file = ReadCompositor::new(vec![1, 2], 5, Vec::new(), opener);
        let (_, _, trailer) = file.zones();
        assert!(trailer.is_empty());
        assert_eq!(file.read(0, 100).unwrap(), [&[1u8, 2][..], &body[..]].concat());
    }

    #[test]
    fn zones_cover_file() {
        let file = compositor(body_bytes(50), 50, Arc::new(AtomicUsize::new(0)));
        let (header, body, trailer) = file.zones();
        assert_eq!(header, Zone { start: 0, end: 10 });
        assert_eq!(body.len(), 50);
        assert_eq!(trailer, Zone { start: 60, end: 64 });
    }

    /// Yields `good` bytes, then fails with a connection reset.
    struct Broken {
        data: Cursor<Vec<u8>>,
        good: usize,
    }

    impl Read for Broken {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let left = self.good - self.data.position() as usize;
            if left == 0 {
                return Err(std::io::Error::new(ErrorKind::ConnectionReset, "reset"));
            }
            let len = buf.len().min(left);
            self.data.read(&mut buf[..len])
        }
    }

    #[test]
    fn stream_error_poisons_later_body_reads() {
        let body = body_bytes(20);
        let opener: BodyOpener = Box::new(move || {
            Ok(Box::new(Broken {
                data: Cursor::new(body),
                good: 5,
            }) as Box<dyn Read + Send>)
        });
        let mut file = ReadCompositor::new(Vec::new(), 20, Vec::new(), opener);

        assert!(matches!(file.read(0, 10), Err(VfsError::Io(_))));
        assert!(matches!(file.read(0, 10), Err(VfsError::StreamFailed)));
        assert!(matches!(file.read(5, 10), Err(VfsError::StreamFailed)));
    }

    #[test]
    fn failed_open_reports_io_not_bad_handle() {
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = opens.clone();
        let opener: BodyOpener = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(VfsError::Io(std::io::Error::new(ErrorKind::TimedOut, "timeout")))
        });
        let mut file = ReadCompositor::new(vec![0xAA; 4], 10, vec![0xBB; 2], opener);

        let err = file.read(0, 8).unwrap_err();
        assert_eq!(err.errno(), libc::EIO);
        let err = file.read(4, 4).unwrap_err();
        assert!(matches!(err, VfsError::StreamFailed));
        assert_eq!(err.errno(), libc::EIO);
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        // Header and trailer are still served.
        assert_eq!(file.read(0, 4).unwrap(), vec![0xAA; 4]);
        assert_eq!(file.read(14, 2).unwrap(), vec![0xBB; 2]);

        file.release();
        assert!(matches!(file.read(0, 1), Err(VfsError::BadHandle)));
    }
}
