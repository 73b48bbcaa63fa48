//! Byte providers and the slices values are bound to.
//!
//! Every source answers three questions: can `length` bytes be read at `offset`, what are
//! those bytes, and (optionally) how large is the source. Sources are shared between parse
//! states through the cheap [`Source`] handle, and any caching happens behind it, so a
//! source needs to be [`Sync`] to be shared with concurrent parses.

use std::{
    fmt::{Debug, Formatter},
    fs::File,
    io::{ErrorKind, Read, Seek, SeekFrom},
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};

use rustc_hash::FxHashMap;

use crate::error::SourceError;

pub trait ByteSource: Send + Sync + Debug {
    /// Reads exactly `length` bytes at `offset`, [`SourceError::Unavailable`] if the range
    /// is not (entirely) in the source.
    fn read(&self, offset: u64, length: u64) -> Result<Arc<[u8]>, SourceError>;

    fn is_available(&self, offset: u64, length: u64) -> Result<bool, SourceError>;

    /// The total size, if known without exhausting the source.
    fn size(&self) -> Option<u64> {
        None
    }
}

fn end_of(offset: u64, length: u64) -> Result<u64, SourceError> {
    offset
        .checked_add(length)
        .ok_or(SourceError::Unavailable { offset, length })
}

/// A shared handle to a [`ByteSource`], compared by identity.
#[derive(Clone)]
pub struct Source(Arc<dyn ByteSource>);

impl Source {
    pub fn new(source: impl ByteSource + 'static) -> Self {
        Source(Arc::new(source))
    }

    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Source::new(MemorySource::new(bytes))
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        Ok(Source::new(FileSource::open(path)?))
    }

    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Source::new(StreamSource::new(reader))
    }

    pub fn read(&self, offset: u64, length: u64) -> Result<Arc<[u8]>, SourceError> {
        self.0.read(offset, length)
    }

    pub fn is_available(&self, offset: u64, length: u64) -> Result<bool, SourceError> {
        self.0.is_available(offset, length)
    }

    pub fn size(&self) -> Option<u64> {
        self.0.size()
    }

    /// Whether both handles refer to the same underlying source.
    pub fn same(&self, other: &Source) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Source {}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Bytes held in memory.
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        MemorySource { data: data.into() }
    }

    fn range(&self, offset: u64, length: u64) -> Option<std::ops::Range<usize>> {
        let end = usize::try_from(offset.checked_add(length)?).ok()?;
        let start = usize::try_from(offset).ok()?;
        (end <= self.data.len()).then_some(start..end)
    }
}

impl ByteSource for MemorySource {
    fn read(&self, offset: u64, length: u64) -> Result<Arc<[u8]>, SourceError> {
        self.range(offset, length)
            .map(|r| Arc::from(&self.data[r]))
            .ok_or(SourceError::Unavailable { offset, length })
    }

    fn is_available(&self, offset: u64, length: u64) -> Result<bool, SourceError> {
        Ok(self.range(offset, length).is_some())
    }

    fn size(&self) -> Option<u64> {
        u64::try_from(self.data.len()).ok()
    }
}

impl Debug for MemorySource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemorySource({} bytes)", self.data.len())
    }
}

/// Files are read and cached in blocks of this size.
const FILE_BLOCK: u64 = 4 * 1024;

/// A file read on demand. Each block of the file is read at most once and kept, so the
/// cache never holds more than the file itself.
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
    blocks: Mutex<FxHashMap<u64, Arc<[u8]>>>,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(FileSource {
            file: Mutex::new(file),
            len,
            blocks: Mutex::new(FxHashMap::default()),
        })
    }

    // INV: `index * FILE_BLOCK < self.len`
    fn block(
        &self,
        blocks: &mut FxHashMap<u64, Arc<[u8]>>,
        index: u64,
    ) -> Result<Arc<[u8]>, SourceError> {
        if let Some(block) = blocks.get(&index) {
            return Ok(block.clone());
        }
        let start = index * FILE_BLOCK;
        let mut buf = vec![0; FILE_BLOCK.min(self.len - start) as usize];
        {
            let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
            file.seek(SeekFrom::Start(start))?;
            file.read_exact(&mut buf)?;
        }
        let block: Arc<[u8]> = Arc::from(buf);
        blocks.insert(index, block.clone());
        Ok(block)
    }
}

#[cfg(test)]
impl FileSource {
    fn cached_bytes(&self) -> usize {
        let blocks = self.blocks.lock().unwrap_or_else(PoisonError::into_inner);
        blocks.values().map(|b| b.len()).sum()
    }
}

impl ByteSource for FileSource {
    fn read(&self, offset: u64, length: u64) -> Result<Arc<[u8]>, SourceError> {
        if !self.is_available(offset, length)? {
            return Err(SourceError::Unavailable { offset, length });
        }
        let size = usize::try_from(length).map_err(|_| SourceError::Unavailable { offset, length })?;
        let end = offset + length;
        let mut data = Vec::with_capacity(size);
        let mut blocks = self.blocks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut at = offset;
        while at < end {
            let index = at / FILE_BLOCK;
            let base = index * FILE_BLOCK;
            let block = self.block(&mut blocks, index)?;
            let upto = end.min(base + FILE_BLOCK);
            data.extend_from_slice(&block[(at - base) as usize..(upto - base) as usize]);
            at = upto;
        }
        Ok(Arc::from(data))
    }

    fn is_available(&self, offset: u64, length: u64) -> Result<bool, SourceError> {
        Ok(offset.checked_add(length).is_some_and(|end| end <= self.len))
    }

    fn size(&self) -> Option<u64> {
        Some(self.len)
    }
}

impl Debug for FileSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileSource({} bytes)", self.len)
    }
}

const STREAM_CHUNK: usize = 8 * 1024;

struct StreamBuffer<R> {
    reader: R,
    buffer: Vec<u8>,
    exhausted: bool,
}

impl<R: Read> StreamBuffer<R> {
    /// Reads forward until at least `end` bytes are buffered, or the stream ends.
    fn fill_to(&mut self, end: u64) -> Result<(), SourceError> {
        let mut chunk = [0; STREAM_CHUNK];
        while !self.exhausted && (self.buffer.len() as u64) < end {
            match self.reader.read(&mut chunk) {
                Ok(0) => self.exhausted = true,
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// A forward-only stream. Everything read so far is retained, so any offset behind the
/// furthest read is served from memory, and reading further only ever moves forward.
pub struct StreamSource<R> {
    inner: Mutex<StreamBuffer<R>>,
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        StreamSource {
            inner: Mutex::new(StreamBuffer {
                reader,
                buffer: Vec::new(),
                exhausted: false,
            }),
        }
    }
}

impl<R: Read + Send> ByteSource for StreamSource<R> {
    fn read(&self, offset: u64, length: u64) -> Result<Arc<[u8]>, SourceError> {
        let end = end_of(offset, length)?;
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.fill_to(end)?;
        if (inner.buffer.len() as u64) < end {
            return Err(SourceError::Unavailable { offset, length });
        }
        // INV: end <= buffer.len(), so both fit in usize
        Ok(Arc::from(&inner.buffer[offset as usize..end as usize]))
    }

    fn is_available(&self, offset: u64, length: u64) -> Result<bool, SourceError> {
        let Ok(end) = end_of(offset, length) else {
            return Ok(false);
        };
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.fill_to(end)?;
        Ok(inner.buffer.len() as u64 >= end)
    }

    fn size(&self) -> Option<u64> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.exhausted.then_some(inner.buffer.len() as u64)
    }
}

impl<R> Debug for StreamSource<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "StreamSource")
    }
}

/// A materialized range of a source.
#[derive(Clone, PartialEq, Eq)]
pub struct Slice {
    source: Source,
    offset: u64,
    data: Arc<[u8]>,
}

impl Slice {
    /// Reads a slice, `Ok(None)` if the range is unavailable.
    pub fn read(source: &Source, offset: u64, length: u64) -> Result<Option<Slice>, SourceError> {
        match source.read(offset, length) {
            Ok(data) => Ok(Some(Slice {
                source: source.clone(),
                offset,
                data,
            })),
            Err(SourceError::Unavailable { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// A slice of `source` whose bytes were already read.
    pub(crate) fn new(source: Source, offset: u64, data: Arc<[u8]>) -> Slice {
        Slice {
            source,
            offset,
            data,
        }
    }

    /// A slice over bytes that do not come from parsed input (constants, computed values).
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Slice {
        let data: Arc<[u8]> = bytes.into();
        Slice {
            source: Source::new(MemorySource::new(data.clone())),
            offset: 0,
            data,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Debug for Slice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Slice@{}{:02x?}", self.offset, &*self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn memory_bounds() {
        let src = Source::from_bytes(vec![1, 2, 3, 4]);
        assert_eq!(&*src.read(1, 2).unwrap(), &[2, 3]);
        assert!(src.is_available(0, 4).unwrap());
        assert!(!src.is_available(2, 3).unwrap());
        assert!(!src.is_available(u64::MAX, 2).unwrap());
        assert!(matches!(
            src.read(3, 2),
            Err(SourceError::Unavailable {
                offset: 3,
                length: 2
            })
        ));
        assert_eq!(src.size(), Some(4));
    }

    #[test]
    fn stream_buffers_forward() {
        let data: Vec<u8> = (0..=255).cycle().take(20_000).collect();
        let src = Source::from_reader(Cursor::new(data.clone()));
        assert_eq!(src.size(), None);
        assert_eq!(&*src.read(10_000, 3).unwrap(), &data[10_000..10_003]);
        // behind the high water mark
        assert_eq!(&*src.read(5, 2).unwrap(), &data[5..7]);
        assert!(!src.is_available(19_999, 2).unwrap());
        assert_eq!(src.size(), Some(20_000));
    }

    #[test]
    fn file_reads_through_blocks() {
        let data: Vec<u8> = (0..=255).cycle().take(10_000).collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &data).unwrap();
        let src = FileSource::open(file.path()).unwrap();

        assert_eq!(src.size(), Some(10_000));
        assert!(src.is_available(0, 10_000).unwrap());
        assert!(!src.is_available(9_999, 2).unwrap());
        assert!(!src.is_available(u64::MAX, 1).unwrap());
        assert!(matches!(
            src.read(9_999, 2),
            Err(SourceError::Unavailable { offset: 9_999, length: 2 })
        ));

        // spans the first block boundary
        assert_eq!(&*src.read(4_090, 12).unwrap(), &data[4_090..4_102]);
        assert_eq!(&*src.read(9_000, 1_000).unwrap(), &data[9_000..]);
        assert!(src.read(5, 0).unwrap().is_empty());
        assert_eq!(src.cached_bytes(), 4_096 * 2 + (10_000 - 4_096 * 2));

        // growing prefixes of one range only ever cache the blocks they cover
        for length in 0..3_000 {
            assert_eq!(&*src.read(100, length).unwrap(), &data[100..100 + length as usize]);
        }
        assert_eq!(src.cached_bytes(), data.len());
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Source::open(dir.path().join("absent")),
            Err(SourceError::Io(_))
        ));
    }

    #[test]
    fn slice_unavailable_is_none() {
        let src = Source::from_bytes(vec![1]);
        assert!(Slice::read(&src, 0, 2).unwrap().is_none());
        let slice = Slice::read(&src, 0, 1).unwrap().unwrap();
        assert_eq!(slice.data(), &[1]);
        assert!(slice.source().same(&src));
    }

    #[test]
    fn identity() {
        let a = Source::from_bytes(vec![1]);
        let b = Source::from_bytes(vec![1]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
