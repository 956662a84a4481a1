use crate::platform::SharedPtr;
use std::{
    fmt, io,
    ops::{Bound, RangeBounds},
    path::{Path, PathBuf},
};

#[derive(Clone)]
enum BlobData {
    Memory {
        bytes: SharedPtr<[u8]>,
        start: usize,
        end: usize,
    },
    File {
        path: SharedPtr<Path>,
        offset: u64,
        len: u64,
    },
}

/// Immutable binary large object, either held in memory or backed by a file
/// that is read lazily when a [`TaskFileReader`](super::TaskFileReader) reads it.
///
/// Clones share the underlying bytes.
#[derive(Clone)]
pub struct Blob {
    data: BlobData,
    content_type: String,
}

impl Blob {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        let bytes: SharedPtr<[u8]> = SharedPtr::from(bytes.into());
        let end = bytes.len();
        Self {
            data: BlobData::Memory {
                bytes,
                start: 0,
                end,
            },
            content_type: content_type.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), "")
    }

    /// Snapshot a file's size now; its contents are read at read time.
    ///
    /// A read fails if the file disappears or changes size in between.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            ));
        }

        Ok(Self {
            data: BlobData::File {
                path: SharedPtr::from(path.to_path_buf()),
                offset: 0,
                len: metadata.len(),
            },
            content_type: String::new(),
        })
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn size(&self) -> u64 {
        match &self.data {
            BlobData::Memory { start, end, .. } => (end - start) as u64,
            BlobData::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// MIME type, empty when unknown
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Sub-range of this blob, clamped to its size. Like the DOM, the slice has
    /// an empty content type.
    pub fn slice(&self, range: impl RangeBounds<u64>) -> Blob {
        let size = self.size();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(size);
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => size,
        }
        .clamp(start, size);

        let data = match &self.data {
            BlobData::Memory { bytes, start: base, .. } => BlobData::Memory {
                bytes: bytes.clone(),
                start: base + start as usize,
                end: base + end as usize,
            },
            BlobData::File { path, offset, .. } => BlobData::File {
                path: path.clone(),
                offset: offset + start,
                len: end - start,
            },
        };

        Blob {
            data,
            content_type: String::new(),
        }
    }

    pub(crate) fn source(&self) -> BlobSource<'_> {
        match &self.data {
            BlobData::Memory { bytes, start, end } => BlobSource::Memory(&bytes[*start..*end]),
            BlobData::File { path, offset, len } => BlobSource::File {
                path: path.to_path_buf(),
                offset: *offset,
                len: *len,
            },
        }
    }
}

pub(crate) enum BlobSource<'a> {
    Memory(&'a [u8]),
    File { path: PathBuf, offset: u64, len: u64 },
}

impl Default for Blob {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Blob::new(bytes, "")
    }
}

impl From<&str> for Blob {
    fn from(text: &str) -> Self {
        Blob::new(text.as_bytes(), "text/plain;charset=utf-8")
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Blob");
        if let BlobData::File { path, .. } = &self.data {
            s.field("path", path);
        }
        s.field("size", &self.size())
            .field("content_type", &self.content_type)
            .finish()
    }
}
