//! Call-site sugar over [`ReadStream`]: one function per read mode.
//!
//! ```no_run
//! # async fn demo() -> Result<(), file_reader_streams::ReadError> {
//! use file_reader_streams::{Blob, TaskReaderFactory, read_as_text};
//! use futures::TryStreamExt;
//!
//! // run inside a `tokio::task::LocalSet`
//! let factory = TaskReaderFactory::new(|fut| {
//!     tokio::task::spawn_local(fut);
//! });
//! let text = read_as_text(factory.clone(), Blob::from("hello"))
//!     .try_next()
//!     .await?;
//! assert_eq!(text.as_deref(), Some("hello"));
//!
//! let mut progress = read_as_text(factory, Blob::from("hello")).with_progress();
//! while let Some(note) = progress.try_next().await? {
//!     println!("{}/{}", note.loaded(), note.total());
//! }
//! # Ok(())
//! # }
//! ```

use super::adapter::ReadStream;
use crate::{
    platform::MaybeSend,
    reader::{ArrayBuffer, BlobOf, FromReadResult, ReadMode, ReaderFactory},
};

pub fn read_as<F, T>(factory: F, mode: ReadMode, blob: BlobOf<F>) -> ReadStream<F, T>
where
    F: ReaderFactory,
    T: FromReadResult + MaybeSend + 'static,
{
    ReadStream::new(factory, mode, blob)
}

/// Reads the blob as a `data:` URL with a base64 payload.
pub fn read_as_data_url<F: ReaderFactory>(factory: F, blob: BlobOf<F>) -> ReadStream<F, String> {
    read_as(factory, ReadMode::DataUrl, blob)
}

/// Reads the blob as a string with one char per byte.
///
/// Deprecated in the DOM; prefer [`read_as_array_buffer`].
pub fn read_as_binary_string<F: ReaderFactory>(
    factory: F,
    blob: BlobOf<F>,
) -> ReadStream<F, String> {
    read_as(factory, ReadMode::BinaryString, blob)
}

pub fn read_as_text<F: ReaderFactory>(factory: F, blob: BlobOf<F>) -> ReadStream<F, String> {
    read_as(factory, ReadMode::Text, blob)
}

pub fn read_as_array_buffer<F: ReaderFactory>(
    factory: F,
    blob: BlobOf<F>,
) -> ReadStream<F, ArrayBuffer> {
    read_as(factory, ReadMode::ArrayBuffer, blob)
}

/// Holds a reader factory and hands out read streams.
#[derive(Debug, Clone)]
pub struct StreamFileReader<F: ReaderFactory> {
    factory: F,
}

impl<F: ReaderFactory> StreamFileReader<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn read_as<T>(&self, mode: ReadMode, blob: BlobOf<F>) -> ReadStream<F, T>
    where
        T: FromReadResult + MaybeSend + 'static,
    {
        read_as(self.factory.clone(), mode, blob)
    }

    pub fn read_as_data_url(&self, blob: BlobOf<F>) -> ReadStream<F, String> {
        read_as_data_url(self.factory.clone(), blob)
    }

    pub fn read_as_binary_string(&self, blob: BlobOf<F>) -> ReadStream<F, String> {
        read_as_binary_string(self.factory.clone(), blob)
    }

    pub fn read_as_text(&self, blob: BlobOf<F>) -> ReadStream<F, String> {
        read_as_text(self.factory.clone(), blob)
    }

    pub fn read_as_array_buffer(&self, blob: BlobOf<F>) -> ReadStream<F, ArrayBuffer> {
        read_as_array_buffer(self.factory.clone(), blob)
    }
}
