pub mod blob;
pub mod encoding;
pub mod error;
pub mod task;

pub use blob::*;
pub use error::*;
pub use task::*;

use crate::platform::{Listener, MaybeSend, MaybeSync, SharedPtr};
use std::{fmt, ops::Deref};

// ----------- Read Modes -----------

/// Selects which of the four read operations a reader performs, and so the
/// shape of its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadMode {
    DataUrl,
    /// Deprecated in the DOM; kept for parity with `readAsBinaryString`.
    BinaryString,
    Text,
    ArrayBuffer,
}

impl ReadMode {
    pub const ALL: [ReadMode; 4] = [
        ReadMode::DataUrl,
        ReadMode::BinaryString,
        ReadMode::Text,
        ReadMode::ArrayBuffer,
    ];

    /// Name of the DOM method this mode corresponds to
    pub const fn method_name(self) -> &'static str {
        match self {
            ReadMode::DataUrl => "readAsDataURL",
            ReadMode::BinaryString => "readAsBinaryString",
            ReadMode::Text => "readAsText",
            ReadMode::ArrayBuffer => "readAsArrayBuffer",
        }
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

// ----------- Reader State -----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Empty,
    Loading,
    Done,
}

// ----------- Events -----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    LoadStart,
    Progress,
    Load,
    Error,
    Abort,
    LoadEnd,
}

impl EventKind {
    pub const fn name(self) -> &'static str {
        match self {
            EventKind::LoadStart => "loadstart",
            EventKind::Progress => "progress",
            EventKind::Load => "load",
            EventKind::Error => "error",
            EventKind::Abort => "abort",
            EventKind::LoadEnd => "loadend",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte counters carried by every progress-style event.
///
/// `total` is meaningless when `length_computable` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressEvent {
    pub length_computable: bool,
    pub loaded: u64,
    pub total: u64,
}

impl ProgressEvent {
    pub const fn new(length_computable: bool, loaded: u64, total: u64) -> Self {
        Self {
            length_computable,
            loaded,
            total,
        }
    }
}

/// Event delivered to listeners registered on a [`FileReader`].
#[derive(Debug, Clone)]
pub enum ReaderEvent<E> {
    LoadStart(ProgressEvent),
    Progress(ProgressEvent),
    /// The read finished; carries the decoded result.
    Load(ProgressEvent, ReadResult),
    Error(E),
    Abort(ProgressEvent),
    LoadEnd(ProgressEvent),
}

impl<E> ReaderEvent<E> {
    pub fn kind(&self) -> EventKind {
        match self {
            ReaderEvent::LoadStart(_) => EventKind::LoadStart,
            ReaderEvent::Progress(_) => EventKind::Progress,
            ReaderEvent::Load(..) => EventKind::Load,
            ReaderEvent::Error(_) => EventKind::Error,
            ReaderEvent::Abort(_) => EventKind::Abort,
            ReaderEvent::LoadEnd(_) => EventKind::LoadEnd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenerOptions {
    /// Remove the listener after its first invocation
    pub once: bool,
}

impl ListenerOptions {
    pub const ONCE: ListenerOptions = ListenerOptions { once: true };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

// ----------- Results -----------

/// Immutable shared byte buffer, cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ArrayBuffer(SharedPtr<[u8]>);

impl ArrayBuffer {
    pub fn byte_length(&self) -> usize {
        self.0.len()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl Deref for ArrayBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for ArrayBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for ArrayBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        ArrayBuffer(SharedPtr::from(bytes))
    }
}

impl From<&[u8]> for ArrayBuffer {
    fn from(bytes: &[u8]) -> Self {
        ArrayBuffer(SharedPtr::from(bytes))
    }
}

impl fmt::Debug for ArrayBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayBuffer")
            .field("byte_length", &self.byte_length())
            .finish()
    }
}

/// What a reader holds after a successful read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    Text(String),
    ArrayBuffer(ArrayBuffer),
}

/// Conversion from a platform [`ReadResult`] into the value a stream yields.
///
/// The read mode decides the result shape, so a mismatch only happens with a
/// misbehaving platform; it is converted rather than rejected.
pub trait FromReadResult: Sized {
    fn from_read_result(result: ReadResult) -> Self;
}

impl FromReadResult for String {
    fn from_read_result(result: ReadResult) -> Self {
        match result {
            ReadResult::Text(text) => text,
            ReadResult::ArrayBuffer(buffer) => String::from_utf8_lossy(&buffer).into_owned(),
        }
    }
}

impl FromReadResult for ArrayBuffer {
    fn from_read_result(result: ReadResult) -> Self {
        match result {
            ReadResult::ArrayBuffer(buffer) => buffer,
            ReadResult::Text(text) => ArrayBuffer::from(text.into_bytes()),
        }
    }
}

impl FromReadResult for ReadResult {
    fn from_read_result(result: ReadResult) -> Self {
        result
    }
}

// ----------- Platform Traits -----------

/// An event-driven file reading handle, modelled on the DOM `FileReader`.
///
/// One handle performs at most one read at a time. Events are dispatched to
/// listeners at some later point on the caller's executor; implementations
/// must never invoke a listener after it has been removed, and must let a
/// running listener remove listeners (itself included).
pub trait FileReader: MaybeSend + MaybeSync + 'static {
    type Blob: Clone + MaybeSend + 'static;
    type Error: Clone + MaybeSend + 'static;

    fn add_event_listener(
        &self,
        kind: EventKind,
        listener: Listener<Self::Error>,
        options: ListenerOptions,
    ) -> ListenerId;

    fn remove_event_listener(&self, kind: EventKind, id: ListenerId);

    fn read_as_data_url(&self, blob: &Self::Blob) -> Result<(), Self::Error>;

    fn read_as_binary_string(&self, blob: &Self::Blob) -> Result<(), Self::Error>;

    fn read_as_text(&self, blob: &Self::Blob) -> Result<(), Self::Error>;

    fn read_as_array_buffer(&self, blob: &Self::Blob) -> Result<(), Self::Error>;

    fn ready_state(&self) -> ReadyState;

    /// Cancels an in-progress read. Only meaningful while `Loading`.
    fn abort(&self);
}

/// Creates a fresh [`FileReader`] for every read session.
pub trait ReaderFactory: Clone + MaybeSend + 'static {
    type Reader: FileReader;

    fn create_reader(&self) -> Self::Reader;
}

pub type BlobOf<F> = <<F as ReaderFactory>::Reader as FileReader>::Blob;
pub type ErrorOf<F> = <<F as ReaderFactory>::Reader as FileReader>::Error;
