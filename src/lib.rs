pub mod platform;
pub mod reader;
pub mod streams;

pub use reader::{
    ArrayBuffer, Blob, EventKind, FileReader, FromReadResult, ListenerId, ListenerOptions,
    ProgressEvent, ReadError, ReadMode, ReadResult, ReaderConfig, ReaderEvent, ReaderFactory,
    ReadyState, TaskFileReader, TaskReaderFactory,
};
pub use streams::*;
