use super::{
    Blob, BlobSource, EventKind, FileReader, ListenerId, ListenerOptions, ProgressEvent, ReadError,
    ReadMode, ReadResult, ReaderEvent, ReaderFactory, ReadyState, encoding,
};
use crate::platform::{Listener, MaybeSend, MaybeSync, PlatformBoxFutureStatic, SharedPtr, Spawner};
use futures::{
    FutureExt,
    future::{AbortHandle, Abortable, poll_fn},
};
use std::{
    fmt,
    io::{self, SeekFrom},
    path::PathBuf,
    sync::Mutex,
    task::Poll,
};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, trace};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

// ----------- Configuration -----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    chunk_size: usize,
}

impl ReaderConfig {
    pub const fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Bytes read between two `progress` events. Zero is treated as one.
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = if chunk_size == 0 { 1 } else { chunk_size };
        self
    }

    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ----------- Listener Registry -----------

struct Entry {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    // None while the listener is being invoked
    listener: Option<Listener<ReadError>>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<Entry>,
}

// ----------- Reader State -----------

struct ReaderState {
    ready_state: ReadyState,
    result: Option<ReadResult>,
    error: Option<ReadError>,
    progress: ProgressEvent,
    abort: Option<AbortHandle>,
    // Bumped by every read and abort; a task whose generation is stale stops dispatching
    generation: u64,
}

struct Shared {
    state: Mutex<ReaderState>,
    registry: Mutex<Registry>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(ReaderState {
                ready_state: ReadyState::Empty,
                result: None,
                error: None,
                progress: ProgressEvent::default(),
                abort: None,
                generation: 0,
            }),
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Invokes the listeners for `event`. Events of a read stop reaching
    /// listeners as soon as a newer read or an abort supersedes it, even
    /// midway through the listener list.
    fn dispatch(&self, generation: u64, event: ReaderEvent<ReadError>) {
        let kind = event.kind();
        let ids: Vec<ListenerId> = {
            let registry = self.registry.lock().unwrap();
            registry
                .entries
                .iter()
                .filter(|e| e.kind == kind && e.listener.is_some())
                .map(|e| e.id)
                .collect()
        };

        for id in ids {
            if !self.is_current(generation) {
                trace!(%kind, "dropping event of a superseded read");
                return;
            }
            let taken = {
                let mut registry = self.registry.lock().unwrap();
                match registry.entries.iter().position(|e| e.id == id) {
                    Some(pos) if registry.entries[pos].once => {
                        registry.entries.remove(pos).listener.map(|l| (l, true))
                    }
                    Some(pos) => registry.entries[pos].listener.take().map(|l| (l, false)),
                    None => None,
                }
            };

            let Some((mut listener, once)) = taken else {
                continue;
            };
            listener(&event);

            if !once {
                let mut registry = self.registry.lock().unwrap();
                // Skipped if the listener removed itself
                if let Some(entry) = registry.entries.iter_mut().find(|e| e.id == id) {
                    entry.listener = Some(listener);
                }
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().unwrap().generation == generation
    }

    /// Records progress and reports whether the read is still current
    fn advance(&self, generation: u64, progress: ProgressEvent) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            return false;
        }
        state.progress = progress;
        true
    }

    /// Moves a current read to `Done`, returning false if it was aborted meanwhile
    fn finish(&self, generation: u64, outcome: Result<ReadResult, ReadError>) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            return false;
        }
        state.ready_state = ReadyState::Done;
        state.abort = None;
        match outcome {
            Ok(result) => state.result = Some(result),
            Err(error) => state.error = Some(error),
        }
        true
    }
}

// ----------- Reader -----------

/// [`FileReader`] that performs each read on a task handed to a spawner,
/// emitting `loadstart`, `progress`, `load`/`error` and `loadend` like a
/// browser `FileReader`.
///
/// File-backed blobs are read with `tokio::fs`, so the spawner must run
/// tasks on a tokio runtime for them; in-memory blobs work on any executor.
pub struct TaskFileReader {
    shared: SharedPtr<Shared>,
    spawner: Spawner,
    config: ReaderConfig,
}

impl TaskFileReader {
    pub fn new<S>(spawn: S) -> Self
    where
        S: Fn(PlatformBoxFutureStatic<()>) + MaybeSend + MaybeSync + 'static,
    {
        Self::with_spawner(SharedPtr::new(spawn), ReaderConfig::default())
    }

    fn with_spawner(spawner: Spawner, config: ReaderConfig) -> Self {
        Self {
            shared: SharedPtr::new(Shared::new()),
            spawner,
            config,
        }
    }

    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Result of the last successful read
    pub fn result(&self) -> Option<ReadResult> {
        self.shared.state.lock().unwrap().result.clone()
    }

    /// Error of the last failed or aborted read
    pub fn error(&self) -> Option<ReadError> {
        self.shared.state.lock().unwrap().error.clone()
    }

    fn start(&self, mode: ReadMode, blob: &Blob) -> Result<(), ReadError> {
        let (generation, registration) = {
            let mut state = self.shared.state.lock().unwrap();
            if state.ready_state == ReadyState::Loading {
                return Err(ReadError::InvalidState);
            }
            let (handle, registration) = AbortHandle::new_pair();
            state.ready_state = ReadyState::Loading;
            state.result = None;
            state.error = None;
            state.progress = ProgressEvent::new(true, 0, blob.size());
            state.abort = Some(handle);
            state.generation += 1;
            (state.generation, registration)
        };

        debug!(%mode, size = blob.size(), "starting read task");
        let task = run_read(
            self.shared.clone(),
            generation,
            mode,
            blob.clone(),
            self.config.chunk_size,
        );
        (self.spawner)(Box::pin(Abortable::new(task, registration).map(|_| ())));
        Ok(())
    }
}

impl FileReader for TaskFileReader {
    type Blob = Blob;
    type Error = ReadError;

    fn add_event_listener(
        &self,
        kind: EventKind,
        listener: Listener<ReadError>,
        options: ListenerOptions,
    ) -> ListenerId {
        let mut registry = self.shared.registry.lock().unwrap();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry.entries.push(Entry {
            id,
            kind,
            once: options.once,
            listener: Some(listener),
        });
        id
    }

    fn remove_event_listener(&self, kind: EventKind, id: ListenerId) {
        let mut registry = self.shared.registry.lock().unwrap();
        registry.entries.retain(|e| !(e.id == id && e.kind == kind));
    }

    fn read_as_data_url(&self, blob: &Blob) -> Result<(), ReadError> {
        self.start(ReadMode::DataUrl, blob)
    }

    fn read_as_binary_string(&self, blob: &Blob) -> Result<(), ReadError> {
        self.start(ReadMode::BinaryString, blob)
    }

    fn read_as_text(&self, blob: &Blob) -> Result<(), ReadError> {
        self.start(ReadMode::Text, blob)
    }

    fn read_as_array_buffer(&self, blob: &Blob) -> Result<(), ReadError> {
        self.start(ReadMode::ArrayBuffer, blob)
    }

    fn ready_state(&self) -> ReadyState {
        self.shared.state.lock().unwrap().ready_state
    }

    fn abort(&self) {
        let (handle, progress, generation) = {
            let mut state = self.shared.state.lock().unwrap();
            if state.ready_state != ReadyState::Loading {
                return;
            }
            state.ready_state = ReadyState::Done;
            state.result = None;
            state.error = Some(ReadError::Aborted);
            state.generation += 1;
            (state.abort.take(), state.progress, state.generation)
        };

        if let Some(handle) = handle {
            handle.abort();
        }
        debug!(loaded = progress.loaded, total = progress.total, "read aborted");
        self.shared.dispatch(generation, ReaderEvent::Abort(progress));
        self.shared.dispatch(generation, ReaderEvent::LoadEnd(progress));
    }
}

impl fmt::Debug for TaskFileReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFileReader")
            .field("ready_state", &self.ready_state())
            .field("config", &self.config)
            .finish()
    }
}

// ----------- Factory -----------

/// Creates [`TaskFileReader`]s that share one spawner and configuration.
#[derive(Clone)]
pub struct TaskReaderFactory {
    spawner: Spawner,
    config: ReaderConfig,
}

impl TaskReaderFactory {
    pub fn new<S>(spawn: S) -> Self
    where
        S: Fn(PlatformBoxFutureStatic<()>) + MaybeSend + MaybeSync + 'static,
    {
        Self {
            spawner: SharedPtr::new(spawn),
            config: ReaderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> ReaderConfig {
        self.config
    }
}

impl ReaderFactory for TaskReaderFactory {
    type Reader = TaskFileReader;

    fn create_reader(&self) -> TaskFileReader {
        TaskFileReader::with_spawner(self.spawner.clone(), self.config)
    }
}

impl fmt::Debug for TaskReaderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskReaderFactory")
            .field("config", &self.config)
            .finish()
    }
}

// ----------- Read Task -----------

async fn yield_now() {
    let mut yielded = false;
    poll_fn(|cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
    .await
}

async fn run_read(
    shared: SharedPtr<Shared>,
    generation: u64,
    mode: ReadMode,
    blob: Blob,
    chunk_size: usize,
) {
    let total = blob.size();
    if !shared.is_current(generation) {
        return;
    }
    shared.dispatch(generation, ReaderEvent::LoadStart(ProgressEvent::new(true, 0, total)));

    let mut loaded = 0u64;
    let outcome = match blob.source() {
        BlobSource::Memory(bytes) => {
            read_memory(&shared, generation, bytes, chunk_size, &mut loaded).await
        }
        BlobSource::File { path, offset, len } => {
            read_file(&shared, generation, path, offset, len, chunk_size, &mut loaded).await
        }
    };

    let end = ProgressEvent::new(true, loaded, total);
    match outcome {
        Ok(Some(bytes)) => {
            let result = encoding::encode(mode, bytes, blob.content_type());
            if !shared.finish(generation, Ok(result.clone())) {
                return;
            }
            debug!(%mode, loaded, "read task finished");
            shared.dispatch(generation, ReaderEvent::Load(end, result));
            shared.dispatch(generation, ReaderEvent::LoadEnd(end));
        }
        Ok(None) => {}
        Err(error) => {
            if !shared.finish(generation, Err(error.clone())) {
                return;
            }
            debug!(%mode, %error, "read task failed");
            shared.dispatch(generation, ReaderEvent::Error(error));
            shared.dispatch(generation, ReaderEvent::LoadEnd(end));
        }
    }
}

fn report_progress(shared: &Shared, generation: u64, loaded: u64, total: u64) -> bool {
    let progress = ProgressEvent::new(true, loaded, total);
    if !shared.advance(generation, progress) {
        return false;
    }
    trace!(loaded, total, "read progress");
    shared.dispatch(generation, ReaderEvent::Progress(progress));
    true
}

// Ok(None) means the read was aborted
async fn read_memory(
    shared: &Shared,
    generation: u64,
    bytes: &[u8],
    chunk_size: usize,
    loaded: &mut u64,
) -> Result<Option<Vec<u8>>, ReadError> {
    let total = bytes.len() as u64;
    let mut out = Vec::with_capacity(bytes.len());
    for chunk in bytes.chunks(chunk_size) {
        yield_now().await;
        out.extend_from_slice(chunk);
        *loaded += chunk.len() as u64;
        if !report_progress(shared, generation, *loaded, total) {
            return Ok(None);
        }
    }
    Ok(Some(out))
}

async fn read_file(
    shared: &Shared,
    generation: u64,
    path: PathBuf,
    offset: u64,
    len: u64,
    chunk_size: usize,
    loaded: &mut u64,
) -> Result<Option<Vec<u8>>, ReadError> {
    let io_err = |e: io::Error| ReadError::from_io(path.clone(), e);

    let mut file = tokio::fs::File::open(&path).await.map_err(io_err)?;
    file.seek(SeekFrom::Start(offset)).await.map_err(io_err)?;

    let mut buf = vec![0u8; chunk_size];
    let mut out = Vec::with_capacity(len as usize);
    while *loaded < len {
        let want = chunk_size.min((len - *loaded) as usize);
        let n = file.read(&mut buf[..want]).await.map_err(io_err)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
        *loaded += n as u64;
        if !report_progress(shared, generation, *loaded, len) {
            return Ok(None);
        }
    }

    if *loaded != len {
        return Err(io_err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "file changed after it was opened",
        )));
    }
    Ok(Some(out))
}
