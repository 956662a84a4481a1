use file_reader_streams::{
    ArrayBuffer, Blob, EventKind, FileReader, ListenerId, ListenerOptions, ReadError,
    ReaderConfig, ReaderFactory, ReadyState, StreamFileReader, TaskFileReader,
    TaskReaderFactory, read_as_data_url, read_as_text,
    platform::{Listener, SharedPtr},
};
use std::sync::Mutex;
use futures::{StreamExt, TryStreamExt, future};
use tokio::task::LocalSet;

fn local_factory(chunk_size: usize) -> TaskReaderFactory {
    TaskReaderFactory::new(|fut| {
        tokio::task::spawn_local(fut);
    })
    .with_config(ReaderConfig::default().with_chunk_size(chunk_size))
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("{}-{}", std::process::id(), name))
}

#[tokio::test]
async fn reads_text_end_to_end() {
    LocalSet::new()
        .run_until(async {
            let text: Vec<_> = read_as_text(local_factory(4), Blob::from("hello world"))
                .try_collect()
                .await
                .unwrap();
            assert_eq!(text, ["hello world"]);
        })
        .await;
}

#[tokio::test]
async fn reads_every_mode_through_the_facade() {
    LocalSet::new()
        .run_until(async {
            let reader = StreamFileReader::new(local_factory(2));
            let blob = Blob::new(b"hi\xff".to_vec(), "text/plain");

            let url = reader.read_as_data_url(blob.clone()).try_next().await.unwrap();
            assert_eq!(url.as_deref(), Some("data:text/plain;base64,aGn/"));

            let binary = reader.read_as_binary_string(blob.clone()).try_next().await.unwrap();
            assert_eq!(binary.as_deref(), Some("hi\u{ff}"));

            let text = reader.read_as_text(blob.clone()).try_next().await.unwrap();
            assert_eq!(text.as_deref(), Some("hi\u{fffd}"));

            let buffer = reader.read_as_array_buffer(blob).try_next().await.unwrap();
            assert_eq!(buffer.as_deref(), Some(b"hi\xff".as_slice()));
        })
        .await;
}

#[tokio::test]
async fn progress_follows_chunks() {
    LocalSet::new()
        .run_until(async {
            let factory = local_factory(4);
            let notes: Vec<_> = file_reader_streams::read_as_array_buffer(
                factory,
                Blob::new(vec![1u8; 10], ""),
            )
            .with_progress()
            .try_collect()
            .await
            .unwrap();

            let summary: Vec<_> = notes
                .iter()
                .map(|n| (n.loaded(), n.completed(), n.is_terminal()))
                .collect();
            assert_eq!(
                summary,
                [
                    (0, false, false),
                    (4, false, false),
                    (8, false, false),
                    (10, true, false),
                    (10, true, true),
                ]
            );
            let buffer: &ArrayBuffer = notes.last().unwrap().result().unwrap();
            assert_eq!(buffer.byte_length(), 10);
        })
        .await;
}

#[tokio::test]
async fn reads_file_backed_blobs() {
    let path = temp_path("file-backed.txt");
    tokio::fs::write(&path, "line one\nline two\n").await.unwrap();
    let blob = Blob::open(&path).await.unwrap().with_content_type("text/plain");

    LocalSet::new()
        .run_until(async {
            let text = read_as_text(local_factory(5), blob.slice(5..))
                .try_next()
                .await
                .unwrap();
            assert_eq!(text.as_deref(), Some("one\nline two\n"));

            let url = read_as_data_url(local_factory(64), blob.slice(0..4))
                .try_next()
                .await
                .unwrap();
            // slices drop the content type
            assert_eq!(url.as_deref(), Some("data:application/octet-stream;base64,bGluZQ=="));
        })
        .await;

    tokio::fs::remove_file(&path).await.unwrap();
}

#[tokio::test]
async fn missing_file_surfaces_not_found() {
    let path = temp_path("vanishing.bin");
    tokio::fs::write(&path, [0u8; 16]).await.unwrap();
    let blob = Blob::open(&path).await.unwrap();
    tokio::fs::remove_file(&path).await.unwrap();

    LocalSet::new()
        .run_until(async {
            let mut stream = read_as_text(local_factory(4), blob).with_progress();
            let mut items = Vec::new();
            while let Some(item) = stream.next().await {
                items.push(item);
            }

            // loadstart precedes the failure
            assert_eq!(items.len(), 2);
            assert!(items[0].as_ref().is_ok_and(|n| !n.is_terminal()));
            assert!(matches!(&items[1], Err(ReadError::NotFound(p)) if *p == path));
        })
        .await;
}

/// Shares each created reader with the test so it can be inspected after the
/// stream that owned it is gone.
#[derive(Clone)]
struct TrackingFactory {
    inner: TaskReaderFactory,
    created: SharedPtr<Mutex<Vec<SharedPtr<TaskFileReader>>>>,
}

impl TrackingFactory {
    fn new(inner: TaskReaderFactory) -> Self {
        Self {
            inner,
            created: SharedPtr::default(),
        }
    }

    fn reader(&self, index: usize) -> SharedPtr<TaskFileReader> {
        self.created.lock().unwrap()[index].clone()
    }
}

struct TrackedReader(SharedPtr<TaskFileReader>);

impl FileReader for TrackedReader {
    type Blob = Blob;
    type Error = ReadError;

    fn add_event_listener(
        &self,
        kind: EventKind,
        listener: Listener<ReadError>,
        options: ListenerOptions,
    ) -> ListenerId {
        self.0.add_event_listener(kind, listener, options)
    }

    fn remove_event_listener(&self, kind: EventKind, id: ListenerId) {
        self.0.remove_event_listener(kind, id)
    }

    fn read_as_data_url(&self, blob: &Blob) -> Result<(), ReadError> {
        self.0.read_as_data_url(blob)
    }

    fn read_as_binary_string(&self, blob: &Blob) -> Result<(), ReadError> {
        self.0.read_as_binary_string(blob)
    }

    fn read_as_text(&self, blob: &Blob) -> Result<(), ReadError> {
        self.0.read_as_text(blob)
    }

    fn read_as_array_buffer(&self, blob: &Blob) -> Result<(), ReadError> {
        self.0.read_as_array_buffer(blob)
    }

    fn ready_state(&self) -> ReadyState {
        self.0.ready_state()
    }

    fn abort(&self) {
        self.0.abort()
    }
}

impl ReaderFactory for TrackingFactory {
    type Reader = TrackedReader;

    fn create_reader(&self) -> TrackedReader {
        let reader = SharedPtr::new(self.inner.create_reader());
        self.created.lock().unwrap().push(reader.clone());
        TrackedReader(reader)
    }
}

#[tokio::test]
async fn dropping_a_stream_stops_its_read() {
    LocalSet::new()
        .run_until(async {
            let factory = TrackingFactory::new(local_factory(1));
            let mut stream =
                read_as_text(factory.clone(), Blob::new(vec![b'a'; 64], "")).with_progress();

            let first = stream.try_next().await.unwrap().unwrap();
            assert_eq!(first.loaded(), 0);
            let reader = factory.reader(0);
            assert_eq!(reader.ready_state(), ReadyState::Loading);
            drop(stream);

            assert_eq!(reader.ready_state(), ReadyState::Done);
            assert!(matches!(reader.error(), Some(ReadError::Aborted)));

            // the aborted task never completes the read
            for _ in 0..8 {
                tokio::task::yield_now().await;
            }
            assert_eq!(reader.result(), None);
            assert!(matches!(reader.error(), Some(ReadError::Aborted)));
        })
        .await;
}

#[tokio::test]
async fn concurrent_reads_do_not_interfere() {
    LocalSet::new()
        .run_until(async {
            let factory = local_factory(3);
            let (a, b) = future::join(
                read_as_text(factory.clone(), Blob::from("first blob")).try_collect::<Vec<_>>(),
                read_as_text(factory, Blob::from("second")).try_collect::<Vec<_>>(),
            )
            .await;

            assert_eq!(a.unwrap(), ["first blob"]);
            assert_eq!(b.unwrap(), ["second"]);
        })
        .await;
}

#[cfg(not(feature = "local"))]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn send_streams_work_with_tokio_spawn() {
    let factory = TaskReaderFactory::new(|fut| {
        tokio::spawn(fut);
    });
    let stream = read_as_text(factory, Blob::from("across threads")).with_progress();

    let last = tokio::spawn(async move { stream.try_collect::<Vec<_>>().await })
        .await
        .unwrap()
        .unwrap()
        .pop()
        .and_then(|n| n.into_result());
    assert_eq!(last.as_deref(), Some("across threads"));
}
