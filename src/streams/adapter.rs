use super::notification::{Observe, ValueOnly, WithProgress};
use crate::{
    platform::{MaybeSend, SharedPtr, WeakPtr},
    reader::{
        BlobOf, ErrorOf, EventKind, FileReader, FromReadResult, ListenerId, ListenerOptions,
        ReadMode, ReaderEvent, ReaderFactory, ReadyState,
    },
};
use futures::stream::{FusedStream, Stream};
use std::{
    collections::VecDeque,
    fmt,
    marker::PhantomData,
    pin::Pin,
    sync::Mutex,
    task::{Context, Poll, Waker},
};
use tracing::{debug, trace};

// ----------- Session Inbox -----------

struct Inbox<I, E> {
    queue: VecDeque<Result<I, E>>,
    // Set once the terminal item is queued
    finished: bool,
    errored: bool,
    waker: Option<Waker>,
}

type SharedInbox<I, E> = SharedPtr<Mutex<Inbox<I, E>>>;

fn new_inbox<I, E>() -> SharedInbox<I, E> {
    SharedPtr::new(Mutex::new(Inbox {
        queue: VecDeque::new(),
        finished: false,
        errored: false,
        waker: None,
    }))
}

/// Queues an item unless the session already received its terminal item
fn deliver<I, E>(inbox: &SharedInbox<I, E>, item: Result<I, E>, terminal: bool) {
    let waker = {
        let mut inbox = inbox.lock().unwrap();
        if inbox.finished {
            return;
        }
        inbox.errored = terminal && item.is_err();
        inbox.queue.push_back(item);
        inbox.finished = terminal;
        inbox.waker.take()
    };
    if let Some(waker) = waker {
        waker.wake();
    }
}

// ----------- Read Session -----------

/// The reader of a session and the listeners it registered on it.
///
/// Terminal listeners hold it weakly so they can detach the whole session
/// from inside the platform's dispatch.
struct Attachment<R: FileReader> {
    reader: R,
    listeners: Mutex<Vec<(EventKind, ListenerId)>>,
}

impl<R: FileReader> Attachment<R> {
    fn detach(&self) {
        let listeners = std::mem::take(&mut *self.listeners.lock().unwrap());
        if listeners.is_empty() {
            return;
        }
        trace!(count = listeners.len(), "detaching read listeners");
        for (kind, id) in listeners {
            self.reader.remove_event_listener(kind, id);
        }
    }
}

fn detach_weak<R: FileReader>(attachment: &WeakPtr<Attachment<R>>) {
    if let Some(attachment) = attachment.upgrade() {
        attachment.detach();
    }
}

/// One reader bound to one subscription. Its listeners are detached as soon
/// as the terminal event arrives; dropping it earlier detaches them and
/// aborts the read if it is still loading.
struct ReadSession<R: FileReader> {
    attachment: SharedPtr<Attachment<R>>,
    mode: ReadMode,
}

impl<R: FileReader> ReadSession<R> {
    fn open<T, P>(
        reader: R,
        mode: ReadMode,
        blob: &R::Blob,
        inbox: &SharedInbox<P::Item<T>, R::Error>,
    ) -> Self
    where
        T: FromReadResult + MaybeSend + 'static,
        P: Observe,
    {
        let attachment = SharedPtr::new(Attachment {
            reader,
            listeners: Mutex::new(Vec::with_capacity(4)),
        });
        let reader = &attachment.reader;
        let attach = |kind: EventKind, id: ListenerId| {
            attachment.listeners.lock().unwrap().push((kind, id));
        };

        let load_inbox = inbox.clone();
        let load_attachment = SharedPtr::downgrade(&attachment);
        let id = reader.add_event_listener(
            EventKind::Load,
            Box::new(move |event: &ReaderEvent<R::Error>| {
                if let ReaderEvent::Load(progress, result) = event {
                    let value = T::from_read_result(result.clone());
                    deliver(&load_inbox, Ok(P::terminal(progress, value)), true);
                    detach_weak(&load_attachment);
                }
            }),
            ListenerOptions::ONCE,
        );
        attach(EventKind::Load, id);

        let error_inbox = inbox.clone();
        let error_attachment = SharedPtr::downgrade(&attachment);
        let id = reader.add_event_listener(
            EventKind::Error,
            Box::new(move |event: &ReaderEvent<R::Error>| {
                if let ReaderEvent::Error(error) = event {
                    deliver(&error_inbox, Err(error.clone()), true);
                    detach_weak(&error_attachment);
                }
            }),
            ListenerOptions::ONCE,
        );
        attach(EventKind::Error, id);

        if P::PROGRESS {
            for (kind, options) in [
                (EventKind::LoadStart, ListenerOptions::ONCE),
                (EventKind::Progress, ListenerOptions::default()),
            ] {
                let progress_inbox = inbox.clone();
                let id = reader.add_event_listener(
                    kind,
                    Box::new(move |event: &ReaderEvent<R::Error>| {
                        if let ReaderEvent::LoadStart(progress) | ReaderEvent::Progress(progress) =
                            event
                        {
                            trace!(loaded = progress.loaded, total = progress.total, "read progress");
                            if let Some(item) = P::intermediate::<T>(progress) {
                                deliver(&progress_inbox, Ok(item), false);
                            }
                        }
                    }),
                    options,
                );
                attach(kind, id);
            }
        }

        let started = match mode {
            ReadMode::DataUrl => reader.read_as_data_url(blob),
            ReadMode::BinaryString => reader.read_as_binary_string(blob),
            ReadMode::Text => reader.read_as_text(blob),
            ReadMode::ArrayBuffer => reader.read_as_array_buffer(blob),
        };
        match started {
            Ok(()) => debug!(%mode, progress = P::PROGRESS, "read session started"),
            Err(error) => {
                debug!(%mode, "read could not be started");
                deliver(inbox, Err(error), true);
                attachment.detach();
            }
        }

        Self { attachment, mode }
    }
}

impl<R: FileReader> Drop for ReadSession<R> {
    fn drop(&mut self) {
        self.attachment.detach();
        if self.attachment.reader.ready_state() == ReadyState::Loading {
            debug!(mode = %self.mode, "read session cancelled, aborting reader");
            self.attachment.reader.abort();
        }
    }
}

// ----------- Stream -----------

/// Observable lifecycle of a [`ReadStream`].
///
/// `Completed` and `Errored` are reported as soon as the reader's terminal
/// event arrives, even while the terminal item is still waiting to be polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Reading,
    Completed,
    Errored,
    /// Ended by [`ReadStream::cancel`] before its terminal item was consumed
    Cancelled,
}

enum Phase<R: FileReader, I> {
    Idle,
    Reading {
        session: ReadSession<R>,
        inbox: SharedInbox<I, R::Error>,
    },
    Terminated(SessionState),
}

/// Lazy stream over a single read.
///
/// Nothing happens until the first poll, which creates a reader from the
/// factory and starts the read. The stream then yields what the reader's
/// events produce and ends after the terminal item. Dropping it early
/// detaches its listeners and aborts the read.
///
/// Cloning yields a new, unsubscribed stream for the same blob; each clone
/// performs its own read.
pub struct ReadStream<F, T, P = ValueOnly>
where
    F: ReaderFactory,
    T: FromReadResult + MaybeSend + 'static,
    P: Observe,
{
    factory: F,
    mode: ReadMode,
    blob: BlobOf<F>,
    phase: Phase<F::Reader, P::Item<T>>,
    _phantom: PhantomData<fn() -> (T, P)>,
}

impl<F, T> ReadStream<F, T, ValueOnly>
where
    F: ReaderFactory,
    T: FromReadResult + MaybeSend + 'static,
{
    pub fn new(factory: F, mode: ReadMode, blob: BlobOf<F>) -> Self {
        Self {
            factory,
            mode,
            blob,
            phase: Phase::Idle,
            _phantom: PhantomData,
        }
    }

    /// Switch to yielding [`ProgressNotification`](super::ProgressNotification)s.
    ///
    /// The returned stream is unsubscribed. If this stream was already
    /// reading, that read is cancelled: its listeners are detached and the
    /// reader is aborted if still loading.
    pub fn with_progress(self) -> ReadStream<F, T, WithProgress> {
        let ReadStream {
            factory,
            mode,
            blob,
            ..
        } = self;
        ReadStream {
            factory,
            mode,
            blob,
            phase: Phase::Idle,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, P> ReadStream<F, T, P>
where
    F: ReaderFactory,
    T: FromReadResult + MaybeSend + 'static,
    P: Observe,
{
    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    pub fn blob(&self) -> &BlobOf<F> {
        &self.blob
    }

    pub fn state(&self) -> SessionState {
        match &self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::Reading { inbox, .. } => {
                let inbox = inbox.lock().unwrap();
                match (inbox.finished, inbox.errored) {
                    (false, _) => SessionState::Reading,
                    (true, false) => SessionState::Completed,
                    (true, true) => SessionState::Errored,
                }
            }
            Phase::Terminated(state) => *state,
        }
    }

    /// Ends the stream without waiting for the read. An in-flight read is
    /// aborted and any queued items are discarded. Streams that already
    /// finished keep their state.
    pub fn cancel(&mut self) {
        if matches!(self.phase, Phase::Terminated(_)) {
            return;
        }
        debug!(mode = %self.mode, "read stream cancelled");
        // Drops the session, detaching its listeners
        self.phase = Phase::Terminated(SessionState::Cancelled);
    }
}

impl<F, T, P> Stream for ReadStream<F, T, P>
where
    F: ReaderFactory,
    T: FromReadResult + MaybeSend + 'static,
    P: Observe,
{
    type Item = Result<P::Item<T>, ErrorOf<F>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let inbox = match &this.phase {
                Phase::Idle => {
                    let inbox = new_inbox();
                    let session = ReadSession::open::<T, P>(
                        this.factory.create_reader(),
                        this.mode,
                        &this.blob,
                        &inbox,
                    );
                    this.phase = Phase::Reading { session, inbox };
                    continue;
                }
                Phase::Reading { inbox, .. } => inbox.clone(),
                Phase::Terminated(_) => return Poll::Ready(None),
            };

            let (item, done) = {
                let mut inbox = inbox.lock().unwrap();
                match inbox.queue.pop_front() {
                    Some(item) => {
                        let done = inbox.finished && inbox.queue.is_empty();
                        (Some(item), done)
                    }
                    None if inbox.finished => (None, true),
                    None => {
                        if !inbox.waker.as_ref().is_some_and(|w| w.will_wake(cx.waker())) {
                            inbox.waker = Some(cx.waker().clone());
                        }
                        return Poll::Pending;
                    }
                }
            };

            if done {
                let state = match item {
                    Some(Err(_)) => SessionState::Errored,
                    _ => SessionState::Completed,
                };
                debug!(mode = %this.mode, ?state, "read session finished");
                this.phase = Phase::Terminated(state);
            }
            return Poll::Ready(item);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.phase {
            Phase::Terminated(_) => (0, Some(0)),
            _ if P::PROGRESS => (0, None),
            _ => (0, Some(1)),
        }
    }
}

impl<F, T, P> FusedStream for ReadStream<F, T, P>
where
    F: ReaderFactory,
    T: FromReadResult + MaybeSend + 'static,
    P: Observe,
{
    fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Terminated(_))
    }
}

// Fields are never structurally pinned
impl<F, T, P> Unpin for ReadStream<F, T, P>
where
    F: ReaderFactory,
    T: FromReadResult + MaybeSend + 'static,
    P: Observe,
{
}

impl<F, T, P> Clone for ReadStream<F, T, P>
where
    F: ReaderFactory,
    T: FromReadResult + MaybeSend + 'static,
    P: Observe,
{
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            mode: self.mode,
            blob: self.blob.clone(),
            phase: Phase::Idle,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, P> fmt::Debug for ReadStream<F, T, P>
where
    F: ReaderFactory,
    T: FromReadResult + MaybeSend + 'static,
    P: Observe,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadStream")
            .field("mode", &self.mode)
            .field("progress", &P::PROGRESS)
            .field("state", &self.state())
            .finish()
    }
}
