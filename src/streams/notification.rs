use crate::{platform::MaybeSend, reader::ProgressEvent};

/// Snapshot of a read's progress as seen by a stream consumer.
///
/// Intermediate notifications never carry a result, and their `completed`
/// flag only says that `loaded == total`. The read is usable once a
/// notification with a result (the terminal one) arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressNotification<T> {
    length_computable: bool,
    loaded: u64,
    total: u64,
    completed: bool,
    result: Option<T>,
}

impl<T> ProgressNotification<T> {
    pub fn intermediate(event: &ProgressEvent) -> Self {
        Self {
            length_computable: event.length_computable,
            loaded: event.loaded,
            total: event.total,
            completed: event.loaded == event.total,
            result: None,
        }
    }

    pub fn terminal(event: &ProgressEvent, result: T) -> Self {
        Self {
            length_computable: event.length_computable,
            loaded: event.loaded,
            total: event.total,
            completed: true,
            result: Some(result),
        }
    }

    pub fn length_computable(&self) -> bool {
        self.length_computable
    }

    pub fn loaded(&self) -> u64 {
        self.loaded
    }

    /// Expected size; meaningless unless `length_computable`
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.result.is_some()
    }

    pub fn into_result(self) -> Option<T> {
        self.result
    }
}

// ----------- Output Shape Markers -----------

/// Streams yield only the decoded result.
pub struct ValueOnly;
/// Streams yield [`ProgressNotification`]s, the last one carrying the result.
pub struct WithProgress;

/// Selects what a read stream yields.
pub trait Observe: MaybeSend + 'static {
    /// Whether `loadstart` and `progress` listeners are registered
    const PROGRESS: bool;

    type Item<T: MaybeSend + 'static>: MaybeSend + 'static;

    fn intermediate<T: MaybeSend + 'static>(event: &ProgressEvent) -> Option<Self::Item<T>>;

    fn terminal<T: MaybeSend + 'static>(event: &ProgressEvent, value: T) -> Self::Item<T>;
}

impl Observe for ValueOnly {
    const PROGRESS: bool = false;

    type Item<T: MaybeSend + 'static> = T;

    fn intermediate<T: MaybeSend + 'static>(_event: &ProgressEvent) -> Option<T> {
        None
    }

    fn terminal<T: MaybeSend + 'static>(_event: &ProgressEvent, value: T) -> T {
        value
    }
}

impl Observe for WithProgress {
    const PROGRESS: bool = true;

    type Item<T: MaybeSend + 'static> = ProgressNotification<T>;

    fn intermediate<T: MaybeSend + 'static>(
        event: &ProgressEvent,
    ) -> Option<ProgressNotification<T>> {
        Some(ProgressNotification::intermediate(event))
    }

    fn terminal<T: MaybeSend + 'static>(event: &ProgressEvent, value: T) -> ProgressNotification<T> {
        ProgressNotification::terminal(event, value)
    }
}
