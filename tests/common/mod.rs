//! Scripted `FileReader` whose events are fired by the test.

#![allow(dead_code)]

use file_reader_streams::{
    EventKind, FileReader, ListenerId, ListenerOptions, ProgressEvent, ReadMode, ReadResult,
    ReaderEvent, ReaderFactory, ReadyState, platform::Listener, platform::SharedPtr,
};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError(pub &'static str);

struct Slot {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    listener: Option<Listener<ScriptError>>,
}

struct Script {
    next_id: u64,
    slots: Vec<Slot>,
    ready_state: ReadyState,
    started: Vec<ReadMode>,
    aborts: usize,
    reject_start: Option<ScriptError>,
}

#[derive(Clone)]
pub struct ScriptedReader(SharedPtr<Mutex<Script>>);

impl ScriptedReader {
    fn new(reject_start: Option<ScriptError>) -> Self {
        Self(SharedPtr::new(Mutex::new(Script {
            next_id: 0,
            slots: Vec::new(),
            ready_state: ReadyState::Empty,
            started: Vec::new(),
            aborts: 0,
            reject_start,
        })))
    }

    pub fn fire(&self, event: ReaderEvent<ScriptError>) {
        let kind = event.kind();
        let ids: Vec<ListenerId> = self
            .0
            .lock()
            .unwrap()
            .slots
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.id)
            .collect();

        for id in ids {
            let taken = {
                let mut script = self.0.lock().unwrap();
                match script.slots.iter().position(|s| s.id == id) {
                    Some(pos) if script.slots[pos].once => {
                        script.slots.remove(pos).listener.map(|l| (l, true))
                    }
                    Some(pos) => script.slots[pos].listener.take().map(|l| (l, false)),
                    None => None,
                }
            };
            if let Some((mut listener, once)) = taken {
                listener(&event);
                if !once {
                    let mut script = self.0.lock().unwrap();
                    if let Some(slot) = script.slots.iter_mut().find(|s| s.id == id) {
                        slot.listener = Some(listener);
                    }
                }
            }
        }
    }

    pub fn load_start(&self, total: u64) {
        self.fire(ReaderEvent::LoadStart(ProgressEvent::new(true, 0, total)));
    }

    pub fn progress(&self, loaded: u64, total: u64) {
        self.fire(ReaderEvent::Progress(ProgressEvent::new(true, loaded, total)));
    }

    pub fn load(&self, loaded: u64, total: u64, result: ReadResult) {
        self.0.lock().unwrap().ready_state = ReadyState::Done;
        let end = ProgressEvent::new(true, loaded, total);
        self.fire(ReaderEvent::Load(end, result));
        self.fire(ReaderEvent::LoadEnd(end));
    }

    pub fn fail(&self, error: ScriptError) {
        self.0.lock().unwrap().ready_state = ReadyState::Done;
        self.fire(ReaderEvent::Error(error));
        self.fire(ReaderEvent::LoadEnd(ProgressEvent::default()));
    }

    pub fn listener_count(&self) -> usize {
        self.0.lock().unwrap().slots.len()
    }

    pub fn abort_count(&self) -> usize {
        self.0.lock().unwrap().aborts
    }

    pub fn started(&self) -> Vec<ReadMode> {
        self.0.lock().unwrap().started.clone()
    }

    fn start(&self, mode: ReadMode) -> Result<(), ScriptError> {
        let mut script = self.0.lock().unwrap();
        if let Some(error) = script.reject_start.clone() {
            return Err(error);
        }
        script.started.push(mode);
        script.ready_state = ReadyState::Loading;
        Ok(())
    }
}

impl FileReader for ScriptedReader {
    type Blob = &'static str;
    type Error = ScriptError;

    fn add_event_listener(
        &self,
        kind: EventKind,
        listener: Listener<ScriptError>,
        options: ListenerOptions,
    ) -> ListenerId {
        let mut script = self.0.lock().unwrap();
        script.next_id += 1;
        let id = ListenerId(script.next_id);
        script.slots.push(Slot {
            id,
            kind,
            once: options.once,
            listener: Some(listener),
        });
        id
    }

    fn remove_event_listener(&self, kind: EventKind, id: ListenerId) {
        self.0
            .lock()
            .unwrap()
            .slots
            .retain(|s| !(s.id == id && s.kind == kind));
    }

    fn read_as_data_url(&self, _blob: &&'static str) -> Result<(), ScriptError> {
        self.start(ReadMode::DataUrl)
    }

    fn read_as_binary_string(&self, _blob: &&'static str) -> Result<(), ScriptError> {
        self.start(ReadMode::BinaryString)
    }

    fn read_as_text(&self, _blob: &&'static str) -> Result<(), ScriptError> {
        self.start(ReadMode::Text)
    }

    fn read_as_array_buffer(&self, _blob: &&'static str) -> Result<(), ScriptError> {
        self.start(ReadMode::ArrayBuffer)
    }

    fn ready_state(&self) -> ReadyState {
        self.0.lock().unwrap().ready_state
    }

    fn abort(&self) {
        let mut script = self.0.lock().unwrap();
        script.aborts += 1;
        script.ready_state = ReadyState::Done;
    }
}

/// Hands out scripted readers and remembers them for inspection.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    readers: SharedPtr<Mutex<Vec<ScriptedReader>>>,
    reject_start: Option<ScriptError>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(error: ScriptError) -> Self {
        Self {
            readers: SharedPtr::default(),
            reject_start: Some(error),
        }
    }

    pub fn created(&self) -> usize {
        self.readers.lock().unwrap().len()
    }

    pub fn reader(&self, index: usize) -> ScriptedReader {
        self.readers.lock().unwrap()[index].clone()
    }
}

impl ReaderFactory for ScriptedFactory {
    type Reader = ScriptedReader;

    fn create_reader(&self) -> ScriptedReader {
        let reader = ScriptedReader::new(self.reject_start.clone());
        self.readers.lock().unwrap().push(reader.clone());
        reader
    }
}
