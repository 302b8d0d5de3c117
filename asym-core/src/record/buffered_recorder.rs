use super::{Record, RecordStorage, Recorder};

/// Keeps written records in memory.
///
/// Mostly used in tests, where the written records are inspected afterwards.
#[derive(Default)]
pub struct BufferedRecorder {
    buf: Vec<(i64, Record)>,
    storage: RecordStorage,
}

impl BufferedRecorder {
    /// Constructs the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates over the written records with their steps.
    pub fn iter(&self) -> std::slice::Iter<(i64, Record)> {
        self.buf.iter()
    }

    /// Records having the given key, with their steps.
    pub fn with_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a (i64, Record)> + 'a {
        self.buf.iter().filter(move |(_, r)| r.get(key).is_some())
    }
}

impl Recorder for BufferedRecorder {
    fn write(&mut self, step: i64, record: Record) {
        self.buf.push((step, record));
    }

    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        if !self.storage.is_empty() {
            let record = self.storage.aggregate();
            self.buf.push((step, record));
        }
    }
}
