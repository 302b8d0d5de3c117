use super::Record;

/// A sink of [`Record`]s.
///
/// `write` emits a record at a step immediately. `store` keeps a record until the
/// next `flush`, which writes the aggregation of the stored records.
pub trait Recorder {
    /// Writes a record at the given step.
    fn write(&mut self, step: i64, record: Record);

    /// Stores a record for aggregation.
    fn store(&mut self, record: Record);

    /// Writes the aggregation of the stored records at the given step.
    fn flush(&mut self, step: i64);
}

impl<R: Recorder + ?Sized> Recorder for Box<R> {
    fn write(&mut self, step: i64, record: Record) {
        (**self).write(step, record)
    }

    fn store(&mut self, record: Record) {
        (**self).store(record)
    }

    fn flush(&mut self, step: i64) {
        (**self).flush(step)
    }
}
