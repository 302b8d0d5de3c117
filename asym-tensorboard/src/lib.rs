//! Writes records of the training loops as TensorBoard event files.
use asym_core::record::{Record, RecordStorage, RecordValue, Recorder};
use log::warn;
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
///
/// Scalars are written as scalar summaries and every element of an
/// [`RecordValue::Array1`] as a scalar under `<key>/<index>`. Timestamps and
/// strings have no summary type and are skipped.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    storage: RecordStorage,
    warn_unsupported_value: bool,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            storage: RecordStorage::new(),
            warn_unsupported_value: false,
        }
    }

    /// Construct a [`TensorboardRecorder`] that logs a warning for every skipped value.
    pub fn new_with_check_unsupported_value<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            warn_unsupported_value: true,
            ..Self::new(logdir)
        }
    }
}

impl Recorder for TensorboardRecorder {
    fn write(&mut self, step: i64, record: Record) {
        let step = step.max(0) as usize;
        for (k, v) in record.iter() {
            match v {
                RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
                RecordValue::Array1(vs) => {
                    for (i, v) in vs.iter().enumerate() {
                        self.writer.add_scalar(&format!("{}/{}", k, i), *v, step);
                    }
                }
                RecordValue::DateTime(_) => {}
                RecordValue::String(_) => {
                    if self.warn_unsupported_value {
                        warn!("Unsupported value: {:?}", (k, v));
                    }
                }
            }
        }
    }

    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        if !self.storage.is_empty() {
            let record = self.storage.aggregate();
            self.write(step, record);
        }
        self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_write_event_file() -> anyhow::Result<()> {
        let dir = TempDir::new("tensorboard")?;
        let mut recorder = TensorboardRecorder::new_with_check_unsupported_value(dir.path());
        let mut record = Record::from_scalar("train/loss_critic", 0.5);
        record.insert("rollout/actions", RecordValue::Array1(vec![0.1, -0.2]));
        record.insert("run_name", RecordValue::String("point".into()));
        recorder.write(0, record);
        for v in [1.0, 2.0, 3.0] {
            recorder.store(Record::from_scalar("returns", v));
        }
        recorder.flush(1);

        let n_files = std::fs::read_dir(dir.path())?.count();
        assert!(n_files >= 1);
        Ok(())
    }
}
