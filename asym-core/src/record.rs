//! Key-value records and the sinks they are written to.
//!
//! Training loops summarise what happened (losses, returns, noise levels,
//! hyperparameters) as a [`Record`] and hand it to a [`Recorder`]. A recorder either
//! writes a record immediately at a given step, or stores records and writes their
//! aggregation when flushed.
//!
//! ```rust
//! use asym_core::record::{BufferedRecorder, Record, RecordValue, Recorder};
//!
//! let mut recorder = BufferedRecorder::new();
//! let mut record = Record::from_scalar("train/loss_critic", 0.5);
//! record.insert("noise", RecordValue::String("ou_0.2".into()));
//! recorder.write(3, record);
//! assert_eq!(recorder.iter().count(), 1);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
pub use storage::RecordStorage;
