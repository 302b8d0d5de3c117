//! Collective communication between data-parallel workers.
//!
//! Every worker runs the same training loop and calls the same collectives in the
//! same order. Gradients are averaged with [`Communicator::all_reduce_mean`] before
//! they are applied, so parameters and optimizer states stay identical on all
//! workers; initial parameters are distributed with [`Communicator::broadcast`].
mod channel;
mod local;
use crate::record::{Record, RecordValue};
use anyhow::Result;
pub use channel::ChannelCommunicator;
pub use local::LocalCommunicator;

/// Collective operations over a fixed group of workers.
pub trait Communicator {
    /// Index of this worker in `0..size`.
    fn rank(&self) -> usize;

    /// Number of workers.
    fn size(&self) -> usize;

    /// Replaces `buf` by its element-wise sum over all workers.
    ///
    /// Every worker receives bit-identical results.
    fn all_reduce_sum(&self, buf: &mut [f32]) -> Result<()>;

    /// Replaces `buf` by the copy held by rank 0.
    fn broadcast(&self, buf: &mut [f32]) -> Result<()>;

    /// Replaces `buf` by its element-wise mean over all workers.
    fn all_reduce_mean(&self, buf: &mut [f32]) -> Result<()> {
        self.all_reduce_sum(buf)?;
        let n = self.size() as f32;
        buf.iter_mut().for_each(|v| *v /= n);
        Ok(())
    }

    /// Returns `true` on the worker in charge of logging and checkpointing.
    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// Averages the scalars of a record over all workers.
///
/// All workers must hold the same set of scalar keys. Non-scalar values are kept as
/// they are.
pub fn all_reduce_mean_record<C: Communicator + ?Sized>(comm: &C, record: Record) -> Result<Record> {
    let keys = record.sorted_scalar_keys();
    let mut buf = keys
        .iter()
        .map(|k| record.get_scalar(k))
        .collect::<Result<Vec<f32>, _>>()?;
    comm.all_reduce_mean(&mut buf)?;

    let mut reduced = record;
    for (k, v) in keys.into_iter().zip(buf.into_iter()) {
        reduced.insert(k, RecordValue::Scalar(v));
    }
    Ok(reduced)
}
