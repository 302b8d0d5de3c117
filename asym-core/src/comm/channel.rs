use super::Communicator;
use crate::error::AsymError;
use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::trace;

/// In-process group of workers connected through channels.
///
/// Rank 0 is the hub: it collects contributions in rank order, reduces them and
/// sends the same result back to every worker. Each worker (typically a thread)
/// owns one endpoint created by [`ChannelCommunicator::group`].
#[derive(Clone)]
pub struct ChannelCommunicator {
    rank: usize,
    size: usize,

    /// Non-root endpoints.
    to_root: Option<Sender<Vec<f32>>>,
    from_root: Option<Receiver<Vec<f32>>>,

    /// Root endpoints, indexed by `rank - 1`.
    from_workers: Vec<Receiver<Vec<f32>>>,
    to_workers: Vec<Sender<Vec<f32>>>,
}

fn comm_err(e: impl std::fmt::Display) -> AsymError {
    AsymError::Comm(e.to_string())
}

impl ChannelCommunicator {
    /// Creates the endpoints of a group of `size` workers, ordered by rank.
    pub fn group(size: usize) -> Vec<Self> {
        assert!(size > 0, "a group needs at least one worker");
        let mut from_workers = vec![];
        let mut to_workers = vec![];
        let mut endpoints = vec![];

        for rank in 1..size {
            let (tx_up, rx_up) = unbounded();
            let (tx_down, rx_down) = unbounded();
            from_workers.push(rx_up);
            to_workers.push(tx_down);
            endpoints.push(Self {
                rank,
                size,
                to_root: Some(tx_up),
                from_root: Some(rx_down),
                from_workers: vec![],
                to_workers: vec![],
            });
        }

        let root = Self {
            rank: 0,
            size,
            to_root: None,
            from_root: None,
            from_workers,
            to_workers,
        };
        std::iter::once(root).chain(endpoints).collect()
    }

    fn send_to_root(&self, buf: &[f32]) -> Result<()> {
        match &self.to_root {
            Some(tx) => tx.send(buf.to_vec()).map_err(comm_err)?,
            None => return Err(AsymError::Comm("the root has no root to send to".into()).into()),
        }
        Ok(())
    }

    fn recv_from_root(&self, buf: &mut [f32]) -> Result<()> {
        let v = match &self.from_root {
            Some(rx) => rx.recv().map_err(comm_err)?,
            None => {
                return Err(AsymError::Comm("the root has no root to receive from".into()).into())
            }
        };
        if v.len() != buf.len() {
            return Err(AsymError::shape("broadcast buffer", buf.len(), v.len()).into());
        }
        buf.copy_from_slice(&v);
        Ok(())
    }

    fn send_to_workers(&self, buf: &[f32]) -> Result<()> {
        for tx in self.to_workers.iter() {
            tx.send(buf.to_vec()).map_err(comm_err)?;
        }
        Ok(())
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_reduce_sum(&self, buf: &mut [f32]) -> Result<()> {
        if self.size == 1 {
            return Ok(());
        }
        trace!("all_reduce_sum: rank {}, {} values", self.rank, buf.len());

        if self.rank == 0 {
            let mut acc = buf.to_vec();
            for rx in self.from_workers.iter() {
                let v = rx.recv().map_err(comm_err)?;
                if v.len() != acc.len() {
                    return Err(AsymError::shape("all-reduce buffer", acc.len(), v.len()).into());
                }
                acc.iter_mut().zip(v.iter()).for_each(|(a, b)| *a += b);
            }
            self.send_to_workers(&acc)?;
            buf.copy_from_slice(&acc);
            Ok(())
        } else {
            self.send_to_root(buf)?;
            self.recv_from_root(buf)
        }
    }

    fn broadcast(&self, buf: &mut [f32]) -> Result<()> {
        if self.size == 1 {
            return Ok(());
        }
        if self.rank == 0 {
            self.send_to_workers(buf)
        } else {
            self.recv_from_root(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_all_reduce_and_broadcast() {
        let handles = ChannelCommunicator::group(3)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let r = comm.rank() as f32;
                    let mut sum = vec![r, 1.0];
                    comm.all_reduce_sum(&mut sum).unwrap();

                    let mut mean = vec![r * 2.0];
                    comm.all_reduce_mean(&mut mean).unwrap();

                    let mut params = vec![r; 4];
                    comm.broadcast(&mut params).unwrap();
                    (sum, mean, params)
                })
            })
            .collect::<Vec<_>>();

        for h in handles {
            let (sum, mean, params) = h.join().unwrap();
            assert_eq!(sum, vec![3.0, 3.0]);
            assert_eq!(mean, vec![2.0]);
            assert_eq!(params, vec![0.0; 4]);
        }
    }

    #[test]
    fn test_single_worker_group() {
        let comm = ChannelCommunicator::group(1).pop().unwrap();
        let mut buf = vec![1.5, 2.5];
        comm.all_reduce_mean(&mut buf).unwrap();
        assert_eq!(buf, vec![1.5, 2.5]);
        assert!(comm.is_root());
    }

    #[test]
    fn test_root_has_no_link_to_itself() {
        let root = ChannelCommunicator::group(2).swap_remove(0);
        let mut buf = vec![0.0];
        assert_eq!(
            root.recv_from_root(&mut buf).unwrap_err().downcast::<AsymError>().unwrap(),
            AsymError::Comm("the root has no root to receive from".into())
        );
        assert_eq!(
            root.send_to_root(&buf).unwrap_err().downcast::<AsymError>().unwrap(),
            AsymError::Comm("the root has no root to send to".into())
        );
    }
}
