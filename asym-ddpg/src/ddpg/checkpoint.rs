//! Serialized state of the agent.
use anyhow::Result;
use asym_core::{opt::Adam, opt::SyncOptimizer, running_stats::RunningMeanStd};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// File name of the agent snapshot in a model directory.
pub const AGENT_FILE: &str = "agent.bin";

/// Everything needed to resume training.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DdpgCheckpoint {
    pub actor: Vec<f32>,
    pub target_actor: Vec<f32>,
    pub critic: Vec<f32>,
    pub target_critic: Vec<f32>,
    pub actor_opt: SyncOptimizer<Adam>,
    pub critic_opt: SyncOptimizer<Adam>,
    pub obs_rms: Option<RunningMeanStd>,
    pub state_rms: Option<RunningMeanStd>,
    pub aux_rms: Option<RunningMeanStd>,
    pub param_noise_stddev: Option<f32>,
    pub n_opts: usize,
}

impl DdpgCheckpoint {
    /// Writes the snapshot to `<dir>/agent.bin`, creating `dir` if needed.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(AGENT_FILE);
        let writer = BufWriter::new(File::create(&path)?);
        bincode::serialize_into(writer, self)?;
        info!("Saved agent parameters to {:?}", &path);
        Ok(())
    }

    /// Reads the snapshot from `<dir>/agent.bin`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(AGENT_FILE);
        let reader = BufReader::new(File::open(&path)?);
        let checkpoint = bincode::deserialize_from(reader)?;
        info!("Loaded agent parameters from {:?}", &path);
        Ok(checkpoint)
    }
}
