//! A2C model and its train step.
use crate::{
    util::{entropy, log_softmax, sample_categorical},
    A2cConfig, ActorCriticModel, Scheduler,
};
use anyhow::Result;
use asym_core::{
    opt::{clip_by_global_norm, Optimizer, RmsProp},
    AsymError,
};
use log::{info, trace};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Losses of a batch and the gradient of their combination.
#[derive(Clone, Debug)]
pub struct A2cLoss {
    pub policy_loss: f32,
    pub value_loss: f32,
    pub entropy: f32,
    pub grad: Vec<f32>,
}

/// Wraps an [`ActorCriticModel`] with its optimizer and learning rate schedule.
pub struct A2cModel<M> {
    model: M,
    opt: RmsProp,
    lr: Scheduler,
    vf_coef: f32,
    ent_coef: f32,
    max_grad_norm: Option<f32>,
}

impl<M: ActorCriticModel> A2cModel<M> {
    /// The learning rate decays over `total_timesteps` samples.
    pub fn build(model: M, config: &A2cConfig) -> Result<Self> {
        config.validate()?;
        let opt = RmsProp::new(model.params().len(), config.alpha, config.epsilon);
        Ok(Self {
            model,
            opt,
            lr: Scheduler::new(config.lr, config.total_timesteps, config.lr_schedule),
            vf_coef: config.vf_coef,
            ent_coef: config.ent_coef,
            max_grad_norm: config.max_grad_norm,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn lr(&self) -> &Scheduler {
        &self.lr
    }

    /// Samples actions and returns them with the values of `obs`.
    pub fn step<R: Rng + ?Sized>(
        &self,
        obs: ArrayView2<f32>,
        rng: &mut R,
    ) -> Result<(Vec<usize>, Array1<f32>)> {
        let (logits, values) = self.model.forward(obs)?;
        Ok((sample_categorical(logits.view(), rng), values))
    }

    pub fn value(&self, obs: ArrayView2<f32>) -> Result<Array1<f32>> {
        Ok(self.model.forward(obs)?.1)
    }

    /// Computes the losses of a batch and the gradient of
    /// `policy_loss - ent_coef * entropy + vf_coef * value_loss`.
    ///
    /// `rewards` are the discounted returns and `values` the value estimates made
    /// when acting, so the advantages `rewards - values` are constants.
    pub fn compute_gradients(
        &self,
        obs: ArrayView2<f32>,
        rewards: ArrayView1<f32>,
        actions: &[usize],
        values: ArrayView1<f32>,
    ) -> Result<A2cLoss> {
        let n = obs.nrows();
        for (what, len) in [
            ("rewards", rewards.len()),
            ("actions", actions.len()),
            ("values", values.len()),
        ] {
            if len != n {
                return Err(AsymError::shape(what, n, len).into());
            }
        }
        let na = self.model.num_actions();
        if let Some(&a) = actions.iter().find(|&&a| a >= na) {
            return Err(AsymError::Index { ix: a, len: na }.into());
        }
        if n == 0 {
            return Err(AsymError::InsufficientData { requested: 1, available: 0 }.into());
        }

        let advs = &rewards - &values;
        let (logits, vf) = self.model.forward(obs)?;
        let logp = log_softmax(logits.view());
        let ent = entropy(logp.view());
        let neglogpac = actions
            .iter()
            .enumerate()
            .map(|(k, &a)| -logp[[k, a]])
            .collect::<Array1<f32>>();
        let b = n as f32;

        let policy_loss = (&advs * &neglogpac).sum() / b;
        let value_loss = (&vf - &rewards).mapv(|d| 0.5 * d * d).sum() / b;
        let entropy = ent.sum() / b;

        let mut d_logits = Array2::<f32>::zeros(logp.raw_dim());
        for ((k, j), d) in d_logits.indexed_iter_mut() {
            let p = logp[[k, j]].exp();
            let onehot = (j == actions[k]) as i32 as f32;
            let pg = advs[k] * (p - onehot);
            let bonus = self.ent_coef * p * (logp[[k, j]] + ent[k]);
            *d = (pg + bonus) / b;
        }
        let d_values = (&vf - &rewards) * (self.vf_coef / b);
        let grad = self.model.backward(obs, d_logits.view(), d_values.view())?;
        if grad.len() != self.model.params().len() {
            return Err(AsymError::shape("gradient", self.model.params().len(), grad.len()).into());
        }

        Ok(A2cLoss {
            policy_loss,
            value_loss,
            entropy,
            grad,
        })
    }

    /// Takes one RMSProp step and returns `(policy_loss, value_loss, entropy)`.
    ///
    /// The learning rate schedule advances once per sample of the batch.
    pub fn train(
        &mut self,
        obs: ArrayView2<f32>,
        rewards: ArrayView1<f32>,
        actions: &[usize],
        values: ArrayView1<f32>,
    ) -> Result<(f32, f32, f32)> {
        let mut loss = self.compute_gradients(obs, rewards, actions, values)?;
        let mut cur_lr = 0f32;
        for _ in 0..obs.nrows() {
            cur_lr = self.lr.value();
        }
        if let Some(max_norm) = self.max_grad_norm {
            let norm = clip_by_global_norm(&mut loss.grad, max_norm);
            trace!("grad norm = {}, lr = {}", norm, cur_lr);
        }
        self.opt.step(self.model.params_mut(), &loss.grad, cur_lr);
        Ok((loss.policy_loss, loss.value_loss, loss.entropy))
    }

    /// Writes the parameters to `path` with bincode.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self.model.params())?;
        info!("Saved snapshot to {:?}", path);
        Ok(())
    }

    /// Reads parameters written by [`A2cModel::save`].
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let params: Vec<f32> = bincode::deserialize_from(reader)?;
        let dest = self.model.params_mut();
        if params.len() != dest.len() {
            return Err(AsymError::shape("snapshot", dest.len(), params.len()).into());
        }
        dest.copy_from_slice(&params);
        info!("Loaded snapshot from {:?}", path);
        Ok(())
    }
}
