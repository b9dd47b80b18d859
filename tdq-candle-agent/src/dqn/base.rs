//! DQN agent implemented with candle.
use super::{config::DqnConfig, explorer::ActionBounds, model::QModel};
use crate::{
    model::QFunction,
    opt::Optimizer,
    util::{clip_grad_norm, grad_norm, ModelDims, NamedTensors},
};
use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::loss::mse;
use log::{debug, info, trace};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{de::DeserializeOwned, Serialize};
use std::{convert::TryFrom, fs, path::Path};
use tdq_core::{
    record::{Record, RecordValue},
    Agent, Configurable, ReplayMemory, TdqError,
};

/// Name of the file holding the online network in a checkpoint directory.
pub const MODEL_FILE: &str = "model.pt";

/// DQN agent for continuous actions implemented with candle.
///
/// The agent owns the online network `qnet`, the target network `qnet_tgt` and
/// the optimizer of `qnet`. The target network is only changed by
/// [`Agent::update`], which copies `qnet` into it.
pub struct Dqn<Q>
where
    Q: QFunction,
{
    qnet: QModel<Q>,
    qnet_tgt: QModel<Q>,
    opt: Optimizer,
    state_dim: usize,
    action_dim: usize,
    bounds: ActionBounds,
    device: Device,
    max_grad_norm: f64,
    n_opts: usize,
    rng: SmallRng,
}

impl<Q> Dqn<Q>
where
    Q: QFunction,
    Q::Config: DeserializeOwned + Serialize + ModelDims + Clone,
{
    /// Returns copies of the parameters of the online and target networks.
    ///
    /// The copies are on the host and never share storage with the networks.
    pub fn get_weights(&self) -> Result<(NamedTensors, NamedTensors)> {
        Ok((self.qnet.snapshot()?, self.qnet_tgt.snapshot()?))
    }

    /// Overwrites the parameters of the online and target networks.
    ///
    /// Both snapshots are checked before anything is written, so on a structural
    /// mismatch neither network is changed.
    pub fn set_weights(&mut self, weights: &(NamedTensors, NamedTensors)) -> Result<()> {
        let (online, target) = weights;
        online.check_structure(self.qnet.get_varmap())?;
        target.check_structure(self.qnet_tgt.get_varmap())?;
        self.qnet.restore(online)?;
        self.qnet_tgt.restore(target)?;
        Ok(())
    }

    /// Returns the number of optimization steps performed so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Returns the device on which the networks live.
    pub fn device(&self) -> &Device {
        &self.device
    }

    fn batch_tensor(&self, v: Vec<f32>, dim: Option<usize>) -> Result<Tensor> {
        let n = v.len() / dim.unwrap_or(1).max(1);
        Ok(match dim {
            Some(dim) => Tensor::from_vec(v, (n, dim), &self.device)?,
            None => Tensor::from_vec(v, (n,), &self.device)?,
        })
    }

    /// Computes `reward + (1 - terminal) * gamma * max_a Q_tgt(next_state, next_timestep, a)`.
    ///
    /// The result is detached from the computation graph.
    pub(crate) fn td_target(
        &mut self,
        reward: &Tensor,
        terminal: &Tensor,
        next_state: &Tensor,
        next_timestep: &Tensor,
        gamma: f64,
    ) -> Result<Tensor> {
        let v = {
            let q = self.qnet_tgt.inference();
            q.forward(next_state, next_timestep, None)?.detach()
        };
        let not_done = terminal.affine(-1.0, 1.0)?;
        let tgt = (reward + ((not_done * gamma)? * v)?)?;
        Ok(tgt.detach())
    }

    fn update_critic<R: ReplayMemory>(
        &mut self,
        memory: &mut R,
        gamma: f64,
        batch_size: usize,
    ) -> Result<Record> {
        let batch = memory.sample(batch_size)?;
        batch.validate(self.state_dim, self.action_dim)?;
        if batch.is_empty() {
            return Err(TdqError::BatchMismatch("empty batch".into()).into());
        }

        let (s0, act, reward, s1, terminal, timestep) = batch.unpack();
        let t1 = timestep.iter().map(|t| t + 1.0).collect::<Vec<_>>();
        let s0 = self.batch_tensor(s0, Some(self.state_dim))?;
        let act = self.batch_tensor(act, Some(self.action_dim))?;
        let reward = self.batch_tensor(reward, None)?;
        let s1 = self.batch_tensor(s1, Some(self.state_dim))?;
        let terminal = self.batch_tensor(terminal, None)?;
        let t0 = self.batch_tensor(timestep, None)?;
        let t1 = self.batch_tensor(t1, None)?;

        let pred = {
            self.qnet.set_train(true);
            self.qnet.forward(&s0, &t0, Some(&act))?
        };

        // No gradient flows into the target network; its parameters are only
        // replaced by copying the online network in `update()`.
        let tgt = self.td_target(&reward, &terminal, &s1, &t1, gamma)?;

        let loss = mse(&pred, &tgt)?;

        // Backprop
        let vars = self.qnet.vars();
        let mut grads = loss.backward()?;
        let norm = clip_grad_norm(&mut grads, &vars, self.max_grad_norm)?;
        let norm_clipped = grad_norm(&grads, &vars)?;
        self.opt.step(&grads)?;
        drop(grads);

        let loss = loss.detach().to_scalar::<f32>()?;
        self.n_opts += 1;
        trace!(
            "opt {}: loss = {}, grad_norm = {} -> {}",
            self.n_opts,
            loss,
            norm,
            norm_clipped
        );

        Ok(Record::from_slice(&[
            ("loss", RecordValue::Scalar(loss)),
            ("grad_norm", RecordValue::Scalar(norm)),
            ("grad_norm_clipped", RecordValue::Scalar(norm_clipped)),
        ]))
    }
}

impl<Q> Configurable for Dqn<Q>
where
    Q: QFunction,
    Q::Config: DeserializeOwned + Serialize + ModelDims + Clone,
{
    type Config = DqnConfig<Q::Config>;

    /// Constructs DQN agent.
    fn build(config: Self::Config) -> Result<Self> {
        let opt_config = config.opt_config()?;
        let missing = |name: &str| TdqError::Config(format!("{} is not set", name));
        let q_config = config.q_config.ok_or_else(|| missing("q_config"))?;
        let action_dim = config.action_dim.ok_or_else(|| missing("action_dim"))?;
        let bounds = config.bounds.ok_or_else(|| missing("bounds"))?;
        let device = Device::try_from(config.device.ok_or_else(|| missing("device"))?)?;
        let state_dim = q_config.state_dim();

        let qnet = QModel::<Q>::build(q_config, device.clone())?;
        let mut qnet_tgt = qnet.duplicate()?;
        qnet_tgt.set_train(false);
        let opt = opt_config.build(qnet.vars())?;
        info!(
            "Build DQN agent: state_dim = {}, action_dim = {}, {:?}",
            state_dim, action_dim, opt_config
        );

        Ok(Dqn {
            qnet,
            qnet_tgt,
            opt,
            state_dim,
            action_dim,
            bounds,
            device,
            max_grad_norm: config.max_grad_norm,
            n_opts: 0,
            rng: SmallRng::seed_from_u64(config.seed),
        })
    }
}

impl<Q> Agent for Dqn<Q>
where
    Q: QFunction,
    Q::Config: DeserializeOwned + Serialize + ModelDims + Clone,
{
    fn sample_action(
        &mut self,
        state: &[f32],
        timestep: f32,
        explore_prob: f64,
    ) -> Result<Vec<f32>> {
        if self.rng.gen::<f64>() < explore_prob {
            return Ok(self.bounds.sample(self.action_dim, &mut self.rng));
        }

        if state.len() != self.state_dim {
            return Err(TdqError::BatchMismatch(format!(
                "state has {} elements, expected {}",
                state.len(),
                self.state_dim
            ))
            .into());
        }
        let state = Tensor::from_slice(state, (1, self.state_dim), &self.device)?;
        let timestep = Tensor::from_slice(&[timestep], (1,), &self.device)?;

        let q = self.qnet.inference();
        let act = q.sample_action(&state, &timestep)?.detach();
        Ok(act.flatten_all()?.to_vec1::<f32>()?)
    }

    fn train_with_record<R: ReplayMemory>(
        &mut self,
        memory: &mut R,
        gamma: f64,
        batch_size: usize,
    ) -> Result<Record> {
        self.update_critic(memory, gamma, batch_size)
    }

    fn update(&mut self) -> Result<()> {
        self.qnet_tgt.copy_from(&self.qnet)?;
        self.qnet_tgt.set_train(false);
        debug!("Copy qnet to qnet_tgt after {} optimization steps", self.n_opts);
        Ok(())
    }

    fn save_checkpoint(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.qnet.save(path.join(MODEL_FILE))?;
        info!("Save checkpoint to {:?}", path);
        Ok(())
    }

    fn load_checkpoint(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(TdqError::CheckpointNotFound(path.to_path_buf()).into());
        }
        self.qnet.load(path.join(MODEL_FILE))?;
        self.update()?;
        info!("Load checkpoint from {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mlp::{NafMlp, NafMlpConfig};

    fn agent() -> Result<Dqn<NafMlp>> {
        let config = DqnConfig::default()
            .q_config(NafMlpConfig::new(3, vec![16], 2))
            .action_dim(2)
            .bounds(ActionBounds::Scalar(-1.0, 1.0))
            .device(crate::Device::Cpu)
            .lr(1e-3)
            .weight_decay(0.0);
        Dqn::build(config)
    }

    fn next_state() -> Result<(Tensor, Tensor)> {
        let s1 = Tensor::randn(0f32, 100.0, (3, 3), &Device::Cpu)?;
        let t1 = Tensor::from_slice(&[1f32, 50.0, 1000.0], (3,), &Device::Cpu)?;
        Ok((s1, t1))
    }

    #[test]
    fn test_terminal_target_is_reward() -> Result<()> {
        let mut agent = agent()?;
        let reward = Tensor::from_slice(&[1f32, -2.0, 3.5], (3,), &Device::Cpu)?;
        let terminal = Tensor::ones((3,), candle_core::DType::F32, &Device::Cpu)?;
        let (s1, t1) = next_state()?;

        for gamma in [0.0, 0.5, 0.99, 10.0] {
            let tgt = agent.td_target(&reward, &terminal, &s1, &t1, gamma)?;
            assert_eq!(tgt.to_vec1::<f32>()?, vec![1.0, -2.0, 3.5]);
        }
        Ok(())
    }

    #[test]
    fn test_non_terminal_target_bootstraps() -> Result<()> {
        let mut agent = agent()?;
        let reward = Tensor::from_slice(&[1f32, -2.0, 3.5], (3,), &Device::Cpu)?;
        let terminal = Tensor::from_slice(&[0f32, 1.0, 0.0], (3,), &Device::Cpu)?;
        let (s1, t1) = next_state()?;
        let gamma = 0.9;

        let v = agent.qnet_tgt.forward(&s1, &t1, None)?.to_vec1::<f32>()?;
        let tgt = agent
            .td_target(&reward, &terminal, &s1, &t1, gamma)?
            .to_vec1::<f32>()?;

        assert!((tgt[0] - (1.0 + 0.9 * v[0])).abs() < 1e-4);
        assert_eq!(tgt[1], -2.0);
        assert!((tgt[2] - (3.5 + 0.9 * v[2])).abs() < 1e-4);
        assert!(!agent.qnet_tgt.is_train());
        Ok(())
    }

    #[test]
    fn test_greedy_action_is_approximator_output() -> Result<()> {
        let mut agent = agent()?;
        let state = [0.4f32, -1.2, 2.0];
        let a = agent.sample_action(&state, 7.0, 0.0)?;

        let s = Tensor::from_slice(&state, (1, 3), &Device::Cpu)?;
        let t = Tensor::from_slice(&[7f32], (1,), &Device::Cpu)?;
        let expected = {
            let q = agent.qnet.inference();
            q.sample_action(&s, &t)?.flatten_all()?.to_vec1::<f32>()?
        };
        assert_eq!(a, expected);
        assert!(agent.qnet.is_train());
        Ok(())
    }

    #[test]
    fn test_target_starts_in_inference_mode() -> Result<()> {
        let agent = agent()?;
        assert!(agent.qnet.is_train());
        assert!(!agent.qnet_tgt.is_train());
        Ok(())
    }
}
