//! Configuration of DQN agent.
use super::ActionBounds;
use crate::{opt::OptimizerConfig, util::ModelDims, Device};
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};
use tdq_core::TdqError;

/// Configuration of [`Dqn`](super::Dqn) agent.
///
/// Fields wrapped in `Option` are required and have no default; building an agent
/// from a configuration missing any of them fails.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DqnConfig<Q> {
    pub q_config: Option<Q>,
    pub action_dim: Option<usize>,
    pub bounds: Option<ActionBounds>,
    pub device: Option<Device>,
    pub lr: Option<f64>,
    pub weight_decay: Option<f64>,

    /// Use AdamW instead of Adam with L2 penalty.
    #[serde(default)]
    pub decoupled_weight_decay: bool,

    /// Maximum L2 norm of the gradient over all parameters.
    #[serde(default = "default_max_grad_norm")]
    pub max_grad_norm: f64,

    /// Seed of the random number generator used for exploration.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_max_grad_norm() -> f64 {
    10.0
}

fn default_seed() -> u64 {
    42
}

impl<Q> Default for DqnConfig<Q> {
    fn default() -> Self {
        Self {
            q_config: None,
            action_dim: None,
            bounds: None,
            device: None,
            lr: None,
            weight_decay: None,
            decoupled_weight_decay: false,
            max_grad_norm: default_max_grad_norm(),
            seed: default_seed(),
        }
    }
}

impl<Q> DqnConfig<Q>
where
    Q: DeserializeOwned + Serialize + ModelDims,
{
    /// Sets configurations for action-value function.
    ///
    /// The action dimension and bounds already set are copied into `v`.
    pub fn q_config(mut self, mut v: Q) -> Self {
        if let Some(action_dim) = self.action_dim {
            v.set_action_dim(action_dim);
        }
        if let Some(bounds) = &self.bounds {
            v.set_action_bounds(bounds.clone());
        }
        self.q_config = Some(v);
        self
    }

    /// Sets the dimension of actions, also in the configuration of the action-value function.
    pub fn action_dim(mut self, v: usize) -> Self {
        self.action_dim = Some(v);
        if let Some(q_config) = &mut self.q_config {
            q_config.set_action_dim(v);
        }
        self
    }

    /// Sets the bounds of the action space, also in the configuration of the action-value function.
    pub fn bounds(mut self, v: ActionBounds) -> Self {
        if let Some(q_config) = &mut self.q_config {
            q_config.set_action_bounds(v.clone());
        }
        self.bounds = Some(v);
        self
    }

    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = Some(v);
        self
    }

    /// Sets the learning rate.
    pub fn lr(mut self, v: f64) -> Self {
        self.lr = Some(v);
        self
    }

    /// Sets the weight decay coefficient.
    pub fn weight_decay(mut self, v: f64) -> Self {
        self.weight_decay = Some(v);
        self
    }

    /// Uses AdamW if `true`.
    pub fn decoupled_weight_decay(mut self, v: bool) -> Self {
        self.decoupled_weight_decay = v;
        self
    }

    /// Sets the maximum gradient norm.
    pub fn max_grad_norm(mut self, v: f64) -> Self {
        self.max_grad_norm = v;
        self
    }

    /// Sets the seed of the exploration.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Checks required fields and their values.
    pub fn validate(&self) -> Result<(), TdqError> {
        fn required<'a, T>(v: &'a Option<T>, name: &str) -> Result<&'a T, TdqError> {
            v.as_ref()
                .ok_or_else(|| TdqError::Config(format!("{} is not set", name)))
        }

        let q_config = required(&self.q_config, "q_config")?;
        let action_dim = *required(&self.action_dim, "action_dim")?;
        let bounds = required(&self.bounds, "bounds")?;
        required(&self.device, "device")?;
        let lr = *required(&self.lr, "lr")?;
        let weight_decay = *required(&self.weight_decay, "weight_decay")?;

        if action_dim == 0 {
            return Err(TdqError::Config("action_dim must be positive".into()));
        }
        if q_config.action_dim() != action_dim {
            return Err(TdqError::Config(format!(
                "action_dim is {}, q_config has {}",
                action_dim,
                q_config.action_dim()
            )));
        }
        bounds.validate(action_dim)?;
        if let Some(q_bounds) = q_config.get_action_bounds() {
            if q_bounds != bounds {
                return Err(TdqError::Config(format!(
                    "bounds are {:?}, q_config has {:?}",
                    bounds, q_bounds
                )));
            }
        }
        if !(lr.is_finite() && lr > 0.0) {
            return Err(TdqError::Config(format!("lr must be positive, got {}", lr)));
        }
        if !(weight_decay.is_finite() && weight_decay >= 0.0) {
            return Err(TdqError::Config(format!(
                "weight_decay must be non-negative, got {}",
                weight_decay
            )));
        }
        if !(self.max_grad_norm.is_finite() && self.max_grad_norm > 0.0) {
            return Err(TdqError::Config(format!(
                "max_grad_norm must be positive, got {}",
                self.max_grad_norm
            )));
        }
        Ok(())
    }

    /// Returns the configuration of the optimizer.
    pub fn opt_config(&self) -> Result<OptimizerConfig, TdqError> {
        self.validate()?;
        let lr = self.lr.unwrap_or_default();
        let weight_decay = self.weight_decay.unwrap_or_default();

        Ok(match self.decoupled_weight_decay {
            false => OptimizerConfig::Adam { lr, weight_decay },
            true => OptimizerConfig::AdamW {
                lr,
                beta1: 0.9,
                beta2: 0.999,
                eps: 1e-8,
                weight_decay,
            },
        })
    }

    /// Constructs [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        log::info!("Load config of DQN agent from {}", path_.to_str().unwrap_or("?"));
        Ok(b)
    }

    /// Saves [`DqnConfig`] to as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        log::info!("Save config of DQN agent into {}", path_.to_str().unwrap_or("?"));
        Ok(())
    }
}
