//! Optimizers.
use anyhow::Result;
use candle_core::{backprop::GradStore, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW};
use candle_optimisers::{
    adam::{Adam, ParamsAdam},
    Decay,
};
use serde::{Deserialize, Serialize};

/// Configuration of optimizer for training neural networks in an RL agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Adam optimizer with L2 penalty added to the gradient.
    Adam {
        /// Learning rate.
        lr: f64,

        /// Weight decay coefficient.
        #[serde(default)]
        weight_decay: f64,
    },

    /// AdamW optimizer, weight decay decoupled from the gradient.
    AdamW {
        lr: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_eps")]
        eps: f64,
        #[serde(default = "default_weight_decay")]
        weight_decay: f64,
    },
}

fn default_beta1() -> f64 {
    ParamsAdamW::default().beta1
}

fn default_beta2() -> f64 {
    ParamsAdamW::default().beta2
}

fn default_eps() -> f64 {
    ParamsAdamW::default().eps
}

fn default_weight_decay() -> f64 {
    ParamsAdamW::default().weight_decay
}

impl OptimizerConfig {
    /// Constructs the optimizer bound to the given variables.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        match &self {
            OptimizerConfig::Adam { lr, weight_decay } => {
                let weight_decay = match *weight_decay {
                    wd if wd > 0.0 => Some(Decay::WeightDecay(wd)),
                    _ => None,
                };
                let params = ParamsAdam {
                    lr: *lr,
                    weight_decay,
                    ..ParamsAdam::default()
                };
                let opt = Adam::new(vars, params)?;
                Ok(Optimizer::Adam(opt))
            }
            OptimizerConfig::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => {
                let params = ParamsAdamW {
                    lr: *lr,
                    beta1: *beta1,
                    beta2: *beta2,
                    eps: *eps,
                    weight_decay: *weight_decay,
                };
                let opt = AdamW::new(vars, params)?;
                Ok(Optimizer::AdamW(opt))
            }
        }
    }

    /// Returns the learning rate.
    pub fn lr(&self) -> f64 {
        match self {
            Self::Adam { lr, .. } => *lr,
            Self::AdamW { lr, .. } => *lr,
        }
    }
}

/// Optimizers.
///
/// This is a thin wrapper of optimizers in candle.
/// Moment estimates live in the optimizer and persist across steps.
pub enum Optimizer {
    /// Adam optimizer.
    Adam(Adam),

    /// AdamW optimizer.
    AdamW(AdamW),
}

impl Optimizer {
    /// Applies one update with the given gradients.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            Self::Adam(opt) => Ok(opt.step(grads)?),
            Self::AdamW(opt) => Ok(opt.step(grads)?),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{Device, Tensor};

    #[test]
    fn test_step_moves_towards_minimum() -> Result<()> {
        for config in [
            OptimizerConfig::Adam {
                lr: 0.1,
                weight_decay: 0.01,
            },
            OptimizerConfig::AdamW {
                lr: 0.1,
                beta1: default_beta1(),
                beta2: default_beta2(),
                eps: default_eps(),
                weight_decay: 0.0,
            },
        ] {
            let w = Var::from_tensor(&Tensor::from_slice(&[3f32], (1,), &Device::Cpu)?)?;
            let mut opt = config.build(vec![w.clone()])?;
            for _ in 0..10 {
                let loss = w.as_tensor().sqr()?.sum_all()?;
                opt.step(&loss.backward()?)?;
            }
            let v = w.as_tensor().to_vec1::<f32>()?[0];
            assert!(v < 3.0 && v > 0.0, "{:?}: {}", config, v);
        }
        Ok(())
    }

    #[test]
    fn test_yaml_default_fields() -> Result<()> {
        let config: OptimizerConfig = serde_yaml::from_str("Adam:\n  lr: 0.001\n")?;
        assert_eq!(
            config,
            OptimizerConfig::Adam {
                lr: 0.001,
                weight_decay: 0.0
            }
        );
        assert_eq!(config.lr(), 0.001);
        Ok(())
    }
}
