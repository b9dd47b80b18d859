use super::{mlp_forward, NafMlpConfig};
use crate::model::QFunction;
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::{linear, Linear, Module, VarBuilder};
use tdq_core::TdqError;

/// Returns vector of linear modules of hidden layers.
fn create_linear_layers(
    prefix: &str,
    vs: VarBuilder,
    in_dim: usize,
    units: &[usize],
) -> Result<Vec<Linear>> {
    let mut in_out_pairs: Vec<(usize, usize)> = Vec::with_capacity(units.len());
    let mut d = in_dim;
    for &u in units.iter() {
        in_out_pairs.push((d, u));
        d = u;
    }
    let vs = vs.pp(prefix);

    in_out_pairs
        .iter()
        .enumerate()
        .map(|(i, &(in_dim, out_dim))| -> Result<Linear> {
            Ok(linear(in_dim, out_dim, vs.pp(format!("ln{}", i)))?)
        })
        .collect()
}

fn check_config(config: &NafMlpConfig) -> Result<(), TdqError> {
    if config.state_dim == 0 || config.action_dim == 0 {
        Err(TdqError::Config("state_dim and action_dim must be positive".into()))
    } else if config.units.iter().any(|&u| u == 0) {
        Err(TdqError::Config(format!("invalid hidden units {:?}", config.units)))
    } else if let Err(e) = config.action_bounds.validate(config.action_dim) {
        Err(e)
    } else if !(0.0..1.0).contains(&config.dropout) {
        Err(TdqError::Config(format!("invalid dropout {}", config.dropout)))
    } else if !config.time_scale.is_finite() {
        Err(TdqError::Config(format!("invalid time scale {}", config.time_scale)))
    } else {
        Ok(())
    }
}

/// Multilayer perceptron computing normalized advantage function.
///
/// The input is the concatenation of the state and the scaled timestep.
/// Three heads on top of the hidden layers output the state value `V`, the greedy
/// action `mu` and a diagonal precision `p`:
///
/// `Q(s, t, a) = V(s, t) - 0.5 * sum_i p_i(s, t) * (a_i - mu_i(s, t))^2`
///
/// Since `p` is positive, `max_a Q(s, t, a) = V(s, t)` is attained at `a = mu`.
pub struct NafMlp {
    config: NafMlpConfig,
    device: Device,
    layers: Vec<Linear>,
    value: Linear,
    mean: Linear,
    log_prec: Linear,

    // Half widths and centres of the action bounds, shape `[action_dim]`.
    half: Tensor,
    mid: Tensor,
    train: bool,
}

impl NafMlp {
    fn hidden(&self, state: &Tensor, timestep: &Tensor) -> Result<Tensor> {
        let state = state.to_device(&self.device)?;
        let n = state.dims()[0];
        let t = timestep
            .to_device(&self.device)?
            .reshape((n, 1))?
            .affine(self.config.time_scale, 0.0)?;
        let xs = Tensor::cat(&[&state, &t], D::Minus1)?;
        let dropout_p = match self.train && self.config.dropout > 0.0 {
            true => Some(self.config.dropout),
            false => None,
        };

        Ok(mlp_forward(xs, &self.layers, dropout_p)?)
    }

    fn greedy(&self, h: &Tensor) -> Result<Tensor> {
        Ok(self
            .mean
            .forward(h)?
            .tanh()?
            .broadcast_mul(&self.half)?
            .broadcast_add(&self.mid)?)
    }

    fn precision(&self, h: &Tensor) -> Result<Tensor> {
        // log-precision is kept in [-5, 5]
        Ok(self.log_prec.forward(h)?.tanh()?.affine(5.0, 0.0)?.exp()?)
    }
}

impl QFunction for NafMlp {
    type Config = NafMlpConfig;

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        check_config(&config)?;
        let device = vs.device().clone();
        let in_dim = config.state_dim + 1;
        let layers = create_linear_layers("mlp", vs.clone(), in_dim, &config.units)?;
        let last = config.units.last().copied().unwrap_or(in_dim);
        let value = linear(last, 1, vs.pp("value"))?;
        let mean = linear(last, config.action_dim, vs.pp("mean"))?;
        let log_prec = linear(last, config.action_dim, vs.pp("log_prec"))?;

        let (half, mid): (Vec<f32>, Vec<f32>) = (0..config.action_dim)
            .map(|i| {
                let (low, high) = config.action_bounds.get(i);
                ((high - low) / 2.0, (high + low) / 2.0)
            })
            .unzip();
        let half = Tensor::from_vec(half, (config.action_dim,), &device)?;
        let mid = Tensor::from_vec(mid, (config.action_dim,), &device)?;

        Ok(Self {
            config,
            device,
            layers,
            value,
            mean,
            log_prec,
            half,
            mid,
            train: true,
        })
    }

    fn forward(
        &self,
        state: &Tensor,
        timestep: &Tensor,
        action: Option<&Tensor>,
    ) -> Result<Tensor> {
        let h = self.hidden(state, timestep)?;
        let v = self.value.forward(&h)?.squeeze(D::Minus1)?;

        match action {
            None => Ok(v),
            Some(action) => {
                let action = action.to_device(&self.device)?;
                let mu = self.greedy(&h)?;
                let p = self.precision(&h)?;
                let adv = ((action - mu)?.sqr()? * p)?.sum(D::Minus1)?;
                Ok((v - (adv * 0.5)?)?)
            }
        }
    }

    fn sample_action(&self, state: &Tensor, timestep: &Tensor) -> Result<Tensor> {
        let h = self.hidden(state, timestep)?;
        self.greedy(&h)
    }

    fn set_train(&mut self, train: bool) {
        self.train = train;
    }

    fn is_train(&self) -> bool {
        self.train
    }
}
