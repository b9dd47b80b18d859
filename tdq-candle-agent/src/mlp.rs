//! Multilayer perceptron with normalized advantage heads.
mod base;
mod config;
pub use base::NafMlp;
use candle_core::Tensor;
use candle_nn::{ops::dropout, Linear, Module};
pub use config::NafMlpConfig;

fn mlp_forward(
    xs: Tensor,
    layers: &[Linear],
    dropout_p: Option<f32>,
) -> candle_core::Result<Tensor> {
    let mut xs = xs;

    for layer in layers.iter() {
        xs = layer.forward(&xs)?.relu()?;
        if let Some(p) = dropout_p {
            xs = dropout(&xs, p)?;
        }
    }

    Ok(xs)
}
