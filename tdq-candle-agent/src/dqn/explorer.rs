//! Exploration of DQN in a continuous action space.
use rand::Rng;
use serde::{Deserialize, Serialize};
use tdq_core::TdqError;

/// Bounds of the continuous action space.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum ActionBounds {
    /// The same `(low, high)` in every dimension.
    Scalar(f32, f32),

    /// Per-dimension lower and upper limits.
    PerDim(Vec<f32>, Vec<f32>),
}

impl ActionBounds {
    /// Checks that the bounds are finite, ordered and match `action_dim`.
    pub fn validate(&self, action_dim: usize) -> Result<(), TdqError> {
        let check = |low: f32, high: f32| {
            if low.is_finite() && high.is_finite() && low <= high {
                Ok(())
            } else {
                Err(TdqError::Config(format!(
                    "invalid action bounds ({}, {})",
                    low, high
                )))
            }
        };

        match self {
            Self::Scalar(low, high) => check(*low, *high),
            Self::PerDim(low, high) => {
                if low.len() != action_dim || high.len() != action_dim {
                    return Err(TdqError::Config(format!(
                        "action bounds have {} lower and {} upper limits, action_dim is {}",
                        low.len(),
                        high.len(),
                        action_dim
                    )));
                }
                low.iter().zip(high.iter()).try_for_each(|(&l, &h)| check(l, h))
            }
        }
    }

    /// Returns `(low, high)` of the `i`-th dimension.
    pub fn get(&self, i: usize) -> (f32, f32) {
        match self {
            Self::Scalar(low, high) => (*low, *high),
            Self::PerDim(low, high) => (low[i], high[i]),
        }
    }

    /// Draws an action uniformly, each component independently within its bounds.
    pub fn sample(&self, action_dim: usize, rng: &mut impl Rng) -> Vec<f32> {
        (0..action_dim)
            .map(|i| {
                let (low, high) = self.get(i);
                rng.gen_range(low..=high)
            })
            .collect()
    }

    /// Returns `true` if every component of `action` lies within its bounds.
    pub fn contains(&self, action: &[f32]) -> bool {
        action.iter().enumerate().all(|(i, &a)| {
            let (low, high) = self.get(i);
            low <= a && a <= high
        })
    }
}

/// Linearly decaying exploration probability.
///
/// The agent itself never decays the exploration probability. A training loop
/// computes it with this schedule and passes it to `sample_action`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonSchedule {
    pub eps_start: f64,
    pub eps_final: f64,
    pub final_step: usize,
}

#[allow(clippy::new_without_default)]
impl EpsilonSchedule {
    /// Constructs a schedule decaying from 1.0 to 0.02 in 100000 steps.
    pub fn new() -> Self {
        Self {
            eps_start: 1.0,
            eps_final: 0.02,
            final_step: 100_000,
        }
    }

    /// Returns the exploration probability at the given step.
    pub fn eps(&self, step: usize) -> f64 {
        if self.final_step == 0 {
            return self.eps_final;
        }
        let d = (self.eps_start - self.eps_final) / (self.final_step as f64);
        (self.eps_start - d * step as f64).max(self.eps_final)
    }

    /// Set the epsilon value at the final step.
    pub fn eps_final(mut self, v: f64) -> Self {
        self.eps_final = v;
        self
    }

    /// Set the epsilon value at the start.
    pub fn eps_start(mut self, v: f64) -> Self {
        self.eps_start = v;
        self
    }

    /// Set the step at which epsilon reaches its final value.
    pub fn final_step(mut self, v: usize) -> Self {
        self.final_step = v;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_sample_within_bounds() {
        let bounds = ActionBounds::PerDim(vec![-1.0, 0.0, 5.0], vec![1.0, 0.1, 5.0]);
        bounds.validate(3).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);
        for _ in 0..1000 {
            let a = bounds.sample(3, &mut rng);
            assert_eq!(a.len(), 3);
            assert!(bounds.contains(&a));
            assert_eq!(a[2], 5.0);
        }
    }

    #[test]
    fn test_validate() {
        assert!(ActionBounds::Scalar(-1.0, 1.0).validate(4).is_ok());
        assert!(ActionBounds::Scalar(1.0, -1.0).validate(4).is_err());
        assert!(ActionBounds::Scalar(f32::NAN, 1.0).validate(1).is_err());
        assert!(ActionBounds::PerDim(vec![0.0], vec![1.0]).validate(2).is_err());
    }

    #[test]
    fn test_epsilon_schedule() {
        let s = EpsilonSchedule::new().eps_start(1.0).eps_final(0.1).final_step(10);
        assert_eq!(s.eps(0), 1.0);
        assert!((s.eps(5) - 0.55).abs() < 1e-12);
        assert!((s.eps(10) - 0.1).abs() < 1e-12);
        assert_eq!(s.eps(1000), 0.1);
    }
}
