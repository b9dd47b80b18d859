//! Ring buffer of transitions.
use super::SimpleReplayMemoryConfig;
use crate::{error::TdqError, ReplayMemory, Transition, TransitionBatch};
use anyhow::Result;
use rand::{rngs::StdRng, RngCore, SeedableRng};

/// A replay memory of fixed capacity with uniform sampling.
///
/// When the memory is full, the oldest transition is overwritten.
/// Sampling draws indices uniformly with replacement.
pub struct SimpleReplayMemory {
    capacity: usize,
    i: usize,
    buf: Vec<Transition>,
    rng: StdRng,
}

impl SimpleReplayMemory {
    /// Constructs a replay memory.
    pub fn build(config: &SimpleReplayMemoryConfig) -> Result<Self> {
        if config.capacity == 0 {
            let msg = "capacity of replay memory must be positive".to_string();
            return Err(TdqError::Config(msg).into());
        }

        Ok(Self {
            capacity: config.capacity,
            i: 0,
            buf: Vec::with_capacity(config.capacity),
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Returns the capacity of the memory.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl ReplayMemory for SimpleReplayMemory {
    fn push(&mut self, tr: Transition) -> Result<()> {
        if self.buf.len() < self.capacity {
            self.buf.push(tr);
        } else {
            self.buf[self.i] = tr;
        }
        self.i = (self.i + 1) % self.capacity;
        Ok(())
    }

    fn len(&self) -> usize {
        self.buf.len()
    }

    fn sample(&mut self, batch_size: usize) -> Result<TransitionBatch> {
        if self.buf.is_empty() {
            return Err(TdqError::EmptyMemory.into());
        }

        let size = self.buf.len();
        let ixs = (0..batch_size)
            .map(|_| (self.rng.next_u32() as usize) % size)
            .collect::<Vec<_>>();

        Ok(TransitionBatch::from_transitions(ixs.iter().map(|&ix| &self.buf[ix])))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn transition(i: usize) -> Transition {
        let x = i as f32;
        Transition::new(vec![x], vec![x], x, vec![x + 1.0], false, x)
    }

    #[test]
    fn test_overwrites_oldest() -> Result<()> {
        let config = SimpleReplayMemoryConfig::default().capacity(3);
        let mut memory = SimpleReplayMemory::build(&config)?;
        for i in 0..5 {
            memory.push(transition(i))?;
        }
        assert_eq!(memory.len(), 3);

        // Transitions 0 and 1 have been overwritten by 3 and 4.
        let batch = memory.sample(64)?;
        assert_eq!(batch.len(), 64);
        assert!(batch.reward.iter().all(|&r| r >= 2.0));
        batch.validate(1, 1)?;
        Ok(())
    }

    #[test]
    fn test_sample_empty_fails() -> Result<()> {
        let mut memory = SimpleReplayMemory::build(&SimpleReplayMemoryConfig::default())?;
        let err = memory.sample(4).unwrap_err();
        assert!(matches!(err.downcast_ref::<TdqError>(), Some(TdqError::EmptyMemory)));
        Ok(())
    }

    #[test]
    fn test_same_seed_same_samples() -> Result<()> {
        let config = SimpleReplayMemoryConfig::default().capacity(100).seed(7);
        let mut m1 = SimpleReplayMemory::build(&config)?;
        let mut m2 = SimpleReplayMemory::build(&config)?;
        for i in 0..100 {
            m1.push(transition(i))?;
            m2.push(transition(i))?;
        }
        assert_eq!(m1.sample(16)?, m2.sample(16)?);
        Ok(())
    }

    #[test]
    fn test_config_yaml() -> Result<()> {
        let dir = tempdir::TempDir::new("replay_memory_config")?;
        let path = dir.path().join("memory.yaml");
        let config = SimpleReplayMemoryConfig::default().capacity(123).seed(9);
        config.save(&path)?;
        assert_eq!(SimpleReplayMemoryConfig::load(&path)?, config);
        Ok(())
    }
}
