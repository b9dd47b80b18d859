use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use std::collections::HashMap;
use tdq_core::TdqError;

/// Named tensors holding a copy of model parameters on the host.
///
/// The tensors never share storage with the variables they were copied from,
/// so a snapshot can be kept, sent to another worker or mutated without
/// affecting the network.
#[derive(Clone, Debug)]
pub struct NamedTensors {
    pub named_tensors: HashMap<String, Tensor>,
}

impl NamedTensors {
    /// Copy data of [`VarMap`] to CPU.
    pub fn copy_from(vs: &VarMap) -> Result<Self> {
        let src = vs.data().lock().map_err(|_| anyhow!("lock failed"))?;
        let mut named_tensors = HashMap::with_capacity(src.len());

        for (k, v) in src.iter() {
            // `to_device` returns a shallow clone when already on CPU
            let t = v.as_tensor().detach().to_device(&Device::Cpu)?.copy()?;
            named_tensors.insert(k.clone(), t);
        }

        Ok(Self { named_tensors })
    }

    /// Checks that names, shapes and dtypes agree with the variables of [`VarMap`].
    pub fn check_structure(&self, vs: &VarMap) -> Result<()> {
        let dest = vs.data().lock().map_err(|_| anyhow!("lock failed"))?;
        let mismatch = |msg: String| -> anyhow::Error { TdqError::StructuralMismatch(msg).into() };

        if dest.len() != self.named_tensors.len() {
            return Err(mismatch(format!(
                "{} tensors given, network has {} variables",
                self.named_tensors.len(),
                dest.len()
            )));
        }

        for (name, var) in dest.iter() {
            let src = self
                .named_tensors
                .get(name)
                .ok_or_else(|| mismatch(format!("{} is missing", name)))?;
            if src.shape() != var.shape() {
                return Err(mismatch(format!(
                    "{}: shape {:?} given, {:?} expected",
                    name,
                    src.shape(),
                    var.shape()
                )));
            }
            if src.dtype() != var.dtype() {
                return Err(mismatch(format!(
                    "{}: dtype {:?} given, {:?} expected",
                    name,
                    src.dtype(),
                    var.dtype()
                )));
            }
        }

        Ok(())
    }

    /// Copy named tensors to [`VarMap`].
    ///
    /// Nothing is copied if the structure does not match.
    pub fn copy_to(&self, vs: &VarMap) -> Result<()> {
        self.check_structure(vs)?;

        let dest = vs.data().lock().map_err(|_| anyhow!("lock failed"))?;
        for (name, var) in dest.iter() {
            let src = self.named_tensors[name].to_device(var.device())?;
            var.set(&src)?;
        }

        Ok(())
    }

    /// Returns the number of tensors.
    pub fn len(&self) -> usize {
        self.named_tensors.len()
    }

    /// Returns `true` if there is no tensor.
    pub fn is_empty(&self) -> bool {
        self.named_tensors.is_empty()
    }

    /// Returns the flattened values of the tensor of the given name.
    pub fn values(&self, name: &str) -> Result<Vec<f32>> {
        let t = self
            .named_tensors
            .get(name)
            .ok_or_else(|| anyhow!("no tensor named {}", name))?;
        Ok(t.flatten_all()?.to_vec1::<f32>()?)
    }

    /// Returns `true` if both hold the same names with bit-identical values.
    pub fn bit_eq(&self, other: &Self) -> Result<bool> {
        if self.len() != other.len() {
            return Ok(false);
        }
        for name in self.named_tensors.keys() {
            if !other.named_tensors.contains_key(name) {
                return Ok(false);
            }
            let v1 = self.values(name)?;
            let v2 = other.values(name)?;
            let differ = v1.iter().zip(v2.iter()).any(|(a, b)| a.to_bits() != b.to_bits());
            if v1.len() != v2.len() || differ {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
