use crate::{
    model::QFunction,
    util::{copy_vars, NamedTensors},
};
use anyhow::Result;
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use log::{info, warn};
use std::{
    fs,
    ops::Deref,
    path::{Path, PathBuf},
};

/// An action-value function together with the [`VarMap`] owning its parameters.
pub struct QModel<Q>
where
    Q: QFunction,
{
    device: Device,
    varmap: VarMap,
    q_config: Q::Config,
    q: Q,
}

impl<Q> QModel<Q>
where
    Q: QFunction,
    Q::Config: Clone,
{
    /// Constructs [`QModel`] with parameters in a fresh [`VarMap`] on `device`.
    pub fn build(q_config: Q::Config, device: Device) -> Result<Self> {
        let varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            Q::build(vb, q_config.clone())?
        };

        Ok(Self {
            device,
            varmap,
            q_config,
            q,
        })
    }

    /// Returns a structurally identical model whose parameters are a copy of `self`.
    ///
    /// The copy owns its own storage.
    pub fn duplicate(&self) -> Result<Self> {
        let mut model = Self::build(self.q_config.clone(), self.device.clone())?;
        model.copy_from(self)?;
        model.set_train(self.is_train());
        Ok(model)
    }
}

impl<Q> QModel<Q>
where
    Q: QFunction,
{
    /// Outputs action values, see [`QFunction::forward`].
    pub fn forward(
        &self,
        state: &Tensor,
        timestep: &Tensor,
        action: Option<&Tensor>,
    ) -> Result<Tensor> {
        self.q.forward(state, timestep, action)
    }

    /// Outputs greedy actions, see [`QFunction::sample_action`].
    pub fn sample_action(&self, state: &Tensor, timestep: &Tensor) -> Result<Tensor> {
        self.q.sample_action(state, timestep)
    }

    pub fn set_train(&mut self, train: bool) {
        self.q.set_train(train);
    }

    pub fn is_train(&self) -> bool {
        self.q.is_train()
    }

    /// Puts the model in inference mode until the returned guard is dropped.
    ///
    /// The previous mode is restored when the guard goes out of scope, including
    /// on early return with `?`.
    pub fn inference(&mut self) -> InferenceGuard<'_, Q> {
        let prev = self.q.is_train();
        self.q.set_train(false);
        InferenceGuard { model: self, prev }
    }

    pub fn get_varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Returns the variables to be optimized.
    pub fn vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Overwrites parameters with the values of `src`.
    pub fn copy_from(&mut self, src: &QModel<Q>) -> Result<()> {
        copy_vars(&self.varmap, &src.varmap)
    }

    /// Returns a host copy of the parameters.
    pub fn snapshot(&self) -> Result<NamedTensors> {
        NamedTensors::copy_from(&self.varmap)
    }

    /// Overwrites parameters with the snapshot.
    pub fn restore(&mut self, src: &NamedTensors) -> Result<()> {
        src.copy_to(&self.varmap)
    }

    /// Saves parameters in safetensors format.
    ///
    /// The file is first written next to `path` and then renamed onto it, so an
    /// interrupted save never leaves a truncated file at `path`.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        let tensors = self.snapshot()?.named_tensors;
        write_atomic(path, |tmp| Ok(candle_core::safetensors::save(&tensors, tmp)?))?;
        info!("Save qnet to {:?}", path);
        Ok(())
    }

    /// Loads parameters saved with [`QModel::save`] onto the device of the model.
    ///
    /// Nothing is changed if the parameters do not match the network.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        let path = path.as_ref();
        let named_tensors = candle_core::safetensors::load(path, &self.device)?;
        self.restore(&NamedTensors { named_tensors })?;
        info!("Load qnet from {:?}", path);
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Runs `write` on a sibling temporary file and renames it onto `path`.
///
/// On failure the temporary file is removed and `path` is left as it was.
fn write_atomic(path: &Path, write: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    let tmp = tmp_path(path);
    let result = write(&tmp).and_then(|()| Ok(fs::rename(&tmp, path)?));
    if result.is_err() && tmp.exists() {
        if let Err(e) = fs::remove_file(&tmp) {
            warn!("Failed to remove {:?}: {}", tmp, e);
        }
    }
    result
}

/// Keeps a [`QModel`] in inference mode while alive.
pub struct InferenceGuard<'a, Q>
where
    Q: QFunction,
{
    model: &'a mut QModel<Q>,
    prev: bool,
}

impl<'a, Q> Deref for InferenceGuard<'a, Q>
where
    Q: QFunction,
{
    type Target = QModel<Q>;

    fn deref(&self) -> &Self::Target {
        self.model
    }
}

impl<'a, Q> Drop for InferenceGuard<'a, Q>
where
    Q: QFunction,
{
    fn drop(&mut self) {
        self.model.q.set_train(self.prev);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mlp::{NafMlp, NafMlpConfig};
    use tempdir::TempDir;

    fn model() -> Result<QModel<NafMlp>> {
        QModel::build(NafMlpConfig::new(2, vec![8], 1), Device::Cpu)
    }

    fn failing_inference(model: &mut QModel<NafMlp>) -> Result<()> {
        let q = model.inference();
        assert!(!q.is_train());
        let state = Tensor::zeros((1, 5), DType::F32, &Device::Cpu)?;
        let t = Tensor::zeros((1,), DType::F32, &Device::Cpu)?;
        q.forward(&state, &t, None)?;
        Ok(())
    }

    #[test]
    fn test_inference_guard_restores_mode() -> Result<()> {
        let mut model = model()?;
        assert!(model.is_train());

        // State has a wrong dimension: the forward pass fails inside the guard.
        assert!(failing_inference(&mut model).is_err());
        assert!(model.is_train());

        model.set_train(false);
        {
            let _q = model.inference();
        }
        assert!(!model.is_train());
        Ok(())
    }

    #[test]
    fn test_duplicate_is_independent() -> Result<()> {
        let model = model()?;
        let copy = model.duplicate()?;
        assert!(model.snapshot()?.bit_eq(&copy.snapshot()?)?);

        let other = self::model()?;
        copy_vars(model.get_varmap(), other.get_varmap())?;
        assert!(!model.snapshot()?.bit_eq(&copy.snapshot()?)?);
        Ok(())
    }

    #[test]
    fn test_save_load() -> Result<()> {
        let dir = TempDir::new("qmodel")?;
        let path = dir.path().join("model.pt");
        let model = model()?;
        model.save(&path)?;
        assert!(path.exists());
        assert!(!tmp_path(&path).exists());

        let mut model2 = self::model()?;
        model2.load(&path)?;
        assert!(model.snapshot()?.bit_eq(&model2.snapshot()?)?);
        Ok(())
    }

    #[test]
    fn test_load_other_architecture_fails() -> Result<()> {
        let dir = TempDir::new("qmodel")?;
        let path = dir.path().join("model.pt");
        model()?.save(&path)?;

        let mut model2: QModel<NafMlp> =
            QModel::build(NafMlpConfig::new(2, vec![16], 1), Device::Cpu)?;
        let before = model2.snapshot()?;
        assert!(model2.load(&path).is_err());
        assert!(before.bit_eq(&model2.snapshot()?)?);
        Ok(())
    }

    #[test]
    fn test_failed_write_leaves_no_temporary_file() -> Result<()> {
        let dir = TempDir::new("qmodel")?;
        let path = dir.path().join("model.pt");
        fs::write(&path, b"previous")?;

        let result = write_atomic(&path, |tmp| {
            fs::write(tmp, b"trunc")?;
            Err(anyhow::anyhow!("interrupted"))
        });
        assert!(result.is_err());
        assert!(!tmp_path(&path).exists());
        assert_eq!(fs::read(&path)?, b"previous");
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }
}
