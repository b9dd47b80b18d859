//! Utilities.
use crate::dqn::ActionBounds;
use anyhow::{anyhow, Result};
use candle_core::{backprop::GradStore, DType, Var};
use candle_nn::VarMap;
use log::trace;
mod named_tensors;
pub use named_tensors::NamedTensors;
use tdq_core::TdqError;

/// Interface for handling the input and output spaces of an action-value function.
pub trait ModelDims {
    /// Returns the dimension of states.
    fn state_dim(&self) -> usize;

    /// Returns the dimension of actions.
    fn action_dim(&self) -> usize;

    /// Sets the dimension of actions.
    fn set_action_dim(&mut self, v: usize);

    /// Returns the bounds of actions output by the function, if it has any.
    fn get_action_bounds(&self) -> Option<&ActionBounds> {
        None
    }

    /// Sets the bounds of actions output by the function.
    fn set_action_bounds(&mut self, _v: ActionBounds) {}
}

/// Copies the values of variables in `src` into the variables of `dest`.
///
/// Variables are identified by their names. Values are copied into the storage of
/// `dest`, so `dest` and `src` never share storage afterwards.
/// Fails without modifying `dest` if names or shapes disagree.
pub fn copy_vars(dest: &VarMap, src: &VarMap) -> Result<()> {
    let dest = dest.data().lock().map_err(|_| anyhow!("lock failed"))?;
    let src = src.data().lock().map_err(|_| anyhow!("lock failed"))?;

    if dest.len() != src.len() {
        return Err(TdqError::StructuralMismatch(format!(
            "{} variables in destination, {} in source",
            dest.len(),
            src.len()
        ))
        .into());
    }
    for (k, v_dest) in dest.iter() {
        match src.get(k) {
            Some(v_src) if v_src.shape() == v_dest.shape() => {}
            Some(v_src) => {
                return Err(TdqError::StructuralMismatch(format!(
                    "{}: shape {:?} in destination, {:?} in source",
                    k,
                    v_dest.shape(),
                    v_src.shape()
                ))
                .into())
            }
            None => {
                return Err(TdqError::StructuralMismatch(format!("{} is not in source", k)).into())
            }
        }
    }

    trace!("Copy {} variables", dest.len());
    for (k, v_dest) in dest.iter() {
        let t_src = src[k].as_tensor().to_device(v_dest.device())?;
        v_dest.set(&t_src)?;
    }

    Ok(())
}

/// Returns the L2 norm of the gradients of `vars`, taken over all variables jointly.
///
/// Variables without gradient are ignored.
pub fn grad_norm(grads: &GradStore, vars: &[Var]) -> Result<f32> {
    let mut sq = 0f64;
    for var in vars.iter() {
        if let Some(g) = grads.get(var.as_tensor()) {
            sq += g
                .to_dtype(DType::F64)?
                .sqr()?
                .sum_all()?
                .to_scalar::<f64>()?;
        }
    }
    Ok(sq.sqrt() as f32)
}

/// Rescales the gradients of `vars` so that their joint L2 norm does not exceed `max_norm`.
///
/// Returns the norm before clipping.
/// See <https://pytorch.org/docs/stable/generated/torch.nn.utils.clip_grad_norm_.html>.
pub fn clip_grad_norm(grads: &mut GradStore, vars: &[Var], max_norm: f64) -> Result<f32> {
    let norm = grad_norm(grads, vars)?;
    let coef = max_norm / (norm as f64 + 1e-6);

    if coef < 1.0 {
        for var in vars.iter() {
            if let Some(g) = grads.remove(var.as_tensor()) {
                grads.insert(var.as_tensor(), (g * coef)?);
            }
        }
    }

    Ok(norm)
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{Device, Tensor};
    use candle_nn::Init;

    fn varmap(values: &[f32]) -> Result<VarMap> {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get((values.len(),), "var1", init, DType::F32, &Device::Cpu)?;
        vm.data().lock().unwrap()["var1"]
            .set(&Tensor::from_slice(values, (values.len(),), &Device::Cpu)?)?;
        Ok(vm)
    }

    fn values(vm: &VarMap) -> Vec<f32> {
        vm.data().lock().unwrap()["var1"]
            .as_tensor()
            .to_vec1::<f32>()
            .unwrap()
    }

    #[test]
    fn test_copy_vars() -> Result<()> {
        let vm_src = varmap(&[1.0, 2.0, 3.0])?;
        let vm_dest = varmap(&[4.0, 5.0, 6.0])?;
        copy_vars(&vm_dest, &vm_src)?;
        assert_eq!(values(&vm_dest), vec![1.0, 2.0, 3.0]);

        // No shared storage: changing the source leaves the copy intact.
        let t = Tensor::from_slice(&[7f32, 8.0, 9.0], (3,), &Device::Cpu)?;
        vm_src.data().lock().unwrap()["var1"].set(&t)?;
        assert_eq!(values(&vm_dest), vec![1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_copy_vars_shape_mismatch() -> Result<()> {
        let vm_src = varmap(&[1.0, 2.0])?;
        let vm_dest = varmap(&[4.0, 5.0, 6.0])?;
        let err = copy_vars(&vm_dest, &vm_src).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TdqError>(),
            Some(TdqError::StructuralMismatch(_))
        ));
        assert_eq!(values(&vm_dest), vec![4.0, 5.0, 6.0]);
        Ok(())
    }

    #[test]
    fn test_clip_grad_norm() -> Result<()> {
        let w1 = Var::from_tensor(&Tensor::from_slice(&[1f32, 2.0], (2,), &Device::Cpu)?)?;
        let w2 = Var::from_tensor(&Tensor::from_slice(&[3f32], (1,), &Device::Cpu)?)?;
        // d/dw (1000 * sum(w)) = 1000 for every element, norm = 1000 * sqrt(3)
        let loss = ((w1.as_tensor().sum_all()? + w2.as_tensor().sum_all()?)? * 1000.0)?;
        let mut grads = loss.backward()?;
        let vars = vec![w1, w2];

        let norm = clip_grad_norm(&mut grads, &vars, 10.0)?;
        assert!((norm - 1000.0 * 3f32.sqrt()).abs() < 1e-2);

        let clipped = grad_norm(&grads, &vars)?;
        assert!(clipped <= 10.0 + 1e-4);
        assert!((clipped - 10.0).abs() < 1e-3);

        // Direction is preserved.
        let g1 = grads.get(vars[0].as_tensor()).unwrap().to_vec1::<f32>()?;
        assert!((g1[0] - g1[1]).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_clip_grad_norm_small_untouched() -> Result<()> {
        let w = Var::from_tensor(&Tensor::from_slice(&[1f32, 2.0], (2,), &Device::Cpu)?)?;
        let loss = w.as_tensor().sum_all()?;
        let mut grads = loss.backward()?;
        let vars = vec![w];

        let norm = clip_grad_norm(&mut grads, &vars, 10.0)?;
        assert!((norm - 2f32.sqrt()).abs() < 1e-5);
        assert_eq!(
            grads.get(vars[0].as_tensor()).unwrap().to_vec1::<f32>()?,
            vec![1.0, 1.0]
        );
        Ok(())
    }
}
