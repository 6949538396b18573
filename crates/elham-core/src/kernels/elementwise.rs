use rayon::prelude::*;

use super::{check_device, check_devices, parallel_for, BinaryOp, UnaryOp};
use crate::array::Array;
use crate::error::Result;
use crate::shape::Shape;

/// Broadcasting elementwise `op(a, b)`.
///
/// The output has shape `broadcast_shape(a, b)`. For each output position the
/// operands are read at their stride-aligned offsets, so a size-1 or missing
/// axis repeats its single element.
pub fn binary(op: BinaryOp, a: &Array, b: &Array) -> Result<Array> {
    let device = check_devices(op.name(), a, b)?;
    let out_shape = Shape::broadcast_shape(a.shape(), b.shape())?;
    let n = out_shape.elem_count();
    let (ad, bd) = (a.data(), b.data());

    // Same shape: plain zip, no index decoding.
    if a.shape() == b.shape() {
        let data: Vec<f64> = if parallel_for(n) {
            ad.par_iter()
                .zip(bd.par_iter())
                .map(|(&x, &y)| op.apply(x, y))
                .collect()
        } else {
            ad.iter().zip(bd).map(|(&x, &y)| op.apply(x, y)).collect()
        };
        return Ok(Array::from_parts(out_shape, data, device));
    }

    let la = a.layout().broadcast_to(&out_shape)?;
    let lb = b.layout().broadcast_to(&out_shape)?;
    let data: Vec<f64> = if parallel_for(n) {
        (0..n)
            .into_par_iter()
            .map(|i| op.apply(ad[la.offset_of(i)], bd[lb.offset_of(i)]))
            .collect()
    } else {
        la.strided_indices()
            .zip(lb.strided_indices())
            .map(|(ia, ib)| op.apply(ad[ia], bd[ib]))
            .collect()
    };
    Ok(Array::from_parts(out_shape, data, device))
}

/// Elementwise `op(a)`.
pub fn unary(op: UnaryOp, a: &Array) -> Result<Array> {
    let device = check_device(op.name(), a)?;
    let data: Vec<f64> = if parallel_for(a.size()) {
        a.data().par_iter().map(|&x| op.apply(x)).collect()
    } else {
        a.data().iter().map(|&x| op.apply(x)).collect()
    };
    Ok(Array::from_parts(a.shape().clone(), data, device))
}

pub fn add(a: &Array, b: &Array) -> Result<Array> {
    binary(BinaryOp::Add, a, b)
}

pub fn sub(a: &Array, b: &Array) -> Result<Array> {
    binary(BinaryOp::Sub, a, b)
}

pub fn mul(a: &Array, b: &Array) -> Result<Array> {
    binary(BinaryOp::Mul, a, b)
}

pub fn div(a: &Array, b: &Array) -> Result<Array> {
    binary(BinaryOp::Div, a, b)
}

/// `a` raised elementwise to `b`.
pub fn pow(a: &Array, b: &Array) -> Result<Array> {
    binary(BinaryOp::Pow, a, b)
}

pub fn neg(a: &Array) -> Result<Array> {
    unary(UnaryOp::Neg, a)
}

pub fn exp(a: &Array) -> Result<Array> {
    unary(UnaryOp::Exp, a)
}

/// Natural logarithm. Non-positive inputs give NaN / -inf, not an error.
pub fn ln(a: &Array) -> Result<Array> {
    unary(UnaryOp::Ln, a)
}

pub fn sqrt(a: &Array) -> Result<Array> {
    unary(UnaryOp::Sqrt, a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::testing::with_kernel_config;
    use crate::config::KernelConfig;
    use crate::device::Device;
    use crate::error::Error;

    #[test]
    fn test_broadcast_row_over_matrix() {
        let m = Array::from_nested([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        let row = Array::from_nested([10.0, 20.0, 30.0]).unwrap();
        let out = add(&m, &row).unwrap();
        assert_eq!(out.dims(), &[2, 3]);
        assert_eq!(out.data(), &[11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);
    }

    #[test]
    fn test_broadcast_column_times_row() {
        let col = Array::from_nested([[1.0], [2.0]]).unwrap();
        let row = Array::from_nested([1.0, 10.0, 100.0]).unwrap();
        let out = mul(&col, &row).unwrap();
        assert_eq!(out.dims(), &[2, 3]);
        assert_eq!(out.data(), &[1.0, 10.0, 100.0, 2.0, 20.0, 200.0]);
    }

    #[test]
    fn test_scalar_operand() {
        let a = Array::from_nested([1.0, 2.0, 3.0]).unwrap();
        let out = pow(&a, &Array::scalar(2.0)).unwrap();
        assert_eq!(out.data(), &[1.0, 4.0, 9.0]);
    }

    #[test]
    fn test_incompatible_shapes() {
        let a = Array::ones(3).unwrap();
        let b = Array::ones(4).unwrap();
        let err = sub(&a, &b).unwrap_err();
        assert!(matches!(err, Error::BroadcastIncompatible { .. }));
    }

    #[test]
    fn test_domain_errors_are_ieee() {
        let a = Array::from_nested([0.0, -1.0]).unwrap();
        let out = ln(&a).unwrap();
        assert_eq!(out.data()[0], f64::NEG_INFINITY);
        assert!(out.data()[1].is_nan());

        let q = div(&Array::scalar(1.0), &Array::scalar(0.0)).unwrap();
        assert_eq!(q.item().unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_device_checks() {
        let cpu = Array::ones(2).unwrap();
        let gpu = Array::ones(2).unwrap().with_device(Device::Cuda);
        assert!(matches!(
            add(&cpu, &gpu).unwrap_err(),
            Error::DeviceMismatch { .. }
        ));
        assert!(matches!(
            exp(&gpu).unwrap_err(),
            Error::UnsupportedDevice { .. }
        ));
    }

    #[test]
    fn test_parallel_path_matches_serial() {
        let a = Array::from_vec((0..64).map(|v| v as f64).collect(), (8, 8)).unwrap();
        let b = Array::from_vec((0..8).map(|v| v as f64 * 0.5).collect(), 8).unwrap();
        let run = || -> Result<Vec<Array>> {
            Ok(vec![add(&a, &b)?, mul(&a, &a)?, sqrt(&a)?])
        };

        let serial = with_kernel_config(KernelConfig::default().with_parallel(false), run).unwrap();
        let parallel =
            with_kernel_config(KernelConfig::default().with_parallel_threshold(1), run).unwrap();
        assert_eq!(serial, parallel);
    }
}
