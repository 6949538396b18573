use rayon::prelude::*;

use super::{check_device, check_devices, parallel_for};
use crate::array::Array;
use crate::error::{Error, Result};
use crate::shape::Shape;

fn require_rank(op: &'static str, a: &Array, expected: usize) -> Result<()> {
    if a.rank() != expected {
        return Err(Error::RankMismatch {
            op,
            expected,
            got: a.shape().clone(),
        });
    }
    Ok(())
}

/// Matrix product of `[m, k] @ [k, n] → [m, n]`.
///
/// Output rows are independent, so each row is computed by its own rayon task
/// once `m * n * k` reaches the parallel threshold. The inner loop runs over
/// `k` then `n` so both `b` and the output row are walked contiguously.
pub fn matmul(a: &Array, b: &Array) -> Result<Array> {
    let device = check_devices("matmul", a, b)?;
    require_rank("matmul", a, 2)?;
    require_rank("matmul", b, 2)?;
    let (m, k) = (a.dims()[0], a.dims()[1]);
    let (k2, n) = (b.dims()[0], b.dims()[1]);
    if k != k2 {
        return Err(Error::MatmulShapeMismatch { m, k1: k, k2, n });
    }

    let (ad, bd) = (a.data(), b.data());
    let fill_row = |(i, row): (usize, &mut [f64])| {
        let a_row = &ad[i * k..(i + 1) * k];
        for (p, &aip) in a_row.iter().enumerate() {
            let b_row = &bd[p * n..(p + 1) * n];
            for (o, &bpj) in row.iter_mut().zip(b_row) {
                *o += aip * bpj;
            }
        }
    };

    let mut out = vec![0.0; m * n];
    if parallel_for(m * n * k) {
        out.par_chunks_mut(n).enumerate().for_each(fill_row);
    } else {
        out.chunks_mut(n).enumerate().for_each(fill_row);
    }
    Ok(Array::from_parts(Shape::from((m, n)), out, device))
}

/// Inner product of two equal-length vectors, as a rank-0 array.
pub fn dot(a: &Array, b: &Array) -> Result<Array> {
    let device = check_devices("dot", a, b)?;
    require_rank("dot", a, 1)?;
    require_rank("dot", b, 1)?;
    if a.size() != b.size() {
        return Err(Error::DotLengthMismatch {
            lhs: a.size(),
            rhs: b.size(),
        });
    }
    let total: f64 = if parallel_for(a.size()) {
        a.data()
            .par_iter()
            .zip(b.data().par_iter())
            .map(|(x, y)| x * y)
            .sum()
    } else {
        a.data().iter().zip(b.data()).map(|(x, y)| x * y).sum()
    };
    Ok(Array::scalar(total).with_device(device))
}

/// Cross product of two 3-vectors.
pub fn cross(a: &Array, b: &Array) -> Result<Array> {
    let device = check_devices("cross", a, b)?;
    for v in [a, b] {
        if v.dims() != [3] {
            return Err(Error::NotVec3 {
                op: "cross",
                got: v.shape().clone(),
            });
        }
    }
    let (u, v) = (a.data(), b.data());
    let out = vec![
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ];
    Ok(Array::from_parts(Shape::from(3), out, device))
}

/// Materialized transpose of a 2-D array.
pub fn transpose(a: &Array) -> Result<Array> {
    let device = check_device("transpose", a)?;
    require_rank("transpose", a, 2)?;
    let view = a.layout().transpose(0, 1)?;
    let data = a.data();
    let out: Vec<f64> = view.strided_indices().map(|off| data[off]).collect();
    Ok(Array::from_parts(view.shape().clone(), out, device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::testing::with_kernel_config;
    use crate::config::KernelConfig;

    fn serial_and_parallel<T>(f: impl Fn() -> T) -> (T, T) {
        let serial = with_kernel_config(KernelConfig::default().with_parallel(false), &f);
        let parallel = with_kernel_config(KernelConfig::default().with_parallel_threshold(1), &f);
        (serial, parallel)
    }

    #[test]
    fn test_matmul_2x2() {
        let a = Array::from_nested([[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let b = Array::from_nested([[5.0, 6.0], [7.0, 8.0]]).unwrap();
        let c = matmul(&a, &b).unwrap();
        assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matmul_rectangular() {
        // [2,3] @ [3,1]
        let a = Array::from_nested([[1.0, 0.0, 2.0], [0.0, 1.0, 3.0]]).unwrap();
        let b = Array::from_nested([[1.0], [2.0], [3.0]]).unwrap();
        let c = matmul(&a, &b).unwrap();
        assert_eq!(c.dims(), &[2, 1]);
        assert_eq!(c.data(), &[7.0, 11.0]);
    }

    #[test]
    fn test_matmul_shape_errors() {
        let a = Array::ones((2, 3)).unwrap();
        let b = Array::ones((2, 3)).unwrap();
        assert!(matches!(
            matmul(&a, &b).unwrap_err(),
            Error::MatmulShapeMismatch { k1: 3, k2: 2, .. }
        ));
        let v = Array::ones(3).unwrap();
        assert!(matches!(
            matmul(&a, &v).unwrap_err(),
            Error::RankMismatch { op: "matmul", .. }
        ));
    }

    #[test]
    fn test_dot() {
        let a = Array::from_nested([1.0, 2.0, 3.0]).unwrap();
        let b = Array::from_nested([4.0, 5.0, 6.0]).unwrap();
        let d = dot(&a, &b).unwrap();
        assert_eq!(d.rank(), 0);
        assert_eq!(d.item().unwrap(), 32.0);

        let short = Array::ones(2).unwrap();
        assert!(matches!(
            dot(&a, &short).unwrap_err(),
            Error::DotLengthMismatch { lhs: 3, rhs: 2 }
        ));
    }

    #[test]
    fn test_cross() {
        let x = Array::from_nested([1.0, 0.0, 0.0]).unwrap();
        let y = Array::from_nested([0.0, 1.0, 0.0]).unwrap();
        assert_eq!(cross(&x, &y).unwrap().data(), &[0.0, 0.0, 1.0]);
        assert_eq!(cross(&y, &x).unwrap().data(), &[0.0, 0.0, -1.0]);

        let bad = Array::ones(4).unwrap();
        assert!(matches!(
            cross(&x, &bad).unwrap_err(),
            Error::NotVec3 { .. }
        ));
    }

    #[test]
    fn test_transpose() {
        let a = Array::from_nested([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        let t = transpose(&a).unwrap();
        assert_eq!(t.dims(), &[3, 2]);
        assert_eq!(t.strides(), &[2, 1]);
        assert_eq!(t.data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_parallel_matmul_matches_serial() {
        // [7, 5] @ [5, 3]: rows go to separate rayon tasks
        let a = Array::from_vec((0..35).map(|v| v as f64 - 17.0).collect(), (7, 5)).unwrap();
        let b = Array::from_vec((0..15).map(|v| (v % 4) as f64).collect(), (5, 3)).unwrap();
        let (serial, parallel) = serial_and_parallel(|| matmul(&a, &b).unwrap());
        assert_eq!(serial.dims(), &[7, 3]);
        assert_eq!(serial, parallel);
        // row 0 of a is -17..-13, column 0 of b is 0, 3, 2, 1, 0
        assert_eq!(serial.get(&[0, 0]), Some(-17.0 * 0.0 - 16.0 * 3.0 - 15.0 * 2.0 - 14.0));
    }

    #[test]
    fn test_parallel_dot_matches_serial() {
        let a = Array::from_vec((0..50).map(|v| v as f64).collect(), 50).unwrap();
        let b = Array::ones(50).unwrap();
        let (serial, parallel) = serial_and_parallel(|| dot(&a, &b).unwrap());
        assert_eq!(serial.item().unwrap(), 1225.0);
        assert_eq!(serial, parallel);
    }
}
