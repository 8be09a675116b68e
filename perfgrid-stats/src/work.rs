// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Per-element work model of the benchmark kernels.
//!
//! | kernel     | FLOPs | reads | writes |
//! |------------|-------|-------|--------|
//! | `saxpy`    | 2     | 2     | 1      |
//! | `dot`      | 2     | 2     | 0      |
//! | `ewmul`    | 1     | 2     | 1      |
//! | `stencil3` | 5     | 2     | 1      |
//! | other      | 1     | 2     | 1      |

use log::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    F32,
    F64,
}

impl DataType {
    /// Anything other than `f32` is treated as an 8-byte type.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("f32") {
            DataType::F32
        } else {
            DataType::F64
        }
    }

    #[must_use]
    pub fn size_bytes(self) -> u64 {
        match self {
            DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelModel {
    pub flops_per_element: f64,
    pub reads: u32,
    pub writes: u32,
}

impl Default for KernelModel {
    fn default() -> Self {
        Self {
            flops_per_element: 1.0,
            reads: 2,
            writes: 1,
        }
    }
}

impl KernelModel {
    #[must_use]
    pub fn for_kernel(kernel: &str) -> Self {
        let (flops_per_element, reads, writes) = match kernel.trim().to_lowercase().as_str() {
            "saxpy" => (2.0, 2, 1),
            "dot" => (2.0, 2, 0),
            "ewmul" => (1.0, 2, 1),
            "stencil3" => (5.0, 2, 1),
            other => {
                debug!("no work model for kernel '{other}', using the default");
                return Self::default();
            }
        };
        Self {
            flops_per_element,
            reads,
            writes,
        }
    }

    /// Work for `n` elements in GFLOP.
    #[must_use]
    pub fn work_gflop(&self, n: f64) -> f64 {
        self.flops_per_element * n / 1e9
    }

    #[must_use]
    pub fn bytes_per_element(&self, dtype: DataType) -> u64 {
        dtype.size_bytes() * u64::from(self.reads + self.writes)
    }

    /// Arithmetic intensity in FLOPs per byte.
    #[must_use]
    pub fn intensity(&self, dtype: DataType) -> f64 {
        self.flops_per_element / self.bytes_per_element(dtype) as f64
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn known_kernels() {
        let saxpy = KernelModel::for_kernel("SAXPY");
        assert_eq!(saxpy.bytes_per_element(DataType::F32), 12);
        assert_relative_eq!(saxpy.intensity(DataType::F32), 2.0 / 12.0);

        let dot = KernelModel::for_kernel("dot");
        assert_eq!(dot.bytes_per_element(DataType::F64), 16);
        assert_relative_eq!(dot.intensity(DataType::F64), 0.125);

        assert_eq!(KernelModel::for_kernel("stencil3").flops_per_element, 5.0);
        assert_eq!(KernelModel::for_kernel("gemm"), KernelModel::default());
    }

    #[test]
    fn work_in_gflop() {
        let saxpy = KernelModel::for_kernel("saxpy");
        assert_relative_eq!(saxpy.work_gflop(1e6), 2e-3);
    }

    #[test]
    fn dtype_names() {
        assert_eq!(DataType::from_name(" F32 "), DataType::F32);
        assert_eq!(DataType::from_name("f64"), DataType::F64);
        assert_eq!(DataType::from_name("bf16"), DataType::F64);
    }
}
