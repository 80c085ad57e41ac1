//! The provider seam between a mesh hierarchy and the networks that consume it.
//!
//! Levels are indexed from the finest (template) mesh at level 0 towards
//! progressively coarser meshes. Operators only connect adjacent levels;
//! multi-level hops are compositions of single steps.

use crate::error::{HierarchyError, Result};
use crate::sparse::SparseMatrix;
use crate::types::{points_to_rows, rows_to_points, Point3};

/// Read-only access to a precomputed multi-resolution mesh hierarchy.
///
/// Implementors supply per-level adjacency, the template vertices and the
/// single-step resampling operators. Everything else has a default
/// implementation in terms of those.
pub trait HierarchyProvider {
    /// Number of resolution levels.
    fn num_levels(&self) -> usize;

    /// Normalised adjacency (with self loops) at `level`, `n x n`.
    fn adjacency(&self, level: usize) -> Result<&SparseMatrix>;

    /// Operator mapping level `level` to `level + 1`, shape `(n_{level+1}, n_level)`.
    fn downsample_operator(&self, level: usize) -> Result<&SparseMatrix>;

    /// Operator mapping level `level + 1` back to `level`, shape `(n_level, n_{level+1})`.
    fn upsample_operator(&self, level: usize) -> Result<&SparseMatrix>;

    /// Template vertex positions at level 0.
    fn template_vertices(&self) -> &[Point3];

    /// Vertex count at `level`.
    fn num_vertices(&self, level: usize) -> Result<usize> {
        Ok(self.adjacency(level)?.rows())
    }

    /// Check that `level` exists.
    fn check_level(&self, level: usize) -> Result<()> {
        let num_levels = self.num_levels();
        if level >= num_levels {
            return Err(HierarchyError::LevelOutOfRange { level, num_levels });
        }
        Ok(())
    }

    /// Template vertices resampled down to `level`.
    fn reference_vertices(&self, level: usize) -> Result<Vec<Point3>> {
        let rows = points_to_rows(self.template_vertices());
        let rows = self.downsample(&rows, 3, 0, level)?;
        Ok(rows_to_points(&rows))
    }

    /// Resample a row-major `n_from x width` block from level `from` down to `to`.
    ///
    /// `from == to` returns the block unchanged.
    fn downsample(&self, features: &[f32], width: usize, from: usize, to: usize) -> Result<Vec<f32>> {
        self.check_level(from)?;
        self.check_level(to)?;
        if to < from {
            return Err(HierarchyError::invalid(format!(
                "downsample must go to a coarser level, got {from} -> {to}"
            )));
        }

        let mut x = features.to_vec();
        for level in from..to {
            x = self.downsample_operator(level)?.mul_dense(&x, width)?;
        }
        Ok(x)
    }

    /// Resample a row-major `n_from x width` block from level `from` up to `to`.
    fn upsample(&self, features: &[f32], width: usize, from: usize, to: usize) -> Result<Vec<f32>> {
        self.check_level(from)?;
        self.check_level(to)?;
        if to > from {
            return Err(HierarchyError::invalid(format!(
                "upsample must go to a finer level, got {from} -> {to}"
            )));
        }

        let mut x = features.to_vec();
        for level in (to..from).rev() {
            x = self.upsample_operator(level)?.mul_dense(&x, width)?;
        }
        Ok(x)
    }
}
