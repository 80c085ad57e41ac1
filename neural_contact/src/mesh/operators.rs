//! On-device copies of a hierarchy's active levels.

use burn::module::Module;
use burn::prelude::*;

use contact_mesh::{HierarchyError, HierarchyProvider};

use super::SparseOperator;
use crate::error::Result;

/// Adjacency and resampling operators for levels
/// `base_level..=base_level + depth`, stored as sparse triplets.
#[derive(Module, Debug)]
pub struct MeshOperators<B: Backend> {
    /// One adjacency per active level, `n_l x n_l`.
    adjacency: Vec<SparseOperator<B>>,
    /// `D_l`, `n_{l+1} x n_l`.
    downsample: Vec<SparseOperator<B>>,
    /// `U_l`, `n_l x n_{l+1}`.
    upsample: Vec<SparseOperator<B>>,
    /// Template vertices at the base level, `[3, n_base]`.
    reference_vertices: Tensor<B, 2>,
    base_level: usize,
}

impl<B: Backend> MeshOperators<B> {
    /// Upload levels `base_level..=base_level + depth` of `hierarchy`.
    pub fn new<H: HierarchyProvider>(
        hierarchy: &H,
        base_level: usize,
        depth: usize,
        device: &B::Device,
    ) -> Result<Self> {
        let top = base_level + depth;
        hierarchy.check_level(top)?;

        let mut adjacency = Vec::with_capacity(depth + 1);
        let mut downsample = Vec::with_capacity(depth);
        let mut upsample = Vec::with_capacity(depth);

        for level in base_level..=top {
            adjacency.push(SparseOperator::from_matrix(hierarchy.adjacency(level)?, device));
        }
        for level in base_level..top {
            downsample.push(SparseOperator::from_matrix(
                hierarchy.downsample_operator(level)?,
                device,
            ));
            upsample.push(SparseOperator::from_matrix(
                hierarchy.upsample_operator(level)?,
                device,
            ));
        }

        let vertices = hierarchy.reference_vertices(base_level)?;
        let num_vertices = vertices.len();
        // Channel-major: all x, then all y, then all z.
        let coords: Vec<f32> = (0..3)
            .flat_map(|axis| vertices.iter().map(move |v| v.as_array()[axis]))
            .collect();
        let reference_vertices =
            Tensor::from_data(TensorData::new(coords, [3, num_vertices]), device);

        Ok(Self {
            adjacency,
            downsample,
            upsample,
            reference_vertices,
            base_level,
        })
    }

    /// First (finest) active hierarchy level.
    pub fn base_level(&self) -> usize {
        self.base_level
    }

    /// Number of downsampling steps between the first and last active level.
    pub fn depth(&self) -> usize {
        self.downsample.len()
    }

    /// Vertex count at the base level.
    pub fn base_vertices(&self) -> usize {
        self.reference_vertices.dims()[1]
    }

    /// Vertex count at active stage `stage`, i.e. hierarchy level `base_level + stage`.
    pub fn num_vertices(&self, stage: usize) -> Option<usize> {
        self.adjacency.get(stage).map(|a| a.shape().0)
    }

    /// Adjacency at active stage `stage`.
    pub fn adjacency(&self, stage: usize) -> Option<&SparseOperator<B>> {
        self.adjacency.get(stage)
    }

    /// Adjacency at active stage `stage`, or an error naming the missing level.
    pub(crate) fn require_adjacency(&self, stage: usize) -> Result<SparseOperator<B>> {
        self.adjacency(stage).cloned().ok_or_else(|| {
            HierarchyError::LevelOutOfRange {
                level: self.base_level + stage,
                num_levels: self.base_level + self.adjacency.len(),
            }
            .into()
        })
    }

    /// Template vertices tiled over the batch, `[batch, 3, n_base]`.
    pub fn reference_vertices(&self, batch: usize) -> Tensor<B, 3> {
        self.reference_vertices
            .clone()
            .unsqueeze::<3>()
            .repeat_dim(0, batch)
    }

    /// Resample from hierarchy level `from` down to `to`, one step at a time.
    pub fn downsample(&self, x: Tensor<B, 3>, from: usize, to: usize) -> Result<Tensor<B, 3>> {
        let (from_stage, to_stage) = (self.stage_of(from)?, self.stage_of(to)?);
        if to_stage < from_stage {
            return Err(HierarchyError::invalid(format!(
                "downsample must go to a coarser level, got {from} -> {to}"
            ))
            .into());
        }

        Ok((from_stage..to_stage).fold(x, |x, stage| self.downsample_step(x, stage)))
    }

    /// Resample from hierarchy level `from` up to `to`, one step at a time.
    pub fn upsample(&self, x: Tensor<B, 3>, from: usize, to: usize) -> Result<Tensor<B, 3>> {
        let (from_stage, to_stage) = (self.stage_of(from)?, self.stage_of(to)?);
        if to_stage > from_stage {
            return Err(HierarchyError::invalid(format!(
                "upsample must go to a finer level, got {from} -> {to}"
            ))
            .into());
        }

        Ok((to_stage..from_stage)
            .rev()
            .fold(x, |x, stage| self.upsample_step(x, stage)))
    }

    /// Stage `stage` to `stage + 1`. `stage` must be below [`Self::depth`].
    pub(crate) fn downsample_step(&self, x: Tensor<B, 3>, stage: usize) -> Tensor<B, 3> {
        self.downsample[stage].apply(x)
    }

    /// Stage `stage + 1` to `stage`. `stage` must be below [`Self::depth`].
    pub(crate) fn upsample_step(&self, x: Tensor<B, 3>, stage: usize) -> Tensor<B, 3> {
        self.upsample[stage].apply(x)
    }

    fn stage_of(&self, level: usize) -> Result<usize> {
        let num_levels = self.base_level + self.adjacency.len();
        if level < self.base_level || level >= num_levels {
            return Err(HierarchyError::LevelOutOfRange { level, num_levels }.into());
        }
        Ok(level - self.base_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use contact_mesh::MeshHierarchy;

    use crate::error::NeuralContactError;

    type TestBackend = NdArray;

    fn ramp(batch: usize, channels: usize, n: usize) -> Tensor<TestBackend, 3> {
        let data: Vec<f32> = (0..batch * channels * n).map(|i| (i % n) as f32).collect();
        Tensor::from_data(TensorData::new(data, [batch, channels, n]), &Default::default())
    }

    #[test]
    fn test_active_range() {
        let device = Default::default();
        let hierarchy = MeshHierarchy::ring(&[16, 8, 4, 2]).unwrap();
        let ops = MeshOperators::<TestBackend>::new(&hierarchy, 1, 2, &device).unwrap();

        assert_eq!(ops.base_level(), 1);
        assert_eq!(ops.depth(), 2);
        assert_eq!(ops.num_vertices(0), Some(8));
        assert_eq!(ops.num_vertices(2), Some(2));
        assert_eq!(ops.num_vertices(3), None);
        assert_eq!(ops.adjacency(1).unwrap().shape(), (4, 4));
        assert_eq!(ops.adjacency(1).unwrap().nnz(), 8);
        assert_eq!(ops.reference_vertices(3).dims(), [3, 3, 8]);
    }

    #[test]
    fn test_range_past_hierarchy() {
        let device = Default::default();
        let hierarchy = MeshHierarchy::ring(&[8, 4]).unwrap();
        let err = MeshOperators::<TestBackend>::new(&hierarchy, 1, 1, &device).unwrap_err();

        assert!(matches!(
            err,
            NeuralContactError::Hierarchy(HierarchyError::LevelOutOfRange { level: 2, .. })
        ));
    }

    #[test]
    fn test_resampling_matches_cpu_operators() {
        let device = Default::default();
        let hierarchy = MeshHierarchy::ring(&[8, 4, 2]).unwrap();
        let ops = MeshOperators::<TestBackend>::new(&hierarchy, 0, 2, &device).unwrap();

        let x = ramp(2, 3, 8);
        let coarse = ops.downsample(x, 0, 2).unwrap();
        assert_eq!(coarse.dims(), [2, 3, 2]);

        let values: Vec<f32> = coarse.clone().into_data().to_vec().unwrap();
        let cpu: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let expected = hierarchy.downsample(&cpu, 1, 0, 2).unwrap();
        for row in values.chunks(2) {
            for (got, want) in row.iter().zip(&expected) {
                assert!((got - want).abs() < 1e-5, "{got} vs {want}");
            }
        }

        let fine = ops.upsample(coarse, 2, 0).unwrap();
        assert_eq!(fine.dims(), [2, 3, 8]);
    }

    #[test]
    fn test_resampling_direction_and_range() {
        let device = Default::default();
        let hierarchy = MeshHierarchy::ring(&[8, 4, 2]).unwrap();
        let ops = MeshOperators::<TestBackend>::new(&hierarchy, 0, 1, &device).unwrap();

        assert!(ops.downsample(ramp(1, 1, 4), 1, 0).is_err());
        assert!(ops.upsample(ramp(1, 1, 8), 0, 1).is_err());
        // Level 2 exists in the hierarchy but not in the active range.
        assert!(ops.downsample(ramp(1, 1, 8), 0, 2).is_err());
        assert_eq!(ops.downsample(ramp(1, 1, 8), 0, 0).unwrap().dims(), [1, 1, 8]);
    }

    #[test]
    fn test_reference_vertices_layout() {
        let device = Default::default();
        let hierarchy = MeshHierarchy::ring(&[4, 2]).unwrap();
        let ops = MeshOperators::<TestBackend>::new(&hierarchy, 0, 1, &device).unwrap();

        let tiled: Vec<f32> = ops.reference_vertices(1).into_data().to_vec().unwrap();
        let template = contact_mesh::HierarchyProvider::template_vertices(&hierarchy);

        // Row 0 holds every x, row 2 every z.
        for (i, v) in template.iter().enumerate() {
            assert!((tiled[i] - v.x).abs() < 1e-6);
            assert!((tiled[2 * 4 + i] - v.z).abs() < 1e-6);
        }
    }
}
