//! Sparse operators held on device as coordinate triplets.

use burn::module::Module;
use burn::prelude::*;
use burn::tensor::IndexingUpdateOp;

use contact_mesh::SparseMatrix;

/// A fixed sparse `rows x cols` operator acting on the vertex axis.
///
/// Applying it gathers the input at every stored column, scales by the stored
/// value and scatter-adds into the stored row, so cost scales with the number
/// of stored entries rather than `rows * cols`.
#[derive(Module, Debug)]
pub struct SparseOperator<B: Backend> {
    /// Row of each stored entry, `[nnz]`.
    rows: Tensor<B, 1, Int>,
    /// Column of each stored entry, `[nnz]`.
    cols: Tensor<B, 1, Int>,
    /// Stored values, `[nnz]`.
    values: Tensor<B, 1>,
    num_rows: usize,
    num_cols: usize,
}

impl<B: Backend> SparseOperator<B> {
    /// Upload the triplets of `matrix` to `device`.
    pub fn from_matrix(matrix: &SparseMatrix, device: &B::Device) -> Self {
        let (num_rows, num_cols) = matrix.shape();
        let nnz = matrix.nnz();

        let mut rows = Vec::with_capacity(nnz);
        let mut cols = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        for (r, c, v) in matrix.iter() {
            rows.push(r as i64);
            cols.push(c as i64);
            values.push(v);
        }

        Self {
            rows: Tensor::from_data(TensorData::new(rows, [nnz]), device),
            cols: Tensor::from_data(TensorData::new(cols, [nnz]), device),
            values: Tensor::from_data(TensorData::new(values, [nnz]), device),
            num_rows,
            num_cols,
        }
    }

    /// The `n x n` identity.
    pub fn identity(n: usize, device: &B::Device) -> Self {
        Self::from_matrix(&SparseMatrix::identity(n), device)
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows, self.num_cols)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.dims()[0]
    }

    /// Apply the operator along the last axis.
    ///
    /// Input shape: [batch, channels, cols]
    /// Output shape: [batch, channels, rows]
    pub fn apply(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, channels, _] = x.dims();
        let output = Tensor::zeros([batch, channels, self.num_rows], &x.device());

        let nnz = self.nnz();
        if nnz == 0 {
            return output;
        }

        let weighted = x.select(2, self.cols.clone()) * self.values.clone().reshape([1, 1, nnz]);
        output.select_assign(2, self.rows.clone(), weighted, IndexingUpdateOp::Add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn dense_apply(matrix: &SparseMatrix, x: &[f32], channels: usize) -> Vec<f32> {
        let (rows, cols) = matrix.shape();
        let dense = matrix.to_dense();
        let mut out = vec![0.0; channels * rows];
        for c in 0..channels {
            for r in 0..rows {
                out[c * rows + r] = (0..cols)
                    .map(|k| dense[r * cols + k] * x[c * cols + k])
                    .sum();
            }
        }
        out
    }

    #[test]
    fn test_apply_matches_dense_product() {
        let device = Default::default();
        let matrix = SparseMatrix::new(
            3,
            4,
            &[(0, 0, 2.0), (0, 3, -1.0), (2, 1, 0.5), (2, 2, 4.0), (2, 3, 1.0)],
        )
        .unwrap();
        let op = SparseOperator::<TestBackend>::from_matrix(&matrix, &device);
        assert_eq!(op.shape(), (3, 4));
        assert_eq!(op.nnz(), 5);

        let x: Vec<f32> = (0..8).map(|i| i as f32 - 3.0).collect();
        let input = Tensor::<TestBackend, 3>::from_data(TensorData::new(x.clone(), [1, 2, 4]), &device);
        let y: Vec<f32> = op.apply(input).into_data().to_vec().unwrap();

        let expected = dense_apply(&matrix, &x, 2);
        assert_eq!(y.len(), expected.len());
        for (got, want) in y.iter().zip(&expected) {
            assert!((got - want).abs() < 1e-5, "{got} vs {want}");
        }
        // Row 1 has no entries.
        assert_eq!(y[1], 0.0);
    }

    #[test]
    fn test_apply_accumulates_rows() {
        let device = Default::default();
        let matrix = SparseMatrix::ring_adjacency(4);
        let op = SparseOperator::<TestBackend>::from_matrix(&matrix, &device);

        let input = Tensor::<TestBackend, 3>::ones([2, 3, 4], &device);
        let y: Vec<f32> = op.apply(input).into_data().to_vec().unwrap();

        // Every ring vertex has two neighbours.
        assert!(y.iter().all(|&v| (v - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_empty_operator() {
        let device = Default::default();
        let op = SparseOperator::<TestBackend>::from_matrix(&SparseMatrix::ring_adjacency(1), &device);
        assert_eq!(op.nnz(), 0);

        let y = op.apply(Tensor::ones([2, 3, 1], &device));
        assert_eq!(y.dims(), [2, 3, 1]);
        let total: f32 = y.sum().into_scalar();
        assert_eq!(total, 0.0);
    }
}
