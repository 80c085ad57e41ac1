//! Sparse matrices for adjacency and resampling operators.
//!
//! Storage is a compressed sparse row matrix from `nalgebra_sparse`. Feature
//! blocks passed to [`SparseMatrix::mul_dense`] are row-major with one row
//! per vertex, i.e. `vertices x width`.

use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};

use crate::error::{HierarchyError, Result};

/// A sparse `rows x cols` matrix in CSR format.
///
/// Serialized as coordinate triplets; deserialization rejects out-of-bounds
/// or ragged triplet arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Triplets", into = "Triplets")]
pub struct SparseMatrix {
    matrix: CsrMatrix<f32>,
}

/// On-disk form of a [`SparseMatrix`].
#[derive(Serialize, Deserialize)]
struct Triplets {
    rows: usize,
    cols: usize,
    row_indices: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f32>,
}

impl TryFrom<Triplets> for SparseMatrix {
    type Error = HierarchyError;

    fn try_from(t: Triplets) -> Result<Self> {
        let coo =
            CooMatrix::try_from_triplets(t.rows, t.cols, t.row_indices, t.col_indices, t.values)?;
        Ok(Self::from_coo(&coo))
    }
}

impl From<SparseMatrix> for Triplets {
    fn from(m: SparseMatrix) -> Self {
        let (row_indices, (col_indices, values)) = m.iter().map(|(r, c, v)| (r, (c, v))).unzip();
        Self {
            rows: m.rows(),
            cols: m.cols(),
            row_indices,
            col_indices,
            values,
        }
    }
}

impl PartialEq for SparseMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.iter().eq(other.iter())
    }
}

impl SparseMatrix {
    /// Build a matrix from `(row, col, value)` triplets.
    ///
    /// Duplicate coordinates are summed.
    pub fn new(rows: usize, cols: usize, triplets: &[(usize, usize, f32)]) -> Result<Self> {
        let coo = CooMatrix::try_from_triplets(
            rows,
            cols,
            triplets.iter().map(|&(r, _, _)| r).collect(),
            triplets.iter().map(|&(_, c, _)| c).collect(),
            triplets.iter().map(|&(_, _, v)| v).collect(),
        )?;
        Ok(Self::from_coo(&coo))
    }

    /// The `n x n` identity.
    pub fn identity(n: usize) -> Self {
        Self {
            matrix: CsrMatrix::identity(n),
        }
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.matrix.ncols()
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Iterate over stored `(row, col, value)` triplets in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        self.matrix.triplet_iter().map(|(r, c, &v)| (r, c, v))
    }

    /// The transposed matrix.
    pub fn transpose(&self) -> Self {
        Self {
            matrix: self.matrix.transpose(),
        }
    }

    /// Replace the diagonal with ones.
    pub fn with_self_loops(&self) -> Result<Self> {
        self.require_square("self loops")?;

        let n = self.rows();
        let mut coo = CooMatrix::new(n, n);
        for (r, c, v) in self.iter().filter(|&(r, c, _)| r != c) {
            coo.push(r, c, v);
        }
        for i in 0..n {
            coo.push(i, i, 1.0);
        }
        Ok(Self::from_coo(&coo))
    }

    /// Scale every row to sum to one. Rows summing to zero are left untouched.
    pub fn row_normalized(&self) -> Self {
        let mut matrix = self.matrix.clone();
        for mut row in matrix.row_iter_mut() {
            let sum: f32 = row.values_mut().iter().sum();
            if sum != 0.0 {
                row.values_mut().iter_mut().for_each(|v| *v /= sum);
            }
        }
        Self { matrix }
    }

    /// Apply the matrix to a row-major `cols x width` feature block.
    ///
    /// Returns a row-major `rows x width` block.
    pub fn mul_dense(&self, features: &[f32], width: usize) -> Result<Vec<f32>> {
        if features.len() != self.cols() * width {
            let got_rows = if width == 0 { 0 } else { features.len() / width };
            return Err(HierarchyError::shape(
                "feature block",
                (self.cols(), width),
                (got_rows, width),
            ));
        }

        let x = DMatrix::from_row_slice(self.cols(), width, features);
        let y: DMatrix<f32> = &self.matrix * &x;
        Ok(row_major(&y))
    }

    /// Densify into a row-major `rows x cols` buffer.
    pub fn to_dense(&self) -> Vec<f32> {
        row_major(&DMatrix::from(&self.matrix))
    }

    /// Unweighted, undirected vertex adjacency of a triangle mesh.
    ///
    /// Each edge appears once per direction with value 1 regardless of how many
    /// faces share it. The diagonal is empty.
    pub fn adjacency_from_faces(faces: &[[usize; 3]], num_vertices: usize) -> Result<Self> {
        let mut coo = CooMatrix::new(num_vertices, num_vertices);
        for face in faces {
            for k in 0..3 {
                let (a, b) = (face[k], face[(k + 1) % 3]);
                if a >= num_vertices || b >= num_vertices {
                    return Err(HierarchyError::IndexOutOfBounds {
                        row: a,
                        col: b,
                        rows: num_vertices,
                        cols: num_vertices,
                    });
                }
                if a != b {
                    coo.push(a, b, 1.0);
                    coo.push(b, a, 1.0);
                }
            }
        }

        Ok(Self::from_coo(&coo).with_unit_values())
    }

    /// Adjacency of a closed ring of `n` vertices (no diagonal).
    pub fn ring_adjacency(n: usize) -> Self {
        let mut coo = CooMatrix::new(n, n);
        if n > 1 {
            for i in 0..n {
                let next = (i + 1) % n;
                coo.push(i, next, 1.0);
                coo.push(next, i, 1.0);
            }
        }
        Self::from_coo(&coo).with_unit_values()
    }

    /// Fine-to-coarse operator averaging contiguous runs of fine vertices.
    ///
    /// Fine vertex `i` contributes to coarse vertex `i * coarse / fine`.
    pub fn average_pooling(fine: usize, coarse: usize) -> Result<Self> {
        if coarse == 0 || coarse > fine {
            return Err(HierarchyError::invalid(format!(
                "cannot pool {fine} vertices into {coarse}"
            )));
        }

        let triplets: Vec<(usize, usize, f32)> =
            (0..fine).map(|i| (i * coarse / fine, i, 1.0)).collect();
        Ok(Self::new(coarse, fine, &triplets)?.row_normalized())
    }

    /// Coarse-to-fine operator copying each coarse value to the fine vertices it pooled.
    pub fn nearest_unpooling(coarse: usize, fine: usize) -> Result<Self> {
        if coarse == 0 || coarse > fine {
            return Err(HierarchyError::invalid(format!(
                "cannot unpool {coarse} vertices into {fine}"
            )));
        }

        let triplets: Vec<(usize, usize, f32)> =
            (0..fine).map(|i| (i, i * coarse / fine, 1.0)).collect();
        Self::new(fine, coarse, &triplets)
    }

    /// Duplicate coordinates are summed by the conversion.
    fn from_coo(coo: &CooMatrix<f32>) -> Self {
        Self {
            matrix: CsrMatrix::from(coo),
        }
    }

    fn with_unit_values(mut self) -> Self {
        self.matrix.values_mut().fill(1.0);
        self
    }

    fn require_square(&self, what: &str) -> Result<()> {
        if self.rows() != self.cols() {
            return Err(HierarchyError::shape(
                what,
                (self.rows(), self.rows()),
                self.shape(),
            ));
        }
        Ok(())
    }
}

/// Column-major nalgebra storage to a row-major buffer.
fn row_major(m: &DMatrix<f32>) -> Vec<f32> {
    m.transpose().as_slice().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::SparseFormatErrorKind;

    fn row_sums(m: &SparseMatrix) -> Vec<f32> {
        let mut sums = vec![0.0; m.rows()];
        for (r, _, v) in m.iter() {
            sums[r] += v;
        }
        sums
    }

    #[test]
    fn test_new_rejects_out_of_bounds() {
        let err = SparseMatrix::new(2, 2, &[(0, 0, 1.0), (2, 1, 1.0)]).unwrap_err();
        match err {
            HierarchyError::Format(e) => {
                assert_eq!(e.kind(), &SparseFormatErrorKind::IndexOutOfBounds)
            }
            other => panic!("expected a format error, got {other:?}"),
        }
    }

    #[test]
    fn test_deserialize_rejects_bad_triplets() {
        let ragged = r#"{"rows":2,"cols":2,"row_indices":[0,1],"col_indices":[0],"values":[1.0,1.0]}"#;
        assert!(serde_json::from_str::<SparseMatrix>(ragged).is_err());

        let outside = r#"{"rows":2,"cols":2,"row_indices":[0,5],"col_indices":[0,0],"values":[1.0,1.0]}"#;
        assert!(serde_json::from_str::<SparseMatrix>(outside).is_err());
    }

    #[test]
    fn test_serde_keeps_triplet_layout() {
        let m = SparseMatrix::new(2, 3, &[(1, 0, -1.0), (0, 2, 5.0)]).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(
            json,
            r#"{"rows":2,"cols":3,"row_indices":[0,1],"col_indices":[2,0],"values":[5.0,-1.0]}"#
        );

        let back: SparseMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_transpose_and_dense() {
        let m = SparseMatrix::new(2, 3, &[(0, 2, 5.0), (1, 0, -1.0)]).unwrap();
        let t = m.transpose();

        assert_eq!(t.shape(), (3, 2));
        assert_eq!(m.to_dense(), vec![0.0, 0.0, 5.0, -1.0, 0.0, 0.0]);
        assert_eq!(t.to_dense(), vec![0.0, -1.0, 0.0, 0.0, 5.0, 0.0]);
    }

    #[test]
    fn test_new_sums_duplicates() {
        let m = SparseMatrix::new(1, 2, &[(0, 1, 1.0), (0, 1, 2.0), (0, 0, 1.0)]).unwrap();

        assert_eq!(m.nnz(), 2);
        assert_eq!(m.to_dense(), vec![1.0, 3.0]);
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![(0, 0, 1.0), (0, 1, 3.0)]);
    }

    #[test]
    fn test_self_loops_replace_diagonal() {
        let m = SparseMatrix::new(2, 2, &[(0, 0, 4.0), (0, 1, 1.0)]).unwrap();
        let looped = m.with_self_loops().unwrap();
        assert_eq!(looped.to_dense(), vec![1.0, 1.0, 0.0, 1.0]);

        let rect = SparseMatrix::new(2, 3, &[]).unwrap();
        assert!(rect.with_self_loops().is_err());
    }

    #[test]
    fn test_row_normalized_rows_sum_to_one() {
        let adj = SparseMatrix::ring_adjacency(5)
            .with_self_loops()
            .unwrap()
            .row_normalized();

        for sum in row_sums(&adj) {
            assert!((sum - 1.0).abs() < 1e-6);
        }

        // Empty rows stay empty instead of dividing by zero.
        let sparse = SparseMatrix::new(2, 2, &[(0, 1, 2.0)]).unwrap().row_normalized();
        assert_eq!(row_sums(&sparse), vec![1.0, 0.0]);
    }

    #[test]
    fn test_mul_dense_matches_dense_product() {
        let m = SparseMatrix::new(2, 3, &[(0, 0, 1.0), (0, 2, 2.0), (1, 1, -1.0)]).unwrap();
        // 3 x 2 feature block
        let features = [1.0, 10.0, 2.0, 20.0, 3.0, 30.0];
        let out = m.mul_dense(&features, 2).unwrap();

        assert_eq!(out, vec![7.0, 70.0, -2.0, -20.0]);
        assert!(m.mul_dense(&features[..4], 2).is_err());
    }

    #[test]
    fn test_adjacency_from_faces() {
        // Two triangles sharing edge 1-2.
        let faces = [[0, 1, 2], [1, 3, 2]];
        let adj = SparseMatrix::adjacency_from_faces(&faces, 4).unwrap();

        assert_eq!(adj.nnz(), 10);
        let dense = adj.to_dense();
        let at = |r: usize, c: usize| dense[r * 4 + c];
        assert_eq!(at(1, 2), 1.0);
        assert_eq!(at(2, 1), 1.0);
        assert_eq!(at(0, 3), 0.0);
        assert_eq!(adj, adj.transpose());

        assert!(SparseMatrix::adjacency_from_faces(&[[0, 1, 9]], 4).is_err());
    }

    #[test]
    fn test_ring_adjacency_degenerate_sizes() {
        assert_eq!(SparseMatrix::ring_adjacency(1).nnz(), 0);
        // Both neighbours of a 2-ring are the same vertex.
        assert_eq!(SparseMatrix::ring_adjacency(2).nnz(), 2);
        assert_eq!(SparseMatrix::ring_adjacency(6).nnz(), 12);
    }

    #[test]
    fn test_pooling_operators() {
        let down = SparseMatrix::average_pooling(6, 3).unwrap();
        let up = SparseMatrix::nearest_unpooling(3, 6).unwrap();

        assert_eq!(down.shape(), (3, 6));
        assert_eq!(up.shape(), (6, 3));

        let fine = [1.0, 3.0, 5.0, 7.0, 9.0, 11.0];
        let coarse = down.mul_dense(&fine, 1).unwrap();
        assert_eq!(coarse, vec![2.0, 6.0, 10.0]);

        // Resampling is lossy: down then up does not restore the input.
        let restored = up.mul_dense(&coarse, 1).unwrap();
        assert_eq!(restored, vec![2.0, 2.0, 6.0, 6.0, 10.0, 10.0]);

        assert!(SparseMatrix::average_pooling(3, 6).is_err());
        assert!(SparseMatrix::nearest_unpooling(0, 6).is_err());
    }
}
