//! In-memory mesh hierarchy and its JSON artifact format.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HierarchyError, Result};
use crate::sparse::SparseMatrix;
use crate::traits::HierarchyProvider;
use crate::types::Point3;

/// A precomputed chain of mesh resolutions.
///
/// Level 0 carries the template vertices; each further level is coarser.
/// Adjacency matrices are stored ready to use, i.e. already normalised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshHierarchy {
    template: Vec<Point3>,
    adjacency: Vec<SparseMatrix>,
    downsample: Vec<SparseMatrix>,
    upsample: Vec<SparseMatrix>,
}

impl MeshHierarchy {
    /// Assemble a hierarchy and validate it.
    ///
    /// # Arguments
    /// * `template` - Template vertices at level 0
    /// * `adjacency` - One normalised adjacency per level
    /// * `downsample` - `downsample[i]` maps level `i` to `i + 1`
    /// * `upsample` - `upsample[i]` maps level `i + 1` to `i`
    pub fn new(
        template: Vec<Point3>,
        adjacency: Vec<SparseMatrix>,
        downsample: Vec<SparseMatrix>,
        upsample: Vec<SparseMatrix>,
    ) -> Result<Self> {
        let hierarchy = Self {
            template,
            adjacency,
            downsample,
            upsample,
        };
        hierarchy.validate()?;
        Ok(hierarchy)
    }

    /// Build per-level adjacency from triangle faces, then assemble.
    ///
    /// Each level's adjacency gets self loops and row normalisation.
    pub fn from_level_faces(
        template: Vec<Point3>,
        faces: &[Vec<[usize; 3]>],
        downsample: Vec<SparseMatrix>,
        upsample: Vec<SparseMatrix>,
    ) -> Result<Self> {
        if faces.is_empty() {
            return Err(HierarchyError::invalid("no levels given"));
        }

        // Vertex counts come from the template and the downsample chain.
        let mut counts = vec![template.len()];
        counts.extend(downsample.iter().map(SparseMatrix::rows));
        if counts.len() != faces.len() {
            return Err(HierarchyError::invalid(format!(
                "{} face lists for {} levels",
                faces.len(),
                counts.len()
            )));
        }

        let adjacency = faces
            .iter()
            .zip(&counts)
            .map(|(level_faces, &n)| {
                normalized_adjacency(&SparseMatrix::adjacency_from_faces(level_faces, n)?)
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(template, adjacency, downsample, upsample)
    }

    /// A synthetic hierarchy of concentric rings, coarsened by average pooling.
    ///
    /// Level `i` is a ring of `sizes[i]` vertices on the unit circle in the
    /// `xz` plane. Useful for tests and demos where no decimated mesh is at hand.
    pub fn ring(sizes: &[usize]) -> Result<Self> {
        let Some(&finest) = sizes.first() else {
            return Err(HierarchyError::invalid("no levels given"));
        };
        if sizes.windows(2).any(|w| w[1] > w[0]) || sizes.contains(&0) {
            return Err(HierarchyError::invalid(format!(
                "ring sizes must be positive and non-increasing, got {sizes:?}"
            )));
        }

        let template = (0..finest)
            .map(|i| {
                let theta = i as f32 / finest as f32 * std::f32::consts::TAU;
                Point3::new(theta.cos(), 0.0, theta.sin())
            })
            .collect();

        let adjacency = sizes
            .iter()
            .map(|&n| normalized_adjacency(&SparseMatrix::ring_adjacency(n)))
            .collect::<Result<Vec<_>>>()?;

        let mut downsample = Vec::with_capacity(sizes.len() - 1);
        let mut upsample = Vec::with_capacity(sizes.len() - 1);
        for w in sizes.windows(2) {
            downsample.push(SparseMatrix::average_pooling(w[0], w[1])?);
            upsample.push(SparseMatrix::nearest_unpooling(w[1], w[0])?);
        }

        Self::new(template, adjacency, downsample, upsample)
    }

    /// Check operator counts and shapes against the per-level vertex counts.
    pub fn validate(&self) -> Result<()> {
        let num_levels = self.adjacency.len();
        if num_levels == 0 {
            return Err(HierarchyError::invalid("no levels given"));
        }
        if self.downsample.len() != num_levels - 1 || self.upsample.len() != num_levels - 1 {
            return Err(HierarchyError::invalid(format!(
                "{num_levels} levels need {} operators each way, got {} downsample and {} upsample",
                num_levels - 1,
                self.downsample.len(),
                self.upsample.len()
            )));
        }

        for (level, a) in self.adjacency.iter().enumerate() {
            if a.rows() != a.cols() {
                return Err(HierarchyError::shape(
                    format!("adjacency {level}"),
                    (a.rows(), a.rows()),
                    a.shape(),
                ));
            }
        }

        let n0 = self.adjacency[0].rows();
        if self.template.len() != n0 {
            return Err(HierarchyError::shape(
                "template vertices",
                (n0, 3),
                (self.template.len(), 3),
            ));
        }

        for level in 0..num_levels - 1 {
            let fine = self.adjacency[level].rows();
            let coarse = self.adjacency[level + 1].rows();

            let d = &self.downsample[level];
            if d.shape() != (coarse, fine) {
                return Err(HierarchyError::shape(
                    format!("downsample {level}"),
                    (coarse, fine),
                    d.shape(),
                ));
            }

            let u = &self.upsample[level];
            if u.shape() != (fine, coarse) {
                return Err(HierarchyError::shape(
                    format!("upsample {level}"),
                    (fine, coarse),
                    u.shape(),
                ));
            }
        }

        Ok(())
    }

    /// Vertex count of every level, finest first.
    pub fn level_sizes(&self) -> Vec<usize> {
        self.adjacency.iter().map(SparseMatrix::rows).collect()
    }

    /// Parse and validate a hierarchy from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let hierarchy: Self = serde_json::from_str(json)?;
        hierarchy.validate()?;
        Ok(hierarchy)
    }

    /// Serialize to JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load and validate a hierarchy file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let hierarchy: Self = serde_json::from_reader(reader)?;
        hierarchy.validate()?;

        log::debug!(
            "Loaded mesh hierarchy from {}: level sizes {:?}",
            path.display(),
            hierarchy.level_sizes()
        );
        Ok(hierarchy)
    }

    /// Write the hierarchy as JSON.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }
}

impl HierarchyProvider for MeshHierarchy {
    fn num_levels(&self) -> usize {
        self.adjacency.len()
    }

    fn adjacency(&self, level: usize) -> Result<&SparseMatrix> {
        self.check_level(level)?;
        Ok(&self.adjacency[level])
    }

    fn downsample_operator(&self, level: usize) -> Result<&SparseMatrix> {
        self.downsample.get(level).ok_or(HierarchyError::LevelOutOfRange {
            level: level + 1,
            num_levels: self.num_levels(),
        })
    }

    fn upsample_operator(&self, level: usize) -> Result<&SparseMatrix> {
        self.upsample.get(level).ok_or(HierarchyError::LevelOutOfRange {
            level: level + 1,
            num_levels: self.num_levels(),
        })
    }

    fn template_vertices(&self) -> &[Point3] {
        &self.template
    }
}

/// Self loops plus row normalisation, the form graph convolutions expect.
pub fn normalized_adjacency(adjacency: &SparseMatrix) -> Result<SparseMatrix> {
    Ok(adjacency.with_self_loops()?.row_normalized())
}
