//! In-memory domain datasets

use ndarray::{Array1, Array2, Axis};

/// Features plus a label block whose last column is always the domain
/// indicator. Source datasets put task labels in the leading columns;
/// target datasets have the domain column only.
#[derive(Clone)]
pub struct DomainDataset {
    x: Array2<f32>,
    y: Array2<f32>,
}

impl DomainDataset {
    /// Build a dataset from raw feature and label blocks.
    ///
    /// Panics if the row counts disagree; loaders assume aligned rows.
    pub fn new(x: Array2<f32>, y: Array2<f32>) -> Self {
        assert_eq!(
            x.nrows(),
            y.nrows(),
            "feature and label blocks must have the same number of rows"
        );
        Self { x, y }
    }

    /// Labeled source dataset: task labels in the first column, the domain
    /// indicator appended as the last.
    pub fn source(x: Array2<f32>, task_labels: &Array1<f32>, domain: f32) -> Self {
        let n = x.nrows();
        assert_eq!(n, task_labels.len(), "one task label per row");
        let mut y = Array2::zeros((n, 2));
        for i in 0..n {
            y[[i, 0]] = task_labels[i];
            y[[i, 1]] = domain;
        }
        Self { x, y }
    }

    /// Unlabeled target dataset: domain indicator only.
    pub fn target(x: Array2<f32>, domain: f32) -> Self {
        let n = x.nrows();
        let y = Array2::from_elem((n, 1), domain);
        Self { x, y }
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    pub fn num_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn features(&self) -> &Array2<f32> {
        &self.x
    }

    pub fn labels(&self) -> &Array2<f32> {
        &self.y
    }

    /// Materialize the rows at `indices` as one batch.
    pub(crate) fn gather(&self, indices: &[usize]) -> DomainBatch {
        let x = self.x.select(Axis(0), indices);
        let y = self.y.select(Axis(0), indices);
        DomainBatch { x, y }
    }
}

/// One minibatch drawn from a [`DomainDataset`].
#[derive(Clone)]
pub struct DomainBatch {
    pub x: Array2<f32>,
    pub y: Array2<f32>,
}

impl DomainBatch {
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    /// Task-label columns (everything except the trailing domain column).
    pub fn task_labels(&self) -> ndarray::ArrayView2<'_, f32> {
        let cols = self.y.ncols();
        self.y.slice(ndarray::s![.., ..cols - 1])
    }

    /// The trailing domain-indicator column.
    pub fn domain_labels(&self) -> ndarray::ArrayView1<'_, f32> {
        let cols = self.y.ncols();
        self.y.column(cols - 1)
    }

    /// Features flattened row-major for the autograd layer.
    pub fn features_flat(&self) -> Vec<f32> {
        self.x.iter().copied().collect()
    }
}
