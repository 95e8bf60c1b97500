//! Dataset abstractions and batched collation.
//!
//! Datasets wrap the sparse matrices built by the `sparse` module and
//! hand out batches in a pull-based iteration: each call to `next`
//! stacks exactly one batch. Three modes mirror the three training
//! setups:
//!
//! - matrix mode ([`SparseDataset`]): `(input row, label row)` pairs
//!   stacked into a pair of [`SparseBatch`]es;
//! - single mode ([`SingleDataset`]): rows only, for inference-time
//!   scoring of customer or article tables;
//! - pair mode ([`collate_pairs`]): `(customer, article, label)` triples
//!   collated into dense parallel arrays.
//!
//! Collation is a pure function of its input rows, so it may be invoked
//! from multiple workers concurrently; [`stack_batches_parallel`] does
//! exactly that.

use std::cmp;

use ndarray::Array1;
use rand::Rng;
use rayon::prelude::*;

use data::PairMinibatch;
use sparse::{CsrMatrix, CsrRow, MatrixError, SparseBatch};

/// A dataset of aligned `(input row, label row)` pairs: one interaction
/// row and one label row per customer.
#[derive(Clone, Debug)]
pub struct SparseDataset {
    data: CsrMatrix,
    targets: CsrMatrix,
}

impl SparseDataset {
    /// Wrap an input matrix and a label matrix. Fails unless both have
    /// the same number of rows.
    pub fn new(data: CsrMatrix, targets: CsrMatrix) -> Result<Self, MatrixError> {
        if data.num_rows() != targets.num_rows() {
            return Err(MatrixError::DimensionMismatch(
                data.num_rows(),
                targets.num_rows(),
            ));
        }

        Ok(SparseDataset {
            data: data,
            targets: targets,
        })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.data.num_rows()
    }

    /// Whether the dataset contains no samples.
    pub fn is_empty(&self) -> bool {
        self.data.num_rows() == 0
    }

    /// A single sample, or `None` when the index is out of range.
    pub fn get(&self, idx: usize) -> Option<(CsrRow, CsrRow)> {
        match (self.data.row(idx), self.targets.row(idx)) {
            (Some(data), Some(targets)) => Some((data, targets)),
            _ => None,
        }
    }

    /// The input matrix.
    pub fn data(&self) -> &CsrMatrix {
        &self.data
    }

    /// The label matrix.
    pub fn targets(&self) -> &CsrMatrix {
        &self.targets
    }

    /// Iterate over the dataset in batches of `batch_size` samples,
    /// stacking each side into a sparse batch. The final batch of a pass
    /// may be shorter than the nominal size.
    pub fn iter_batches(&self, batch_size: usize) -> SparseBatchIterator {
        SparseBatchIterator {
            dataset: &self,
            idx: 0,
            batch_size: batch_size,
        }
    }

    /// Randomly split the dataset rows into train and validation
    /// subsets.
    ///
    /// This is a row-level random split (the matrix pipeline's
    /// train/validation partition), distinct from both the temporal and
    /// the customer-hash strategies in the `data` module.
    pub fn random_split<R: Rng>(
        &self,
        rng: &mut R,
        val_fraction: f32,
    ) -> Result<(SparseDataset, SparseDataset), MatrixError> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        rng.shuffle(&mut order);

        let num_val = (val_fraction * order.len() as f32) as usize;
        let split = order.len() - num_val;
        let (train_rows, val_rows) = order.split_at(split);

        let train = SparseDataset::new(
            self.data.select_rows(train_rows)?,
            self.targets.select_rows(train_rows)?,
        )?;
        let val = SparseDataset::new(
            self.data.select_rows(val_rows)?,
            self.targets.select_rows(val_rows)?,
        )?;

        Ok((train, val))
    }
}

/// Iterator over stacked `(input, label)` batches of a
/// [`SparseDataset`].
pub struct SparseBatchIterator<'a> {
    dataset: &'a SparseDataset,
    idx: usize,
    batch_size: usize,
}

impl<'a> Iterator for SparseBatchIterator<'a> {
    type Item = (SparseBatch, SparseBatch);
    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.dataset.len() || self.batch_size == 0 {
            return None;
        }

        let start = self.idx;
        let stop = cmp::min(start + self.batch_size, self.dataset.len());

        self.idx = stop;

        Some((
            self.dataset.data.stack_rows(start, stop),
            self.dataset.targets.stack_rows(start, stop),
        ))
    }
}

/// A dataset of sparse rows with no paired target, used to feed customer
/// or article tables through a trained model.
#[derive(Clone, Debug)]
pub struct SingleDataset {
    data: CsrMatrix,
}

impl SingleDataset {
    /// Wrap a matrix.
    pub fn new(data: CsrMatrix) -> Self {
        SingleDataset { data: data }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.data.num_rows()
    }

    /// Whether the dataset contains no samples.
    pub fn is_empty(&self) -> bool {
        self.data.num_rows() == 0
    }

    /// A single row, or `None` when the index is out of range.
    pub fn get(&self, idx: usize) -> Option<CsrRow> {
        self.data.row(idx)
    }

    /// The underlying matrix.
    pub fn data(&self) -> &CsrMatrix {
        &self.data
    }

    /// Iterate over the rows in stacked batches of `batch_size`. The
    /// final batch of a pass may be shorter than the nominal size.
    pub fn iter_batches(&self, batch_size: usize) -> SingleBatchIterator {
        SingleBatchIterator {
            dataset: &self,
            idx: 0,
            batch_size: batch_size,
        }
    }
}

/// Iterator over stacked batches of a [`SingleDataset`].
pub struct SingleBatchIterator<'a> {
    dataset: &'a SingleDataset,
    idx: usize,
    batch_size: usize,
}

impl<'a> Iterator for SingleBatchIterator<'a> {
    type Item = SparseBatch;
    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.dataset.len() || self.batch_size == 0 {
            return None;
        }

        let start = self.idx;
        let stop = cmp::min(start + self.batch_size, self.dataset.len());

        self.idx = stop;

        Some(self.dataset.data.stack_rows(start, stop))
    }
}

/// A pair-mode batch: three equal-length dense arrays ready for direct
/// consumption by a numeric model.
#[derive(Clone, Debug)]
pub struct PairBatch {
    /// Customer codes.
    pub customer_ids: Array1<i64>,
    /// Article codes.
    pub article_ids: Array1<i64>,
    /// Purchase labels.
    pub labels: Array1<f32>,
}

/// Collate a pair-mode minibatch into dense parallel arrays, preserving
/// row order.
pub fn collate_pairs(minibatch: &PairMinibatch) -> PairBatch {
    PairBatch {
        customer_ids: Array1::from_vec(
            minibatch.customer_ids.iter().map(|&x| x as i64).collect(),
        ),
        article_ids: Array1::from_vec(
            minibatch.article_ids.iter().map(|&x| x as i64).collect(),
        ),
        labels: Array1::from_vec(minibatch.labels.to_vec()),
    }
}

/// Stack every batch of a dataset across a rayon thread pool.
///
/// An optional throughput optimization at the loading boundary: safe
/// because stacking is a pure function of the rows it reads. Batches are
/// returned in order.
pub fn stack_batches_parallel(
    dataset: &SparseDataset,
    batch_size: usize,
) -> Vec<(SparseBatch, SparseBatch)> {
    if batch_size == 0 {
        return Vec::new();
    }

    let num_batches = (dataset.len() + batch_size - 1) / batch_size;

    (0..num_batches)
        .into_par_iter()
        .map(|batch_idx| {
            let start = batch_idx * batch_size;
            let stop = cmp::min(start + batch_size, dataset.len());

            (
                dataset.data().stack_rows(start, stop),
                dataset.targets().stack_rows(start, stop),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, XorShiftRng};

    use data::{LabeledPairs, Transaction, Transactions};
    use sparse::train_val_matrices;
    use super::*;

    fn dataset() -> SparseDataset {
        let records = vec![
            Transaction::new(0, 0, 1, 9.99, 1),
            Transaction::new(0, 1, 2, 9.99, 1),
            Transaction::new(1, 2, 1, 4.99, 2),
            Transaction::new(1, 3, 2, 4.99, 2),
            Transaction::new(2, 0, 1, 9.99, 1),
            Transaction::new(2, 4, 3, 7.99, 1),
            Transaction::new(3, 1, 1, 9.99, 1),
            Transaction::new(3, 2, 4, 4.99, 1),
            Transaction::new(4, 3, 1, 4.99, 1),
            Transaction::new(4, 4, 2, 7.99, 2),
        ];
        let transactions = Transactions::from_observed(records, 5);

        let (x_matrix, y_matrix) = train_val_matrices(&transactions, 5, 5).unwrap();

        SparseDataset::new(x_matrix, y_matrix).unwrap()
    }

    #[test]
    fn mismatched_row_counts_are_rejected() {
        let dataset = dataset();

        let truncated = dataset.data().select_rows(&[0, 1]).unwrap();
        assert!(SparseDataset::new(truncated, dataset.targets().clone()).is_err());
    }

    #[test]
    fn batches_cover_all_rows_with_partial_final_batch() {
        let dataset = dataset();

        let batches: Vec<_> = dataset.iter_batches(2).collect();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].0.num_rows(), 2);
        assert_eq!(batches[2].0.num_rows(), 1);

        let total_nnz: usize = batches.iter().map(|&(ref x, _)| x.nnz()).sum();
        assert_eq!(total_nnz, dataset.data().nnz());
    }

    #[test]
    fn batch_rows_preserve_order() {
        let dataset = dataset();

        let (x_batch, y_batch) = dataset.iter_batches(5).next().unwrap();

        assert_eq!(x_batch.to_dense(), dataset.data().to_dense().map(|&x| x as f32));
        assert_eq!(
            y_batch.to_dense(),
            dataset.targets().to_dense().map(|&x| x as f32)
        );
    }

    #[test]
    fn random_split_partitions_rows() {
        let dataset = dataset();

        let mut rng = XorShiftRng::from_seed([42; 16]);
        let (train, val) = dataset.random_split(&mut rng, 0.2).unwrap();

        assert_eq!(train.len(), 4);
        assert_eq!(val.len(), 1);
        assert_eq!(
            train.data().nnz() + val.data().nnz(),
            dataset.data().nnz()
        );
    }

    #[test]
    fn single_dataset_batches_match_matrix() {
        let dataset = dataset();
        let single = SingleDataset::new(dataset.data().clone());

        let batches: Vec<_> = single.iter_batches(3).collect();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].num_rows(), 3);
        assert_eq!(batches[1].num_rows(), 2);

        let total_nnz: usize = batches.iter().map(|batch| batch.nnz()).sum();
        assert_eq!(total_nnz, single.data().nnz());
    }

    #[test]
    fn pair_collation_preserves_order() {
        let mut pairs = LabeledPairs::new(10, 10);
        pairs.push(3, 7, 1.0);
        pairs.push(1, 2, 0.0);
        pairs.push(4, 9, 1.0);

        let minibatch = pairs.iter_minibatch(3).next().unwrap();
        let batch = collate_pairs(&minibatch);

        assert_eq!(batch.customer_ids.to_vec(), vec![3, 1, 4]);
        assert_eq!(batch.article_ids.to_vec(), vec![7, 2, 9]);
        assert_eq!(batch.labels.to_vec(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn parallel_stacking_matches_sequential() {
        let dataset = dataset();

        let sequential: Vec<_> = dataset.iter_batches(2).collect();
        let parallel = stack_batches_parallel(&dataset, 2);

        assert_eq!(sequential, parallel);
    }
}
