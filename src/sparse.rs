//! Compressed sparse representations of customer-article interactions.
//!
//! [`CsrMatrix`] stores integer purchase counts in compressed-row form,
//! sized for tens of millions of entries and cheap per-customer row
//! slicing. [`SparseBatch`] is the coordinate-form structure the batch
//! collator stacks rows into at load time; neither representation ever
//! materializes a dense catalog-width array.

use std::cmp;

use ndarray::Array2;

use data::{last_date_split, Transactions};
use ArticleId;

/// Matrix construction and collation error types.
#[derive(Debug, Fail)]
pub enum MatrixError {
    /// A customer code exceeded the declared row dimension.
    #[fail(display = "customer code {} out of bounds for {} rows", _0, _1)]
    CustomerOutOfBounds(usize, usize),
    /// An article code exceeded the declared column dimension.
    #[fail(display = "article code {} out of bounds for {} columns", _0, _1)]
    ArticleOutOfBounds(usize, usize),
    /// Two structures that must agree on a dimension did not.
    #[fail(display = "dimension mismatch: expected {}, got {}", _0, _1)]
    DimensionMismatch(usize, usize),
}

/// A sparse customer-by-article matrix of purchase counts in
/// compressed-row form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    num_rows: usize,
    num_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<ArticleId>,
    data: Vec<u32>,
}

impl CsrMatrix {
    /// Accumulate a transaction set into a count matrix of the given
    /// shape.
    ///
    /// Every `(customer, article)` occurrence increments its cell, so
    /// repeated purchases of the same article count up. Entries are
    /// stored sorted by column within each row, making construction
    /// deterministic for a given transaction set regardless of record
    /// order. Any record outside the declared shape fails the whole
    /// build; nothing is clipped silently.
    pub fn from_transactions(
        transactions: &Transactions,
        num_rows: usize,
        num_cols: usize,
    ) -> Result<CsrMatrix, MatrixError> {
        let mut pairs = Vec::with_capacity(transactions.len());

        for transaction in transactions.data() {
            if transaction.customer_id() >= num_rows {
                return Err(MatrixError::CustomerOutOfBounds(
                    transaction.customer_id(),
                    num_rows,
                ));
            }
            if transaction.article_id() >= num_cols {
                return Err(MatrixError::ArticleOutOfBounds(
                    transaction.article_id(),
                    num_cols,
                ));
            }

            pairs.push((transaction.customer_id(), transaction.article_id()));
        }

        pairs.sort();

        let mut row_counts = vec![0; num_rows];
        let mut indices = Vec::with_capacity(pairs.len());
        let mut data: Vec<u32> = Vec::with_capacity(pairs.len());

        let mut previous = None;

        for &(row, col) in &pairs {
            if previous == Some((row, col)) {
                if let Some(count) = data.last_mut() {
                    *count += 1;
                }
            } else {
                indices.push(col);
                data.push(1);
                row_counts[row] += 1;
                previous = Some((row, col));
            }
        }

        let mut indptr = vec![0; num_rows + 1];
        for (row, &count) in row_counts.iter().enumerate() {
            indptr[row + 1] = count;
        }
        for idx in 1..indptr.len() {
            indptr[idx] += indptr[idx - 1];
        }

        Ok(CsrMatrix {
            num_rows: num_rows,
            num_cols: num_cols,
            indptr: indptr,
            indices: indices,
            data: data,
        })
    }

    /// Clamp every stored value to at most `max`.
    ///
    /// Applied with `max = 1` to holdout matrices, whose cells mean "was
    /// this article ever purchased on the holdout date" rather than "how
    /// many units".
    pub fn clip_values(&mut self, max: u32) {
        for value in &mut self.data {
            if *value > max {
                *value = max;
            }
        }
    }

    /// A borrowed view of a single row, or `None` when the index is out
    /// of range.
    pub fn row(&self, idx: usize) -> Option<CsrRow> {
        if idx >= self.num_rows {
            return None;
        }

        let start = self.indptr[idx];
        let stop = self.indptr[idx + 1];

        Some(CsrRow {
            num_cols: self.num_cols,
            indices: &self.indices[start..stop],
            data: &self.data[start..stop],
        })
    }

    /// Iterate over all rows in order.
    pub fn iter_rows(&self) -> CsrRowIterator {
        CsrRowIterator {
            matrix: &self,
            idx: 0,
        }
    }

    /// Gather the given rows, in the given order, into a new matrix.
    pub fn select_rows(&self, rows: &[usize]) -> Result<CsrMatrix, MatrixError> {
        for &row in rows {
            if row >= self.num_rows {
                return Err(MatrixError::CustomerOutOfBounds(row, self.num_rows));
            }
        }

        let mut indptr = Vec::with_capacity(rows.len() + 1);
        indptr.push(0);
        let mut indices = Vec::new();
        let mut data = Vec::new();

        for &row in rows {
            let start = self.indptr[row];
            let stop = self.indptr[row + 1];

            indices.extend_from_slice(&self.indices[start..stop]);
            data.extend_from_slice(&self.data[start..stop]);
            indptr.push(indices.len());
        }

        Ok(CsrMatrix {
            num_rows: rows.len(),
            num_cols: self.num_cols,
            indptr: indptr,
            indices: indices,
            data: data,
        })
    }

    /// Stack the `[start, stop)` row range into a coordinate-form batch.
    ///
    /// Row indices in the result are relative to the start of the range.
    /// The range is clamped to the matrix dimensions.
    pub fn stack_rows(&self, start: usize, stop: usize) -> SparseBatch {
        let stop = cmp::min(stop, self.num_rows);
        let start = cmp::min(start, stop);

        SparseBatch::from_rows(self.num_cols, (start..stop).filter_map(|idx| self.row(idx)))
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns.
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// `(num_rows, num_cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows, self.num_cols)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Materialize the matrix densely. Intended for tests and small
    /// shapes only; never call this with a catalog-sized column
    /// dimension.
    pub fn to_dense(&self) -> Array2<u32> {
        let mut dense = Array2::zeros((self.num_rows, self.num_cols));

        for (row, view) in self.iter_rows().enumerate() {
            for (&col, &value) in view.indices.iter().zip(view.data.iter()) {
                dense[[row, col]] = value;
            }
        }

        dense
    }
}

/// A borrowed view of a single matrix row.
#[derive(Clone, Copy, Debug)]
pub struct CsrRow<'a> {
    /// The column dimension of the parent matrix.
    pub num_cols: usize,
    /// Column indices of the stored entries, sorted ascending.
    pub indices: &'a [ArticleId],
    /// Stored counts, parallel to `indices`.
    pub data: &'a [u32],
}

impl<'a> CsrRow<'a> {
    /// Number of stored entries in the row.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }
}

/// Iterator over the rows of a [`CsrMatrix`].
pub struct CsrRowIterator<'a> {
    matrix: &'a CsrMatrix,
    idx: usize,
}

impl<'a> Iterator for CsrRowIterator<'a> {
    type Item = CsrRow<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        let value = self.matrix.row(self.idx);

        self.idx += 1;

        value
    }
}

/// A batch of sparse rows stacked into coordinate form, ready for
/// handoff to a sparse tensor constructor.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseBatch {
    num_rows: usize,
    num_cols: usize,
    row_indices: Vec<usize>,
    col_indices: Vec<ArticleId>,
    values: Vec<f32>,
}

impl SparseBatch {
    fn from_rows<'a, I>(num_cols: usize, rows: I) -> SparseBatch
    where
        I: IntoIterator<Item = CsrRow<'a>>,
    {
        let mut num_rows = 0;
        let mut row_indices = Vec::new();
        let mut col_indices = Vec::new();
        let mut values = Vec::new();

        for (batch_row, row) in rows.into_iter().enumerate() {
            for (&col, &value) in row.indices.iter().zip(row.data.iter()) {
                row_indices.push(batch_row);
                col_indices.push(col);
                values.push(value as f32);
            }

            num_rows = batch_row + 1;
        }

        SparseBatch {
            num_rows: num_rows,
            num_cols: num_cols,
            row_indices: row_indices,
            col_indices: col_indices,
            values: values,
        }
    }

    /// Stack a sequence of sparse rows into a single batch, preserving
    /// row order.
    ///
    /// All rows must share the same column dimension. An empty slice
    /// yields an empty batch of width 0.
    pub fn stack(rows: &[CsrRow]) -> Result<SparseBatch, MatrixError> {
        let num_cols = rows.first().map_or(0, |row| row.num_cols);

        for row in rows {
            if row.num_cols != num_cols {
                return Err(MatrixError::DimensionMismatch(num_cols, row.num_cols));
            }
        }

        Ok(SparseBatch::from_rows(num_cols, rows.iter().cloned()))
    }

    /// Number of rows in the batch.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns in the batch.
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// `(num_rows, num_cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows, self.num_cols)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Batch-relative row index of every stored entry.
    pub fn row_indices(&self) -> &[usize] {
        &self.row_indices
    }

    /// Column index of every stored entry.
    pub fn col_indices(&self) -> &[ArticleId] {
        &self.col_indices
    }

    /// Value of every stored entry.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Materialize the batch densely. Intended for tests and small
    /// shapes only.
    pub fn to_dense(&self) -> Array2<f32> {
        let mut dense = Array2::zeros((self.num_rows, self.num_cols));

        for (&row, &col, &value) in izip!(&self.row_indices, &self.col_indices, &self.values) {
            dense[[row, col]] = value;
        }

        dense
    }
}

/// Build the history and holdout matrices for the matrix training
/// pipeline.
///
/// The transaction set is split on each customer's last purchase date;
/// the history side becomes the input matrix with raw counts, the
/// holdout side becomes the label matrix with values clamped to {0, 1}.
pub fn train_val_matrices(
    transactions: &Transactions,
    num_rows: usize,
    num_cols: usize,
) -> Result<(CsrMatrix, CsrMatrix), MatrixError> {
    let (history, holdout) = last_date_split(transactions);

    let x_matrix = CsrMatrix::from_transactions(&history, num_rows, num_cols)?;
    let mut y_matrix = CsrMatrix::from_transactions(&holdout, num_rows, num_cols)?;
    y_matrix.clip_values(1);

    Ok((x_matrix, y_matrix))
}

#[cfg(test)]
mod tests {
    use ndarray::arr2;

    use data::Transaction;
    use super::*;

    fn transactions(records: Vec<(usize, usize, usize)>, num_articles: usize) -> Transactions {
        let records = records
            .into_iter()
            .map(|(customer_id, article_id, timestamp)| {
                Transaction::new(customer_id, article_id, timestamp, 9.99, 1)
            })
            .collect();

        Transactions::from_observed(records, num_articles)
    }

    #[test]
    fn counts_accumulate_repeated_purchases() {
        let transactions = transactions(vec![(0, 1, 0), (0, 1, 1), (0, 2, 0), (1, 0, 0)], 3);
        let matrix = CsrMatrix::from_transactions(&transactions, 2, 3).unwrap();

        assert_eq!(matrix.shape(), (2, 3));
        assert_eq!(matrix.nnz(), 3);
        assert_eq!(
            matrix.to_dense(),
            arr2(&[[0, 2, 1], [1, 0, 0]])
        );
    }

    #[test]
    fn construction_is_idempotent() {
        let transactions = transactions(vec![(2, 1, 0), (0, 1, 1), (1, 2, 0), (0, 1, 2)], 4);

        let first = CsrMatrix::from_transactions(&transactions, 3, 4).unwrap();
        let second = CsrMatrix::from_transactions(&transactions, 3, 4).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn bounds_violations_fail_fast() {
        let transactions_oob_customer = transactions(vec![(0, 1, 0), (5, 1, 0)], 3);
        assert!(CsrMatrix::from_transactions(&transactions_oob_customer, 2, 3).is_err());

        let transactions_oob_article = transactions(vec![(0, 9, 0)], 3);
        assert!(CsrMatrix::from_transactions(&transactions_oob_article, 2, 3).is_err());
    }

    #[test]
    fn clip_values_caps_counts() {
        let transactions = transactions(vec![(0, 1, 0), (0, 1, 1), (0, 1, 2)], 2);
        let mut matrix = CsrMatrix::from_transactions(&transactions, 1, 2).unwrap();

        matrix.clip_values(1);

        assert_eq!(matrix.to_dense(), arr2(&[[0, 1]]));
    }

    #[test]
    fn train_val_matrices_match_split_semantics() {
        // Customer 0: article 5 on day 1, articles 5 and 7 on day 5.
        let transactions = transactions(vec![(0, 5, 1), (0, 5, 5), (0, 7, 5)], 10);

        let (x_matrix, y_matrix) = train_val_matrices(&transactions, 1, 10).unwrap();

        let mut expected_x = vec![0; 10];
        expected_x[5] = 1;
        assert_eq!(x_matrix.to_dense().row(0).to_vec(), expected_x);

        let mut expected_y = vec![0; 10];
        expected_y[5] = 1;
        expected_y[7] = 1;
        assert_eq!(y_matrix.to_dense().row(0).to_vec(), expected_y);
    }

    #[test]
    fn holdout_matrix_never_exceeds_one() {
        // Two purchases of the same article on the same (latest) date.
        let transactions = transactions(vec![(0, 3, 5), (0, 3, 5)], 5);

        let (_, y_matrix) = train_val_matrices(&transactions, 1, 5).unwrap();

        assert!(y_matrix.iter_rows().all(|row| row.data.iter().all(|&x| x <= 1)));
    }

    #[test]
    fn select_rows_gathers_in_order() {
        let transactions = transactions(vec![(0, 0, 0), (1, 1, 0), (2, 2, 0)], 3);
        let matrix = CsrMatrix::from_transactions(&transactions, 3, 3).unwrap();

        let gathered = matrix.select_rows(&[2, 0]).unwrap();

        assert_eq!(gathered.shape(), (2, 3));
        assert_eq!(gathered.to_dense(), arr2(&[[0, 0, 1], [1, 0, 0]]));

        assert!(matrix.select_rows(&[3]).is_err());
    }

    #[test]
    fn stacking_preserves_rows_and_nnz() {
        let transactions = transactions(
            vec![(0, 17, 0), (1, 99_000, 0), (1, 4, 0), (2, 55_555, 0)],
            100_000,
        );
        let matrix = CsrMatrix::from_transactions(&transactions, 3, 100_000).unwrap();

        let rows: Vec<CsrRow> = matrix.iter_rows().collect();
        let batch = SparseBatch::stack(&rows).unwrap();

        assert_eq!(batch.shape(), (3, 100_000));
        assert_eq!(
            batch.nnz(),
            rows.iter().map(|row| row.nnz()).sum::<usize>()
        );
        assert_eq!(batch.row_indices(), &[0, 1, 1, 2]);
        assert_eq!(batch.col_indices(), &[17, 4, 99_000, 55_555]);
        assert_eq!(batch.values(), &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn stacking_rejects_mismatched_widths() {
        let narrow = transactions(vec![(0, 1, 0)], 2);
        let wide = transactions(vec![(0, 1, 0)], 5);

        let narrow = CsrMatrix::from_transactions(&narrow, 1, 2).unwrap();
        let wide = CsrMatrix::from_transactions(&wide, 1, 5).unwrap();

        let rows: Vec<CsrRow> = narrow.iter_rows().chain(wide.iter_rows()).collect();

        assert!(SparseBatch::stack(&rows).is_err());
    }

    #[test]
    fn stack_rows_is_range_clamped() {
        let transactions = transactions(vec![(0, 0, 0), (1, 1, 0)], 2);
        let matrix = CsrMatrix::from_transactions(&transactions, 2, 2).unwrap();

        let batch = matrix.stack_rows(1, 10);

        assert_eq!(batch.shape(), (1, 2));
        assert_eq!(batch.col_indices(), &[1]);
    }
}
