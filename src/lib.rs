//! # recprep
//!
//! `recprep` prepares transactional retail data (customers, articles,
//! purchase transactions) for training implicit-feedback recommendation
//! models. It encodes raw identifiers into dense integer ranges, splits
//! each customer's history by their last purchase date, builds sparse
//! customer-by-article interaction matrices in compressed-row form,
//! generates negative samples disjoint from observed purchases, and wraps
//! the results in dataset abstractions that stack sparse rows into sparse
//! batches at load time.
//!
//! ## Example
//! ```rust
//! # extern crate recprep;
//! # extern crate rand;
//! use rand::{SeedableRng, XorShiftRng};
//! use recprep::data::{Transaction, Transactions};
//! use recprep::loader::collate_pairs;
//!
//! let records = vec![
//!     Transaction::new(0, 5, 0, 9.99, 1),
//!     Transaction::new(0, 5, 4, 9.99, 1),
//!     Transaction::new(0, 7, 4, 19.99, 2),
//!     Transaction::new(1, 2, 1, 4.99, 1),
//! ];
//!
//! // The article catalog size is always supplied explicitly: the catalog
//! // may contain articles that never appear in the observed transactions.
//! let transactions = Transactions::from_observed(records, 10);
//!
//! // History/holdout matrices split on each customer's last purchase date.
//! let (x_matrix, y_matrix) = recprep::sparse::train_val_matrices(
//!     &transactions,
//!     transactions.num_customers(),
//!     transactions.num_articles(),
//! ).unwrap();
//!
//! assert_eq!(x_matrix.shape(), y_matrix.shape());
//!
//! // Observed purchases labelled 1.0, surviving random negatives 0.0,
//! // shuffled into a single table for factorization-style training.
//! let mut rng = XorShiftRng::from_seed([42; 16]);
//! let pairs = recprep::sampling::negative_sample(&transactions, 100, &mut rng);
//!
//! for minibatch in pairs.iter_minibatch(64) {
//!     let batch = collate_pairs(&minibatch);
//!     assert_eq!(batch.customer_ids.len(), batch.labels.len());
//! }
//! ```
#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate itertools;

#[macro_use]
extern crate failure;

#[cfg(feature = "default")]
extern crate csv;
extern crate fnv;
extern crate ndarray;
extern crate rand;
extern crate rayon;
extern crate serde;
extern crate serde_json;
extern crate siphasher;

pub mod data;
#[cfg(feature = "default")]
pub mod datasets;
pub mod encoding;
pub mod loader;
pub mod sampling;
pub mod sparse;

/// Alias for customer indices.
pub type CustomerId = usize;
/// Alias for article indices.
pub type ArticleId = usize;
/// Alias for transaction timestamps.
///
/// Timestamps are opaque ordinals (for instance, days since the start of
/// the observation window); the library only ever compares them.
pub type Timestamp = usize;
