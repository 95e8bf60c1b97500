//! Transaction records, their containers, and splitting strategies.
//!
//! Two splitting strategies live here, and they are deliberately separate
//! because they serve different evaluation protocols:
//!
//! - [`last_date_split`] partitions every customer's transactions by their
//!   single latest purchase date (time-holdout; feeds the matrix pipeline).
//! - [`customer_based_split`] holds out whole customers by hashing their
//!   code (customer-holdout; feeds the factorization pipeline).

use std;
use std::cmp;
use std::hash::Hasher;

use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use siphasher::sip::SipHasher;

use super::{ArticleId, CustomerId, Timestamp};

/// A single observed purchase event. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    customer_id: CustomerId,
    article_id: ArticleId,
    timestamp: Timestamp,
    price: f32,
    sales_channel: u8,
}

impl Transaction {
    /// Build a new transaction record.
    pub fn new(
        customer_id: CustomerId,
        article_id: ArticleId,
        timestamp: Timestamp,
        price: f32,
        sales_channel: u8,
    ) -> Self {
        Transaction {
            customer_id: customer_id,
            article_id: article_id,
            timestamp: timestamp,
            price: price,
            sales_channel: sales_channel,
        }
    }

    /// The dense customer code.
    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    /// The dense article code.
    pub fn article_id(&self) -> ArticleId {
        self.article_id
    }

    /// The purchase timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The paid price.
    pub fn price(&self) -> f32 {
        self.price
    }

    /// The sales channel the purchase was made through.
    pub fn sales_channel(&self) -> u8 {
        self.sales_channel
    }
}

/// A set of observed transactions together with its declared
/// customer/article dimensions.
#[derive(Debug)]
pub struct Transactions {
    num_customers: usize,
    num_articles: usize,
    transactions: Vec<Transaction>,
}

impl Transactions {
    /// Build a transaction set from observed records.
    ///
    /// The customer dimension is derived as the maximum observed customer
    /// code plus one. The article dimension is always supplied explicitly:
    /// the catalog may contain articles that never appear in the observed
    /// transactions, so it must not be inferred.
    pub fn from_observed(transactions: Vec<Transaction>, num_articles: usize) -> Self {
        let num_customers = transactions
            .iter()
            .map(|x| x.customer_id())
            .max()
            .map_or(0, |x| x + 1);

        Transactions {
            num_customers: num_customers,
            num_articles: num_articles,
            transactions: transactions,
        }
    }

    /// The underlying records.
    pub fn data(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the set contains no records.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Shuffle the records in place.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        rng.shuffle(&mut self.transactions);
    }

    /// Partition the records by a predicate, preserving the declared
    /// dimensions on both sides.
    pub fn split_by<F: Fn(&Transaction) -> bool>(&self, func: F) -> (Self, Self) {
        let head = Transactions {
            num_customers: self.num_customers,
            num_articles: self.num_articles,
            transactions: self.transactions
                .iter()
                .filter(|x| func(x))
                .cloned()
                .collect(),
        };
        let tail = Transactions {
            num_customers: self.num_customers,
            num_articles: self.num_articles,
            transactions: self.transactions
                .iter()
                .filter(|x| !func(x))
                .cloned()
                .collect(),
        };

        (head, tail)
    }

    /// The customer dimension.
    pub fn num_customers(&self) -> usize {
        self.num_customers
    }

    /// The article catalog size.
    pub fn num_articles(&self) -> usize {
        self.num_articles
    }

    /// `(num_customers, num_articles)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_customers, self.num_articles)
    }
}

/// Split a transaction set into each customer's history and their
/// most-recent-date holdout.
///
/// For every customer the maximum transaction timestamp is computed;
/// records strictly before it form the history side, records on it form
/// the holdout side. All ties on the latest date land in holdout. A
/// customer whose transactions share a single date is entirely absent
/// from history; downstream consumers must treat a missing customer as
/// "no history", not as zero-filled.
pub fn last_date_split(transactions: &Transactions) -> (Transactions, Transactions) {
    let mut last_purchase = vec![0; transactions.num_customers()];

    for transaction in transactions.data() {
        let last = &mut last_purchase[transaction.customer_id()];
        *last = cmp::max(*last, transaction.timestamp());
    }

    transactions.split_by(|x| x.timestamp() < last_purchase[x.customer_id()])
}

/// Split a labelled pair table into train and test sets by holding out
/// whole customers.
///
/// Customers are assigned to sides by a keyed hash of their code, with
/// keys drawn from the supplied RNG; every row of a held-out customer
/// lands on the test side.
pub fn customer_based_split<R: Rng>(
    pairs: &LabeledPairs,
    rng: &mut R,
    test_fraction: f32,
) -> (LabeledPairs, LabeledPairs) {
    let denominator = 100_000;
    let train_cutoff = (test_fraction * denominator as f32) as u64;

    let range = Uniform::new(0, std::u64::MAX);
    let (key_0, key_1) = (range.sample(rng), range.sample(rng));

    let is_train = |customer_id: CustomerId| {
        let mut hasher = SipHasher::new_with_keys(key_0, key_1);
        hasher.write_usize(customer_id);
        hasher.finish() % denominator > train_cutoff
    };

    pairs.split_by(is_train)
}

/// A table of `(customer, article, label)` rows stored as parallel
/// vectors, the unit of factorization-style training.
///
/// Observed purchases carry label 1.0; synthetic negatives carry 0.0.
#[derive(Clone, Debug)]
pub struct LabeledPairs {
    num_customers: usize,
    num_articles: usize,
    customer_ids: Vec<CustomerId>,
    article_ids: Vec<ArticleId>,
    labels: Vec<f32>,
}

impl LabeledPairs {
    /// Build an empty table with the given dimensions.
    pub fn new(num_customers: usize, num_articles: usize) -> Self {
        LabeledPairs {
            num_customers: num_customers,
            num_articles: num_articles,
            customer_ids: Vec::new(),
            article_ids: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Append a row.
    pub fn push(&mut self, customer_id: CustomerId, article_id: ArticleId, label: f32) {
        self.customer_ids.push(customer_id);
        self.article_ids.push(article_id);
        self.labels.push(label);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.customer_ids.len()
    }

    /// Whether the table contains no rows.
    pub fn is_empty(&self) -> bool {
        self.customer_ids.is_empty()
    }

    /// The customer code column.
    pub fn customer_ids(&self) -> &[CustomerId] {
        &self.customer_ids
    }

    /// The article code column.
    pub fn article_ids(&self) -> &[ArticleId] {
        &self.article_ids
    }

    /// The label column.
    pub fn labels(&self) -> &[f32] {
        &self.labels
    }

    /// Shuffle all three columns in lockstep.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        rng.shuffle(&mut order);

        self.customer_ids = order.iter().map(|&idx| self.customer_ids[idx]).collect();
        self.article_ids = order.iter().map(|&idx| self.article_ids[idx]).collect();
        self.labels = order.iter().map(|&idx| self.labels[idx]).collect();
    }

    /// Partition the rows by a predicate on the customer code, preserving
    /// the declared dimensions on both sides.
    pub fn split_by<F: Fn(CustomerId) -> bool>(&self, func: F) -> (Self, Self) {
        let mut head = LabeledPairs::new(self.num_customers, self.num_articles);
        let mut tail = LabeledPairs::new(self.num_customers, self.num_articles);

        for (&customer_id, &article_id, &label) in
            izip!(&self.customer_ids, &self.article_ids, &self.labels)
        {
            if func(customer_id) {
                head.push(customer_id, article_id, label);
            } else {
                tail.push(customer_id, article_id, label);
            }
        }

        (head, tail)
    }

    /// Iterate over the table in minibatches of `minibatch_size` rows.
    ///
    /// The final minibatch of a pass may be shorter than the nominal size;
    /// that is a normal boundary condition, not an error.
    pub fn iter_minibatch(&self, minibatch_size: usize) -> PairMinibatchIterator {
        PairMinibatchIterator {
            pairs: &self,
            idx: 0,
            stop_idx: self.len(),
            minibatch_size: minibatch_size,
        }
    }

    /// Split minibatch iteration into `num_partitions` contiguous ranges,
    /// for consumption from multiple workers. The remainder rows are
    /// assigned to the last partition.
    pub fn iter_minibatch_partitioned(
        &self,
        minibatch_size: usize,
        num_partitions: usize,
    ) -> Vec<PairMinibatchIterator> {
        let iterator = self.iter_minibatch(minibatch_size);
        let chunk_size = self.len() / num_partitions;

        (0..num_partitions)
            .map(|x| {
                let stop = if x + 1 == num_partitions {
                    self.len()
                } else {
                    (x + 1) * chunk_size
                };
                iterator.slice(x * chunk_size, stop)
            })
            .collect()
    }

    /// The customer dimension.
    pub fn num_customers(&self) -> usize {
        self.num_customers
    }

    /// The article catalog size.
    pub fn num_articles(&self) -> usize {
        self.num_articles
    }

    /// `(num_customers, num_articles)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_customers, self.num_articles)
    }
}

/// Iterator over contiguous minibatches of a [`LabeledPairs`] table.
#[derive(Clone, Debug)]
pub struct PairMinibatchIterator<'a> {
    pairs: &'a LabeledPairs,
    idx: usize,
    stop_idx: usize,
    minibatch_size: usize,
}

impl<'a> PairMinibatchIterator<'a> {
    /// Restrict the iterator to the `[start, stop)` row range.
    pub fn slice(&self, start: usize, stop: usize) -> PairMinibatchIterator<'a> {
        PairMinibatchIterator {
            pairs: &self.pairs,
            idx: start,
            stop_idx: stop,
            minibatch_size: self.minibatch_size,
        }
    }
}

/// A borrowed minibatch of parallel `(customer, article, label)` columns.
#[derive(Debug)]
pub struct PairMinibatch<'a> {
    /// Customer codes for this minibatch.
    pub customer_ids: &'a [CustomerId],
    /// Article codes for this minibatch.
    pub article_ids: &'a [ArticleId],
    /// Labels for this minibatch.
    pub labels: &'a [f32],
}

impl<'a> PairMinibatch<'a> {
    /// Number of rows in the minibatch.
    pub fn len(&self) -> usize {
        self.customer_ids.len()
    }

    /// Whether the minibatch contains no rows.
    pub fn is_empty(&self) -> bool {
        self.customer_ids.is_empty()
    }
}

impl<'a> Iterator for PairMinibatchIterator<'a> {
    type Item = PairMinibatch<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.stop_idx || self.minibatch_size == 0 {
            return None;
        }

        let start = self.idx;
        let stop = cmp::min(start + self.minibatch_size, self.stop_idx);

        self.idx = stop;

        Some(PairMinibatch {
            customer_ids: &self.pairs.customer_ids[start..stop],
            article_ids: &self.pairs.article_ids[start..stop],
            labels: &self.pairs.labels[start..stop],
        })
    }
}
