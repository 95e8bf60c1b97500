//! Negative sampling for implicit-feedback training.
//!
//! Observed transactions only tell the model what customers purchased.
//! To learn a ranking, training also needs pairs the customer did not
//! purchase; these are drawn uniformly at random over the observed
//! customer and article code sets and filtered against the full set of
//! observed pairs.

use fnv::FnvHashSet;
use itertools::Itertools;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use data::{LabeledPairs, Transactions};
use {ArticleId, CustomerId};

/// Draw `num_samples` synthetic non-interactions and combine them with
/// the observed transactions into a shuffled training table.
///
/// Customer and article codes are sampled independently and with
/// replacement from the codes appearing in `transactions`, so a sampled
/// pair need not reflect any realistic co-occurrence. Draws that collide
/// with an observed pair are dropped: fewer than `num_samples` negatives
/// may survive, which callers must check for themselves if they need a
/// guaranteed count. Observed rows are labelled 1.0, surviving negatives
/// 0.0; the concatenated table is shuffled once with the supplied RNG.
///
/// Pass a seeded RNG for reproducible output.
pub fn negative_sample<R: Rng>(
    transactions: &Transactions,
    num_samples: usize,
    rng: &mut R,
) -> LabeledPairs {
    let customers: Vec<CustomerId> = transactions
        .data()
        .iter()
        .map(|x| x.customer_id())
        .unique()
        .collect();
    let articles: Vec<ArticleId> = transactions
        .data()
        .iter()
        .map(|x| x.article_id())
        .unique()
        .collect();

    // Built once, read-only afterwards; this is the membership structure
    // every draw is checked against.
    let mut observed =
        FnvHashSet::with_capacity_and_hasher(transactions.len(), Default::default());
    for transaction in transactions.data() {
        observed.insert((transaction.customer_id(), transaction.article_id()));
    }

    let mut pairs = LabeledPairs::new(transactions.num_customers(), transactions.num_articles());

    for transaction in transactions.data() {
        pairs.push(transaction.customer_id(), transaction.article_id(), 1.0);
    }

    if !customers.is_empty() && !articles.is_empty() {
        let customer_range = Uniform::new(0, customers.len());
        let article_range = Uniform::new(0, articles.len());

        for _ in 0..num_samples {
            let customer_id = customers[customer_range.sample(rng)];
            let article_id = articles[article_range.sample(rng)];

            if !observed.contains(&(customer_id, article_id)) {
                pairs.push(customer_id, article_id, 0.0);
            }
        }
    }

    pairs.shuffle(rng);

    pairs
}
