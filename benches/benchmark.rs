#[macro_use]
extern crate criterion;

extern crate rand;
extern crate recprep;

use criterion::Criterion;

use rand::distributions::{Distribution, Uniform};
use rand::{SeedableRng, XorShiftRng};

use recprep::data::{Transaction, Transactions};
use recprep::sampling::negative_sample;
use recprep::sparse::CsrMatrix;

fn synthetic_transactions(
    num_transactions: usize,
    num_customers: usize,
    num_articles: usize,
) -> Transactions {
    let mut rng = XorShiftRng::from_seed([17; 16]);

    let customer_range = Uniform::new(0, num_customers);
    let article_range = Uniform::new(0, num_articles);
    let timestamp_range = Uniform::new(0, 365);

    let records: Vec<Transaction> = (0..num_transactions)
        .map(|_| {
            Transaction::new(
                customer_range.sample(&mut rng),
                article_range.sample(&mut rng),
                timestamp_range.sample(&mut rng),
                9.99,
                1,
            )
        })
        .collect();

    Transactions::from_observed(records, num_articles)
}

fn bench_matrix_construction(c: &mut Criterion) {
    c.bench_function("csr_from_transactions", |b| {
        let transactions = synthetic_transactions(100_000, 5_000, 2_000);

        b.iter(|| {
            CsrMatrix::from_transactions(
                &transactions,
                transactions.num_customers(),
                transactions.num_articles(),
            ).unwrap()
        })
    });
}

fn bench_negative_sampling(c: &mut Criterion) {
    c.bench_function("negative_sample", |b| {
        let transactions = synthetic_transactions(100_000, 5_000, 2_000);

        b.iter(|| {
            let mut rng = XorShiftRng::from_seed([42; 16]);
            negative_sample(&transactions, 100_000, &mut rng)
        })
    });
}

criterion_group!{
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_matrix_construction, bench_negative_sampling
}
criterion_main!(benches);
