//! Loading transaction tables and persisting encoding artifacts.
use std::fs::File;
use std::path::Path;

use csv;
use failure;
use serde_json;

use data::{Transaction, Transactions};
use encoding::IdEncoder;

/// Read a headered CSV of transaction records.
///
/// Expected columns: `customer_id`, `article_id`, `timestamp`, `price`,
/// `sales_channel`. The article catalog size is still supplied
/// explicitly; it is never inferred from the file.
pub fn load_transactions<P: AsRef<Path>>(
    path: P,
    num_articles: usize,
) -> Result<Transactions, failure::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let records: Vec<Transaction> = reader.deserialize().collect::<Result<Vec<_>, _>>()?;

    Ok(Transactions::from_observed(records, num_articles))
}

/// Persist a fitted string-token encoder as JSON.
pub fn save_encoding<P: AsRef<Path>>(
    encoder: &IdEncoder<String>,
    path: P,
) -> Result<(), failure::Error> {
    let file = File::create(path)?;
    serde_json::to_writer(file, encoder)?;

    Ok(())
}

/// Load a previously persisted string-token encoder.
pub fn load_encoding<P: AsRef<Path>>(path: P) -> Result<IdEncoder<String>, failure::Error> {
    let file = File::open(path)?;
    let encoder = serde_json::from_reader(file)?;

    Ok(encoder)
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_transactions_from_csv() {
        let path = env::temp_dir().join("recprep_transactions_test.csv");

        {
            let mut file = fs::File::create(&path).unwrap();
            writeln!(file, "customer_id,article_id,timestamp,price,sales_channel").unwrap();
            writeln!(file, "0,5,1,9.99,1").unwrap();
            writeln!(file, "1,2,3,4.99,2").unwrap();
        }

        let transactions = load_transactions(&path, 10).unwrap();

        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions.shape(), (2, 10));
        assert_eq!(transactions.data()[0].article_id(), 5);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn encoding_artifact_round_trips() {
        let path = env::temp_dir().join("recprep_encoding_test.json");

        let column = vec![
            "customer-a".to_string(),
            "customer-b".to_string(),
            "customer-a".to_string(),
        ];
        let encoder = IdEncoder::fit(column, None);

        save_encoding(&encoder, &path).unwrap();
        let loaded = load_encoding(&path).unwrap();

        assert_eq!(loaded.len(), encoder.len());
        assert_eq!(
            loaded.encode(&"customer-b".to_string()).unwrap(),
            encoder.encode(&"customer-b".to_string()).unwrap()
        );

        fs::remove_file(&path).unwrap();
    }
}
