//! Mapping raw customer and article identifiers to dense integer codes.
//!
//! Raw tables identify customers and articles by opaque tokens (hashed
//! customer strings, article numbers, categorical column values). Models
//! want dense, contiguous integer ranges. An [`IdEncoder`] is fitted once
//! per categorical column and assigns each distinct token a code in
//! `[0, distinct_count)`; decoding is the exact inverse.
//!
//! A column may designate a sentinel token for missing values. The
//! sentinel always maps to [`SENTINEL_CODE`] and is excluded from the
//! contiguous range, so real codes still start at 0.

use std::hash::Hash;

use fnv::FnvHashMap;

/// Code reserved for missing or unknown categorical values.
pub const SENTINEL_CODE: i64 = -1;

/// Identity encoding error types.
#[derive(Debug, Fail)]
pub enum EncodingError {
    /// The token was not seen when the mapping was fitted.
    #[fail(display = "token not present in the mapping")]
    UnknownToken,
    /// The code was never assigned to a token.
    #[fail(display = "code {} not present in the mapping", _0)]
    UnknownCode(i64),
}

/// A bidirectional mapping between raw tokens and dense integer codes,
/// scoped to a single categorical column.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdEncoder<T: Hash + Eq> {
    codes: FnvHashMap<T, i64>,
    tokens: Vec<T>,
    sentinel: Option<T>,
}

impl<T: Hash + Eq + Clone> IdEncoder<T> {
    /// Fit an encoder over a column of raw tokens.
    ///
    /// Distinct tokens are assigned codes in first-seen order, which makes
    /// the mapping deterministic for a fixed input order. Occurrences of
    /// the sentinel token are skipped: the sentinel keeps the reserved
    /// code and the remaining codes stay contiguous from 0.
    pub fn fit<I>(values: I, sentinel: Option<T>) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut codes = FnvHashMap::default();
        let mut tokens = Vec::new();

        for value in values {
            if sentinel.as_ref() == Some(&value) {
                continue;
            }

            if !codes.contains_key(&value) {
                codes.insert(value.clone(), tokens.len() as i64);
                tokens.push(value);
            }
        }

        IdEncoder {
            codes: codes,
            tokens: tokens,
            sentinel: sentinel,
        }
    }

    /// Encode a single token.
    pub fn encode(&self, token: &T) -> Result<i64, EncodingError> {
        if self.sentinel.as_ref() == Some(token) {
            return Ok(SENTINEL_CODE);
        }

        self.codes
            .get(token)
            .cloned()
            .ok_or(EncodingError::UnknownToken)
    }

    /// Decode a single code back into its raw token.
    pub fn decode(&self, code: i64) -> Result<&T, EncodingError> {
        if code == SENTINEL_CODE {
            return self.sentinel
                .as_ref()
                .ok_or(EncodingError::UnknownCode(code));
        }

        if code < 0 {
            return Err(EncodingError::UnknownCode(code));
        }

        self.tokens
            .get(code as usize)
            .ok_or(EncodingError::UnknownCode(code))
    }

    /// Encode a whole column, failing on the first unknown token.
    pub fn encode_column(&self, tokens: &[T]) -> Result<Vec<i64>, EncodingError> {
        tokens.iter().map(|token| self.encode(token)).collect()
    }

    /// Number of distinct non-sentinel tokens in the mapping.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the mapping contains no non-sentinel tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The sentinel token, if one was configured.
    pub fn sentinel(&self) -> Option<&T> {
        self.sentinel.as_ref()
    }
}
