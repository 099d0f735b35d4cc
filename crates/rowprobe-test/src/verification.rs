//! Assertions over the fake agent's set log.

use thiserror::Error;

use crate::fake_agent::SetRecord;

/// Verification error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerificationError {
    #[error("No request carried '{object}'")]
    ObjectNeverSent { object: String },

    #[error("Request {request} sent '{actual}' for {object}, expected '{expected}'")]
    ValueMismatch {
        request: usize,
        object: String,
        expected: String,
        actual: String,
    },

    #[error("Request {request} omitted {object}")]
    ObjectMissing { request: usize, object: String },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Read-only view over a set log.
pub struct SetLogVerifier<'a> {
    log: &'a [SetRecord],
}

impl<'a> SetLogVerifier<'a> {
    pub fn new(log: &'a [SetRecord]) -> Self {
        Self { log }
    }

    /// Requests that carried `object`, with their position in the log.
    pub fn requests_with(&self, object: &str) -> Vec<(usize, &'a SetRecord)> {
        self.log
            .iter()
            .enumerate()
            .filter(|(_, record)| record.value_of(object).is_some())
            .collect()
    }

    /// Every value sent for `object`, in order.
    pub fn values_sent(&self, object: &str) -> Vec<String> {
        self.log
            .iter()
            .filter_map(|record| record.value_of(object).map(str::to_string))
            .collect()
    }

    /// Values sent for `object` in requests where `probed` carried `c`.
    pub fn values_alongside(&self, probed: &str, c: char, object: &str) -> Vec<Option<String>> {
        self.log
            .iter()
            .filter(|record| record.value_of(probed).is_some_and(|v| v.contains(c)))
            .map(|record| record.value_of(object).map(str::to_string))
            .collect()
    }

    /// Asserts that every request probing `probed` with `c` held `other` at
    /// `expected`.
    pub fn assert_held_at(&self, probed: &str, c: char, other: &str, expected: &str) -> VerifyResult<()> {
        let mut seen = false;
        for (request, record) in self.log.iter().enumerate() {
            let probing = record.value_of(probed).is_some_and(|v| v.contains(c));
            if !probing {
                continue;
            }
            seen = true;
            match record.value_of(other) {
                Some(actual) if actual == expected => {}
                Some(actual) => {
                    return Err(VerificationError::ValueMismatch {
                        request,
                        object: other.to_string(),
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    })
                }
                None => {
                    return Err(VerificationError::ObjectMissing {
                        request,
                        object: other.to_string(),
                    })
                }
            }
        }
        if seen {
            Ok(())
        } else {
            Err(VerificationError::ObjectNeverSent {
                object: probed.to_string(),
            })
        }
    }

    /// Number of accepted requests.
    pub fn accepted(&self) -> usize {
        self.log.iter().filter(|record| record.accepted).count()
    }
}
