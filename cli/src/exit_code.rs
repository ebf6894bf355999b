//! Process exit codes.
//!
//! - 0: success
//! - 1: unexpected failure
//! - 2: invalid input (validation failure or malformed token)
//! - 3: record not found
//! - 4: upstream reference does not exist
//! - 5: storage failure
//! - 6: configuration error

use herbtrace_core::{ChainError, ErrorCategory};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const INVALID_INPUT: i32 = 2;
pub const NOT_FOUND: i32 = 3;
pub const REFERENCE: i32 = 4;
pub const STORAGE: i32 = 5;
pub const CONFIG: i32 = 6;

pub fn for_category(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::Validation | ErrorCategory::Malformed => INVALID_INPUT,
        ErrorCategory::NotFound => NOT_FOUND,
        ErrorCategory::Reference => REFERENCE,
        ErrorCategory::Storage => STORAGE,
        ErrorCategory::Config => CONFIG,
    }
}

/// Exit code for a command failure, looking through any added context.
pub fn for_error(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ChainError>())
        .map_or(FAILURE, |chain_err| for_category(chain_err.category()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use herbtrace_core::{RecordId, RecordKind, TokenError, ValidationError};

    #[test]
    fn context_does_not_hide_the_category() {
        let result: Result<(), ChainError> = Err(ChainError::Reference {
            kind: RecordKind::Collection,
            id: RecordId::new(),
        });
        let err = result.context("submitting transport").unwrap_err();
        assert_eq!(for_error(&err), REFERENCE);
    }

    #[test]
    fn malformed_and_validation_share_a_code() {
        let malformed = anyhow::Error::new(ChainError::Malformed(TokenError::Empty));
        let invalid = anyhow::Error::new(ChainError::from(ValidationError::MissingField {
            field: "species",
        }));
        assert_eq!(for_error(&malformed), INVALID_INPUT);
        assert_eq!(for_error(&invalid), INVALID_INPUT);
    }

    #[test]
    fn unrelated_errors_are_generic_failures() {
        let err = anyhow::anyhow!("stdout closed");
        assert_eq!(for_error(&err), FAILURE);
    }
}
