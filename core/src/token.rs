//! Identifier codec.
//!
//! A token is the string a physical QR artifact carries between stages. It
//! names both the record kind and the record id so a scanner never needs an
//! out-of-band hint:
//!
//! ```text
//! [namespace ":"] tag ":" uuid
//!
//! herbtrace:CollectionID:7f1c0f5e-9a43-4b8e-a3c8-8e2a3d6c9b10
//! LabTestID:0b7e2a51-3f7d-4b6c-9a7e-2f1e4d5c6b7a
//! ```
//!
//! The namespace prefix is optional on input and is stripped before the tag
//! is read.

use crate::records::{RecordId, RecordKind, RecordRef};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is empty")]
    Empty,

    #[error("token `{token}` does not name a record kind")]
    MissingKind { token: String },

    #[error("unknown record kind tag `{tag}`")]
    UnknownKind { tag: String },

    #[error("token is missing its identifier")]
    MissingIdentifier,

    #[error("invalid identifier `{value}`: {reason}")]
    InvalidIdentifier { value: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCodec {
    namespace: Option<String>,
}

impl TokenCodec {
    pub const DEFAULT_NAMESPACE: &'static str = "herbtrace";

    /// Create a codec that prefixes encoded tokens with `namespace`.
    /// A blank namespace is treated as none.
    pub fn new(namespace: Option<String>) -> Self {
        let namespace = namespace
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty());
        Self { namespace }
    }

    /// Codec that emits tokens without a namespace prefix.
    pub fn bare() -> Self {
        Self { namespace: None }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn encode(&self, kind: RecordKind, id: &RecordId) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}:{}:{id}", kind.token_tag()),
            None => format!("{}:{id}", kind.token_tag()),
        }
    }

    pub fn encode_ref(&self, reference: RecordRef) -> String {
        self.encode(reference.kind, &reference.id)
    }

    /// Decode a token produced by any codec, with or without a namespace.
    pub fn decode(&self, token: &str) -> Result<RecordRef, TokenError> {
        decode(token)
    }
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new(Some(Self::DEFAULT_NAMESPACE.to_string()))
    }
}

/// Decode `token` into the record it names.
pub fn decode(token: &str) -> Result<RecordRef, TokenError> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(TokenError::Empty);
    }

    // id, tag, then whatever namespace precedes them.
    let mut parts = trimmed.rsplitn(3, ':');
    let Some(id_part) = parts.next() else {
        return Err(TokenError::Empty);
    };
    let Some(tag) = parts.next() else {
        return Err(TokenError::MissingKind {
            token: trimmed.to_string(),
        });
    };

    let kind = RecordKind::from_token_tag(tag).ok_or_else(|| TokenError::UnknownKind {
        tag: tag.to_string(),
    })?;

    if id_part.is_empty() {
        return Err(TokenError::MissingIdentifier);
    }

    let id: RecordId = id_part
        .parse()
        .map_err(|e: uuid::Error| TokenError::InvalidIdentifier {
            value: id_part.to_string(),
            reason: e.to_string(),
        })?;
    if id.is_nil() {
        return Err(TokenError::InvalidIdentifier {
            value: id_part.to_string(),
            reason: "nil identifier".to_string(),
        });
    }

    Ok(RecordRef::new(kind, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ID: &str = "7f1c0f5e-9a43-4b8e-a3c8-8e2a3d6c9b10";

    fn id() -> RecordId {
        match ID.parse() {
            Ok(id) => id,
            Err(err) => panic!("fixture id should parse: {err}"),
        }
    }

    #[test]
    fn encode_includes_namespace_and_tag() {
        let codec = TokenCodec::default();
        assert_eq!(
            codec.encode(RecordKind::Collection, &id()),
            format!("herbtrace:CollectionID:{ID}")
        );
        assert_eq!(
            TokenCodec::bare().encode(RecordKind::LabTest, &id()),
            format!("LabTestID:{ID}")
        );
    }

    #[test]
    fn decode_strips_optional_namespace() {
        let expected = RecordRef::new(RecordKind::LabTest, id());
        assert_eq!(decode(&format!("LabTestID:{ID}")), Ok(expected));
        assert_eq!(decode(&format!("herbtrace:LabTestID:{ID}")), Ok(expected));
        assert_eq!(decode(&format!("  acme.farm:LabTestID:{ID}\n")), Ok(expected));
    }

    #[test]
    fn blank_namespace_is_ignored() {
        let codec = TokenCodec::new(Some("   ".to_string()));
        assert_eq!(codec.namespace(), None);
    }

    #[test]
    fn empty_token_is_malformed() {
        assert_eq!(decode(""), Err(TokenError::Empty));
        assert_eq!(decode("   "), Err(TokenError::Empty));
    }

    #[test]
    fn bare_identifier_has_no_kind() {
        assert!(matches!(decode(ID), Err(TokenError::MissingKind { .. })));
    }

    #[test]
    fn unknown_tag_is_malformed() {
        assert_eq!(
            decode(&format!("BatchID:{ID}")),
            Err(TokenError::UnknownKind {
                tag: "BatchID".to_string()
            })
        );
    }

    #[test]
    fn truncated_tokens_are_malformed() {
        assert_eq!(decode("LabTestID:"), Err(TokenError::MissingIdentifier));
        assert!(matches!(
            decode("LabTestID:7f1c0f5e-9a43-4b8e"),
            Err(TokenError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn nil_identifier_is_rejected() {
        assert!(matches!(
            decode("CollectionID:00000000-0000-0000-0000-000000000000"),
            Err(TokenError::InvalidIdentifier { .. })
        ));
    }
}
