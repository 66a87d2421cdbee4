//! The individual field validators run by the pipeline.

use bid_policy_types::{RuleNode, is_valid_marketplace, is_valid_policy_type, wire};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{FieldValue, Tag};
use crate::error::{FieldError, FormatKind};

pub const MIN_PASSWORD_LEN: usize = 8;

// Pattern browsers use for `<input type=email>`.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$",
    )
    .expect("email pattern compiles")
});

/// One stage of the pipeline.
///
/// A stage looks at every field declaring its [`Tag`] and reports all
/// offending fields at once through [`FieldValidator::reject`].
pub trait FieldValidator: Send + Sync {
    fn tag(&self) -> Tag;

    /// Whether the value violates this stage.
    fn is_invalid(&self, value: &FieldValue<'_>) -> bool;

    fn reject(&self, fields: Vec<String>) -> FieldError;
}

pub struct RequiredValidator;

impl FieldValidator for RequiredValidator {
    fn tag(&self) -> Tag {
        Tag::Required
    }

    fn is_invalid(&self, value: &FieldValue<'_>) -> bool {
        value.is_empty()
    }

    fn reject(&self, fields: Vec<String>) -> FieldError {
        FieldError::MissingRequiredField(fields)
    }
}

pub struct MarketplaceValidator;

impl FieldValidator for MarketplaceValidator {
    fn tag(&self) -> Tag {
        Tag::Marketplace
    }

    fn is_invalid(&self, value: &FieldValue<'_>) -> bool {
        value.as_text().is_some_and(|s| !is_valid_marketplace(s))
    }

    fn reject(&self, fields: Vec<String>) -> FieldError {
        FieldError::InvalidMarketplace(fields)
    }
}

pub struct PolicyTypeValidator;

impl FieldValidator for PolicyTypeValidator {
    fn tag(&self) -> Tag {
        Tag::Type
    }

    fn is_invalid(&self, value: &FieldValue<'_>) -> bool {
        value.as_text().is_some_and(|s| !is_valid_policy_type(s))
    }

    fn reject(&self, fields: Vec<String>) -> FieldError {
        FieldError::InvalidRuleSetType(fields)
    }
}

pub struct EmailValidator;

impl FieldValidator for EmailValidator {
    fn tag(&self) -> Tag {
        Tag::Email
    }

    fn is_invalid(&self, value: &FieldValue<'_>) -> bool {
        value.as_text().is_some_and(|s| !EMAIL_RE.is_match(s))
    }

    fn reject(&self, fields: Vec<String>) -> FieldError {
        FieldError::InvalidFormat {
            kind: FormatKind::Email,
            fields,
        }
    }
}

pub struct UuidValidator;

impl FieldValidator for UuidValidator {
    fn tag(&self) -> Tag {
        Tag::Uuid
    }

    fn is_invalid(&self, value: &FieldValue<'_>) -> bool {
        value.as_text().is_some_and(|s| uuid::Uuid::parse_str(s).is_err())
    }

    fn reject(&self, fields: Vec<String>) -> FieldError {
        FieldError::InvalidFormat {
            kind: FormatKind::Uuid,
            fields,
        }
    }
}

pub struct PasswordValidator;

impl FieldValidator for PasswordValidator {
    fn tag(&self) -> Tag {
        Tag::Password
    }

    fn is_invalid(&self, value: &FieldValue<'_>) -> bool {
        value.as_text().is_some_and(|s| s.chars().count() < MIN_PASSWORD_LEN)
    }

    fn reject(&self, fields: Vec<String>) -> FieldError {
        FieldError::InvalidFormat {
            kind: FormatKind::Password,
            fields,
        }
    }
}

/// Final stage: decodes the rule tree through the validating wire codec.
///
/// Unlike the other stages it stops at the first field and hands back the
/// codec error unchanged.
pub struct RuleTreeValidator;

impl RuleTreeValidator {
    pub fn decode(&self, name: &str, value: &FieldValue<'_>) -> Result<RuleNode, FieldError> {
        match value {
            FieldValue::Raw(Some(raw)) => Ok(wire::decode(raw.get().as_bytes())?),
            _ => Err(FieldError::MissingRequiredField(vec![name.to_string()])),
        }
    }
}
