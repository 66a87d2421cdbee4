//! Request payload validation.
//!
//! Each payload type declares which checks apply to which of its fields via
//! [`Validate::FIELDS`]. The pipeline runs its stages in a fixed order, each
//! stage reporting every offending field, and stops at the first stage that
//! fails. The last stage decodes the rule tree, and the decoded tree is
//! returned alongside the payload in [`Validated`].

mod requests;
pub mod validators;

use bid_policy_types::RuleNode;
use once_cell::sync::Lazy;
use serde_json::value::RawValue;

use crate::error::FieldError;
use validators::{
    EmailValidator, FieldValidator, MarketplaceValidator, PasswordValidator, PolicyTypeValidator,
    RequiredValidator, RuleTreeValidator, UuidValidator,
};

/// Check a field opts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Required,
    Email,
    Uuid,
    Password,
    Marketplace,
    Type,
    Rules,
}

/// Declaration of one payload field and the checks it takes.
#[derive(Debug)]
pub struct FieldDef {
    pub name: &'static str,
    pub tags: &'static [Tag],
}

impl FieldDef {
    pub fn has(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Borrowed view of a field value.
#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'a> {
    Text(&'a str),
    /// Unparsed JSON; `None` when absent or null.
    Raw(Option<&'a RawValue>),
}

impl<'a> FieldValue<'a> {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Raw(raw) => raw.is_none(),
        }
    }

    pub fn as_text(&self) -> Option<&'a str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Raw(_) => None,
        }
    }
}

/// A payload the pipeline knows how to inspect.
pub trait Validate {
    /// Field declarations, in the order offending fields are reported.
    const FIELDS: &'static [FieldDef];

    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

/// A payload that passed every stage, with its rule tree already decoded.
#[derive(Debug)]
pub struct Validated<T> {
    pub body: T,
    pub rules: Option<RuleNode>,
}

pub struct ValidationPipeline {
    stages: Vec<Box<dyn FieldValidator>>,
    rule_tree: RuleTreeValidator,
}

impl ValidationPipeline {
    /// The standard stage order: required, marketplace, policy type, email,
    /// UUID, password, then the rule tree.
    pub fn standard() -> Self {
        Self {
            stages: vec![
                Box::new(RequiredValidator),
                Box::new(MarketplaceValidator),
                Box::new(PolicyTypeValidator),
                Box::new(EmailValidator),
                Box::new(UuidValidator),
                Box::new(PasswordValidator),
            ],
            rule_tree: RuleTreeValidator,
        }
    }

    pub fn run<T: Validate>(&self, body: T) -> Result<Validated<T>, FieldError> {
        for stage in &self.stages {
            let offending: Vec<String> = T::FIELDS
                .iter()
                .filter(|def| def.has(stage.tag()))
                .filter(|def| {
                    body.field(def.name)
                        .is_some_and(|value| stage.is_invalid(&value))
                })
                .map(|def| def.name.to_string())
                .collect();

            if !offending.is_empty() {
                let err = stage.reject(offending);
                log::debug!("[VALIDATION] {:?} stage rejected payload: {}", stage.tag(), err);
                return Err(err);
            }
        }

        let mut rules = None;
        for def in T::FIELDS.iter().filter(|def| def.has(Tag::Rules)) {
            let value = body.field(def.name).unwrap_or(FieldValue::Raw(None));
            match self.rule_tree.decode(def.name, &value) {
                Ok(tree) => rules = Some(tree),
                Err(err) => {
                    log::debug!("[VALIDATION] rule tree rejected: {}", err);
                    return Err(err);
                }
            }
        }

        Ok(Validated { body, rules })
    }
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::standard()
    }
}

static PIPELINE: Lazy<ValidationPipeline> = Lazy::new(ValidationPipeline::standard);

/// Runs the standard pipeline over a payload.
pub fn validate<T: Validate>(body: T) -> Result<Validated<T>, FieldError> {
    PIPELINE.run(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormatKind;
    use bid_policy_types::{Branch, RuleError};

    /// Payload exercising every stage.
    #[derive(Debug, Default)]
    struct AccountForm {
        email: String,
        backup_email: String,
        owner: String,
        password: String,
        marketplace: String,
        kind: String,
        rules: Option<Box<RawValue>>,
    }

    impl Validate for AccountForm {
        const FIELDS: &'static [FieldDef] = &[
            FieldDef { name: "email", tags: &[Tag::Required, Tag::Email] },
            FieldDef { name: "backup_email", tags: &[Tag::Email] },
            FieldDef { name: "owner", tags: &[Tag::Required, Tag::Uuid] },
            FieldDef { name: "password", tags: &[Tag::Required, Tag::Password] },
            FieldDef { name: "marketplace", tags: &[Tag::Required, Tag::Marketplace] },
            FieldDef { name: "type", tags: &[Tag::Required, Tag::Type] },
            FieldDef { name: "rules", tags: &[Tag::Rules] },
        ];

        fn field(&self, name: &str) -> Option<FieldValue<'_>> {
            Some(match name {
                "email" => FieldValue::Text(&self.email),
                "backup_email" => FieldValue::Text(&self.backup_email),
                "owner" => FieldValue::Text(&self.owner),
                "password" => FieldValue::Text(&self.password),
                "marketplace" => FieldValue::Text(&self.marketplace),
                "type" => FieldValue::Text(&self.kind),
                "rules" => FieldValue::Raw(self.rules.as_deref()),
                _ => return None,
            })
        }
    }

    const TERMINAL: &str =
        r#"{"type":"terminal","op":{"type":"add","amount":{"neg":false,"amount":5,"perc":true}}}"#;

    fn raw(json: &str) -> Option<Box<RawValue>> {
        Some(RawValue::from_string(json.to_string()).unwrap())
    }

    fn valid_form() -> AccountForm {
        AccountForm {
            email: "ops@example.com".into(),
            backup_email: "oncall@example.com".into(),
            owner: "67e55044-10b1-426f-9247-bb680e5fe0c8".into(),
            password: "correct horse".into(),
            marketplace: "DE".into(),
            kind: "nested".into(),
            rules: raw(TERMINAL),
        }
    }

    #[test]
    fn test_valid_payload_passes_with_decoded_tree() {
        let validated = validate(valid_form()).unwrap();
        assert!(matches!(validated.rules, Some(RuleNode::Terminal(_))));
        assert_eq!(validated.body.marketplace, "DE");
    }

    #[test]
    fn test_required_reports_every_missing_field() {
        let err = validate(AccountForm::default()).unwrap_err();
        assert_eq!(
            err,
            FieldError::MissingRequiredField(vec![
                "email".into(),
                "owner".into(),
                "password".into(),
                "marketplace".into(),
                "type".into(),
            ])
        );
        assert_eq!(err.to_string(), "email, owner, password, marketplace, type required");
    }

    #[test]
    fn test_stages_short_circuit_in_order() {
        let mut form = valid_form();
        form.marketplace = "JP".into();
        form.kind = "flat".into();
        form.email = "nope".into();
        let err = validate(form).unwrap_err();
        assert_eq!(err, FieldError::InvalidMarketplace(vec!["marketplace".into()]));
        assert_eq!(
            err.to_string(),
            "marketplace must be one of: UK, DE, FR, IT, ES, US, CA, MX"
        );

        let mut form = valid_form();
        form.kind = "flat".into();
        form.email = "nope".into();
        let err = validate(form).unwrap_err();
        assert_eq!(err.to_string(), "type must be one of: nested");

        let mut form = valid_form();
        form.email = "nope".into();
        form.backup_email = "also nope".into();
        form.owner = "123".into();
        let err = validate(form).unwrap_err();
        assert_eq!(
            err,
            FieldError::InvalidFormat {
                kind: FormatKind::Email,
                fields: vec!["email".into(), "backup_email".into()],
            }
        );
        assert_eq!(err.to_string(), "email, backup_email must be valid email address(es)");
    }

    #[test]
    fn test_empty_optional_format_field_is_rejected() {
        let mut form = valid_form();
        form.backup_email = String::new();
        assert_eq!(
            validate(form).unwrap_err(),
            FieldError::InvalidFormat {
                kind: FormatKind::Email,
                fields: vec!["backup_email".into()],
            }
        );
    }

    #[test]
    fn test_uuid_then_password() {
        let mut form = valid_form();
        form.owner = "123".into();
        form.password = "short".into();
        let err = validate(form).unwrap_err();
        assert_eq!(err.to_string(), "owner must be valid UUID(s)");

        let mut form = valid_form();
        form.password = "short".into();
        let err = validate(form).unwrap_err();
        assert_eq!(err.to_string(), "password must be at least 8 characters");
    }

    #[test]
    fn test_rule_stage_runs_last() {
        let mut form = valid_form();
        form.rules = None;
        assert_eq!(
            validate(form).unwrap_err(),
            FieldError::MissingRequiredField(vec!["rules".into()])
        );

        // A bad tree is only reported once everything else passes.
        let mut form = valid_form();
        form.password = "short".into();
        form.rules = raw(r#"{"type":"nope"}"#);
        assert!(matches!(
            validate(form).unwrap_err(),
            FieldError::InvalidFormat { kind: FormatKind::Password, .. }
        ));
    }

    #[test]
    fn test_codec_error_is_returned_verbatim() {
        let mut form = valid_form();
        form.rules = raw(
            r#"{"type":"condition","variable":"ctr","min":0.1,"max":0.2,
                "if":{"type":"terminal","op":{"type":"add"}},
                "else":{"type":"condition","variable":"cpc","min":0,"max":1,"if":null,"else":null}}"#,
        );
        let err = validate(form).unwrap_err();
        let expected = RuleError::MissingBranch(Branch::If);
        match &err {
            FieldError::Rules(e) => {
                assert_eq!(e.root_cause(), &expected);
                assert_eq!(e.path(), vec![Branch::Else]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.to_string(), "else->missing branch: if");
        assert!(err.fields().is_empty());
    }
}
