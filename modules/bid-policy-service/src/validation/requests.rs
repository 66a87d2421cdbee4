use bid_policy_types::{CreatePolicyRequest, UpdatePolicyRequest};

use super::{FieldDef, FieldValue, Tag, Validate};

impl Validate for CreatePolicyRequest {
    const FIELDS: &'static [FieldDef] = &[
        FieldDef { name: "marketplace", tags: &[Tag::Required, Tag::Marketplace] },
        FieldDef { name: "name", tags: &[Tag::Required] },
        FieldDef { name: "type", tags: &[Tag::Required, Tag::Type] },
        FieldDef { name: "rules", tags: &[Tag::Rules] },
    ];

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "marketplace" => Some(FieldValue::Text(&self.marketplace)),
            "name" => Some(FieldValue::Text(&self.name)),
            "type" => Some(FieldValue::Text(&self.policy_type)),
            "rules" => Some(FieldValue::Raw(self.rules.as_deref())),
            _ => None,
        }
    }
}

impl Validate for UpdatePolicyRequest {
    const FIELDS: &'static [FieldDef] = &[
        FieldDef { name: "name", tags: &[Tag::Required] },
        FieldDef { name: "rules", tags: &[Tag::Rules] },
    ];

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "name" => Some(FieldValue::Text(&self.name)),
            "rules" => Some(FieldValue::Raw(self.rules.as_deref())),
            _ => None,
        }
    }
}
