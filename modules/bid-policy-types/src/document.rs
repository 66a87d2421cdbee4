//! Persisted document form of the rule tree.
//!
//! Stored documents were validated when they were written, so decoding here
//! only dispatches on the discriminator and rebuilds the shape. Missing
//! branches are kept as `None` rather than rejected; an unknown
//! discriminator is treated as corruption.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Branch, DocumentError};
use crate::rules::{CONDITION_TYPE, Condition, RuleNode, RuleOp, TERMINAL_TYPE, Terminal};

/// Decodes a stored rule document without re-running semantic checks.
pub fn decode(doc: &Value) -> Result<RuleNode, DocumentError> {
    let fields = doc.as_object().ok_or_else(|| DocumentError::Malformed {
        kind: "header",
        cause: format!("expected a document, found {}", kind_of(doc)),
    })?;

    match fields.get("type").and_then(Value::as_str).unwrap_or_default() {
        "" => Err(DocumentError::MissingNodeType),
        TERMINAL_TYPE => decode_terminal(fields),
        CONDITION_TYPE => decode_condition(fields),
        other => Err(DocumentError::InvalidNodeType(other.to_string())),
    }
}

/// Decodes an optional sub-document; absent and null both yield `None`.
pub fn decode_optional(doc: Option<&Value>) -> Result<Option<RuleNode>, DocumentError> {
    match doc {
        None | Some(Value::Null) => Ok(None),
        Some(doc) => decode(doc).map(Some),
    }
}

fn decode_terminal(fields: &Map<String, Value>) -> Result<RuleNode, DocumentError> {
    let op = match fields.get("op") {
        None | Some(Value::Null) => RuleOp::default(),
        Some(op) => RuleOp::deserialize(op).map_err(|e| DocumentError::Malformed {
            kind: "terminal",
            cause: e.to_string(),
        })?,
    };
    Ok(RuleNode::Terminal(Terminal { op }))
}

fn decode_condition(fields: &Map<String, Value>) -> Result<RuleNode, DocumentError> {
    let if_branch = decode_optional(fields.get("if")).map_err(|e| e.in_branch(Branch::If))?;
    let else_branch = decode_optional(fields.get("else")).map_err(|e| e.in_branch(Branch::Else))?;

    Ok(RuleNode::Condition(Condition {
        variable: string_field(fields, "variable")?,
        min: number_field(fields, "min")?,
        max: number_field(fields, "max")?,
        if_branch: if_branch.map(Box::new),
        else_branch: else_branch.map(Box::new),
    }))
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Result<String, DocumentError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(field_mismatch(name, "string", other)),
    }
}

fn number_field(fields: &Map<String, Value>, name: &str) -> Result<f64, DocumentError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(0.0),
        Some(v) => v.as_f64().ok_or_else(|| field_mismatch(name, "number", v)),
    }
}

fn field_mismatch(name: &str, expected: &str, found: &Value) -> DocumentError {
    DocumentError::Malformed {
        kind: "condition",
        cause: format!("field '{}' expected {}, found {}", name, expected, kind_of(found)),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "document",
    }
}

/// Encodes a tree as a storable document. Total and unvalidated; `type` is
/// always the first key.
pub fn encode(node: &RuleNode) -> Value {
    let mut doc = Map::new();
    doc.insert("type".to_string(), Value::from(node.node_type()));
    match node {
        RuleNode::Terminal(t) => {
            let mut amount = Map::new();
            amount.insert("neg".to_string(), Value::Bool(t.op.amount.neg));
            amount.insert("amount".to_string(), Value::from(t.op.amount.amount));
            amount.insert("perc".to_string(), Value::Bool(t.op.amount.perc));

            let mut op = Map::new();
            op.insert("type".to_string(), Value::from(t.op.op_type.as_str()));
            op.insert("amount".to_string(), Value::Object(amount));
            doc.insert("op".to_string(), Value::Object(op));
        }
        RuleNode::Condition(c) => {
            doc.insert("variable".to_string(), Value::from(c.variable.as_str()));
            doc.insert("min".to_string(), Value::from(c.min));
            doc.insert("max".to_string(), Value::from(c.max));
            // Absent branches are omitted entirely, mirroring how they decode.
            if let Some(node) = &c.if_branch {
                doc.insert("if".to_string(), encode(node));
            }
            if let Some(node) = &c.else_branch {
                doc.insert("else".to_string(), encode(node));
            }
        }
    }
    Value::Object(doc)
}
