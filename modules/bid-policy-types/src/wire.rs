//! API (JSON wire) form of the rule tree.
//!
//! Decoding here is the validating path: every node is checked against the
//! rule vocabulary and both branches of a condition are mandatory. The
//! `Deserialize` impl for [`RuleNode`] routes through [`decode`], so any
//! JSON-encoded policy is re-validated when read.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{Branch, RuleError};
use crate::rules::{CONDITION_TYPE, Condition, RuleNode, RuleOp, TERMINAL_TYPE, Terminal};

#[derive(Deserialize)]
struct NodeHeader {
    #[serde(default, rename = "type")]
    node_type: Option<String>,
}

#[derive(Deserialize)]
struct TerminalWire {
    #[serde(default)]
    op: RuleOp,
}

#[derive(Deserialize)]
struct ConditionWire {
    #[serde(default)]
    variable: String,
    #[serde(default)]
    min: f64,
    #[serde(default)]
    max: f64,
    #[serde(default, rename = "if")]
    if_branch: Option<Box<RawValue>>,
    #[serde(default, rename = "else")]
    else_branch: Option<Box<RawValue>>,
}

fn malformed(e: serde_json::Error) -> RuleError {
    RuleError::Malformed(e.to_string())
}

/// Decodes and validates a rule tree from raw JSON bytes.
///
/// Only the `type` field is read first; the rest of the node is decoded once
/// the variant is known.
pub fn decode(bytes: &[u8]) -> Result<RuleNode, RuleError> {
    let header: NodeHeader = serde_json::from_slice(bytes).map_err(malformed)?;
    match header.node_type.as_deref().unwrap_or_default() {
        "" => Err(RuleError::MissingNodeType),
        TERMINAL_TYPE => decode_terminal(bytes),
        CONDITION_TYPE => decode_condition(bytes),
        other => Err(RuleError::InvalidNodeType(other.to_string())),
    }
}

fn decode_terminal(bytes: &[u8]) -> Result<RuleNode, RuleError> {
    let wire: TerminalWire = serde_json::from_slice(bytes).map_err(malformed)?;
    let terminal = Terminal { op: wire.op };
    terminal.check()?;
    Ok(RuleNode::Terminal(terminal))
}

fn decode_condition(bytes: &[u8]) -> Result<RuleNode, RuleError> {
    let wire: ConditionWire = serde_json::from_slice(bytes).map_err(malformed)?;

    let if_branch = decode_branch(wire.if_branch, Branch::If)?;
    let else_branch = decode_branch(wire.else_branch, Branch::Else)?;

    let condition = Condition {
        variable: wire.variable,
        min: wire.min,
        max: wire.max,
        if_branch: Some(if_branch),
        else_branch: Some(else_branch),
    };
    condition.check()?;
    Ok(RuleNode::Condition(condition))
}

fn decode_branch(raw: Option<Box<RawValue>>, side: Branch) -> Result<Box<RuleNode>, RuleError> {
    let raw = raw.ok_or(RuleError::MissingBranch(side))?;
    decode(raw.get().as_bytes())
        .map(Box::new)
        .map_err(|e| e.in_branch(side))
}

/// Encodes a tree in wire form. Performs no validation.
pub fn encode(node: &RuleNode) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(node)
}

impl Serialize for RuleNode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            RuleNode::Terminal(t) => {
                let mut state = serializer.serialize_struct("Terminal", 2)?;
                state.serialize_field("type", TERMINAL_TYPE)?;
                state.serialize_field("op", &t.op)?;
                state.end()
            }
            RuleNode::Condition(c) => {
                let mut state = serializer.serialize_struct("Condition", 6)?;
                state.serialize_field("type", CONDITION_TYPE)?;
                state.serialize_field("variable", &c.variable)?;
                state.serialize_field("min", &c.min)?;
                state.serialize_field("max", &c.max)?;
                state.serialize_field("if", &c.if_branch)?;
                state.serialize_field("else", &c.else_branch)?;
                state.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for RuleNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        decode(raw.get().as_bytes()).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{OP_ADD, OP_MUL, RuleAmount};
    use serde_json::json;

    fn scenario(variable: &str, min: f64, max: f64) -> serde_json::Value {
        json!({
            "type": "condition",
            "variable": variable,
            "min": min,
            "max": max,
            "if": {"type": "terminal", "op": {"type": "add", "amount": {"neg": false, "amount": 0.02, "perc": true}}},
            "else": {"type": "terminal", "op": {"type": "mul", "amount": {"neg": true, "amount": 0.1, "perc": false}}}
        })
    }

    fn decode_value(v: &serde_json::Value) -> Result<RuleNode, RuleError> {
        decode(v.to_string().as_bytes())
    }

    fn terminal(op: &str, amount: f64) -> RuleNode {
        RuleNode::Terminal(Terminal {
            op: RuleOp {
                op_type: op.to_string(),
                amount: RuleAmount {
                    neg: false,
                    amount,
                    perc: true,
                },
            },
        })
    }

    /// Left-leaning chain of conditions `levels` deep above a terminal pair.
    fn nested(levels: usize) -> RuleNode {
        let mut node = terminal(OP_ADD, 1.0);
        for i in 0..levels {
            node = Condition::new(
                "spend",
                i as f64,
                i as f64 + 0.5,
                node,
                terminal(OP_MUL, i as f64 * 0.25),
            )
            .unwrap()
            .into();
        }
        node
    }

    #[test]
    fn test_scenario_a_decodes_condition_with_two_terminals() {
        let node = decode_value(&scenario("ctr", 0.01, 0.05)).unwrap();
        let RuleNode::Condition(c) = node else {
            panic!("expected condition");
        };
        assert_eq!(c.variable, "ctr");
        assert_eq!(c.min, 0.01);
        assert_eq!(c.max, 0.05);
        match c.if_branch.as_deref() {
            Some(RuleNode::Terminal(t)) => {
                assert_eq!(t.op.op_type, "add");
                assert!(t.op.amount.perc);
                assert_eq!(t.op.amount.amount, 0.02);
            }
            other => panic!("unexpected if branch: {:?}", other),
        }
        match c.else_branch.as_deref() {
            Some(RuleNode::Terminal(t)) => {
                assert_eq!(t.op.op_type, "mul");
                assert!(t.op.amount.neg);
            }
            other => panic!("unexpected else branch: {:?}", other),
        }
    }

    #[test]
    fn test_scenario_b_rejects_unknown_variable() {
        let err = decode_value(&scenario("bogus", 0.01, 0.05)).unwrap_err();
        assert_eq!(err, RuleError::InvalidVariable("bogus".to_string()));
    }

    #[test]
    fn test_scenario_c_rejects_inverted_range() {
        let err = decode_value(&scenario("ctr", 0.5, 0.2)).unwrap_err();
        assert_eq!(err, RuleError::InvalidRange { min: 0.5, max: 0.2 });
    }

    #[test]
    fn test_missing_and_unknown_node_type() {
        assert_eq!(decode(br#"{"op":{}}"#).unwrap_err(), RuleError::MissingNodeType);
        assert_eq!(decode(br#"{"type":""}"#).unwrap_err(), RuleError::MissingNodeType);

        let err = decode(br#"{"type":"branch"}"#).unwrap_err();
        assert_eq!(err, RuleError::InvalidNodeType("branch".to_string()));
        let msg = err.to_string();
        assert!(msg.contains("branch"));
        assert!(msg.contains("condition, terminal"));
    }

    #[test]
    fn test_unknown_operator_is_echoed() {
        let err = decode(br#"{"type":"terminal","op":{"type":"pow","amount":{"neg":false,"amount":1,"perc":false}}}"#)
            .unwrap_err();
        assert_eq!(err, RuleError::InvalidOperatorType("pow".to_string()));
    }

    #[test]
    fn test_absent_or_null_branch_is_missing() {
        let mut v = scenario("ctr", 0.01, 0.05);
        v.as_object_mut().unwrap().remove("else");
        assert_eq!(
            decode_value(&v).unwrap_err(),
            RuleError::MissingBranch(Branch::Else)
        );

        let mut v = scenario("ctr", 0.01, 0.05);
        v["if"] = serde_json::Value::Null;
        assert_eq!(
            decode_value(&v).unwrap_err(),
            RuleError::MissingBranch(Branch::If)
        );
    }

    #[test]
    fn test_nested_errors_are_annotated_with_branch() {
        let mut v = scenario("ctr", 0.01, 0.05);
        v["else"] = scenario("acos", 0.01, 0.05);
        v["else"]["if"]["op"]["type"] = json!("sub");

        let err = decode_value(&v).unwrap_err();
        assert_eq!(err.to_string(), "else->if->invalid operator type: sub. Must be one of: add, mul");
        assert_eq!(err.path(), vec![Branch::Else, Branch::If]);
        assert_eq!(err.root_cause(), &RuleError::InvalidOperatorType("sub".into()));
    }

    #[test]
    fn test_branches_decoded_before_range_check() {
        let mut v = scenario("ctr", 0.9, 0.1);
        v.as_object_mut().unwrap().remove("if");
        assert_eq!(
            decode_value(&v).unwrap_err(),
            RuleError::MissingBranch(Branch::If)
        );
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(decode(b"{\"type\":"), Err(RuleError::Malformed(_))));
        assert!(matches!(
            decode(br#"{"type":"condition","variable":"ctr","min":"low","max":1}"#),
            Err(RuleError::Malformed(_))
        ));
    }

    #[test]
    fn test_encode_puts_type_first() {
        let encoded = String::from_utf8(encode(&terminal(OP_ADD, 2.0)).unwrap()).unwrap();
        assert!(encoded.starts_with(r#"{"type":"terminal","op":{"type":"add""#));

        let encoded = String::from_utf8(encode(&nested(1)).unwrap()).unwrap();
        assert!(encoded.starts_with(r#"{"type":"condition","variable":"spend""#));
    }

    #[test]
    fn test_round_trip_deep_tree() {
        for levels in [0, 1, 5, 8] {
            let tree = nested(levels);
            assert_eq!(tree.depth(), levels + 1);
            let bytes = encode(&tree).unwrap();
            assert_eq!(decode(&bytes).unwrap(), tree);
        }
    }

    #[test]
    fn test_serde_impls_use_validating_path() {
        let tree = nested(2);
        let text = serde_json::to_string(&tree).unwrap();
        let back: RuleNode = serde_json::from_str(&text).unwrap();
        assert_eq!(back, tree);

        let bad = scenario("bogus", 0.0, 1.0).to_string();
        let err = serde_json::from_str::<RuleNode>(&bad).unwrap_err();
        assert!(err.to_string().contains("invalid variable: bogus"));
    }
}
