//! Rule tree vocabulary: node kinds, operators, metrics and marketplaces.
//!
//! A policy's effect is a binary decision tree. Internal nodes are
//! [`Condition`]s gating a metric on a `[min, max)` window, leaves are
//! [`Terminal`]s carrying the bid adjustment to apply.

use serde::{Deserialize, Serialize};

use crate::error::RuleError;

// =====================================================
// Discriminators & Vocabulary
// =====================================================

pub const CONDITION_TYPE: &str = "condition";
pub const TERMINAL_TYPE: &str = "terminal";

pub const RULE_NODE_TYPES: &[&str] = &[CONDITION_TYPE, TERMINAL_TYPE];

pub const OP_ADD: &str = "add";
pub const OP_MUL: &str = "mul";

pub const OPERATOR_TYPES: &[&str] = &[OP_ADD, OP_MUL];

/// Metrics a condition may gate on.
pub const VARIABLES: &[&str] = &[
    "impressions",
    "clicks",
    "ctr",
    "spend",
    "cpc",
    "orders",
    "sales",
    "acos",
    "roas",
];

pub const MARKETPLACES: &[&str] = &["UK", "DE", "FR", "IT", "ES", "US", "CA", "MX"];

/// The only policy shape currently supported.
pub const NESTED_POLICY_TYPE: &str = "nested";

pub const POLICY_TYPES: &[&str] = &[NESTED_POLICY_TYPE];

pub fn is_valid_rule_node_type(tag: &str) -> bool {
    RULE_NODE_TYPES.contains(&tag)
}

pub fn is_valid_operator_type(name: &str) -> bool {
    OPERATOR_TYPES.contains(&name)
}

pub fn is_valid_variable(name: &str) -> bool {
    VARIABLES.contains(&name)
}

pub fn is_valid_marketplace(code: &str) -> bool {
    MARKETPLACES.contains(&code)
}

pub fn is_valid_policy_type(tag: &str) -> bool {
    POLICY_TYPES.contains(&tag)
}

// =====================================================
// Tree Types
// =====================================================

/// A node of the rule tree. Serialization always emits `type` first.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleNode {
    Condition(Condition),
    Terminal(Terminal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub variable: String,
    pub min: f64,
    pub max: f64,
    /// `None` only for trees read back from storage with a missing branch.
    pub if_branch: Option<Box<RuleNode>>,
    pub else_branch: Option<Box<RuleNode>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Terminal {
    pub op: RuleOp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleOp {
    #[serde(rename = "type")]
    pub op_type: String,
    pub amount: RuleAmount,
}

/// Adjustment magnitude. Deliberately unvalidated beyond its shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleAmount {
    pub neg: bool,
    pub amount: f64,
    pub perc: bool,
}

impl RuleNode {
    /// The discriminator this node serializes with.
    pub fn node_type(&self) -> &'static str {
        match self {
            RuleNode::Condition(_) => CONDITION_TYPE,
            RuleNode::Terminal(_) => TERMINAL_TYPE,
        }
    }

    /// Structural nesting depth; a lone terminal has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            RuleNode::Terminal(_) => 1,
            RuleNode::Condition(c) => {
                let if_depth = c.if_branch.as_ref().map_or(0, |n| n.depth());
                let else_depth = c.else_branch.as_ref().map_or(0, |n| n.depth());
                1 + if_depth.max(else_depth)
            }
        }
    }
}

impl Condition {
    /// Builds a condition with both branches, enforcing the metric set and
    /// `min < max`.
    pub fn new(
        variable: impl Into<String>,
        min: f64,
        max: f64,
        if_branch: RuleNode,
        else_branch: RuleNode,
    ) -> Result<Self, RuleError> {
        let condition = Condition {
            variable: variable.into(),
            min,
            max,
            if_branch: Some(Box::new(if_branch)),
            else_branch: Some(Box::new(else_branch)),
        };
        condition.check()?;
        Ok(condition)
    }

    /// Semantic checks shared with the wire decoder. Range comes first so
    /// that an out-of-order window is reported even for unknown metrics.
    pub(crate) fn check(&self) -> Result<(), RuleError> {
        // Written as a negation so NaN bounds are rejected too.
        if !(self.min < self.max) {
            return Err(RuleError::InvalidRange {
                min: self.min,
                max: self.max,
            });
        }
        if !is_valid_variable(&self.variable) {
            return Err(RuleError::InvalidVariable(self.variable.clone()));
        }
        Ok(())
    }
}

impl Terminal {
    pub fn new(op_type: impl Into<String>, amount: RuleAmount) -> Result<Self, RuleError> {
        let terminal = Terminal {
            op: RuleOp {
                op_type: op_type.into(),
                amount,
            },
        };
        terminal.check()?;
        Ok(terminal)
    }

    pub(crate) fn check(&self) -> Result<(), RuleError> {
        if !is_valid_operator_type(&self.op.op_type) {
            return Err(RuleError::InvalidOperatorType(self.op.op_type.clone()));
        }
        Ok(())
    }
}

impl From<Condition> for RuleNode {
    fn from(c: Condition) -> Self {
        RuleNode::Condition(c)
    }
}

impl From<Terminal> for RuleNode {
    fn from(t: Terminal) -> Self {
        RuleNode::Terminal(t)
    }
}
