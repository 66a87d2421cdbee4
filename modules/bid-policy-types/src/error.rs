//! Errors raised while decoding rule trees.

use std::fmt;

use thiserror::Error;

/// Which side of a condition an error or missing node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    If,
    Else,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::If => "if",
            Branch::Else => "else",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejections from the validating (API) decoder.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("missing rule node type")]
    MissingNodeType,
    #[error("invalid node type: {0}. Must be one of: condition, terminal")]
    InvalidNodeType(String),
    #[error("invalid operator type: {0}. Must be one of: add, mul")]
    InvalidOperatorType(String),
    #[error("invalid variable: {0}")]
    InvalidVariable(String),
    #[error("min must be less than max: min({min}) >= max({max})")]
    InvalidRange { min: f64, max: f64 },
    #[error("missing branch: {0}")]
    MissingBranch(Branch),
    #[error("{side}->{source}")]
    InBranch {
        side: Branch,
        source: Box<RuleError>,
    },
    #[error("malformed rule node: {0}")]
    Malformed(String),
}

impl RuleError {
    pub(crate) fn in_branch(self, side: Branch) -> Self {
        RuleError::InBranch {
            side,
            source: Box::new(self),
        }
    }

    /// The error at the bottom of any branch annotations.
    pub fn root_cause(&self) -> &RuleError {
        match self {
            RuleError::InBranch { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Branch path from the root to the failing node, e.g. `[If, Else]`.
    pub fn path(&self) -> Vec<Branch> {
        let mut path = Vec::new();
        let mut current = self;
        while let RuleError::InBranch { side, source } = current {
            path.push(*side);
            current = source;
        }
        path
    }
}

/// Failures reading back a stored rule document. These indicate corruption,
/// not a caller mistake.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    #[error("missing rule node type")]
    MissingNodeType,
    #[error("invalid rule node type: {0}")]
    InvalidNodeType(String),
    #[error("{side}->{source}")]
    InBranch {
        side: Branch,
        source: Box<DocumentError>,
    },
    #[error("decode {kind}: {cause}")]
    Malformed { kind: &'static str, cause: String },
}

impl DocumentError {
    pub(crate) fn in_branch(self, side: Branch) -> Self {
        DocumentError::InBranch {
            side,
            source: Box::new(self),
        }
    }
}
