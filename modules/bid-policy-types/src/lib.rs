//! Shared types for the bid policy service and its RPC clients.
//!
//! The rule tree model lives in [`rules`]; [`wire`] and [`document`] are the
//! two independent codecs for it (API JSON and stored documents).

pub mod document;
pub mod error;
pub mod rules;
pub mod wire;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;

pub use error::{Branch, DocumentError, RuleError};
pub use rules::*;

// =====================================================
// Domain Types
// =====================================================

/// A named bidding policy owned by one user in one marketplace.
///
/// Decoding this type runs the rule tree through the validating wire codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    pub marketplace: String,
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: String,
    pub rules: Option<RuleNode>,
}

// =====================================================
// RPC Request Types
// =====================================================

/// Body of `POST /policies`. Every field defaults to empty so that missing
/// fields surface as validation failures rather than decode errors.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreatePolicyRequest {
    #[serde(default)]
    pub marketplace: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub policy_type: String,
    #[serde(default)]
    pub rules: Option<Box<RawValue>>,
}

/// Body of `PUT /policies/:id`. Marketplace and type are immutable.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdatePolicyRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rules: Option<Box<RawValue>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListPoliciesQuery {
    pub marketplace: Option<String>,
}

// =====================================================
// RPC Response Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// =====================================================
// Service Status
// =====================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            error: None,
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            error: Some(error.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub uptime_secs: u64,
    pub components: BTreeMap<String, ComponentHealth>,
}
