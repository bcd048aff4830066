//! Prepared contract calls handed to the profiler.
//!
//! A `PreparedCall` is a plain value: by the time it reaches the profiler it
//! already carries its arguments, caller, and any authorization witnesses.
//! The suites construct these through the connection's collaborator wrappers.

use serde::{Deserialize, Serialize};

/// Suffix marking a function whose profiling attempt failed.
const FAILED_SUFFIX: &str = " (FAILED)";

/// Opaque signed capability permitting one party to act on another's behalf.
/// Created by the platform; attached to a call verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthWitness(pub String);

/// A wallet-bound contract function call, ready to estimate, profile, and
/// submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedCall {
    /// Declared function name, when the artifact resolves one.
    pub name: Option<String>,
    /// Function selector; always present.
    pub selector: String,
    /// Target contract address.
    pub contract: String,
    /// Sending account address.
    pub caller: String,
    /// JSON-encoded call arguments, passed through to the platform.
    pub args: serde_json::Value,
    /// Credentials attached to the call.
    pub authwits: Vec<AuthWitness>,
}

impl PreparedCall {
    pub fn new(
        name: impl Into<String>,
        selector: impl Into<String>,
        contract: impl Into<String>,
        caller: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        PreparedCall {
            name: Some(name.into()),
            selector: selector.into(),
            contract: contract.into(),
            caller: caller.into(),
            args,
            authwits: Vec::new(),
        }
    }

    pub fn with_authwit(mut self, witness: AuthWitness) -> Self {
        self.authwits.push(witness);
        self
    }

    /// Human-readable name for reporting: the declared function name, or a
    /// synthetic one derived from the selector when the name is unavailable.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => unresolved_name(&self.selector),
        }
    }
}

pub fn failed_name(resolved: &str) -> String {
    format!("{resolved}{FAILED_SUFFIX}")
}

pub fn is_failed_name(name: &str) -> bool {
    name.ends_with(FAILED_SUFFIX)
}

pub fn unresolved_name(selector: &str) -> String {
    format!("unresolved({selector})")
}

pub fn is_unresolved_name(name: &str) -> bool {
    name.starts_with("unresolved(") && name.ends_with(')')
}
