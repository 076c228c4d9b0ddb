//! Resource scopes.
//!
//! A scope is derived only from the matched route and its method, never from
//! the request body or anything the backend says.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => f.write_str("read"),
            Operation::Write => f.write_str("write"),
        }
    }
}

/// How a registered route is classified for access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRule {
    /// No authentication, no authorization.
    Public,
    /// Global resource; admin only.
    Misc,
    /// Bound to the `{study_id}` path parameter.
    Study(Operation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceScope {
    Study {
        study_id: String,
        operation: Operation,
    },
    Misc {
        /// Route template, used to name the resource in denials.
        resource: &'static str,
    },
}

impl ResourceScope {
    pub fn class(&self) -> &'static str {
        match self {
            ResourceScope::Study { .. } => "study",
            ResourceScope::Misc { .. } => "misc",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ResourceScope::Study {
                study_id,
                operation,
            } => format!("study {study_id} ({operation})"),
            ResourceScope::Misc { resource } => (*resource).to_string(),
        }
    }
}

/// Resolve the scope of a matched route.
///
/// `study_id` is the value of the route's `{study_id}` parameter. Public
/// routes have no scope; a study rule without a study id cannot be resolved.
pub fn resolve(
    rule: ScopeRule,
    template: &'static str,
    study_id: Option<&str>,
) -> Option<ResourceScope> {
    match rule {
        ScopeRule::Public => None,
        ScopeRule::Misc => Some(ResourceScope::Misc { resource: template }),
        ScopeRule::Study(operation) => study_id.map(|id| ResourceScope::Study {
            study_id: id.to_string(),
            operation,
        }),
    }
}
