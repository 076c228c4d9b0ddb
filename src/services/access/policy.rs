//! Study access predicates.
//!
//! Each predicate answers one question: may `identity` perform `operation`
//! on `study_id`? The engine asks the admin predicate first and the
//! replaceable study predicate second. A predicate backed by a remote
//! ownership check fits the same trait and may fail with ServiceUnavailable.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::services::access::scope::Operation;
use crate::services::auth::Identity;

#[async_trait]
pub trait StudyAccessPolicy: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    async fn allows(
        &self,
        operation: Operation,
        identity: &Identity,
        study_id: &str,
    ) -> Result<bool, GatewayError>;
}

/// Grants everything to holders of the configured admin role.
#[derive(Debug, Clone)]
pub struct AdminRole {
    role: String,
}

impl AdminRole {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }

    pub fn matches(&self, identity: &Identity) -> bool {
        identity.has_role(&self.role)
    }
}

#[async_trait]
impl StudyAccessPolicy for AdminRole {
    fn name(&self) -> &'static str {
        "admin-role"
    }

    async fn allows(
        &self,
        _operation: Operation,
        identity: &Identity,
        _study_id: &str,
    ) -> Result<bool, GatewayError> {
        Ok(self.matches(identity))
    }
}

/// Temporary study predicate: every authenticated caller may read and write
/// every study.
///
/// TODO: replace with a per-study ownership check against the backend once it
/// exposes one; swap it in through `AccessEngine::new`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAllStudies;

#[async_trait]
impl StudyAccessPolicy for PermitAllStudies {
    fn name(&self) -> &'static str {
        "permit-all-studies"
    }

    async fn allows(
        &self,
        _operation: Operation,
        _identity: &Identity,
        _study_id: &str,
    ) -> Result<bool, GatewayError> {
        Ok(true)
    }
}
