use std::sync::Arc;

use crate::config::Config;
use crate::error::GatewayError;
use crate::services::access::policy::{AdminRole, PermitAllStudies, StudyAccessPolicy};
use crate::services::access::scope::ResourceScope;
use crate::services::auth::Identity;

const MISC_REQUIRES_ADMIN: &str = "misc resource access requires admin";
const STUDY_NOT_GRANTED: &str = "study access not granted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub denial_reason: Option<String>,
}

impl AccessDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            denial_reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            denial_reason: Some(reason.into()),
        }
    }
}

/// Allow/deny decisions per resource class.
///
/// - Misc: admin role only.
/// - Study: admin role, or whatever the study predicate grants.
pub struct AccessEngine {
    admin: AdminRole,
    study_policy: Arc<dyn StudyAccessPolicy>,
}

impl std::fmt::Debug for AccessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessEngine")
            .field("admin", &self.admin)
            .field("study_policy", &self.study_policy.name())
            .finish()
    }
}

impl AccessEngine {
    pub fn new(admin_role: impl Into<String>, study_policy: Arc<dyn StudyAccessPolicy>) -> Self {
        Self {
            admin: AdminRole::new(admin_role),
            study_policy,
        }
    }

    pub async fn decide(
        &self,
        identity: &Identity,
        scope: &ResourceScope,
    ) -> Result<AccessDecision, GatewayError> {
        match scope {
            ResourceScope::Misc { .. } => {
                if self.admin.matches(identity) {
                    Ok(AccessDecision::allow())
                } else {
                    Ok(AccessDecision::deny(MISC_REQUIRES_ADMIN))
                }
            }
            ResourceScope::Study {
                study_id,
                operation,
            } => {
                // admin short-circuits; the study predicate is not consulted
                if self.admin.allows(*operation, identity, study_id).await?
                    || self
                        .study_policy
                        .allows(*operation, identity, study_id)
                        .await?
                {
                    Ok(AccessDecision::allow())
                } else {
                    Ok(AccessDecision::deny(STUDY_NOT_GRANTED))
                }
            }
        }
    }

    /// Decide, turning a denial into `Forbidden`.
    pub async fn authorize(
        &self,
        identity: &Identity,
        scope: &ResourceScope,
    ) -> Result<AccessDecision, GatewayError> {
        let decision = self.decide(identity, scope).await?;
        if decision.allowed {
            tracing::debug!(
                subject = %identity.subject,
                scope = %scope.describe(),
                "access allowed"
            );
            return Ok(decision);
        }

        tracing::warn!(
            subject = %identity.subject,
            scope = %scope.describe(),
            reason = decision.denial_reason.as_deref().unwrap_or_default(),
            "access denied"
        );
        Err(GatewayError::forbidden(format!(
            "{}: access denied to {}",
            scope.class(),
            scope.describe()
        )))
    }
}

pub fn build_access_engine(config: &Config) -> Arc<AccessEngine> {
    Arc::new(AccessEngine::new(
        config.admin_role.clone(),
        Arc::new(PermitAllStudies),
    ))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::ErrorKind;
    use crate::services::access::scope::Operation;

    fn identity(role: &str) -> Identity {
        Identity::new("user-1".into(), role.into(), i64::MAX, "token".into())
    }

    fn study(operation: Operation) -> ResourceScope {
        ResourceScope::Study {
            study_id: "ABC".to_string(),
            operation,
        }
    }

    fn misc() -> ResourceScope {
        ResourceScope::Misc {
            resource: "/entities",
        }
    }

    fn engine_with(policy: Arc<dyn StudyAccessPolicy>) -> AccessEngine {
        AccessEngine::new("ADMIN", policy)
    }

    struct DenyAll;

    #[async_trait]
    impl StudyAccessPolicy for DenyAll {
        fn name(&self) -> &'static str {
            "deny-all"
        }

        async fn allows(&self, _: Operation, _: &Identity, _: &str) -> Result<bool, GatewayError> {
            Ok(false)
        }
    }

    struct Unreachable;

    #[async_trait]
    impl StudyAccessPolicy for Unreachable {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        async fn allows(&self, _: Operation, _: &Identity, _: &str) -> Result<bool, GatewayError> {
            Err(GatewayError::service_unavailable("study service unreachable"))
        }
    }

    #[tokio::test]
    async fn admin_is_allowed_on_every_scope() {
        // even with a predicate that would deny or fail
        for policy in [
            Arc::new(DenyAll) as Arc<dyn StudyAccessPolicy>,
            Arc::new(Unreachable) as Arc<dyn StudyAccessPolicy>,
        ] {
            let engine = engine_with(policy);
            for scope in [misc(), study(Operation::Read), study(Operation::Write)] {
                let decision = engine.decide(&identity("ADMIN"), &scope).await.expect("decide");
                assert_eq!(decision, AccessDecision::allow(), "{scope:?}");
            }
        }
    }

    #[tokio::test]
    async fn non_admin_is_denied_misc() {
        let engine = engine_with(Arc::new(PermitAllStudies));
        let decision = engine.decide(&identity("USER"), &misc()).await.expect("decide");
        assert!(!decision.allowed);
        assert_eq!(
            decision.denial_reason.as_deref(),
            Some("misc resource access requires admin")
        );

        let err = engine
            .authorize(&identity("USER"), &misc())
            .await
            .expect_err("forbidden");
        assert_eq!(err.kind, ErrorKind::Forbidden);
        assert_eq!(err.message, "misc: access denied to /entities");
    }

    // Policy-dependent: reflects the current permit-all study predicate, not a
    // security guarantee.
    #[tokio::test]
    async fn non_admin_is_allowed_studies_under_permit_all() {
        let engine = engine_with(Arc::new(PermitAllStudies));
        for operation in [Operation::Read, Operation::Write] {
            let decision = engine
                .authorize(&identity("USER"), &study(operation))
                .await
                .expect("allowed");
            assert!(decision.allowed);
        }
    }

    #[tokio::test]
    async fn replacement_predicate_can_deny_studies() {
        let engine = engine_with(Arc::new(DenyAll));
        let err = engine
            .authorize(&identity("USER"), &study(Operation::Write))
            .await
            .expect_err("forbidden");
        assert_eq!(err.kind, ErrorKind::Forbidden);
        assert_eq!(err.message, "study: access denied to study ABC (write)");
    }

    #[tokio::test]
    async fn predicate_failure_propagates() {
        let engine = engine_with(Arc::new(Unreachable));
        let err = engine
            .authorize(&identity("USER"), &study(Operation::Read))
            .await
            .expect_err("unavailable");
        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
    }

    #[tokio::test]
    async fn role_match_is_exact() {
        let engine = engine_with(Arc::new(PermitAllStudies));
        let decision = engine.decide(&identity("admin"), &misc()).await.expect("decide");
        assert!(!decision.allowed);
    }
}
