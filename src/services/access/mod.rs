pub mod engine;
pub mod policy;
pub mod scope;

pub use engine::{AccessDecision, AccessEngine, build_access_engine};
pub use policy::{AdminRole, PermitAllStudies, StudyAccessPolicy};
pub use scope::{Operation, ResourceScope, ScopeRule};
