pub mod access_jwt;
pub mod factory;
pub mod identity;

pub use access_jwt::{TokenAuthenticator, TokenError, bearer_token};
pub use factory::build_token_authenticator;
pub use identity::Identity;
