pub mod access;
pub mod auth;
pub mod metadata;
pub mod proxy;
