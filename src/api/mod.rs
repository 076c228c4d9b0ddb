pub mod context;
pub mod dto;
pub mod pipeline;
pub mod routes;

pub use routes::routes;
