//! REST API interface

pub mod common;
pub mod dto;
pub mod handlers;
pub mod router;

pub use common::{ApiResponse, ValidatedJson};
pub use router::{create_api_router, ApiDoc};
