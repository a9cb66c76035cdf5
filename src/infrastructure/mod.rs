//! Infrastructure layer - external collaborators and reference data

pub mod anchor;
pub mod auth;
pub mod seed;

pub use anchor::LocalPlanAnchor;
pub use auth::DemoAuthenticator;
pub use seed::load_demo_data;
