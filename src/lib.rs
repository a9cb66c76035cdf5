//! # GridPass Smart Charging
//!
//! Charging plan negotiator and site-capacity scheduler for an
//! EV-charging product: given a vehicle's state of charge, a deadline, a
//! site's power budget and multiple candidate stations/tariffs, pick a
//! station, construct a time-phased power schedule that meets the
//! deadline without exceeding shared capacity, price it, and reserve a
//! connector, atomically and recoverably.
//!
//! ## Architecture
//!
//! - **domain**: Core entities, slot arithmetic and the error taxonomy
//! - **application**: Catalog, tariff book, capacity ledger, plan
//!   builder, negotiator and reservation manager
//! - **infrastructure**: Demo implementations of the external
//!   authentication/anchoring ports and seed reference data
//! - **interfaces**: REST API with Swagger documentation
//! - **notifications**: Real-time event bus for UI subscribers
//! - **shared**: Shutdown coordination and retry helpers

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod notifications;
pub mod shared;

pub use config::{default_config_path, AppConfig};

// Re-export the engine's main entry points for easy access
pub use application::{
    Negotiator, NegotiatorConfig, PlanBuilder, PlannerConfig, ReservationManager, StationCatalog,
    TariffBook,
};
pub use application::{CapacityLedger, SharedCapacityLedger};

// Re-export API router
pub use interfaces::http::create_api_router;

// Re-export notifications
pub use notifications::{create_event_bus, Event, EventBus, SharedEventBus};
