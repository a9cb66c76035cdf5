pub mod booking;
pub mod capacity;
pub mod catalog;
pub mod negotiator;
pub mod planner;
pub mod ports;
pub mod tariffs;

// Re-export key types for convenience
pub use booking::{BookingConfig, BookingRequest, ReservationManager, SharedReservationManager};
pub use capacity::{
    draws_for_plan, start_slot_expiry_task, CapacityLedger, SharedCapacityLedger, SlotDraw,
};
pub use catalog::{ConnectorHandle, SharedStationCatalog, StationCatalog};
pub use negotiator::{
    NegotiationRequest, Negotiator, NegotiatorConfig, PricingSummary, Recommendation,
    StationSnapshot,
};
pub use planner::{PlanBuilder, PlannerConfig};
pub use ports::{AnchorError, AnchorReceipt, AuthError, AuthGrant, Authenticator, PlanAnchor};
pub use tariffs::{SharedTariffBook, TariffBook};
