pub mod error;
pub mod geo;
pub mod plan;
pub mod reservation;
pub mod slot;
pub mod station;
pub mod tariff;

// Re-export commonly used types
pub use error::{BookingError, BookingResult, NegotiationError, PlanError, PlanResult};
pub use geo::GeoPoint;
pub use plan::{ChargingPlan, PlanPhase, Strategy, ENERGY_TOLERANCE_KWH};
pub use reservation::{Reservation, ReservationStatus};
pub use slot::SlotClock;
pub use station::{Connector, ConnectorStatus, PlugType, Station};
pub use tariff::{DemandTier, TariffPoint, TariffSchedule};
