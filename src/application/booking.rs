//! Reservation manager — turns accepted plans into capacity-reserved bookings
//!
//! Booking is all-or-nothing: authenticate, claim a connector, re-validate
//! and commit the plan's capacity in one per-site critical section, then
//! persist. Any failure unwinds what was already acquired; a failed unwind
//! is logged as a critical inconsistency for out-of-band reconciliation.
//! Anchoring is best-effort and never blocks a booking.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::capacity::{draws_for_plan, SharedCapacityLedger};
use crate::application::catalog::{ConnectorHandle, SharedStationCatalog};
use crate::application::ports::{AnchorError, Authenticator, PlanAnchor};
use crate::domain::{BookingError, BookingResult, ChargingPlan, Reservation};
use crate::notifications::{Event, SharedEventBus};
use crate::shared::retry::{retry_with_backoff, RetryConfig};

/// Tunable booking parameters.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Timeout applied to the authentication and anchoring calls,
    /// the only suspension points of a booking.
    pub external_call_timeout: StdDuration,
    pub anchor_retry: RetryConfig,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            external_call_timeout: StdDuration::from_secs(10),
            anchor_retry: RetryConfig::default(),
        }
    }
}

/// An accepted plan plus the identities needed to book it.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub plan: ChargingPlan,
    pub driver_id: String,
    pub vehicle_id: String,
    pub current_soc_percent: f64,
    pub target_soc_percent: f64,
}

/// Owns all reservations and the only write paths into the capacity
/// ledger and connector states.
pub struct ReservationManager {
    catalog: SharedStationCatalog,
    ledger: SharedCapacityLedger,
    authenticator: Arc<dyn Authenticator>,
    anchor: Arc<dyn PlanAnchor>,
    events: SharedEventBus,
    // Arc so the deferred-anchor task can update a reservation after
    // the booking call has returned.
    reservations: Arc<DashMap<String, Reservation>>,
    cfg: BookingConfig,
}

/// Shared, reference-counted reservation manager
pub type SharedReservationManager = Arc<ReservationManager>;

impl ReservationManager {
    pub fn new(
        catalog: SharedStationCatalog,
        ledger: SharedCapacityLedger,
        authenticator: Arc<dyn Authenticator>,
        anchor: Arc<dyn PlanAnchor>,
        events: SharedEventBus,
        cfg: BookingConfig,
    ) -> Self {
        Self {
            catalog,
            ledger,
            authenticator,
            anchor,
            events,
            reservations: Arc::new(DashMap::new()),
            cfg,
        }
    }

    /// Book an accepted plan.
    ///
    /// Steps, in order per request: authenticate → reserve connector →
    /// re-validate and commit capacity → persist. Capacity may have
    /// shifted since negotiation, so the commit re-checks every slot
    /// against the live ledger inside the site's critical section.
    pub async fn book(&self, request: BookingRequest) -> BookingResult<Reservation> {
        let plan = request.plan;
        let station_id = plan.station_id.clone();

        // 1. External trust establishment. No side effects yet, so a
        //    failure or timeout aborts cleanly.
        let grant = match timeout(
            self.cfg.external_call_timeout,
            self.authenticator
                .authenticate(&request.driver_id, &request.vehicle_id, &station_id),
        )
        .await
        {
            Err(_) => {
                metrics::counter!("bookings_total", "outcome" => "auth_timeout").increment(1);
                return Err(BookingError::AuthenticationFailed(format!(
                    "timed out after {:?}",
                    self.cfg.external_call_timeout
                )));
            }
            Ok(Err(e)) => {
                metrics::counter!("bookings_total", "outcome" => "auth_failed").increment(1);
                return Err(BookingError::AuthenticationFailed(e.to_string()));
            }
            Ok(Ok(grant)) => grant,
        };

        // 2. Claim a connector. Loser of a connector race stops here.
        // The guard releases the connector on every exit path (including
        // the caller dropping this future mid-booking) until disarmed.
        let handle = self.catalog.reserve_connector(&station_id).inspect_err(|_| {
            metrics::counter!("bookings_total", "outcome" => "no_availability").increment(1);
        })?;
        let mut guard = ConnectorGuard {
            manager: self,
            handle: Some(handle),
            committed: None,
        };

        // 3. Re-validate and commit the plan's draws atomically.
        let draws = draws_for_plan(self.ledger.clock(), &plan);
        if let Err(e) = self.ledger.try_commit(&plan.site_id, &draws) {
            metrics::counter!("bookings_total", "outcome" => "capacity_exceeded").increment(1);
            return Err(e);
        }
        guard.committed = Some((plan.site_id.clone(), draws));

        // 4. Best-effort anchoring; a failure defers to the retry task.
        let plan_hash = plan.content_hash();
        let anchor_id = match timeout(
            self.cfg.external_call_timeout,
            self.anchor.anchor(&plan_hash),
        )
        .await
        {
            Ok(Ok(receipt)) => Some(receipt.anchor_id),
            Ok(Err(e)) => {
                warn!(%station_id, error = %e, "Plan anchoring failed, deferring");
                None
            }
            Err(_) => {
                warn!(%station_id, "Plan anchoring timed out, deferring");
                None
            }
        };

        // 5. Persist and publish.
        let handle = guard.disarm();
        let reservation = Reservation::new(
            Uuid::new_v4().to_string(),
            plan,
            &handle.connector_id,
            handle.plug,
            &request.driver_id,
            &request.vehicle_id,
            grant.auth_token,
            request.current_soc_percent,
            request.target_soc_percent,
            anchor_id,
        );
        self.reservations
            .insert(reservation.id.clone(), reservation.clone());
        if !reservation.is_anchored() {
            self.spawn_anchor_retry(reservation.id.clone(), plan_hash);
        }

        metrics::counter!("bookings_total", "outcome" => "booked").increment(1);
        info!(
            reservation_id = %reservation.id,
            station_id = %reservation.station_id,
            connector_id = %reservation.connector_id,
            anchored = reservation.is_anchored(),
            "Reservation booked"
        );
        self.events.publish(Event::ReservationBooked {
            reservation_id: reservation.id.clone(),
            station_id: reservation.station_id.clone(),
            connector_id: reservation.connector_id.clone(),
        });

        Ok(reservation)
    }

    pub fn get(&self, reservation_id: &str) -> Option<Reservation> {
        self.reservations.get(reservation_id).map(|r| r.clone())
    }

    pub fn list(&self) -> Vec<Reservation> {
        self.reservations.iter().map(|r| r.clone()).collect()
    }

    /// Mark the charging session as started.
    pub fn start(&self, reservation_id: &str) -> BookingResult<Reservation> {
        let mut reservation = self
            .reservations
            .get_mut(reservation_id)
            .ok_or_else(|| BookingError::ReservationNotFound(reservation_id.to_string()))?;

        reservation.start()?;
        if let Err(e) = self
            .catalog
            .begin_charging(&reservation.station_id, &reservation.connector_id)
        {
            warn!(reservation_id, error = %e, "Could not mark connector charging");
        }

        self.events.publish(Event::ChargingStarted {
            reservation_id: reservation.id.clone(),
            station_id: reservation.station_id.clone(),
        });
        Ok(reservation.clone())
    }

    /// Complete a session: the connector frees up, elapsed ledger slots
    /// stay as the historical record, and slots the session no longer
    /// needs are handed back.
    pub fn complete(&self, reservation_id: &str) -> BookingResult<Reservation> {
        let mut reservation = self
            .reservations
            .get_mut(reservation_id)
            .ok_or_else(|| BookingError::ReservationNotFound(reservation_id.to_string()))?;

        reservation.complete()?;
        self.release_future_capacity(&reservation);
        self.release_connector_or_log(&ConnectorHandle {
            station_id: reservation.station_id.clone(),
            connector_id: reservation.connector_id.clone(),
            plug: reservation.plug,
        });

        metrics::counter!("bookings_total", "outcome" => "completed").increment(1);
        self.events.publish(Event::ReservationCompleted {
            reservation_id: reservation.id.clone(),
            energy_kwh: reservation.plan.energy_kwh,
        });
        Ok(reservation.clone())
    }

    /// Cancel a booking. Idempotent in effect: a repeat cancel reports
    /// `InvalidState` and never double-releases connector or ledger.
    pub fn cancel(&self, reservation_id: &str) -> BookingResult<Reservation> {
        let mut reservation = self
            .reservations
            .get_mut(reservation_id)
            .ok_or_else(|| BookingError::ReservationNotFound(reservation_id.to_string()))?;

        reservation.cancel()?;
        self.release_future_capacity(&reservation);
        self.release_connector_or_log(&ConnectorHandle {
            station_id: reservation.station_id.clone(),
            connector_id: reservation.connector_id.clone(),
            plug: reservation.plug,
        });

        metrics::counter!("bookings_total", "outcome" => "cancelled").increment(1);
        self.events.publish(Event::ReservationCancelled {
            reservation_id: reservation.id.clone(),
        });
        Ok(reservation.clone())
    }

    /// Release the not-yet-elapsed slots of a reservation's plan. The
    /// bucket currently in progress stays committed.
    fn release_future_capacity(&self, reservation: &Reservation) {
        let clock = self.ledger.clock();
        let draws = draws_for_plan(clock, &reservation.plan);
        let not_before = clock.index_of(Utc::now()) + 1;
        self.ledger
            .release(&reservation.plan.site_id, &draws, not_before);
    }

    /// Compensating connector release. A failure here leaks a connector
    /// and degrades the whole station, so it is logged at error level
    /// for out-of-band reconciliation.
    fn release_connector_or_log(&self, handle: &ConnectorHandle) {
        if let Err(e) = self
            .catalog
            .release_connector(&handle.station_id, &handle.connector_id)
        {
            error!(
                station_id = %handle.station_id,
                connector_id = %handle.connector_id,
                error = %e,
                "CRITICAL: failed to release connector, manual reconciliation required"
            );
        }
    }

    fn spawn_anchor_retry(&self, reservation_id: String, plan_hash: String) {
        let anchor = self.anchor.clone();
        let events = self.events.clone();
        let reservations = self.reservations.clone();
        let retry_cfg = self.cfg.anchor_retry.clone();

        tokio::spawn(async move {
            let result = retry_with_backoff(
                retry_cfg,
                || {
                    let anchor = anchor.clone();
                    let hash = plan_hash.clone();
                    async move { anchor.anchor(&hash).await }
                },
                AnchorError::is_transient,
                "anchor_plan",
            )
            .await;

            match result {
                Ok(receipt) => {
                    if let Some(mut reservation) = reservations.get_mut(&reservation_id) {
                        reservation.anchor_id = Some(receipt.anchor_id.clone());
                        info!(%reservation_id, anchor_id = %receipt.anchor_id, "Plan anchored after retry");
                        events.publish(Event::PlanAnchored {
                            reservation_id,
                            anchor_id: receipt.anchor_id,
                        });
                    }
                }
                Err(e) => {
                    warn!(%reservation_id, error = %e, "Plan anchoring abandoned");
                }
            }
        });
    }
}

/// Unwinds a partially-completed booking: releases the committed
/// capacity and the reserved connector unless disarmed. Covers both
/// explicit failure returns and the booking future being dropped
/// mid-flight.
struct ConnectorGuard<'a> {
    manager: &'a ReservationManager,
    handle: Option<ConnectorHandle>,
    committed: Option<(String, Vec<crate::application::capacity::SlotDraw>)>,
}

impl ConnectorGuard<'_> {
    fn disarm(&mut self) -> ConnectorHandle {
        self.committed = None;
        self.handle.take().expect("guard disarmed twice")
    }
}

impl Drop for ConnectorGuard<'_> {
    fn drop(&mut self) {
        if let Some((site_id, draws)) = self.committed.take() {
            self.manager.ledger.release(&site_id, &draws, i64::MIN);
        }
        if let Some(handle) = self.handle.take() {
            self.manager.release_connector_or_log(&handle);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
