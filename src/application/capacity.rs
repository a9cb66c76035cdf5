//! Per-site capacity ledger
//!
//! Tracks aggregate committed power draw per site per time slot. Keyed
//! concurrent map with one mutex per site: commits to a given site are
//! linearized, different sites interleave freely. Negotiation only reads
//! snapshots; commits happen at booking time and re-validate first.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::domain::{BookingError, BookingResult, ChargingPlan, SlotClock};
use crate::shared::shutdown::ShutdownSignal;

const KW_EPSILON: f64 = 1e-9;

/// Committed draw per slot for one site.
struct SiteLedger {
    limit_kw: f64,
    committed: BTreeMap<i64, f64>,
}

impl SiteLedger {
    fn new(limit_kw: f64) -> Self {
        Self {
            limit_kw,
            committed: BTreeMap::new(),
        }
    }

    fn committed_at(&self, slot: i64) -> f64 {
        self.committed.get(&slot).copied().unwrap_or(0.0)
    }
}

/// One (slot, power) draw of a plan against its site.
pub type SlotDraw = (i64, f64);

/// Tracks committed power per site per slot, bounded by the site limit.
pub struct CapacityLedger {
    sites: DashMap<String, Mutex<SiteLedger>>,
    clock: SlotClock,
    default_limit_kw: f64,
}

/// Shared, reference-counted capacity ledger
pub type SharedCapacityLedger = Arc<CapacityLedger>;

impl CapacityLedger {
    pub fn new(clock: SlotClock, default_limit_kw: f64) -> Self {
        Self {
            sites: DashMap::new(),
            clock,
            default_limit_kw,
        }
    }

    pub fn clock(&self) -> SlotClock {
        self.clock
    }

    /// Register a site with an explicit capacity limit. Unregistered
    /// sites are created lazily with the default limit on first use.
    pub fn register_site(&self, site_id: impl Into<String>, limit_kw: f64) {
        let site_id = site_id.into();
        debug!(%site_id, limit_kw, "Registering site capacity");
        self.sites.insert(site_id, Mutex::new(SiteLedger::new(limit_kw)));
    }

    pub fn site_limit(&self, site_id: &str) -> f64 {
        self.sites
            .get(site_id)
            .map(|s| s.lock().expect("site ledger lock poisoned").limit_kw)
            .unwrap_or(self.default_limit_kw)
    }

    /// Free capacity per slot for `count` slots starting at `first_slot`.
    /// A read-only snapshot; plans built against it are re-validated at
    /// commit time.
    pub fn free_capacity(&self, site_id: &str, first_slot: i64, count: usize) -> Vec<f64> {
        let entry = self.site_entry(site_id);
        let ledger = entry.lock().expect("site ledger lock poisoned");
        (0..count as i64)
            .map(|offset| (ledger.limit_kw - ledger.committed_at(first_slot + offset)).max(0.0))
            .collect()
    }

    pub fn committed_at(&self, site_id: &str, slot: i64) -> f64 {
        let entry = self.site_entry(site_id);
        let committed = entry
            .lock()
            .expect("site ledger lock poisoned")
            .committed_at(slot);
        committed
    }

    /// Validate and apply all draws in a single critical section.
    ///
    /// Either every slot fits under the site limit and all draws are
    /// committed, or nothing is mutated and the first violating slot is
    /// reported.
    pub fn try_commit(&self, site_id: &str, draws: &[SlotDraw]) -> BookingResult<()> {
        let entry = self.site_entry(site_id);
        let mut ledger = entry.lock().expect("site ledger lock poisoned");

        for &(slot, kw) in draws {
            if ledger.committed_at(slot) + kw > ledger.limit_kw + KW_EPSILON {
                return Err(BookingError::CapacityExceeded {
                    site_id: site_id.to_string(),
                    slot_start: self.clock.start_of(slot),
                });
            }
        }

        for &(slot, kw) in draws {
            *ledger.committed.entry(slot).or_insert(0.0) += kw;
        }
        debug!(site_id, slots = draws.len(), "Capacity committed");
        Ok(())
    }

    /// Release draws for slots at or after `not_before`. Elapsed slots
    /// stay committed as the historical record. Releasing more than was
    /// committed clamps at zero and logs the discrepancy.
    pub fn release(&self, site_id: &str, draws: &[SlotDraw], not_before: i64) {
        let entry = self.site_entry(site_id);
        let mut ledger = entry.lock().expect("site ledger lock poisoned");

        for &(slot, kw) in draws {
            if slot < not_before {
                continue;
            }
            let remove = match ledger.committed.get_mut(&slot) {
                Some(committed) if *committed + KW_EPSILON >= kw => {
                    *committed -= kw;
                    *committed <= KW_EPSILON
                }
                _ => {
                    warn!(site_id, slot, kw, "Release exceeds committed capacity");
                    true
                }
            };
            if remove {
                ledger.committed.remove(&slot);
            }
        }
    }

    /// Drop slot entries that ended before `cutoff`, across all sites.
    /// Returns the number of removed entries.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let cutoff_slot = self.clock.index_of(cutoff);
        let mut removed = 0;
        for entry in self.sites.iter() {
            let mut ledger = entry.lock().expect("site ledger lock poisoned");
            let keep = ledger.committed.split_off(&cutoff_slot);
            removed += ledger.committed.len();
            ledger.committed = keep;
        }
        removed
    }

    fn site_entry(
        &self,
        site_id: &str,
    ) -> dashmap::mapref::one::Ref<'_, String, Mutex<SiteLedger>> {
        if let Some(entry) = self.sites.get(site_id) {
            return entry;
        }
        self.sites
            .entry(site_id.to_string())
            .or_insert_with(|| Mutex::new(SiteLedger::new(self.default_limit_kw)))
            .downgrade()
    }
}

/// Slot draws a plan commits against its site: one (slot, power) pair per
/// phase. A partially-used slot still draws its phase power for the time
/// it runs, so the full power is what the ledger must bound.
pub fn draws_for_plan(clock: SlotClock, plan: &ChargingPlan) -> Vec<SlotDraw> {
    plan.phases
        .iter()
        .map(|phase| (clock.index_of(phase.start), phase.power_kw))
        .collect()
}

/// Start the background task that expires elapsed ledger slots past the
/// retention window.
pub fn start_slot_expiry_task(
    ledger: SharedCapacityLedger,
    shutdown: ShutdownSignal,
    check_interval_secs: u64,
    retention: Duration,
) {
    tokio::spawn(async move {
        info!(
            check_interval = check_interval_secs,
            "📅 Ledger slot expiry task started"
        );

        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(check_interval_secs));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let cutoff = Utc::now() - retention;
                    let removed = ledger.prune_before(cutoff);
                    if removed > 0 {
                        debug!(removed, "Pruned elapsed capacity slots");
                    }
                }
                _ = shutdown.notified().wait() => {
                    info!("📅 Ledger slot expiry task shutting down");
                    break;
                }
            }
        }
    });
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ledger() -> CapacityLedger {
        let l = CapacityLedger::new(SlotClock::new(15), 50.0);
        l.register_site("site-01", 50.0);
        l.register_site("site-02", 100.0);
        l
    }

    #[test]
    fn commit_within_limit_succeeds() {
        let ledger = ledger();
        ledger.try_commit("site-01", &[(100, 30.0), (101, 30.0)]).unwrap();
        assert_eq!(ledger.committed_at("site-01", 100), 30.0);

        let free = ledger.free_capacity("site-01", 100, 2);
        assert_eq!(free, vec![20.0, 20.0]);
    }

    #[test]
    fn commit_over_limit_is_rejected_without_partial_mutation() {
        let ledger = ledger();
        ledger.try_commit("site-01", &[(100, 40.0)]).unwrap();

        let err = ledger
            .try_commit("site-01", &[(99, 10.0), (100, 20.0)])
            .unwrap_err();
        assert!(matches!(err, BookingError::CapacityExceeded { .. }));

        // The valid slot of the failed batch must not have been applied.
        assert_eq!(ledger.committed_at("site-01", 99), 0.0);
        assert_eq!(ledger.committed_at("site-01", 100), 40.0);
    }

    #[test]
    fn sites_are_independent() {
        let ledger = ledger();
        ledger.try_commit("site-01", &[(100, 50.0)]).unwrap();
        ledger.try_commit("site-02", &[(100, 90.0)]).unwrap();
        assert_eq!(ledger.committed_at("site-01", 100), 50.0);
        assert_eq!(ledger.committed_at("site-02", 100), 90.0);
    }

    #[test]
    fn unknown_site_uses_default_limit() {
        let ledger = ledger();
        assert_eq!(ledger.site_limit("elsewhere"), 50.0);
        assert_eq!(ledger.free_capacity("elsewhere", 0, 1), vec![50.0]);
    }

    #[test]
    fn release_skips_elapsed_slots() {
        let ledger = ledger();
        let draws = vec![(100, 20.0), (101, 20.0), (102, 20.0)];
        ledger.try_commit("site-01", &draws).unwrap();

        ledger.release("site-01", &draws, 101);
        assert_eq!(ledger.committed_at("site-01", 100), 20.0);
        assert_eq!(ledger.committed_at("site-01", 101), 0.0);
        assert_eq!(ledger.committed_at("site-01", 102), 0.0);
    }

    #[test]
    fn over_release_clamps_to_zero() {
        let ledger = ledger();
        ledger.try_commit("site-01", &[(100, 10.0)]).unwrap();
        ledger.release("site-01", &[(100, 25.0)], 0);
        assert_eq!(ledger.committed_at("site-01", 100), 0.0);
    }

    #[test]
    fn prune_drops_only_elapsed_slots() {
        let clock = SlotClock::new(15);
        let ledger = CapacityLedger::new(clock, 50.0);
        let cutoff = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let cutoff_slot = clock.index_of(cutoff);

        ledger
            .try_commit("site-01", &[(cutoff_slot - 2, 10.0), (cutoff_slot + 2, 10.0)])
            .unwrap();

        let removed = ledger.prune_before(cutoff);
        assert_eq!(removed, 1);
        assert_eq!(ledger.committed_at("site-01", cutoff_slot - 2), 0.0);
        assert_eq!(ledger.committed_at("site-01", cutoff_slot + 2), 10.0);
    }

    #[tokio::test]
    async fn concurrent_commits_never_exceed_limit() {
        let ledger = Arc::new(CapacityLedger::new(SlotClock::new(15), 50.0));
        ledger.register_site("site-01", 50.0);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let l = ledger.clone();
            handles.push(tokio::spawn(async move {
                l.try_commit("site-01", &[(200, 15.0), (201, 15.0)])
            }));
        }

        let mut ok = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok += 1;
            }
        }

        // 50 kW limit fits exactly three 15 kW commitments per slot.
        assert_eq!(ok, 3);
        assert!(ledger.committed_at("site-01", 200) <= 50.0 + 1e-9);
        assert!(ledger.committed_at("site-01", 201) <= 50.0 + 1e-9);
    }

    #[test]
    fn draws_map_phases_to_slots() {
        use crate::domain::{DemandTier, PlanPhase, Strategy};

        let clock = SlotClock::new(15);
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let mut plan =
            ChargingPlan::empty("st-1", "site-01", Strategy::Speed, start, start + Duration::hours(1));
        plan.phases.push(PlanPhase {
            start,
            duration_min: 15.0,
            power_kw: 11.0,
            energy_kwh: 2.75,
            price_eur_per_kwh: 0.34,
            tier: DemandTier::Medium,
        });

        let draws = draws_for_plan(clock, &plan);
        assert_eq!(draws, vec![(clock.index_of(start), 11.0)]);
    }
}
