//! Demo reference data
//!
//! Stations, tariffs and site limits for development and testing, in
//! place of the external reference-data feed. Time-of-use curves follow
//! the grid's cheap morning valley (10:00–11:00) and stressed afternoon
//! window (13:00–15:00); base rates follow the power-tier pricing table
//! (AC ≤25 kW 0.25, fast DC ≤150 kW 0.34, HPC ≤350 kW 0.42 €/kWh).

use tracing::info;

use crate::application::capacity::CapacityLedger;
use crate::application::catalog::StationCatalog;
use crate::application::tariffs::TariffBook;
use crate::domain::{
    Connector, DemandTier, GeoPoint, PlugType, Station, TariffPoint, TariffSchedule,
};

const SESSION_FEE_EUR: f64 = 0.75;

fn tou_points(base: f64) -> Vec<TariffPoint> {
    vec![
        TariffPoint::new(0, base * 0.85, DemandTier::Low),
        TariffPoint::new(7 * 60, base, DemandTier::Medium),
        TariffPoint::new(10 * 60, base * 0.75, DemandTier::Low),
        TariffPoint::new(11 * 60, base, DemandTier::Medium),
        TariffPoint::new(13 * 60, base * 1.35, DemandTier::High),
        TariffPoint::new(15 * 60, base, DemandTier::Medium),
        TariffPoint::new(21 * 60, base * 0.85, DemandTier::Low),
    ]
}

/// Load the demo catalog, tariff book and site limits.
pub fn load_demo_data(catalog: &StationCatalog, tariffs: &TariffBook, ledger: &CapacityLedger) {
    tariffs.insert(TariffSchedule::new(
        "tou-ac-urban",
        "AC urban ≤25kW",
        SESSION_FEE_EUR,
        tou_points(0.25),
    ));
    tariffs.insert(TariffSchedule::new(
        "tou-fast-dc",
        "Fast DC 26-150kW",
        SESSION_FEE_EUR,
        tou_points(0.34),
    ));
    tariffs.insert(TariffSchedule::new(
        "tou-hpc",
        "HPC 151-350kW",
        SESSION_FEE_EUR,
        tou_points(0.42),
    ));

    catalog.insert(Station {
        id: "espoo-west".into(),
        name: "Espoo West Mobility Hub".into(),
        operator: "Nordic Charge".into(),
        site_id: "site-espoo-west".into(),
        location: GeoPoint::new(60.1609, 24.6388),
        address: Some("Vanha Jorvaksentie 3".into()),
        city: Some("Espoo".into()),
        max_power_kw: 200.0,
        tariff_id: "tou-hpc".into(),
        connectors: vec![
            Connector::new("connector-ccs-a", PlugType::Ccs2, 200.0),
            Connector::new("connector-ccs-b", PlugType::Ccs2, 200.0),
            Connector::new("connector-type2-a", PlugType::Type2, 22.0),
        ],
    });
    ledger.register_site("site-espoo-west", 250.0);

    catalog.insert(Station {
        id: "fleet-01".into(),
        name: "GridPass Demo Station".into(),
        operator: "GridPass Demo Ops".into(),
        site_id: "site-fleet-01".into(),
        location: GeoPoint::new(60.1699, 24.9384),
        address: Some("Examplekatu 1".into()),
        city: Some("Helsinki".into()),
        max_power_kw: 150.0,
        tariff_id: "tou-fast-dc".into(),
        connectors: vec![
            Connector::new("connector-1", PlugType::Ccs2, 150.0),
            Connector::new("connector-2", PlugType::Chademo, 50.0),
        ],
    });
    ledger.register_site("site-fleet-01", 150.0);

    catalog.insert(Station {
        id: "fleet-02".into(),
        name: "Harbor Fast Charge".into(),
        operator: "Baltic Charge".into(),
        site_id: "site-fleet-02".into(),
        location: GeoPoint::new(59.4470, 24.7536),
        address: Some("Port Road 12".into()),
        city: Some("Tallinn".into()),
        max_power_kw: 300.0,
        tariff_id: "tou-hpc".into(),
        connectors: vec![
            Connector::new("connector-a", PlugType::Ccs2, 300.0),
            Connector::new("connector-b", PlugType::Ccs2, 300.0),
        ],
    });
    ledger.register_site("site-fleet-02", 400.0);

    info!(
        stations = catalog.count(),
        tariffs = tariffs.count(),
        "Demo reference data loaded"
    );
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SlotClock;
    use chrono::{TimeZone, Utc};

    #[test]
    fn demo_data_is_consistent() {
        let catalog = StationCatalog::new();
        let tariffs = TariffBook::new();
        let ledger = CapacityLedger::new(SlotClock::new(15), 50.0);

        load_demo_data(&catalog, &tariffs, &ledger);

        assert_eq!(catalog.count(), 3);
        assert_eq!(tariffs.count(), 3);

        for station in catalog.list() {
            assert!(tariffs.get(&station.tariff_id).is_some(), "{}", station.id);
            assert!(station.available_connectors() > 0);
            // Site must at least fit the station ceiling.
            assert!(ledger.site_limit(&station.site_id) >= station.max_power_kw);
        }
    }

    #[test]
    fn afternoon_window_is_most_expensive() {
        let catalog = StationCatalog::new();
        let tariffs = TariffBook::new();
        let ledger = CapacityLedger::new(SlotClock::new(15), 50.0);
        load_demo_data(&catalog, &tariffs, &ledger);

        let stressed = Utc.with_ymd_and_hms(2025, 6, 1, 13, 30, 0).unwrap();
        let valley = Utc.with_ymd_and_hms(2025, 6, 1, 10, 30, 0).unwrap();

        let (peak_price, peak_tier) = tariffs.price_at("tou-fast-dc", stressed);
        let (valley_price, _) = tariffs.price_at("tou-fast-dc", valley);
        assert!(peak_price > valley_price);
        assert_eq!(peak_tier, DemandTier::High);
    }
}
