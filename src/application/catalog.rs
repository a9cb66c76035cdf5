//! Station catalog — live station registry with connector reservation
//!
//! The catalog is the only mutator of connector state. All mutations to
//! one station happen under its map entry lock, so two bookings racing
//! for the last connector resolve to exactly one winner.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::domain::{BookingError, BookingResult, ConnectorStatus, GeoPoint, PlugType, Station};

/// Proof of an exclusive connector hold, returned by a successful reserve.
#[derive(Debug, Clone)]
pub struct ConnectorHandle {
    pub station_id: String,
    pub connector_id: String,
    pub plug: PlugType,
}

/// Thread-safe registry of stations and their live connector availability.
pub struct StationCatalog {
    stations: DashMap<String, Station>,
}

/// Shared, reference-counted station catalog
pub type SharedStationCatalog = Arc<StationCatalog>;

impl StationCatalog {
    pub fn new() -> Self {
        Self {
            stations: DashMap::new(),
        }
    }

    pub fn shared() -> SharedStationCatalog {
        Arc::new(Self::new())
    }

    pub fn insert(&self, station: Station) {
        self.stations.insert(station.id.clone(), station);
    }

    pub fn get(&self, station_id: &str) -> Option<Station> {
        self.stations.get(station_id).map(|s| s.clone())
    }

    pub fn list(&self) -> Vec<Station> {
        self.stations.iter().map(|s| s.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.stations.len()
    }

    /// Stations within `radius_km` of `origin`, with their distance.
    /// Order unspecified; empty when none match (not an error).
    pub fn candidates(&self, origin: GeoPoint, radius_km: f64) -> Vec<(Station, f64)> {
        self.stations
            .iter()
            .filter_map(|entry| {
                let distance = origin.distance_km(&entry.location);
                (distance <= radius_km).then(|| (entry.clone(), distance))
            })
            .collect()
    }

    /// Atomically claim the first available connector at a station.
    pub fn reserve_connector(&self, station_id: &str) -> BookingResult<ConnectorHandle> {
        let mut station = self
            .stations
            .get_mut(station_id)
            .ok_or_else(|| BookingError::StationNotFound(station_id.to_string()))?;

        match station.first_available_mut() {
            Some(connector) => {
                connector.status = ConnectorStatus::Reserved;
                let handle = ConnectorHandle {
                    station_id: station_id.to_string(),
                    connector_id: connector.id.clone(),
                    plug: connector.plug,
                };
                info!(station_id, connector_id = %handle.connector_id, "Connector reserved");
                Ok(handle)
            }
            None => Err(BookingError::NoAvailability(station_id.to_string())),
        }
    }

    /// Return a connector to the available pool. Idempotent: releasing an
    /// already-available connector is a no-op, logged as a bug signal.
    pub fn release_connector(&self, station_id: &str, connector_id: &str) -> BookingResult<()> {
        let mut station = self
            .stations
            .get_mut(station_id)
            .ok_or_else(|| BookingError::StationNotFound(station_id.to_string()))?;

        match station.connector_mut(connector_id) {
            Some(connector) => {
                if connector.status == ConnectorStatus::Available {
                    warn!(station_id, connector_id, "Double release of connector");
                } else {
                    connector.status = ConnectorStatus::Available;
                    info!(station_id, connector_id, "Connector released");
                }
                Ok(())
            }
            None => {
                warn!(station_id, connector_id, "Release of unknown connector");
                Ok(())
            }
        }
    }

    /// Mark a reserved connector as actively charging.
    pub fn begin_charging(&self, station_id: &str, connector_id: &str) -> BookingResult<()> {
        let mut station = self
            .stations
            .get_mut(station_id)
            .ok_or_else(|| BookingError::StationNotFound(station_id.to_string()))?;

        if let Some(connector) = station.connector_mut(connector_id) {
            connector.status = ConnectorStatus::Charging;
        }
        Ok(())
    }
}

impl Default for StationCatalog {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Connector;

    fn station(id: &str, lat: f64, lng: f64, connectors: usize) -> Station {
        Station {
            id: id.into(),
            name: format!("Station {id}"),
            operator: "Test Ops".into(),
            site_id: "site-01".into(),
            location: GeoPoint::new(lat, lng),
            address: None,
            city: None,
            max_power_kw: 150.0,
            tariff_id: "t-1".into(),
            connectors: (0..connectors)
                .map(|i| Connector::new(format!("c-{i}"), PlugType::Ccs2, 150.0))
                .collect(),
        }
    }

    #[test]
    fn reserve_claims_and_release_returns() {
        let catalog = StationCatalog::new();
        catalog.insert(station("st-1", 60.17, 24.94, 2));

        let handle = catalog.reserve_connector("st-1").unwrap();
        assert_eq!(catalog.get("st-1").unwrap().available_connectors(), 1);

        catalog
            .release_connector("st-1", &handle.connector_id)
            .unwrap();
        assert_eq!(catalog.get("st-1").unwrap().available_connectors(), 2);
    }

    #[test]
    fn exhausted_station_reports_no_availability() {
        let catalog = StationCatalog::new();
        catalog.insert(station("st-1", 60.17, 24.94, 1));

        catalog.reserve_connector("st-1").unwrap();
        let err = catalog.reserve_connector("st-1").unwrap_err();
        assert!(matches!(err, BookingError::NoAvailability(_)));
    }

    #[test]
    fn unknown_station_errors() {
        let catalog = StationCatalog::new();
        assert!(matches!(
            catalog.reserve_connector("missing"),
            Err(BookingError::StationNotFound(_))
        ));
    }

    #[test]
    fn double_release_is_noop() {
        let catalog = StationCatalog::new();
        catalog.insert(station("st-1", 60.17, 24.94, 1));

        let handle = catalog.reserve_connector("st-1").unwrap();
        catalog
            .release_connector("st-1", &handle.connector_id)
            .unwrap();
        catalog
            .release_connector("st-1", &handle.connector_id)
            .unwrap();
        assert_eq!(catalog.get("st-1").unwrap().available_connectors(), 1);
    }

    #[test]
    fn candidates_filters_by_radius() {
        let catalog = StationCatalog::new();
        catalog.insert(station("helsinki", 60.1699, 24.9384, 1));
        catalog.insert(station("tallinn", 59.4470, 24.7536, 1));

        let origin = GeoPoint::new(60.1699, 24.9384);
        let near = catalog.candidates(origin, 30.0);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].0.id, "helsinki");

        let all = catalog.candidates(origin, 200.0);
        assert_eq!(all.len(), 2);

        assert!(catalog.candidates(GeoPoint::new(0.0, 0.0), 10.0).is_empty());
    }

    #[tokio::test]
    async fn concurrent_reserve_has_one_winner() {
        let catalog = Arc::new(StationCatalog::new());
        catalog.insert(station("st-1", 60.17, 24.94, 1));

        let a = {
            let c = catalog.clone();
            tokio::spawn(async move { c.reserve_connector("st-1") })
        };
        let b = {
            let c = catalog.clone();
            tokio::spawn(async move { c.reserve_connector("st-1") })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let losses = results
            .iter()
            .filter(|r| matches!(r, Err(BookingError::NoAvailability(_))))
            .count();
        assert_eq!((wins, losses), (1, 1));
    }

    #[test]
    fn begin_charging_marks_connector() {
        let catalog = StationCatalog::new();
        catalog.insert(station("st-1", 60.17, 24.94, 1));
        let handle = catalog.reserve_connector("st-1").unwrap();

        catalog.begin_charging("st-1", &handle.connector_id).unwrap();
        let s = catalog.get("st-1").unwrap();
        assert_eq!(s.connector(&handle.connector_id).unwrap().status, ConnectorStatus::Charging);
    }
}
