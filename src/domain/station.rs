//! Station domain entity

use serde::{Deserialize, Serialize};

use super::geo::GeoPoint;

/// Plug standard of a physical connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlugType {
    #[serde(rename = "CCS2")]
    Ccs2,
    #[serde(rename = "CHAdeMO")]
    Chademo,
    #[serde(rename = "Type2")]
    Type2,
}

impl std::fmt::Display for PlugType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ccs2 => write!(f, "CCS2"),
            Self::Chademo => write!(f, "CHAdeMO"),
            Self::Type2 => write!(f, "Type2"),
        }
    }
}

/// Connector state as tracked by the catalog.
///
/// Only the catalog mutates this, under the station's map entry lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStatus {
    Available,
    Reserved,
    Charging,
    Unavailable,
}

impl std::fmt::Display for ConnectorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Reserved => write!(f, "reserved"),
            Self::Charging => write!(f, "charging"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// A single physical charging port, the unit of exclusive reservation.
#[derive(Debug, Clone)]
pub struct Connector {
    pub id: String,
    pub plug: PlugType,
    pub power_kw: f64,
    pub status: ConnectorStatus,
}

impl Connector {
    pub fn new(id: impl Into<String>, plug: PlugType, power_kw: f64) -> Self {
        Self {
            id: id.into(),
            plug,
            power_kw,
            status: ConnectorStatus::Available,
        }
    }
}

/// Charging station reference data plus live connector availability.
///
/// Stations sharing a `site_id` draw from that site's power budget.
#[derive(Debug, Clone)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub operator: String,
    pub site_id: String,
    pub location: GeoPoint,
    pub address: Option<String>,
    pub city: Option<String>,
    /// Station power ceiling in kW; no plan phase may exceed it.
    pub max_power_kw: f64,
    /// Price curve reference resolved through the tariff book.
    pub tariff_id: String,
    pub connectors: Vec<Connector>,
}

impl Station {
    pub fn total_connectors(&self) -> usize {
        self.connectors.len()
    }

    pub fn available_connectors(&self) -> usize {
        self.connectors
            .iter()
            .filter(|c| c.status == ConnectorStatus::Available)
            .count()
    }

    pub fn connector(&self, id: &str) -> Option<&Connector> {
        self.connectors.iter().find(|c| c.id == id)
    }

    pub fn connector_mut(&mut self, id: &str) -> Option<&mut Connector> {
        self.connectors.iter_mut().find(|c| c.id == id)
    }

    /// First connector currently free, if any.
    pub fn first_available_mut(&mut self) -> Option<&mut Connector> {
        self.connectors
            .iter_mut()
            .find(|c| c.status == ConnectorStatus::Available)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_station() -> Station {
        Station {
            id: "st-01".into(),
            name: "Test Hub".into(),
            operator: "Nordic Charge".into(),
            site_id: "site-01".into(),
            location: GeoPoint::new(60.17, 24.94),
            address: None,
            city: Some("Helsinki".into()),
            max_power_kw: 150.0,
            tariff_id: "tou-fast".into(),
            connectors: vec![
                Connector::new("c-1", PlugType::Ccs2, 150.0),
                Connector::new("c-2", PlugType::Chademo, 50.0),
            ],
        }
    }

    #[test]
    fn availability_counts() {
        let mut s = sample_station();
        assert_eq!(s.total_connectors(), 2);
        assert_eq!(s.available_connectors(), 2);

        s.connector_mut("c-1").unwrap().status = ConnectorStatus::Reserved;
        assert_eq!(s.available_connectors(), 1);
    }

    #[test]
    fn first_available_skips_reserved() {
        let mut s = sample_station();
        s.connector_mut("c-1").unwrap().status = ConnectorStatus::Reserved;
        assert_eq!(s.first_available_mut().unwrap().id, "c-2");
    }

    #[test]
    fn plug_type_display() {
        assert_eq!(PlugType::Ccs2.to_string(), "CCS2");
        assert_eq!(PlugType::Chademo.to_string(), "CHAdeMO");
        assert_eq!(PlugType::Type2.to_string(), "Type2");
    }
}
