use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Itinerary descriptor as delivered by the route service
///
/// The route service has produced two different shapes over time. Both are accepted here;
/// the tracker canonicalizes either of them into an ordered list of [`Stop`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Itinerary {
    /// Ordered list of destinations with optional route figures per stop
    Preferred { stops: Vec<RouteStop> },
    /// Named waypoints ("Parada N: City/UF") plus a separate final destination ("Destino: City/UF")
    Legacy {
        #[serde(default)]
        waypoints: Vec<Waypoint>,
        #[serde(default)]
        destination: Option<Waypoint>,
    },
}

impl Itinerary {
    /// Decodes the route service payload.
    ///
    /// Returns `None` for anything that is not one of the known shapes,
    /// including a legacy payload without waypoints and destination.
    pub fn from_json(value: &serde_json::Value) -> Option<Itinerary> {
        if !value.is_object() {
            return None;
        }
        match serde_json::from_value::<Itinerary>(value.clone()) {
            Ok(Itinerary::Legacy {
                waypoints,
                destination: None,
            }) if waypoints.is_empty() => None,
            Ok(itinerary) => Some(itinerary),
            Err(_) => None,
        }
    }
}

/// One destination of the preferred itinerary shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteStop {
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub detail: Option<RouteDetail>,
}

/// Named waypoint of the legacy itinerary shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Waypoint {
    /// Display name, e.g. "Parada 2: Belo Horizonte/MG"
    pub name: String,
}

/// Route figures attached by the route service
///
/// Purely informational, the tracker never looks at these values.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteDetail {
    /// Distance from the previous stop in kilometers
    #[serde(default)]
    pub distance_km: Option<f64>,
    /// Estimated driving time from the previous stop in minutes
    #[serde(default)]
    pub duration_min: Option<f64>,
    /// Toll cost on the leg
    #[serde(default)]
    pub tolls: Option<f64>,
    /// Estimated fuel consumption on the leg in liters
    #[serde(default)]
    pub fuel_liters: Option<f64>,
}

/// A canonical itinerary stop
///
/// `city` is the matching key against the resolution ledger; `index` is the position
/// in origin-to-destination order and never changes for the lifetime of a freight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Stop {
    pub index: u32,
    pub city: String,
    pub state: String,
    pub detail: Option<RouteDetail>,
}

impl Stop {
    /// Display label "City/UF" (just the city, if the state is unknown)
    pub fn label(&self) -> String {
        if self.state.is_empty() {
            self.city.clone()
        } else {
            format!("{}/{}", self.city, self.state)
        }
    }
}
