//! Canonicalization of itinerary descriptors into an ordered stop list.
//!
//! Both itinerary shapes end up as the same `Vec<Stop>`: indices `0..n` in
//! origin-to-destination order, blank cities dropped, and every city at most once
//! (the city is the matching key of the resolution ledger, so a repeated city could
//! never be resolved independently).

use freight_types::{Itinerary, RouteStop, Stop, Waypoint};

/// Turns an itinerary descriptor into the canonical stop list.
///
/// `None` (no route detail available) and descriptors without any usable stop yield an
/// empty list. An empty list means "no detail available", not "nothing left to deliver".
pub fn canonicalize(itinerary: Option<&Itinerary>) -> Vec<Stop> {
    let mut builder = StopListBuilder::default();
    match itinerary {
        Some(Itinerary::Preferred { stops }) => {
            for RouteStop {
                city,
                state,
                detail,
            } in stops
            {
                builder.push(city, state, detail.clone());
            }
        }
        Some(Itinerary::Legacy {
            waypoints,
            destination,
        }) => {
            for Waypoint { name } in waypoints.iter().chain(destination.iter()) {
                let (city, state) = split_place(name);
                builder.push(city, state, None);
            }
        }
        None => {}
    }
    if builder.stops.is_empty() {
        log::debug!("itinerary without recognizable stops");
    }
    builder.stops
}

/// Reduces a stop identity to its matching key (the city).
///
/// Strips everything up to the first `:` ("Parada 2: ", "reason: ") and everything
/// from the first `/` on ("/MG"), then trims whitespace. Case is preserved.
pub fn stop_identity(raw: &str) -> &str {
    let without_prefix = match raw.split_once(':') {
        Some((_, rest)) => rest,
        None => raw,
    };
    let city = match without_prefix.split_once('/') {
        Some((city, _)) => city,
        None => without_prefix,
    };
    city.trim()
}

/// Splits a display name like "Destino: Uberaba/MG" into `("Uberaba", "MG")`.
fn split_place(name: &str) -> (&str, &str) {
    let place = match name.split_once(':') {
        Some((_, rest)) => rest,
        None => name,
    };
    match place.split_once('/') {
        Some((city, state)) => (city.trim(), state.trim()),
        None => (place.trim(), ""),
    }
}

#[derive(Default)]
struct StopListBuilder {
    stops: Vec<Stop>,
}

impl StopListBuilder {
    fn push(&mut self, city: &str, state: &str, detail: Option<freight_types::RouteDetail>) {
        // the stored city must be its own matching key, or the stop could never be resolved
        let city = stop_identity(city);
        if city.is_empty() || self.stops.iter().any(|s| s.city == city) {
            return;
        }
        self.stops.push(Stop {
            index: self.stops.len() as u32,
            city: city.to_string(),
            state: state.trim().to_string(),
            detail,
        });
    }
}
