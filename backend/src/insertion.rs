//! Nearest-insertion placement: decides where a stop added from a non-linear
//! source (search hit, bucket-list promotion, AI suggestion) should be
//! spliced into the route to minimize the straight-line detour.

use futures::future::join_all;

use sniffertrek_shared::{Coordinate, Stop, StopRole};

use crate::geo::haversine_km;
use crate::providers::Geocoder;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub coordinates: Option<Coordinate>,
}

/// Index immediately before the `end` stop, the fallback insertion point.
fn before_end_index(stops: &[Stop]) -> usize {
    stops
        .iter()
        .position(|s| s.role == StopRole::End)
        .unwrap_or(stops.len())
}

/// Picks the insertion index for `candidate` within `stops`.
///
/// Stops missing coordinates are geocoded on demand (booking address first,
/// then the stop name) and successful lookups are written back onto the
/// stops, so later insertions skip the lookup. Geocoding failures are
/// non-fatal: the affected stops simply contribute no adjacent pair, and
/// with no usable pair at all the candidate goes in front of `end`.
pub async fn placement_index(
    geocoder: &dyn Geocoder,
    stops: &mut [Stop],
    candidate: &Candidate,
) -> usize {
    let resolved = stops.iter().filter(|s| s.is_resolved()).count();
    let Some(candidate_coords) = candidate.coordinates else {
        return before_end_index(stops);
    };
    if resolved < 2 {
        return before_end_index(stops);
    }

    resolve_missing_coordinates(geocoder, stops).await;

    let mut best: Option<(usize, f64)> = None;
    for i in 0..stops.len().saturating_sub(1) {
        let (Some(a), Some(b)) = (stops[i].coordinates, stops[i + 1].coordinates) else {
            continue;
        };
        let detour =
            haversine_km(a, candidate_coords) + haversine_km(candidate_coords, b)
                - haversine_km(a, b);
        // Strict less-than keeps the first-encountered pair on ties.
        if best.is_none_or(|(_, d)| detour < d) {
            best = Some((i + 1, detour));
        }
    }

    match best {
        Some((index, detour)) => {
            tracing::debug!(index, detour_km = detour, name = %candidate.name, "placed stop");
            index
        }
        None => before_end_index(stops),
    }
}

/// Geocodes every coordinate-less stop, all lookups in flight at once, and
/// persists the results. The caller's placement decision waits for all of
/// them to settle; partial results are never acted on mid-flight.
async fn resolve_missing_coordinates(geocoder: &dyn Geocoder, stops: &mut [Stop]) {
    let pending: Vec<(usize, String)> = stops
        .iter()
        .enumerate()
        .filter(|(_, stop)| stop.coordinates.is_none())
        .filter_map(|(i, stop)| geocode_query(stop).map(|q| (i, q)))
        .collect();
    if pending.is_empty() {
        return;
    }

    let results = join_all(pending.iter().map(|(_, query)| geocoder.geocode(query))).await;
    for ((index, query), result) in pending.into_iter().zip(results) {
        match result {
            Ok(coords) => stops[index].coordinates = Some(coords),
            Err(kind) => {
                tracing::debug!(%kind, %query, "geocoding failed, stop skipped in placement");
            }
        }
    }
}

fn geocode_query(stop: &Stop) -> Option<String> {
    if let Some(address) = stop
        .booking
        .as_ref()
        .and_then(|b| b.address.as_deref())
        .filter(|a| !a.trim().is_empty())
    {
        return Some(address.to_string());
    }
    if stop.is_resolved() {
        return Some(stop.name.clone());
    }
    None
}
