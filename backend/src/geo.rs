use sniffertrek_shared::Coordinate;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance in kilometres (haversine).
///
/// Pure and total: NaN inputs propagate as NaN. Only ever used as a
/// straight-line approximation for the insertion heuristic; displayed
/// distances always come from the routing provider.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlng = (dlng / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlng * sin_dlng;
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Metres to whole kilometres, rounded.
pub fn round_km(distance_m: u64) -> u32 {
    ((distance_m as f64) / 1000.0).round() as u32
}

/// Seconds to a display string like `3 h 25 min`; hours are omitted when zero.
pub fn format_duration(duration_s: u64) -> String {
    let hours = duration_s / 3600;
    let minutes = (duration_s % 3600) / 60;
    if hours == 0 {
        format!("{minutes} min")
    } else {
        format!("{hours} h {minutes} min")
    }
}
