//! Route segmentation: turns the ordered stop list into a provider-computed
//! leg sequence, splitting over-long routes into sequential chunked requests
//! that respect the provider's waypoint ceiling.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;

use sniffertrek_shared::{Leg, RouteErrorKind, Stop, StopId, TravelMode};

use crate::providers::{DirectionsProvider, DirectionsRequest};

/// Google's directions API accepts at most 23 intermediate waypoints per
/// request. Kept configurable on the computer; never assumed elsewhere.
pub const DEFAULT_WAYPOINT_CEILING: usize = 23;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Default)]
pub struct ComputedRoute {
    pub legs: Vec<Leg>,
    pub total_distance_m: u64,
    pub total_duration_s: u64,
    /// Full stop-id sequence in provider-optimized order, when requested and
    /// granted. The caller decides whether to apply it; nothing is reordered
    /// implicitly.
    pub reordered: Option<Vec<StopId>>,
}

/// Inclusive point-index windows over the resolved stop sequence. Each window
/// spans at most `ceiling + 1` points and starts where the previous one ends,
/// so segment n's destination is segment n+1's origin.
fn segment_bounds(point_count: usize, ceiling: usize) -> Vec<(usize, usize)> {
    let mut bounds = Vec::new();
    let mut start = 0;
    while start < point_count - 1 {
        let end = (start + ceiling).min(point_count - 1);
        bounds.push((start, end));
        start = end;
    }
    bounds
}

/// Computes the full leg sequence for the current stop list.
///
/// Fewer than two resolved stops is not an error: the route is simply empty
/// and no provider request is issued. Over-ceiling stop lists are split into
/// strictly sequential segment requests and the optimize flag is silently
/// dropped (the provider cannot reorder across segments).
pub async fn compute_route(
    provider: &dyn DirectionsProvider,
    stops: &[Stop],
    mode: TravelMode,
    optimize: bool,
    ceiling: usize,
) -> Result<ComputedRoute, RouteErrorKind> {
    let resolved: Vec<&Stop> = stops.iter().filter(|s| s.is_resolved()).collect();
    if resolved.len() < 2 {
        return Ok(ComputedRoute::default());
    }

    let waypoint_count = resolved.len() - 2;
    if waypoint_count <= ceiling {
        return compute_single(provider, &resolved, mode, optimize, waypoint_count).await;
    }

    if optimize {
        tracing::debug!(
            waypoint_count,
            ceiling,
            "route exceeds waypoint ceiling, disabling order optimization"
        );
    }

    let mut route = ComputedRoute::default();
    for (seg_start, seg_end) in segment_bounds(resolved.len(), ceiling) {
        let request = DirectionsRequest {
            origin: resolved[seg_start].name.clone(),
            destination: resolved[seg_end].name.clone(),
            waypoints: resolved[seg_start + 1..seg_end]
                .iter()
                .map(|s| s.name.clone())
                .collect(),
            mode,
            optimize: false,
        };
        // Sequential on purpose: totals accumulate in order and each
        // segment's origin is the previous segment's destination.
        let response = provider.directions(request).await?;
        for leg in response.legs {
            route.total_distance_m += u64::from(leg.distance_m);
            route.total_duration_s += u64::from(leg.duration_s);
            route.legs.push(leg);
        }
    }
    Ok(route)
}

async fn compute_single(
    provider: &dyn DirectionsProvider,
    resolved: &[&Stop],
    mode: TravelMode,
    optimize: bool,
    waypoint_count: usize,
) -> Result<ComputedRoute, RouteErrorKind> {
    // Reordering a single waypoint is meaningless; only ask with two or more.
    let optimize = optimize && waypoint_count >= 2;

    let request = DirectionsRequest {
        origin: resolved[0].name.clone(),
        destination: resolved[resolved.len() - 1].name.clone(),
        waypoints: resolved[1..resolved.len() - 1]
            .iter()
            .map(|s| s.name.clone())
            .collect(),
        mode,
        optimize,
    };
    let response = provider.directions(request).await?;

    let reordered = match response.waypoint_order {
        Some(order) => Some(reorder_ids(resolved, &order)?),
        None => None,
    };

    let mut route = ComputedRoute {
        reordered,
        ..ComputedRoute::default()
    };
    for leg in response.legs {
        route.total_distance_m += u64::from(leg.distance_m);
        route.total_duration_s += u64::from(leg.duration_s);
        route.legs.push(leg);
    }
    Ok(route)
}

/// Maps a provider waypoint permutation back onto stop ids. An order that
/// does not index the request's waypoints is a malformed payload and is
/// rejected here, at the boundary, before anything reaches application state.
fn reorder_ids(resolved: &[&Stop], order: &[usize]) -> Result<Vec<StopId>, RouteErrorKind> {
    let waypoint_count = resolved.len() - 2;
    if order.len() != waypoint_count {
        return Err(RouteErrorKind::InvalidRequest);
    }
    let mut ids = Vec::with_capacity(resolved.len());
    ids.push(resolved[0].id);
    for &idx in order {
        if idx >= waypoint_count {
            return Err(RouteErrorKind::InvalidRequest);
        }
        ids.push(resolved[1 + idx].id);
    }
    ids.push(resolved[resolved.len() - 1].id);
    Ok(ids)
}

/// Last successfully applied route plus the latest normalized error, if any.
/// A failed or stale computation never clears previously displayed legs.
#[derive(Debug, Clone, Default)]
pub struct RouteState {
    pub legs: Vec<Leg>,
    pub total_distance_m: u64,
    pub total_duration_s: u64,
    pub error: Option<RouteErrorKind>,
    pub generation: u64,
}

/// Debounced, generation-counted route computation.
///
/// Every stop-list mutation schedules a recompute. Rapid edits coalesce
/// during the quiet window, and a computation whose generation has been
/// superseded by the time its provider response lands is discarded on
/// arrival (last writer wins, keyed by issue order, not receipt order).
pub struct RouteComputer {
    provider: Arc<dyn DirectionsProvider>,
    ceiling: usize,
    debounce: Duration,
    generation: AtomicU64,
    state: RwLock<RouteState>,
}

impl RouteComputer {
    pub fn new(provider: Arc<dyn DirectionsProvider>, ceiling: usize, debounce: Duration) -> Self {
        Self {
            provider,
            ceiling,
            debounce,
            generation: AtomicU64::new(0),
            state: RwLock::new(RouteState::default()),
        }
    }

    pub fn waypoint_ceiling(&self) -> usize {
        self.ceiling
    }

    pub async fn state(&self) -> RouteState {
        self.state.read().await.clone()
    }

    /// Runs one debounced computation over a snapshot of the stop list.
    /// Returns the provider-optimized stop-id order when one was granted and
    /// this computation was still current on arrival.
    pub async fn recompute(
        &self,
        stops: Vec<Stop>,
        mode: TravelMode,
        optimize: bool,
    ) -> Option<Vec<StopId>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.debounce).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            // Superseded while waiting out the quiet window.
            return None;
        }

        let result = compute_route(
            self.provider.as_ref(),
            &stops,
            mode,
            optimize,
            self.ceiling,
        )
        .await;

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation || state.generation > generation {
            tracing::debug!(generation, "discarding stale route computation");
            return None;
        }

        match result {
            Ok(route) => {
                let reordered = route.reordered;
                *state = RouteState {
                    legs: route.legs,
                    total_distance_m: route.total_distance_m,
                    total_duration_s: route.total_duration_s,
                    error: None,
                    generation,
                };
                reordered
            }
            Err(kind) => {
                tracing::warn!(%kind, "route computation failed");
                state.error = Some(kind);
                state.generation = generation;
                None
            }
        }
    }
}
