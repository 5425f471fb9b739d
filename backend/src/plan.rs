//! The canonical stop list and every mutation the application may apply to
//! it. All edits go through `TripPlan`; nothing else reorders or rewrites
//! stops. Every operation preserves the sentinel invariant: exactly one
//! `start` at index 0 and one `end` at the last index.

use sniffertrek_shared::{Booking, Coordinate, Stop, StopId, StopRole};

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("no stop with id {0:?}")]
    UnknownStop(StopId),
    #[error("start and end stops cannot be removed or flagged as overnight")]
    SentinelRemoval,
    #[error("stop order does not match the current stop set")]
    OrderMismatch,
}

#[derive(Debug, Clone)]
pub struct TripPlan {
    stops: Vec<Stop>,
    next_id: u64,
}

impl TripPlan {
    pub fn new(start_name: impl Into<String>, end_name: impl Into<String>) -> Self {
        let mut plan = Self {
            stops: Vec::new(),
            next_id: 0,
        };
        let start = plan.make_stop(start_name.into(), StopRole::Start);
        let end = plan.make_stop(end_name.into(), StopRole::End);
        plan.stops = vec![start, end];
        plan
    }

    /// Rebuilds a plan from a persisted snapshot. Roles are reassigned by
    /// position and the id counter resumes past the highest id seen, so
    /// snapshot ids stay stable and new ids are never reused.
    pub fn from_stops(mut stops: Vec<Stop>) -> Self {
        if stops.len() < 2 {
            return Self::new("", "");
        }
        let next_id = stops.iter().map(|s| s.id.0).max().unwrap_or(0) + 1;
        assign_roles(&mut stops);
        Self { stops, next_id }
    }

    fn make_stop(&mut self, name: String, role: StopRole) -> Stop {
        let id = StopId(self.next_id);
        self.next_id += 1;
        Stop {
            id,
            name,
            role,
            coordinates: None,
            overnight: false,
            booking: None,
        }
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    /// Mutable access for coordinate write-back during placement. The slice
    /// cannot change length, so the sentinel positions stay intact.
    pub fn stops_mut(&mut self) -> &mut [Stop] {
        &mut self.stops
    }

    pub fn start(&self) -> &Stop {
        &self.stops[0]
    }

    pub fn end(&self) -> &Stop {
        &self.stops[self.stops.len() - 1]
    }

    fn index_of(&self, id: StopId) -> Result<usize, PlanError> {
        self.stops
            .iter()
            .position(|s| s.id == id)
            .ok_or(PlanError::UnknownStop(id))
    }

    fn clamp_waypoint_index(&self, index: usize) -> usize {
        index.clamp(1, self.stops.len() - 1)
    }

    /// Inserts an empty-named waypoint immediately before `end`.
    pub fn add_blank_waypoint(&mut self) -> StopId {
        let stop = self.make_stop(String::new(), StopRole::Waypoint);
        let id = stop.id;
        let index = self.stops.len() - 1;
        self.stops.insert(index, stop);
        id
    }

    /// Inserts a resolved waypoint at an explicit position (clamped between
    /// the sentinels).
    pub fn insert_waypoint_at(
        &mut self,
        index: usize,
        name: impl Into<String>,
        coordinates: Option<Coordinate>,
    ) -> StopId {
        let mut stop = self.make_stop(name.into(), StopRole::Waypoint);
        stop.coordinates = coordinates;
        let id = stop.id;
        let index = self.clamp_waypoint_index(index);
        self.stops.insert(index, stop);
        id
    }

    /// Re-inserts an existing stop (same id) at a new position, used when a
    /// rename relocates it.
    pub fn insert_stop_at(&mut self, index: usize, mut stop: Stop) {
        stop.role = StopRole::Waypoint;
        let index = self.clamp_waypoint_index(index);
        self.stops.insert(index, stop);
    }

    pub fn remove_waypoint(&mut self, id: StopId) -> Result<(), PlanError> {
        self.take_waypoint(id).map(|_| ())
    }

    /// Removes a waypoint and hands it back, refusing the sentinels.
    pub fn take_waypoint(&mut self, id: StopId) -> Result<Stop, PlanError> {
        let index = self.index_of(id)?;
        if self.stops[index].role != StopRole::Waypoint {
            return Err(PlanError::SentinelRemoval);
        }
        Ok(self.stops.remove(index))
    }

    pub fn rename_stop(&mut self, id: StopId, name: impl Into<String>) -> Result<(), PlanError> {
        let index = self.index_of(id)?;
        let name = name.into();
        if self.stops[index].name != name {
            // The name points somewhere else now; stale coordinates would
            // poison the placement heuristic.
            self.stops[index].coordinates = None;
            self.stops[index].name = name;
        }
        Ok(())
    }

    /// A renamed waypoint is re-placed through nearest insertion only when
    /// at least two other stops are resolved, mirroring the add path.
    pub fn is_relocatable(&self, id: StopId) -> bool {
        let Ok(index) = self.index_of(id) else {
            return false;
        };
        self.stops[index].role == StopRole::Waypoint
            && self
                .stops
                .iter()
                .filter(|s| s.id != id && s.is_resolved())
                .count()
                >= 2
    }

    /// Swaps the waypoint with its predecessor; no-op against `start`.
    pub fn move_up(&mut self, id: StopId) -> Result<bool, PlanError> {
        let index = self.index_of(id)?;
        if self.stops[index].role != StopRole::Waypoint || index <= 1 {
            return Ok(false);
        }
        self.stops.swap(index, index - 1);
        Ok(true)
    }

    /// Swaps the waypoint with its successor; no-op against `end`.
    pub fn move_down(&mut self, id: StopId) -> Result<bool, PlanError> {
        let index = self.index_of(id)?;
        if self.stops[index].role != StopRole::Waypoint || index + 2 >= self.stops.len() {
            return Ok(false);
        }
        self.stops.swap(index, index + 1);
        Ok(true)
    }

    /// Reverses the route: the whole list flips and roles are reassigned by
    /// position, so the old end's record (name, coordinates, booking) becomes
    /// the new start and the waypoint order inverts.
    pub fn reverse(&mut self) {
        self.stops.reverse();
        assign_roles(&mut self.stops);
    }

    /// Applies a provider-optimized order. The id sequence must be a
    /// permutation of the current stops with the sentinels untouched at the
    /// ends; anything else is rejected wholesale.
    pub fn apply_order(&mut self, order: &[StopId]) -> Result<(), PlanError> {
        if order.len() != self.stops.len() {
            return Err(PlanError::OrderMismatch);
        }
        let mut reordered = Vec::with_capacity(order.len());
        for id in order {
            let index = self
                .stops
                .iter()
                .position(|s| s.id == *id)
                .ok_or(PlanError::OrderMismatch)?;
            if reordered.iter().any(|s: &Stop| s.id == *id) {
                return Err(PlanError::OrderMismatch);
            }
            reordered.push(self.stops[index].clone());
        }
        if reordered[0].id != self.stops[0].id
            || reordered[order.len() - 1].id != self.stops[self.stops.len() - 1].id
        {
            return Err(PlanError::OrderMismatch);
        }
        assign_roles(&mut reordered);
        self.stops = reordered;
        Ok(())
    }

    /// Flips the overnight flag on a waypoint. The sentinels are refused: a
    /// flagged start or end would create spurious stage boundaries whenever
    /// its name matches a leg destination (round trips in particular). The
    /// booking record survives a flag turn-off so toggling back restores it;
    /// clearing is its own operation.
    pub fn toggle_overnight(&mut self, id: StopId) -> Result<bool, PlanError> {
        let index = self.index_of(id)?;
        let stop = &mut self.stops[index];
        if stop.role != StopRole::Waypoint {
            return Err(PlanError::SentinelRemoval);
        }
        stop.overnight = !stop.overnight;
        Ok(stop.overnight)
    }

    pub fn set_booking(&mut self, id: StopId, booking: Booking) -> Result<(), PlanError> {
        let index = self.index_of(id)?;
        self.stops[index].booking = Some(booking);
        Ok(())
    }

    pub fn clear_booking(&mut self, id: StopId) -> Result<(), PlanError> {
        let index = self.index_of(id)?;
        self.stops[index].booking = None;
        Ok(())
    }
}

fn assign_roles(stops: &mut [Stop]) {
    let last = stops.len() - 1;
    for (index, stop) in stops.iter_mut().enumerate() {
        stop.role = if index == 0 {
            StopRole::Start
        } else if index == last {
            StopRole::End
        } else {
            StopRole::Waypoint
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invariant_holds(plan: &TripPlan) -> bool {
        let stops = plan.stops();
        stops.len() >= 2
            && stops[0].role == StopRole::Start
            && stops[stops.len() - 1].role == StopRole::End
            && stops[1..stops.len() - 1]
                .iter()
                .all(|s| s.role == StopRole::Waypoint)
    }

    #[test]
    fn new_plan_has_sentinels_only() {
        let plan = TripPlan::new("Munich", "Rome");
        assert_eq!(plan.stops().len(), 2);
        assert_eq!(plan.start().name, "Munich");
        assert_eq!(plan.end().name, "Rome");
        assert!(invariant_holds(&plan));
    }

    #[test]
    fn blank_waypoint_lands_before_end() {
        let mut plan = TripPlan::new("Munich", "Rome");
        plan.add_blank_waypoint();
        let id = plan.add_blank_waypoint();
        assert_eq!(plan.stops().len(), 4);
        assert_eq!(plan.stops()[2].id, id);
        assert!(invariant_holds(&plan));
    }

    #[test]
    fn insert_index_is_clamped_to_waypoint_span() {
        let mut plan = TripPlan::new("Munich", "Rome");
        plan.insert_waypoint_at(0, "Verona", None);
        plan.insert_waypoint_at(99, "Florence", None);
        assert_eq!(plan.stops()[1].name, "Verona");
        assert_eq!(plan.stops()[2].name, "Florence");
        assert!(invariant_holds(&plan));
    }

    #[test]
    fn sentinels_cannot_be_removed() {
        let mut plan = TripPlan::new("Munich", "Rome");
        let start_id = plan.start().id;
        let end_id = plan.end().id;
        assert!(matches!(
            plan.remove_waypoint(start_id),
            Err(PlanError::SentinelRemoval)
        ));
        assert!(matches!(
            plan.remove_waypoint(end_id),
            Err(PlanError::SentinelRemoval)
        ));
    }

    #[test]
    fn ids_are_never_reused() {
        let mut plan = TripPlan::new("Munich", "Rome");
        let first = plan.add_blank_waypoint();
        plan.remove_waypoint(first).unwrap();
        let second = plan.add_blank_waypoint();
        assert_ne!(first, second);
    }

    #[test]
    fn move_up_and_down_swap_waypoints_only() {
        let mut plan = TripPlan::new("Munich", "Rome");
        let verona = plan.insert_waypoint_at(1, "Verona", None);
        let florence = plan.insert_waypoint_at(2, "Florence", None);

        assert!(plan.move_up(florence).unwrap());
        assert_eq!(plan.stops()[1].name, "Florence");

        // Already adjacent to start, further up is a no-op.
        assert!(!plan.move_up(florence).unwrap());
        assert!(!plan.move_down(verona).unwrap());
        assert!(invariant_holds(&plan));
    }

    #[test]
    fn reverse_swaps_names_and_inverts_waypoints() {
        let mut plan = TripPlan::new("X", "Y");
        plan.insert_waypoint_at(1, "P", None);
        plan.insert_waypoint_at(2, "Q", None);
        plan.reverse();

        let names: Vec<&str> = plan.stops().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Y", "Q", "P", "X"]);
        assert!(invariant_holds(&plan));
    }

    #[test]
    fn rename_clears_stale_coordinates() {
        let mut plan = TripPlan::new("Munich", "Rome");
        let id = plan.insert_waypoint_at(
            1,
            "Verona",
            Some(Coordinate {
                lat: 45.4,
                lng: 10.9,
            }),
        );
        plan.rename_stop(id, "Bologna").unwrap();
        assert!(plan.stops()[1].coordinates.is_none());
        assert_eq!(plan.stops()[1].name, "Bologna");
    }

    #[test]
    fn rename_to_same_name_keeps_coordinates() {
        let mut plan = TripPlan::new("Munich", "Rome");
        let id = plan.insert_waypoint_at(
            1,
            "Verona",
            Some(Coordinate {
                lat: 45.4,
                lng: 10.9,
            }),
        );
        plan.rename_stop(id, "Verona").unwrap();
        assert!(plan.stops()[1].coordinates.is_some());
    }

    #[test]
    fn relocatable_needs_two_other_resolved_stops() {
        let mut plan = TripPlan::new("Munich", "");
        let id = plan.insert_waypoint_at(1, "Verona", None);
        assert!(!plan.is_relocatable(id));

        plan.rename_stop(plan.end().id, "Rome").unwrap();
        assert!(plan.is_relocatable(id));
        assert!(!plan.is_relocatable(plan.start().id));
    }

    #[test]
    fn toggle_overnight_preserves_booking() {
        let mut plan = TripPlan::new("Munich", "Rome");
        let id = plan.insert_waypoint_at(1, "Verona", None);
        plan.set_booking(
            id,
            Booking {
                confirmation: Some("C-1".into()),
                ..Booking::default()
            },
        )
        .unwrap();

        assert!(plan.toggle_overnight(id).unwrap());
        assert!(!plan.toggle_overnight(id).unwrap());
        assert!(plan.stops()[1].booking.is_some());

        plan.clear_booking(id).unwrap();
        assert!(plan.stops()[1].booking.is_none());
    }

    #[test]
    fn overnight_toggle_refuses_sentinels() {
        let mut plan = TripPlan::new("Munich", "Munich");
        assert!(matches!(
            plan.toggle_overnight(plan.start().id),
            Err(PlanError::SentinelRemoval)
        ));
        assert!(matches!(
            plan.toggle_overnight(plan.end().id),
            Err(PlanError::SentinelRemoval)
        ));
        assert!(plan.stops().iter().all(|s| !s.overnight));
    }

    #[test]
    fn apply_order_accepts_valid_permutation() {
        let mut plan = TripPlan::new("Munich", "Rome");
        let a = plan.insert_waypoint_at(1, "Verona", None);
        let b = plan.insert_waypoint_at(2, "Florence", None);
        let order = vec![plan.start().id, b, a, plan.end().id];
        plan.apply_order(&order).unwrap();

        let names: Vec<&str> = plan.stops().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Munich", "Florence", "Verona", "Rome"]);
        assert!(invariant_holds(&plan));
    }

    #[test]
    fn apply_order_rejects_moved_sentinels_and_bad_sets() {
        let mut plan = TripPlan::new("Munich", "Rome");
        let a = plan.insert_waypoint_at(1, "Verona", None);

        let moved_sentinel = vec![a, plan.start().id, plan.end().id];
        assert!(plan.apply_order(&moved_sentinel).is_err());

        let short = vec![plan.start().id, plan.end().id];
        assert!(plan.apply_order(&short).is_err());

        let duplicated = vec![plan.start().id, a, a];
        assert!(plan.apply_order(&duplicated).is_err());
    }

    #[test]
    fn snapshot_restore_resumes_id_counter() {
        let mut plan = TripPlan::new("Munich", "Rome");
        plan.insert_waypoint_at(1, "Verona", None);
        let mut restored = TripPlan::from_stops(plan.stops().to_vec());
        let fresh = restored.add_blank_waypoint();
        assert!(plan.stops().iter().all(|s| s.id != fresh));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            AddBlank,
            InsertAt(usize),
            RemoveNth(usize),
            MoveUpNth(usize),
            MoveDownNth(usize),
            Reverse,
            ToggleNth(usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                Just(Op::AddBlank),
                (0usize..10).prop_map(Op::InsertAt),
                (0usize..10).prop_map(Op::RemoveNth),
                (0usize..10).prop_map(Op::MoveUpNth),
                (0usize..10).prop_map(Op::MoveDownNth),
                Just(Op::Reverse),
                (0usize..10).prop_map(Op::ToggleNth),
            ]
        }

        fn nth_waypoint(plan: &TripPlan, n: usize) -> Option<StopId> {
            plan.stops()
                .iter()
                .filter(|s| s.role == StopRole::Waypoint)
                .nth(n)
                .map(|s| s.id)
        }

        proptest! {
            #[test]
            fn prop_sentinel_invariant_survives_any_edit_sequence(
                ops in prop::collection::vec(op(), 0..40)
            ) {
                let mut plan = TripPlan::new("Start", "End");
                for op in ops {
                    match op {
                        Op::AddBlank => {
                            plan.add_blank_waypoint();
                        }
                        Op::InsertAt(i) => {
                            plan.insert_waypoint_at(i, "W", None);
                        }
                        Op::RemoveNth(n) => {
                            if let Some(id) = nth_waypoint(&plan, n) {
                                plan.remove_waypoint(id).unwrap();
                            }
                        }
                        Op::MoveUpNth(n) => {
                            if let Some(id) = nth_waypoint(&plan, n) {
                                plan.move_up(id).unwrap();
                            }
                        }
                        Op::MoveDownNth(n) => {
                            if let Some(id) = nth_waypoint(&plan, n) {
                                plan.move_down(id).unwrap();
                            }
                        }
                        Op::Reverse => plan.reverse(),
                        Op::ToggleNth(n) => {
                            if let Some(id) = nth_waypoint(&plan, n) {
                                plan.toggle_overnight(id).unwrap();
                            }
                        }
                    }
                    prop_assert!(invariant_holds(&plan));
                }
            }
        }
    }
}
