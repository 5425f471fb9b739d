//! Stage (Etappe) builder: partitions the leg sequence into day-by-day stages
//! at each stop flagged as an overnight hotel stay.

use sniffertrek_shared::{Leg, Stage, StageHotel, Stop};

use crate::geo::{format_duration, round_km};

/// Matches a leg destination against an overnight stop name.
///
/// Case-insensitive substring in either direction: provider-formatted
/// addresses usually embed the user's stop name ("Hotel Post, Innsbruck,
/// Austria" vs "Innsbruck"). Empty names are skipped outright, they would
/// match every destination.
pub(crate) fn names_match(destination: &str, stop_name: &str) -> bool {
    let stop_name = stop_name.trim();
    if stop_name.is_empty() {
        return false;
    }
    let destination = destination.to_lowercase();
    let stop_name = stop_name.to_lowercase();
    destination.contains(&stop_name) || stop_name.contains(&destination)
}

fn hotel_metadata(stop: &Stop) -> StageHotel {
    let booking = stop.booking.as_ref();
    StageHotel {
        booked: booking.is_some_and(|b| b.is_confirmed()),
        hotel_name: booking.and_then(|b| b.hotel_name.clone()),
        address: booking.and_then(|b| b.address.clone()),
    }
}

fn close_stage(index: usize, origin: String, legs: Vec<Leg>, hotel: Option<StageHotel>) -> Stage {
    let distance_m: u64 = legs.iter().map(|l| u64::from(l.distance_m)).sum();
    let duration_s: u64 = legs.iter().map(|l| u64::from(l.duration_s)).sum();
    let destination = legs
        .last()
        .map(|l| l.destination.clone())
        .unwrap_or_else(|| origin.clone());
    Stage {
        index,
        label: format!("Stage {}", index + 1),
        origin,
        destination,
        distance_km: round_km(distance_m),
        duration_s: duration_s as u32,
        duration: format_duration(duration_s),
        legs,
        hotel,
    }
}

/// Walks the leg sequence and closes a stage whenever a leg's destination
/// fuzzy-matches an overnight stop (first match in overnight-stop order
/// wins). Remaining legs form a final stage ending at the route's end name.
///
/// An overnight stop whose name matches no leg destination simply produces
/// no boundary; it is absorbed into the surrounding stage.
pub fn build_stages(legs: &[Leg], stops: &[Stop], start_name: &str, end_name: &str) -> Vec<Stage> {
    if legs.is_empty() {
        return Vec::new();
    }

    let overnight: Vec<&Stop> = stops.iter().filter(|s| s.overnight).collect();
    let mut stages = Vec::new();
    let mut current: Vec<Leg> = Vec::new();
    let mut origin = start_name.to_string();

    for leg in legs {
        current.push(leg.clone());
        let matched = overnight
            .iter()
            .find(|stop| names_match(&leg.destination, &stop.name));
        if let Some(stop) = matched {
            let next_origin = leg.destination.clone();
            stages.push(close_stage(
                stages.len(),
                origin,
                std::mem::take(&mut current),
                Some(hotel_metadata(stop)),
            ));
            origin = next_origin;
        }
    }

    if !current.is_empty() {
        let mut last = close_stage(stages.len(), origin, current, None);
        // The trailing stage ends the trip; show the route's end name even if
        // the provider formatted the final destination differently.
        if !end_name.trim().is_empty() {
            last.destination = end_name.to_string();
        }
        stages.push(last);
    }
    stages
}

#[cfg(test)]
mod tests {
    use super::*;
    use sniffertrek_shared::{Booking, StopId, StopRole};

    fn leg(origin: &str, destination: &str, km: u32) -> Leg {
        Leg {
            origin: origin.into(),
            destination: destination.into(),
            distance_m: km * 1000,
            duration_s: km * 60,
        }
    }

    fn overnight_stop(id: u64, name: &str) -> Stop {
        Stop {
            id: StopId(id),
            name: name.into(),
            role: StopRole::Waypoint,
            coordinates: None,
            overnight: true,
            booking: None,
        }
    }

    fn five_legs() -> Vec<Leg> {
        vec![
            leg("A", "B", 10),
            leg("B", "C", 20),
            leg("C", "D, Tirol, Austria", 30),
            leg("D, Tirol, Austria", "E", 40),
            leg("E", "F", 50),
        ]
    }

    #[test]
    fn no_legs_no_stages() {
        assert!(build_stages(&[], &[], "A", "F").is_empty());
    }

    #[test]
    fn no_overnight_yields_single_stage() {
        let stages = build_stages(&five_legs(), &[], "A", "F");
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].label, "Stage 1");
        assert_eq!(stages[0].origin, "A");
        assert_eq!(stages[0].destination, "F");
        assert_eq!(stages[0].legs.len(), 5);
        assert_eq!(stages[0].distance_km, 150);
    }

    #[test]
    fn overnight_match_splits_after_third_leg() {
        let stops = vec![overnight_stop(1, "D")];
        let stages = build_stages(&five_legs(), &stops, "A", "F");
        assert_eq!(stages.len(), 2);

        assert_eq!(stages[0].legs.len(), 3);
        assert_eq!(stages[0].origin, "A");
        assert_eq!(stages[0].destination, "D, Tirol, Austria");
        assert_eq!(stages[0].distance_km, 60);

        assert_eq!(stages[1].legs.len(), 2);
        assert_eq!(stages[1].origin, "D, Tirol, Austria");
        assert_eq!(stages[1].destination, "F");
        assert_eq!(stages[1].label, "Stage 2");
        assert!(stages[1].hotel.is_none());
    }

    #[test]
    fn booking_confirmation_marks_stage_booked() {
        let mut stop = overnight_stop(1, "D");
        stop.booking = Some(Booking {
            hotel_name: Some("Alpenhof".into()),
            address: Some("Dorfstrasse 1".into()),
            confirmation: Some("CONF-7".into()),
            ..Booking::default()
        });
        let stages = build_stages(&five_legs(), &[stop], "A", "F");
        let hotel = stages[0].hotel.as_ref().unwrap();
        assert!(hotel.booked);
        assert_eq!(hotel.hotel_name.as_deref(), Some("Alpenhof"));
        assert_eq!(hotel.address.as_deref(), Some("Dorfstrasse 1"));
    }

    #[test]
    fn unconfirmed_booking_is_not_booked() {
        let mut stop = overnight_stop(1, "D");
        stop.booking = Some(Booking {
            hotel_name: Some("Alpenhof".into()),
            ..Booking::default()
        });
        let stages = build_stages(&five_legs(), &[stop], "A", "F");
        assert!(!stages[0].hotel.as_ref().unwrap().booked);
    }

    #[test]
    fn unmatched_overnight_is_absorbed() {
        // The name must share no substring with any leg label, in either
        // direction, or the fuzzy match would create a boundary.
        let stops = vec![overnight_stop(1, "Zqx")];
        let stages = build_stages(&five_legs(), &stops, "A", "F");
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].legs.len(), 5);
    }

    #[test]
    fn empty_named_overnight_never_matches() {
        let stops = vec![overnight_stop(1, "  ")];
        let stages = build_stages(&five_legs(), &stops, "A", "F");
        assert_eq!(stages.len(), 1);
    }

    #[test]
    fn first_overnight_in_list_order_wins_ties() {
        let first = {
            let mut s = overnight_stop(1, "D");
            s.booking = Some(Booking {
                hotel_name: Some("First".into()),
                ..Booking::default()
            });
            s
        };
        let second = {
            let mut s = overnight_stop(2, "Tirol");
            s.booking = Some(Booking {
                hotel_name: Some("Second".into()),
                ..Booking::default()
            });
            s
        };
        // Leg 3's destination substring-matches both overnight stops; the
        // first one in list order supplies the hotel metadata.
        let stages = build_stages(&five_legs(), &[first, second], "A", "F");
        assert_eq!(stages.len(), 2);
        assert_eq!(
            stages[0].hotel.as_ref().unwrap().hotel_name.as_deref(),
            Some("First")
        );
    }

    #[test]
    fn overnight_on_final_destination_ends_last_stage() {
        let legs = vec![leg("A", "B", 10), leg("B", "F", 20)];
        let stops = vec![overnight_stop(1, "B")];
        let stages = build_stages(&legs, &stops, "A", "F");
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].destination, "F");
    }

    #[test]
    fn stage_duration_formatting() {
        let legs = vec![leg("A", "B", 125)];
        let stages = build_stages(&legs, &[], "A", "B");
        // 125 legs-minutes = 2 h 5 min.
        assert_eq!(stages[0].duration, "2 h 5 min");
    }
}
