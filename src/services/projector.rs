//! Decides which slots of a day are offered for selection.
//!
//! The projection is a pure function of the raw catalog, the current
//! selection and the package rules; it is recomputed on every request.

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::models::{PackageRules, SelectedSlot, TimeSlot};
use crate::services::catalog::SLOT_STEP_MINUTES;

/// Nominal start of the business day, 08:00.
pub const DAY_START_MINUTES: i64 = 480;

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionError {
    Capacity { max: usize },
    NotSelectable,
    UnknownSlot,
}

impl std::fmt::Display for SelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionError::Capacity { max } => {
                write!(f, "You can only select {max} slots for this package.")
            }
            SelectionError::NotSelectable => {
                write!(f, "That time slot can't be combined with your current selection.")
            }
            SelectionError::UnknownSlot => {
                write!(f, "That time slot is not offered on the selected date.")
            }
        }
    }
}

impl std::error::Error for SelectionError {}

/// Outcome of clicking a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Toggle {
    Added(TimeSlot),
    Removed,
}

pub fn is_selected(selected: &[SelectedSlot], slot: &TimeSlot) -> bool {
    selected.iter().any(|s| s.matches(slot))
}

/// Slots to display, in catalog order.
pub fn project(catalog: &[TimeSlot], selected: &[SelectedSlot], rules: &PackageRules) -> Vec<TimeSlot> {
    let total_step = rules.total_step();

    // Only selections that belong to this day constrain it.
    let chosen: Vec<&TimeSlot> = catalog.iter().filter(|s| is_selected(selected, s)).collect();
    let last_end = chosen.iter().map(|s| s.end_minutes()).max();

    catalog
        .iter()
        .filter(|slot| {
            if is_selected(selected, slot) {
                return true;
            }
            if !slot.available {
                return false;
            }
            if chosen.iter().any(|c| slot.overlaps(c)) {
                return false;
            }

            let start = slot.start_minutes();
            if let Some(last_end) = last_end {
                if start >= last_end {
                    return (start - last_end).rem_euclid(total_step) == 0;
                }
            }

            if (start - DAY_START_MINUTES).rem_euclid(total_step) == 0 {
                return true;
            }

            follows_booked_slot(catalog, start)
        })
        .cloned()
        .collect()
}

/// The fine-grained slot just before `start` is taken by someone else.
fn follows_booked_slot(catalog: &[TimeSlot], start: i64) -> bool {
    let previous = start - i64::from(SLOT_STEP_MINUTES);
    catalog
        .iter()
        .find(|s| s.start_minutes() == previous)
        .is_some_and(|s| !s.available)
}

/// Select or deselect the slot starting at `start`.
pub fn toggle(
    catalog: &[TimeSlot],
    selection: &mut Vec<SelectedSlot>,
    date: NaiveDate,
    start: &DateTime<FixedOffset>,
    rules: &PackageRules,
) -> Result<Toggle, SelectionError> {
    if let Some(pos) = selection.iter().position(|s| s.time == *start) {
        selection.remove(pos);
        return Ok(Toggle::Removed);
    }

    if selection.len() >= rules.max_slots {
        return Err(SelectionError::Capacity {
            max: rules.max_slots,
        });
    }

    let slot = catalog
        .iter()
        .find(|s| s.start_time == *start)
        .ok_or(SelectionError::UnknownSlot)?;

    if !slot.available {
        return Err(SelectionError::NotSelectable);
    }
    let offered = project(catalog, selection, rules);
    if !offered.iter().any(|s| s.start_time == *start) {
        return Err(SelectionError::NotSelectable);
    }

    selection.push(SelectedSlot {
        date,
        time: slot.start_time,
    });
    Ok(Toggle::Added(slot.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Billing;
    use chrono::Duration;

    fn rules(duration: u32, margin: u32, max_slots: usize) -> PackageRules {
        PackageRules {
            max_slots,
            duration,
            margin,
            billing: Billing::PerSlot,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
    }

    fn at(minutes: i64) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-06-16T00:00:00+10:00").unwrap() + Duration::minutes(minutes)
    }

    /// Day from 07:00 to 17:00 in 15-minute steps.
    fn day(duration: i64, unavailable: &[i64]) -> Vec<TimeSlot> {
        (420..=1020)
            .step_by(15)
            .map(|m| TimeSlot {
                start_time: at(m),
                end_time: at(m + duration),
                available: !unavailable.contains(&m),
            })
            .collect()
    }

    fn pick(minutes: i64) -> SelectedSlot {
        SelectedSlot {
            date: date(),
            time: at(minutes),
        }
    }

    fn starts(slots: &[TimeSlot]) -> Vec<i64> {
        slots.iter().map(|s| s.start_minutes()).collect()
    }

    #[test]
    fn test_standard_grid_without_selection() {
        let shown = starts(&project(&day(60, &[]), &[], &rules(60, 15, 10)));
        assert!(shown.contains(&480));
        assert!(shown.contains(&555));
        assert!(shown.contains(&630));
        assert!(!shown.contains(&540));
        assert!(!shown.contains(&495));
        assert!(!shown.contains(&420));
        assert!(shown.iter().all(|m| (m - 480).rem_euclid(75) == 0));
    }

    #[test]
    fn test_slot_before_day_start_on_grid() {
        let catalog: Vec<TimeSlot> = vec![TimeSlot {
            start_time: at(405),
            end_time: at(465),
            available: true,
        }];
        assert_eq!(starts(&project(&catalog, &[], &rules(60, 15, 10))), vec![405]);
    }

    #[test]
    fn test_unavailable_slots_hidden() {
        let shown = starts(&project(&day(60, &[480]), &[], &rules(60, 15, 10)));
        assert!(!shown.contains(&480));
    }

    #[test]
    fn test_edge_exception_after_booked_slot() {
        // 09:00 is off-grid but 08:45 is taken, so 09:00 becomes a start point.
        let shown = starts(&project(&day(60, &[525]), &[], &rules(60, 15, 10)));
        assert!(shown.contains(&540));
        assert!(!shown.contains(&525));
        // 09:30 follows 09:15, which is free
        assert!(!shown.contains(&570));
    }

    #[test]
    fn test_off_grid_slot_hidden_without_exception() {
        let shown = starts(&project(&day(60, &[]), &[], &rules(60, 15, 10)));
        assert!(!shown.contains(&540));
    }

    #[test]
    fn test_selected_slot_always_shown_even_if_unavailable() {
        let catalog = day(60, &[540]);
        let shown = starts(&project(&catalog, &[pick(540)], &rules(60, 15, 10)));
        assert!(shown.contains(&540));
    }

    #[test]
    fn test_overlapping_slots_hidden() {
        let catalog = day(60, &[]);
        let shown = starts(&project(&catalog, &[pick(480)], &rules(60, 15, 10)));
        for m in [435, 450, 465, 495, 510, 525] {
            assert!(!shown.contains(&m), "{m} overlaps 08:00-09:00");
        }
        assert!(shown.contains(&480));
    }

    #[test]
    fn test_reanchored_grid_after_selection() {
        let catalog = day(60, &[]);
        let shown = starts(&project(&catalog, &[pick(480)], &rules(60, 15, 10)));
        // lastEnd = 09:00 (540): diff 0 and 75 qualify, 15 does not.
        assert!(shown.contains(&540));
        assert!(!shown.contains(&555));
        assert!(shown.contains(&615));
        assert!(shown.contains(&690));
        assert!(!shown.contains(&630));
    }

    #[test]
    fn test_margin_gap_alone_does_not_qualify() {
        // A [08:00-09:00] selected, B at 09:15: (555 - 540) mod 75 = 15.
        let catalog = day(60, &[]);
        let shown = project(&catalog, &[pick(480)], &rules(60, 15, 10));
        assert!(!shown.iter().any(|s| s.start_minutes() == 555));
    }

    #[test]
    fn test_reanchor_ignores_edge_exception() {
        // After lastEnd only the re-anchored grid decides, even next to a booked slot.
        let catalog = day(60, &[570]);
        let shown = starts(&project(&catalog, &[pick(480)], &rules(60, 15, 10)));
        assert!(!shown.contains(&585));
    }

    #[test]
    fn test_slots_before_selection_use_standard_grid() {
        let catalog = day(60, &[]);
        let shown = starts(&project(&catalog, &[pick(780)], &rules(60, 15, 10)));
        assert!(shown.contains(&480));
        assert!(shown.contains(&555));
        assert!(!shown.contains(&540));
    }

    #[test]
    fn test_selection_on_other_date_does_not_constrain() {
        let other = SelectedSlot {
            date: NaiveDate::from_ymd_opt(2025, 6, 17).unwrap(),
            time: at(480) + Duration::days(1),
        };
        let with = starts(&project(&day(60, &[]), &[other], &rules(60, 15, 10)));
        let without = starts(&project(&day(60, &[]), &[], &rules(60, 15, 10)));
        assert_eq!(with, without);
    }

    #[test]
    fn test_never_shows_unavailable_unless_selected() {
        let unavailable = [480, 555, 600, 705];
        let catalog = day(60, &unavailable);
        for sel in [vec![], vec![pick(630)], vec![pick(630), pick(780)]] {
            for slot in project(&catalog, &sel, &rules(60, 15, 10)) {
                assert!(slot.available || is_selected(&sel, &slot));
            }
        }
    }

    #[test]
    fn test_two_hour_grid() {
        let shown = starts(&project(&day(120, &[]), &[], &rules(120, 30, 10)));
        assert_eq!(&shown[..3], &[480, 630, 780]);
    }

    #[test]
    fn test_toggle_adds_and_removes() {
        let catalog = day(60, &[]);
        let r = rules(60, 15, 10);
        let mut selection = Vec::new();

        let added = toggle(&catalog, &mut selection, date(), &at(480), &r).unwrap();
        assert!(matches!(added, Toggle::Added(ref s) if s.start_minutes() == 480));
        assert_eq!(selection, vec![pick(480)]);

        assert_eq!(toggle(&catalog, &mut selection, date(), &at(480), &r).unwrap(), Toggle::Removed);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_toggle_rejects_over_capacity() {
        let catalog = day(60, &[]);
        let r = rules(60, 15, 2);
        let mut selection = Vec::new();
        toggle(&catalog, &mut selection, date(), &at(480), &r).unwrap();
        toggle(&catalog, &mut selection, date(), &at(540), &r).unwrap();

        let err = toggle(&catalog, &mut selection, date(), &at(600), &r).unwrap_err();
        assert_eq!(err, SelectionError::Capacity { max: 2 });
        assert_eq!(selection.len(), 2);
        assert_eq!(err.to_string(), "You can only select 2 slots for this package.");
    }

    #[test]
    fn test_deselect_succeeds_regardless_of_grid() {
        // 09:00 would no longer be offered once 08:00 is dropped, yet both can be removed.
        let catalog = day(60, &[]);
        let r = rules(60, 15, 10);
        let mut selection = Vec::new();
        toggle(&catalog, &mut selection, date(), &at(480), &r).unwrap();
        toggle(&catalog, &mut selection, date(), &at(540), &r).unwrap();

        assert_eq!(toggle(&catalog, &mut selection, date(), &at(480), &r).unwrap(), Toggle::Removed);
        assert_eq!(toggle(&catalog, &mut selection, date(), &at(540), &r).unwrap(), Toggle::Removed);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_deselect_works_at_capacity() {
        let catalog = day(60, &[]);
        let r = rules(60, 15, 1);
        let mut selection = Vec::new();
        toggle(&catalog, &mut selection, date(), &at(480), &r).unwrap();
        assert_eq!(toggle(&catalog, &mut selection, date(), &at(480), &r).unwrap(), Toggle::Removed);
    }

    #[test]
    fn test_toggle_rejects_hidden_and_unknown_slots() {
        let catalog = day(60, &[630]);
        let r = rules(60, 15, 10);
        let mut selection = Vec::new();

        assert_eq!(
            toggle(&catalog, &mut selection, date(), &at(540), &r).unwrap_err(),
            SelectionError::NotSelectable
        );
        assert_eq!(
            toggle(&catalog, &mut selection, date(), &at(630), &r).unwrap_err(),
            SelectionError::NotSelectable
        );
        assert_eq!(
            toggle(&catalog, &mut selection, date(), &at(1200), &r).unwrap_err(),
            SelectionError::UnknownSlot
        );
        assert!(selection.is_empty());
    }
}
