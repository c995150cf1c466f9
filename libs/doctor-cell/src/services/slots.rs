use shared_models::time::TimeOfDay;

use crate::models::EffectiveWindow;

/// Steps through a window in fixed increments of `duration + break`.
///
/// A slot is emitted only if it finishes by the window end. The iterator is
/// `Clone`, so a generated sequence can be replayed without recomputing the
/// inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotIter {
    next: Option<TimeOfDay>,
    end: TimeOfDay,
    duration_minutes: u32,
    step_minutes: u32,
}

impl Iterator for SlotIter {
    type Item = TimeOfDay;

    fn next(&mut self) -> Option<TimeOfDay> {
        let current = self.next?;
        let slot_end = current.checked_add_minutes(self.duration_minutes)?;
        if slot_end > self.end {
            self.next = None;
            return None;
        }
        self.next = current.checked_add_minutes(self.step_minutes);
        Some(current)
    }
}

pub struct SlotGenerator;

impl SlotGenerator {
    pub fn generate(
        start: TimeOfDay,
        end: TimeOfDay,
        duration_minutes: u32,
        break_minutes: u32,
    ) -> SlotIter {
        SlotIter {
            // a zero-length slot would never advance
            next: (duration_minutes > 0).then_some(start),
            end,
            duration_minutes,
            step_minutes: duration_minutes.saturating_add(break_minutes),
        }
    }

    pub fn for_window(
        window: &EffectiveWindow,
        duration_minutes: u32,
        break_minutes: u32,
    ) -> SlotIter {
        Self::generate(window.start, window.end, duration_minutes, break_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn render(iter: SlotIter) -> Vec<String> {
        iter.map(|slot| slot.to_string()).collect()
    }

    #[test]
    fn last_slot_may_end_exactly_at_window_end() {
        let slots = render(SlotGenerator::generate(t("09:00"), t("10:00"), 30, 0));
        assert_eq!(slots, vec!["09:00", "09:30"]);
    }

    #[test]
    fn partial_slots_are_dropped() {
        let slots = render(SlotGenerator::generate(t("09:00"), t("09:50"), 30, 0));
        assert_eq!(slots, vec!["09:00"]);
    }

    #[test]
    fn break_time_spaces_slots() {
        let slots = render(SlotGenerator::generate(t("09:00"), t("11:00"), 30, 15));
        assert_eq!(slots, vec!["09:00", "09:45", "10:30"]);
    }

    #[test]
    fn window_shorter_than_duration_yields_nothing() {
        assert_eq!(SlotGenerator::generate(t("09:00"), t("09:20"), 30, 0).count(), 0);
    }

    #[test]
    fn zero_duration_yields_nothing() {
        assert_eq!(SlotGenerator::generate(t("09:00"), t("10:00"), 0, 5).count(), 0);
    }

    #[test]
    fn oversized_break_yields_a_single_slot() {
        let slots = render(SlotGenerator::generate(t("00:00"), t("24:00"), 60, u32::MAX));
        assert_eq!(slots, vec!["00:00"]);
        assert_eq!(SlotGenerator::generate(t("00:00"), t("24:00"), u32::MAX, u32::MAX).count(), 0);
    }

    #[test]
    fn window_ending_at_midnight() {
        let slots = render(SlotGenerator::generate(t("23:00"), t("24:00"), 30, 0));
        assert_eq!(slots, vec!["23:00", "23:30"]);
    }

    #[test]
    fn generation_is_deterministic_and_restartable() {
        let iter = SlotGenerator::generate(t("08:00"), t("12:00"), 20, 10);
        let first: Vec<TimeOfDay> = iter.clone().collect();
        let second: Vec<TimeOfDay> = iter.collect();
        let third: Vec<TimeOfDay> =
            SlotGenerator::generate(t("08:00"), t("12:00"), 20, 10).collect();
        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(first.len(), 8);
    }
}
