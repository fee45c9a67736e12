//! Score arithmetic for timed answers.

use std::time::Duration;

use crate::config::ScoringRules;

/// Whole seconds left on a countdown that started at `time_limit_secs` and
/// ticks down once per elapsed second.
pub fn time_left_secs(time_limit_secs: u32, elapsed: Duration) -> u32 {
    let elapsed_secs = u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX);
    time_limit_secs.saturating_sub(elapsed_secs)
}

/// Points awarded for an answer submitted with `time_left_secs` remaining.
///
/// Correct answers earn `base + floor(time_left / time_limit * bonus)`,
/// incorrect ones nothing. `time_left_secs` is clamped to the time limit.
pub fn points_for(
    rules: &ScoringRules,
    correct: bool,
    time_left_secs: u32,
    time_limit_secs: u32,
) -> u32 {
    if !correct {
        return 0;
    }
    if time_limit_secs == 0 {
        return rules.base_points;
    }

    let time_left = u64::from(time_left_secs.min(time_limit_secs));
    let bonus = time_left * u64::from(rules.bonus_points) / u64::from(time_limit_secs);
    rules
        .base_points
        .saturating_add(u32::try_from(bonus).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incorrect_answers_score_nothing() {
        let rules = ScoringRules::default();
        assert_eq!(points_for(&rules, false, 20, 20), 0);
        assert_eq!(points_for(&rules, false, 0, 20), 0);
    }

    #[test]
    fn full_time_left_earns_full_bonus() {
        let rules = ScoringRules::default();
        assert_eq!(points_for(&rules, true, 20, 20), 1500);
    }

    #[test]
    fn bonus_is_floored() {
        let rules = ScoringRules::default();
        // 7 / 30 * 500 = 116.66...
        assert_eq!(points_for(&rules, true, 7, 30), 1116);
        // 1 / 3 * 500 = 166.66...
        assert_eq!(points_for(&rules, true, 1, 3), 1166);
        assert_eq!(points_for(&rules, true, 10, 20), 1250);
    }

    #[test]
    fn score_stays_within_bounds() {
        let rules = ScoringRules::default();
        for limit in [5, 20, 120] {
            for left in 0..=limit + 3 {
                let points = points_for(&rules, true, left, limit);
                assert!(points >= rules.base_points);
                assert!(points <= rules.base_points + rules.bonus_points);
            }
        }
    }

    #[test]
    fn countdown_ticks_once_per_second() {
        assert_eq!(time_left_secs(20, Duration::ZERO), 20);
        assert_eq!(time_left_secs(20, Duration::from_millis(999)), 20);
        assert_eq!(time_left_secs(20, Duration::from_millis(1_000)), 19);
        assert_eq!(time_left_secs(20, Duration::from_millis(19_500)), 1);
        assert_eq!(time_left_secs(20, Duration::from_secs(20)), 0);
        assert_eq!(time_left_secs(20, Duration::from_secs(3_600)), 0);
    }

    #[test]
    fn custom_rules_are_honoured() {
        let rules = ScoringRules {
            base_points: 100,
            bonus_points: 0,
        };
        assert_eq!(points_for(&rules, true, 5, 10), 100);
    }

    #[test]
    fn huge_configured_points_saturate() {
        let rules = ScoringRules {
            base_points: u32::MAX - 10,
            bonus_points: u32::MAX,
        };
        assert_eq!(points_for(&rules, true, 20, 20), u32::MAX);
        assert_eq!(points_for(&rules, true, 0, 20), u32::MAX - 10);
    }
}
