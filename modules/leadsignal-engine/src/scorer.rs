// Lead scoring — deterministic, pure, no I/O.
//
// Applied in order: base strength, breadth bonus, urgency bonus, risk
// multiplier, engagement bonus; clamped to 0–100 at the end.

use leadsignal_common::types::{RiskLevel, SignalCategory, SignalSet};

pub const BREADTH_STEP: u32 = 15;
pub const BREADTH_CAP: u32 = 50;
pub const URGENCY_BONUS: f64 = 10.0;
pub const ENGAGEMENT_STEP: u32 = 5;
pub const ENGAGEMENT_CAP: u32 = 25;
pub const CAUTION_MULTIPLIER: f64 = 0.7;
pub const HIGH_RISK_MULTIPLIER: f64 = 0.5;

/// Score a candidate lead. `conversation_count` is the count *before*
/// the incoming interaction (0 for a brand-new lead), so the
/// engagement bonus only applies on merge.
pub fn score(
    set: &SignalSet,
    winning: SignalCategory,
    risk_level: Option<RiskLevel>,
    conversation_count: u32,
) -> u8 {
    let base = set.max_strength(winning) as f64;

    let distinct = set.distinct_count(winning);
    let breadth = BREADTH_CAP.min(BREADTH_STEP * distinct.saturating_sub(1)) as f64;

    let mut value = base + breadth;
    if set.urgent {
        value += URGENCY_BONUS;
    }

    value *= match risk_level {
        Some(RiskLevel::Caution) => CAUTION_MULTIPLIER,
        Some(RiskLevel::HighRisk) => HIGH_RISK_MULTIPLIER,
        Some(RiskLevel::LikelyOk) | None => 1.0,
    };

    value += ENGAGEMENT_CAP.min(ENGAGEMENT_STEP * conversation_count) as f64;

    value.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadsignal_common::types::Signal;

    fn customer_set(strengths: &[(&str, u8)], urgent: bool) -> SignalSet {
        SignalSet {
            signals: strengths
                .iter()
                .map(|(name, strength)| Signal {
                    name: name.to_string(),
                    category: SignalCategory::Customer,
                    strength: *strength,
                })
                .collect(),
            urgent,
        }
    }

    #[test]
    fn pricing_plus_demo_scores_85() {
        let set = customer_set(&[("pricing", 70), ("demo", 65)], false);
        assert_eq!(score(&set, SignalCategory::Customer, Some(RiskLevel::LikelyOk), 0), 85);
    }

    #[test]
    fn single_signal_is_its_base_strength() {
        let set = customer_set(&[("pricing", 70)], false);
        assert_eq!(score(&set, SignalCategory::Customer, None, 0), 70);
    }

    #[test]
    fn breadth_bonus_caps_at_50() {
        let set = customer_set(
            &[("a", 60), ("b", 60), ("c", 60), ("d", 60), ("e", 60), ("f", 60)],
            false,
        );
        // 5 extra distinct signals would be 75; capped at 50.
        assert_eq!(score(&set, SignalCategory::Customer, None, 0), 100);
        let set = customer_set(&[("a", 40), ("b", 40), ("c", 40), ("d", 40), ("e", 40), ("f", 40)], false);
        assert_eq!(score(&set, SignalCategory::Customer, None, 0), 90); // 40 + 50
    }

    #[test]
    fn urgency_adds_ten() {
        let set = customer_set(&[("pricing", 70)], true);
        assert_eq!(score(&set, SignalCategory::Customer, None, 0), 80);
    }

    #[test]
    fn caution_multiplies_by_0_7() {
        let set = customer_set(&[("pricing", 70), ("demo", 65)], false);
        // (70 + 15) * 0.7 = 59.5 -> 60
        assert_eq!(score(&set, SignalCategory::Customer, Some(RiskLevel::Caution), 0), 60);
    }

    #[test]
    fn high_risk_halves() {
        let set = customer_set(&[("pricing", 70), ("demo", 65)], false);
        // (70 + 15) * 0.5 = 42.5 -> 43
        assert_eq!(score(&set, SignalCategory::Customer, Some(RiskLevel::HighRisk), 0), 43);
    }

    #[test]
    fn engagement_bonus_applies_after_risk_multiplier() {
        let set = customer_set(&[("pricing", 70)], false);
        // 70 * 0.5 + min(25, 5*2) = 45
        assert_eq!(score(&set, SignalCategory::Customer, Some(RiskLevel::HighRisk), 2), 45);
    }

    #[test]
    fn engagement_bonus_caps_at_25() {
        let set = customer_set(&[("pricing", 40)], false);
        assert_eq!(score(&set, SignalCategory::Customer, None, 100), 65);
    }

    #[test]
    fn output_always_in_range() {
        // Max everything.
        let set = customer_set(
            &[("a", 90), ("b", 90), ("c", 90), ("d", 90), ("e", 90), ("f", 90)],
            true,
        );
        assert_eq!(score(&set, SignalCategory::Customer, None, 50), 100);

        // Empty winning category.
        let empty = SignalSet::default();
        assert_eq!(score(&empty, SignalCategory::Customer, None, 0), 0);
    }

    #[test]
    fn no_engagement_bonus_on_first_contact() {
        let set = customer_set(&[("pricing", 70)], false);
        let fresh = score(&set, SignalCategory::Customer, None, 0);
        let merged = score(&set, SignalCategory::Customer, None, 1);
        assert_eq!(merged - fresh, 5);
    }
}
