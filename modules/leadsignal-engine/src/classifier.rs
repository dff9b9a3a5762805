// Classification — the category with the highest cumulative matched
// strength wins. Confidence saturates at a cumulative strength of 150.

use leadsignal_common::types::{LeadType, SignalCategory, SignalSet};

/// Cumulative strength at which confidence reaches 1.0.
pub const CONFIDENCE_SATURATION: f32 = 150.0;

/// Exact-tie preference: investor leads are rarer and higher-value,
/// so false negatives there are costlier.
const TIE_BREAK_ORDER: [SignalCategory; 3] = [
    SignalCategory::Investor,
    SignalCategory::Partner,
    SignalCategory::Customer,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub category: SignalCategory,
    pub lead_type: LeadType,
    pub confidence: f32,
}

/// Classify a signal set. `None` means no category matched anything:
/// the record is dropped, not an error.
pub fn classify(set: &SignalSet) -> Option<Classification> {
    let mut winner: Option<(SignalCategory, u32)> = None;
    for category in TIE_BREAK_ORDER {
        let cumulative = set.cumulative_strength(category);
        if cumulative == 0 {
            continue;
        }
        // Strict > keeps the earlier (preferred) category on exact ties.
        if winner.map_or(true, |(_, best)| cumulative > best) {
            winner = Some((category, cumulative));
        }
    }

    winner.map(|(category, cumulative)| Classification {
        category,
        lead_type: category.into(),
        confidence: (cumulative as f32 / CONFIDENCE_SATURATION).min(1.0),
    })
}
