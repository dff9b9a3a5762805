// Signal extraction — pure keyword/phrase matching over one
// RawCommunication. The tables below are the single source of truth
// for signal names, categories, and base strengths; classification
// picks the winner, extraction keeps every match.

use regex::Regex;

use leadsignal_common::types::{RawCommunication, Signal, SignalCategory, SignalSet};

/// One row of the signal table: a named signal, its category, base
/// strength (40–90), and the phrases that trigger it.
pub struct SignalSpec {
    pub name: &'static str,
    pub category: SignalCategory,
    pub strength: u8,
    pub phrases: &'static [&'static str],
}

/// Per-signal base strengths. Strengths are calibrated so that a
/// pricing+demo email lands at 85 before risk or engagement effects.
pub const SIGNAL_TABLE: &[SignalSpec] = &[
    // --- Customer ---
    SignalSpec {
        name: "pricing",
        category: SignalCategory::Customer,
        strength: 70,
        phrases: &["pricing", "price", "how much does it cost", "cost of", "quote", "quotation"],
    },
    SignalSpec {
        name: "demo",
        category: SignalCategory::Customer,
        strength: 65,
        phrases: &["demo", "demonstration", "walkthrough", "walk-through"],
    },
    SignalSpec {
        name: "trial",
        category: SignalCategory::Customer,
        strength: 60,
        phrases: &["free trial", "trial", "pilot"],
    },
    SignalSpec {
        name: "purchase_intent",
        category: SignalCategory::Customer,
        strength: 75,
        phrases: &["ready to buy", "purchase", "subscribe", "sign up", "procurement"],
    },
    SignalSpec {
        name: "evaluation",
        category: SignalCategory::Customer,
        strength: 50,
        phrases: &["evaluating", "evaluation", "comparing vendors", "shortlist"],
    },
    // --- Investor ---
    SignalSpec {
        name: "investment",
        category: SignalCategory::Investor,
        strength: 75,
        phrases: &["investment", "investing", "invest"],
    },
    SignalSpec {
        name: "funding",
        category: SignalCategory::Investor,
        strength: 80,
        phrases: &["funding", "fundraise", "fundraising", "seed round", "series a", "series b"],
    },
    SignalSpec {
        name: "cap_table",
        category: SignalCategory::Investor,
        strength: 85,
        phrases: &["cap table"],
    },
    SignalSpec {
        name: "term_sheet",
        category: SignalCategory::Investor,
        strength: 85,
        phrases: &["term sheet"],
    },
    SignalSpec {
        name: "venture_capital",
        category: SignalCategory::Investor,
        strength: 70,
        phrases: &["vc", "venture capital", "venture fund", "angel investor"],
    },
    SignalSpec {
        name: "due_diligence",
        category: SignalCategory::Investor,
        strength: 75,
        phrases: &["due diligence", "data room"],
    },
    // --- Partner ---
    SignalSpec {
        name: "partnership",
        category: SignalCategory::Partner,
        strength: 75,
        phrases: &["partnership", "partner with", "partnering"],
    },
    SignalSpec {
        name: "integration",
        category: SignalCategory::Partner,
        strength: 70,
        phrases: &["integration", "integrate", "api access"],
    },
    SignalSpec {
        name: "white_label",
        category: SignalCategory::Partner,
        strength: 80,
        phrases: &["white label", "white-label"],
    },
    SignalSpec {
        name: "reseller",
        category: SignalCategory::Partner,
        strength: 70,
        phrases: &["reseller", "resell", "channel partner"],
    },
    SignalSpec {
        name: "partner_mention",
        category: SignalCategory::Partner,
        strength: 60,
        phrases: &["partner"],
    },
    SignalSpec {
        name: "collaboration",
        category: SignalCategory::Partner,
        strength: 55,
        phrases: &["collaborate", "collaboration", "joint venture", "co-marketing"],
    },
];

/// Urgency cues add a flat scoring bonus; they are not signals.
pub const URGENCY_CUES: &[&str] = &["asap", "urgent", "today", "immediately"];

/// Compiled signal tables. Built once at process start and passed by
/// reference; never mutated.
pub struct SignalMatcher {
    matchers: Vec<(usize, Regex)>,
    urgency: Regex,
}

impl SignalMatcher {
    pub fn new() -> Self {
        let matchers = SIGNAL_TABLE
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let alternates = spec
                    .phrases
                    .iter()
                    .map(|p| regex::escape(p))
                    .collect::<Vec<_>>()
                    .join("|");
                let re = Regex::new(&format!(r"(?i)\b(?:{alternates})\b"))
                    .expect("signal table phrase must compile");
                (i, re)
            })
            .collect();

        let cues = URGENCY_CUES
            .iter()
            .map(|c| regex::escape(c))
            .collect::<Vec<_>>()
            .join("|");
        let urgency =
            Regex::new(&format!(r"(?i)\b(?:{cues})\b")).expect("urgency cues must compile");

        Self { matchers, urgency }
    }

    /// Match one communication against the full table. Pure; keeps all
    /// category matches.
    pub fn extract(&self, raw: &RawCommunication) -> SignalSet {
        let haystack = raw.text();
        let signals = self
            .matchers
            .iter()
            .filter(|(_, re)| re.is_match(&haystack))
            .map(|(i, _)| {
                let spec = &SIGNAL_TABLE[*i];
                Signal {
                    name: spec.name.to_string(),
                    category: spec.category,
                    strength: spec.strength,
                }
            })
            .collect();

        SignalSet {
            signals,
            urgent: self.urgency.is_match(&haystack),
        }
    }
}

impl Default for SignalMatcher {
    fn default() -> Self {
        Self::new()
    }
}
