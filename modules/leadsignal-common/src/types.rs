use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Communication sources ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommSource {
    Email,
    Calendar,
    Notes,
}

impl std::fmt::Display for CommSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommSource::Email => write!(f, "email"),
            CommSource::Calendar => write!(f, "calendar"),
            CommSource::Notes => write!(f, "notes"),
        }
    }
}

impl CommSource {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "email" | "gmail" => Some(Self::Email),
            "calendar" | "gcal" => Some(Self::Calendar),
            "notes" | "note" => Some(Self::Notes),
            _ => None,
        }
    }

    pub const ALL: [CommSource; 3] = [CommSource::Email, CommSource::Calendar, CommSource::Notes];
}

/// One raw communication record as delivered by a source collector.
/// Immutable as seen by the engine; `source_id` is opaque and unique
/// per originating system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCommunication {
    pub source: CommSource,
    pub source_id: String,
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    pub subject: Option<String>,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl RawCommunication {
    /// Subject + body as one haystack for signal matching.
    pub fn text(&self) -> String {
        match &self.subject {
            Some(s) => format!("{s}\n{}", self.body),
            None => self.body.clone(),
        }
    }
}

// --- Signals ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Customer,
    Investor,
    Partner,
}

impl std::fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalCategory::Customer => write!(f, "customer"),
            SignalCategory::Investor => write!(f, "investor"),
            SignalCategory::Partner => write!(f, "partner"),
        }
    }
}

impl SignalCategory {
    pub const ALL: [SignalCategory; 3] = [
        SignalCategory::Customer,
        SignalCategory::Investor,
        SignalCategory::Partner,
    ];
}

/// One matched commercial-intent signal. Strength is the per-signal
/// base weight from the keyword table (40–90).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    pub category: SignalCategory,
    pub strength: u8,
}

/// All signals matched in one RawCommunication, in table order.
/// Ephemeral: recomputed per ingestion, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalSet {
    pub signals: Vec<Signal>,
    /// Any urgency cue ("asap", "urgent", ...) present in the text.
    pub urgent: bool,
}

impl SignalSet {
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Sum of signal strengths for one category.
    pub fn cumulative_strength(&self, category: SignalCategory) -> u32 {
        self.signals
            .iter()
            .filter(|s| s.category == category)
            .map(|s| s.strength as u32)
            .sum()
    }

    /// Strongest single signal in one category, 0 if none.
    pub fn max_strength(&self, category: SignalCategory) -> u8 {
        self.signals
            .iter()
            .filter(|s| s.category == category)
            .map(|s| s.strength)
            .max()
            .unwrap_or(0)
    }

    /// Distinct signal names matched in one category.
    pub fn distinct_count(&self, category: SignalCategory) -> u32 {
        let mut names: Vec<&str> = self
            .signals
            .iter()
            .filter(|s| s.category == category)
            .map(|s| s.name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names.len() as u32
    }
}

// --- Lead types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeadType {
    Customer,
    Investor,
    Partner,
    Other,
}

impl std::fmt::Display for LeadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeadType::Customer => write!(f, "customer"),
            LeadType::Investor => write!(f, "investor"),
            LeadType::Partner => write!(f, "partner"),
            LeadType::Other => write!(f, "other"),
        }
    }
}

impl From<SignalCategory> for LeadType {
    fn from(c: SignalCategory) -> Self {
        match c {
            SignalCategory::Customer => LeadType::Customer,
            SignalCategory::Investor => LeadType::Investor,
            SignalCategory::Partner => LeadType::Partner,
        }
    }
}

impl LeadType {
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "customer" => LeadType::Customer,
            "investor" => LeadType::Investor,
            "partner" => LeadType::Partner,
            _ => LeadType::Other,
        }
    }

    pub const ALL: [LeadType; 4] = [
        LeadType::Customer,
        LeadType::Investor,
        LeadType::Partner,
        LeadType::Other,
    ];
}

// --- Risk assessment ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    LikelyOk,
    Caution,
    HighRisk,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::LikelyOk => write!(f, "likely_ok"),
            RiskLevel::Caution => write!(f, "caution"),
            RiskLevel::HighRisk => write!(f, "high_risk"),
        }
    }
}

impl RiskLevel {
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "caution" => RiskLevel::Caution,
            "high_risk" | "high-risk" | "scam" => RiskLevel::HighRisk,
            _ => RiskLevel::LikelyOk,
        }
    }
}

/// Outcome of the FounderShield check for an email-sourced record.
/// `verified = false` marks the neutral fallback used when the service
/// was unreachable — the lead is still created, never dropped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub risk_level: RiskLevel,
    pub verified: bool,
}

impl RiskAssessment {
    /// Neutral assessment used when verification is unavailable.
    pub fn unverified() -> Self {
        Self {
            score: 50,
            risk_level: RiskLevel::LikelyOk,
            verified: false,
        }
    }
}

// --- Lead lifecycle ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Closed,
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeadStatus::New => write!(f, "new"),
            LeadStatus::Contacted => write!(f, "contacted"),
            LeadStatus::Qualified => write!(f, "qualified"),
            LeadStatus::Converted => write!(f, "converted"),
            LeadStatus::Closed => write!(f, "closed"),
        }
    }
}

impl LeadStatus {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "new" => Some(LeadStatus::New),
            "contacted" => Some(LeadStatus::Contacted),
            "qualified" => Some(LeadStatus::Qualified),
            "converted" => Some(LeadStatus::Converted),
            "closed" => Some(LeadStatus::Closed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LeadStatus::Converted | LeadStatus::Closed)
    }

    /// Status state machine: new → contacted → qualified → {converted,
    /// closed}; any non-terminal status may close directly.
    pub fn can_transition_to(&self, to: LeadStatus) -> bool {
        if *self == to {
            return false;
        }
        match (self, to) {
            (s, LeadStatus::Closed) if !s.is_terminal() => true,
            (LeadStatus::New, LeadStatus::Contacted) => true,
            (LeadStatus::Contacted, LeadStatus::Qualified) => true,
            (LeadStatus::Qualified, LeadStatus::Converted) => true,
            _ => false,
        }
    }

    pub const ALL: [LeadStatus; 5] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::Converted,
        LeadStatus::Closed,
    ];
}

/// The durable lead aggregate. `lead_type`, `context`, and
/// `first_seen` are fixed at creation; the risk fields are set by the
/// first email-derived assessment (at creation or on a later merge)
/// and fixed after that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub lead_id: String,
    pub source: CommSource,
    pub lead_type: LeadType,
    pub contact_name: String,
    pub contact_email: Option<String>,
    pub company: Option<String>,
    pub status: LeadStatus,
    pub score: u8,
    pub confidence: f32,
    /// Deduplicated signal names accumulated over the lead's life.
    pub signals: Vec<String>,
    /// Excerpt from the communication that established the lead.
    pub context: String,
    pub first_seen: DateTime<Utc>,
    pub last_contact: DateTime<Utc>,
    pub conversation_count: u32,
    pub risk_level: Option<RiskLevel>,
    pub foundershield_score: Option<u8>,
    /// False when the risk service was unreachable at creation.
    pub risk_verified: bool,
    pub next_action: String,
}

// --- Interactions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    EmailReceived,
    EmailSent,
    Meeting,
    Call,
}

impl std::fmt::Display for InteractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionType::EmailReceived => write!(f, "email_received"),
            InteractionType::EmailSent => write!(f, "email_sent"),
            InteractionType::Meeting => write!(f, "meeting"),
            InteractionType::Call => write!(f, "call"),
        }
    }
}

impl InteractionType {
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "email_sent" => InteractionType::EmailSent,
            "meeting" => InteractionType::Meeting,
            "call" => InteractionType::Call,
            _ => InteractionType::EmailReceived,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

impl Direction {
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "outbound" => Direction::Outbound,
            _ => Direction::Inbound,
        }
    }
}

/// Append-only record of one touch with a lead. `source_id` carries
/// the originating system's id and is the idempotence key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub interaction_id: Uuid,
    pub lead_id: String,
    pub interaction_type: InteractionType,
    pub direction: Direction,
    pub content_summary: String,
    pub timestamp: DateTime<Utc>,
    pub source_id: String,
}

// --- Tasks ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    FollowUp,
    Demo,
    Pricing,
    MeetingPrep,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::FollowUp => write!(f, "follow_up"),
            TaskType::Demo => write!(f, "demo"),
            TaskType::Pricing => write!(f, "pricing"),
            TaskType::MeetingPrep => write!(f, "meeting_prep"),
        }
    }
}

impl TaskType {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "follow_up" | "followup" => Some(TaskType::FollowUp),
            "demo" => Some(TaskType::Demo),
            "pricing" => Some(TaskType::Pricing),
            "meeting_prep" => Some(TaskType::MeetingPrep),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Cancelled,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl TaskStatus {
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "completed" => TaskStatus::Completed,
            "cancelled" => TaskStatus::Cancelled,
            _ => TaskStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::Low => write!(f, "low"),
        }
    }
}

impl TaskPriority {
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "high" => TaskPriority::High,
            "low" => TaskPriority::Low,
            _ => TaskPriority::Medium,
        }
    }
}

/// Follow-up work generated by the lifecycle manager. Status only
/// moves pending → completed or pending → cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub lead_id: String,
    pub task_type: TaskType,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_happy_path_transitions() {
        assert!(LeadStatus::New.can_transition_to(LeadStatus::Contacted));
        assert!(LeadStatus::Contacted.can_transition_to(LeadStatus::Qualified));
        assert!(LeadStatus::Qualified.can_transition_to(LeadStatus::Converted));
        assert!(LeadStatus::Qualified.can_transition_to(LeadStatus::Closed));
    }

    #[test]
    fn status_any_non_terminal_can_close() {
        assert!(LeadStatus::New.can_transition_to(LeadStatus::Closed));
        assert!(LeadStatus::Contacted.can_transition_to(LeadStatus::Closed));
        assert!(LeadStatus::Qualified.can_transition_to(LeadStatus::Closed));
    }

    #[test]
    fn status_terminal_states_are_final() {
        for to in LeadStatus::ALL {
            assert!(!LeadStatus::Converted.can_transition_to(to));
            assert!(!LeadStatus::Closed.can_transition_to(to));
        }
    }

    #[test]
    fn status_no_skipping_stages() {
        assert!(!LeadStatus::New.can_transition_to(LeadStatus::Qualified));
        assert!(!LeadStatus::New.can_transition_to(LeadStatus::Converted));
        assert!(!LeadStatus::Contacted.can_transition_to(LeadStatus::Converted));
    }

    #[test]
    fn signal_set_cumulative_and_max() {
        let set = SignalSet {
            signals: vec![
                Signal {
                    name: "pricing".into(),
                    category: SignalCategory::Customer,
                    strength: 70,
                },
                Signal {
                    name: "demo".into(),
                    category: SignalCategory::Customer,
                    strength: 65,
                },
                Signal {
                    name: "investment".into(),
                    category: SignalCategory::Investor,
                    strength: 75,
                },
            ],
            urgent: false,
        };
        assert_eq!(set.cumulative_strength(SignalCategory::Customer), 135);
        assert_eq!(set.max_strength(SignalCategory::Customer), 70);
        assert_eq!(set.distinct_count(SignalCategory::Customer), 2);
        assert_eq!(set.cumulative_strength(SignalCategory::Investor), 75);
    }

    #[test]
    fn distinct_count_ignores_repeat_matches() {
        let pricing = Signal {
            name: "pricing".into(),
            category: SignalCategory::Customer,
            strength: 70,
        };
        let set = SignalSet {
            signals: vec![pricing.clone(), pricing],
            urgent: false,
        };
        assert_eq!(set.distinct_count(SignalCategory::Customer), 1);
    }

    #[test]
    fn risk_level_serializes_snake_case() {
        let json = serde_json::to_string(&RiskLevel::HighRisk).unwrap();
        assert_eq!(json, "\"high_risk\"");
        let json = serde_json::to_string(&RiskLevel::LikelyOk).unwrap();
        assert_eq!(json, "\"likely_ok\"");
    }

    #[test]
    fn unverified_assessment_is_neutral() {
        let a = RiskAssessment::unverified();
        assert_eq!(a.score, 50);
        assert_eq!(a.risk_level, RiskLevel::LikelyOk);
        assert!(!a.verified);
    }
}
