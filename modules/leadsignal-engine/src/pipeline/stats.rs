use leadsignal_common::types::{CommSource, LeadType};

/// A record the run could not persist or resolve. The run reports it
/// and continues; it never aborts the batch.
#[derive(Debug, Clone)]
pub struct FailedRecord {
    pub source_id: String,
    pub reason: String,
}

/// Stats from one collection run.
#[derive(Debug, Default)]
pub struct CollectStats {
    pub records_seen: u32,
    pub skipped_no_signals: u32,
    pub duplicates_ignored: u32,
    pub leads_created: u32,
    pub leads_merged: u32,
    pub tasks_created: u32,
    pub risk_unverified: u32,
    pub by_source: [u32; 3], // email, calendar, notes
    pub by_type: [u32; 4],   // customer, investor, partner, other
    pub failed: Vec<FailedRecord>,
    pub cancelled: bool,
}

impl CollectStats {
    pub fn record_source(&mut self, source: CommSource) {
        let idx = match source {
            CommSource::Email => 0,
            CommSource::Calendar => 1,
            CommSource::Notes => 2,
        };
        self.by_source[idx] += 1;
    }

    pub fn record_created(&mut self, lead_type: LeadType) {
        self.leads_created += 1;
        let idx = match lead_type {
            LeadType::Customer => 0,
            LeadType::Investor => 1,
            LeadType::Partner => 2,
            LeadType::Other => 3,
        };
        self.by_type[idx] += 1;
    }
}

impl std::fmt::Display for CollectStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Collection Run Complete ===")?;
        if self.cancelled {
            writeln!(f, "(run cancelled before completion)")?;
        }
        writeln!(f, "Records seen:       {}", self.records_seen)?;
        writeln!(f, "No signals:         {}", self.skipped_no_signals)?;
        writeln!(f, "Duplicates ignored: {}", self.duplicates_ignored)?;
        writeln!(f, "Leads created:      {}", self.leads_created)?;
        writeln!(f, "Leads merged:       {}", self.leads_merged)?;
        writeln!(f, "Tasks created:      {}", self.tasks_created)?;
        writeln!(f, "Risk unverified:    {}", self.risk_unverified)?;
        writeln!(f, "\nBy source:")?;
        writeln!(f, "  Email:    {}", self.by_source[0])?;
        writeln!(f, "  Calendar: {}", self.by_source[1])?;
        writeln!(f, "  Notes:    {}", self.by_source[2])?;
        writeln!(f, "\nNew leads by type:")?;
        writeln!(f, "  Customer: {}", self.by_type[0])?;
        writeln!(f, "  Investor: {}", self.by_type[1])?;
        writeln!(f, "  Partner:  {}", self.by_type[2])?;
        writeln!(f, "  Other:    {}", self.by_type[3])?;
        if !self.failed.is_empty() {
            writeln!(f, "\nFailed records:")?;
            for failure in &self.failed {
                writeln!(f, "  {}: {}", failure.source_id, failure.reason)?;
            }
        }
        Ok(())
    }
}
