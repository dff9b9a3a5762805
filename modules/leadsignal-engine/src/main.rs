use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use leadsignal_common::config::Config;
use leadsignal_common::types::{CommSource, LeadStatus, LeadType, TaskPriority, TaskType};
use leadsignal_engine::pipeline::{CancelToken, JsonFeedCollector, SourceCollector};
use leadsignal_engine::risk::{FounderShieldVerifier, NoopVerifier, RiskVerifier};
use leadsignal_engine::service::LeadService;
use leadsignal_store::{LeadFilter, LeadStore, MemoryLeadStore, PgLeadStore};

#[derive(Parser)]
#[command(name = "leadsignal")]
#[command(about = "Lead intelligence engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest communications from exported feed files
    Collect {
        /// JSON array of email records
        #[arg(long)]
        email_feed: Option<PathBuf>,

        /// JSON array of calendar records
        #[arg(long)]
        calendar_feed: Option<PathBuf>,

        /// JSON array of notes records
        #[arg(long)]
        notes_feed: Option<PathBuf>,

        /// Lookback window in days (overrides DAYS_BACK)
        #[arg(long)]
        days_back: Option<u32>,
    },

    /// List leads, most recent contact first
    List {
        /// customer | investor | partner | other
        #[arg(long)]
        lead_type: Option<String>,

        /// new | contacted | qualified | converted | closed
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        min_score: Option<u8>,
    },

    /// Show one lead with its interactions and tasks
    Show { lead_id: String },

    /// Move a lead to a new lifecycle status
    Status { lead_id: String, status: String },

    /// Create a follow-up task for a lead
    Task {
        lead_id: String,

        /// follow_up | demo | pricing | meeting_prep
        task_type: String,

        description: String,

        /// high | medium | low
        #[arg(long, default_value = "medium")]
        priority: String,

        #[arg(long, default_value_t = 3)]
        due_in_days: i64,
    },

    /// Mark a task completed
    Complete { task_id: Uuid },

    /// Cancel a pending task
    Cancel { task_id: Uuid },

    /// Print a lead as a CRM payload
    Export {
        lead_id: String,

        /// hubspot | salesforce | pipedrive
        target: String,
    },

    /// Aggregate lead and task counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("leadsignal=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let store: Arc<dyn LeadStore> = match &config.database_url {
        Some(url) => {
            let store = PgLeadStore::connect(url).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store (state is lost on exit)");
            Arc::new(MemoryLeadStore::new())
        }
    };

    let verifier: Arc<dyn RiskVerifier> = match &config.foundershield_api_key {
        Some(key) => Arc::new(FounderShieldVerifier::new(
            &config.foundershield_url,
            Some(key),
            Duration::from_secs(config.risk_timeout_secs),
        )),
        None => {
            warn!("FOUNDERSHIELD_API_KEY not set, leads will carry the neutral unverified assessment");
            Arc::new(NoopVerifier)
        }
    };

    let service = LeadService::new(store, verifier, config.risk_concurrency);

    match cli.command {
        Commands::Collect {
            email_feed,
            calendar_feed,
            notes_feed,
            days_back,
        } => {
            let mut collectors: Vec<Box<dyn SourceCollector>> = Vec::new();
            if let Some(path) = email_feed {
                collectors.push(Box::new(JsonFeedCollector::new(CommSource::Email, path)));
            }
            if let Some(path) = calendar_feed {
                collectors.push(Box::new(JsonFeedCollector::new(CommSource::Calendar, path)));
            }
            if let Some(path) = notes_feed {
                collectors.push(Box::new(JsonFeedCollector::new(CommSource::Notes, path)));
            }
            if collectors.is_empty() {
                return Err(anyhow!("at least one feed file is required"));
            }

            let cancel = CancelToken::new();
            let ctrl_c_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received, finishing current record");
                    ctrl_c_cancel.cancel();
                }
            });

            let stats = service
                .collect(&collectors, days_back.unwrap_or(config.days_back), &cancel)
                .await;
            info!("Collection run complete. {stats}");
        }

        Commands::List {
            lead_type,
            status,
            min_score,
        } => {
            let filter = LeadFilter {
                lead_type: lead_type.as_deref().map(LeadType::from_str_loose),
                status: match status.as_deref() {
                    Some(s) => Some(
                        LeadStatus::from_str_loose(s)
                            .ok_or_else(|| anyhow!("unknown status {s:?}"))?,
                    ),
                    None => None,
                },
                min_score,
                since: None,
            };
            let leads = service.list(&filter).await?;
            println!("{} lead(s)", leads.len());
            for lead in leads {
                println!(
                    "{}  [{:>3}] {:<9} {:<10} {}  — {}",
                    lead.lead_id,
                    lead.score,
                    lead.lead_type,
                    lead.status,
                    lead.contact_name,
                    lead.next_action
                );
            }
        }

        Commands::Show { lead_id } => {
            let detail = service.get(&lead_id).await?;
            println!("{}", serde_json::to_string_pretty(&detail.lead)?);
            println!("\nInteractions ({}):", detail.interactions.len());
            for i in &detail.interactions {
                println!(
                    "  {}  {} {}  {}",
                    i.timestamp, i.interaction_type, i.direction, i.content_summary
                );
            }
            println!("\nTasks ({}):", detail.tasks.len());
            for t in &detail.tasks {
                println!(
                    "  {}  {} [{}] {}  due {}  — {}",
                    t.task_id, t.task_type, t.priority, t.status, t.due_date, t.description
                );
            }
        }

        Commands::Status { lead_id, status } => {
            let to = LeadStatus::from_str_loose(&status)
                .ok_or_else(|| anyhow!("unknown status {status:?}"))?;
            let lead = service.update_status(&lead_id, to).await?;
            println!("{} -> {}", lead.lead_id, lead.status);
        }

        Commands::Task {
            lead_id,
            task_type,
            description,
            priority,
            due_in_days,
        } => {
            let task_type = TaskType::from_str_loose(&task_type)
                .ok_or_else(|| anyhow!("unknown task type {task_type:?}"))?;
            let task = service
                .create_task(
                    &lead_id,
                    task_type,
                    &description,
                    TaskPriority::from_str_loose(&priority),
                    due_in_days,
                )
                .await?;
            println!("created task {} due {}", task.task_id, task.due_date);
        }

        Commands::Complete { task_id } => {
            let task = service.complete_task(task_id).await?;
            println!("task {} completed", task.task_id);
        }

        Commands::Cancel { task_id } => {
            let task = service.cancel_task(task_id).await?;
            println!("task {} cancelled", task.task_id);
        }

        Commands::Export { lead_id, target } => {
            let payload = service.export(&lead_id, &target).await?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }

        Commands::Stats => {
            let counts = service.counts().await?;
            println!("Leads total:   {}", counts.total);
            println!("Average score: {:.1}", counts.avg_score);
            println!("Pending tasks: {}", counts.pending_tasks);
            println!("\nBy type:");
            for (lead_type, n) in &counts.by_type {
                println!("  {lead_type:<9} {n}");
            }
            println!("\nBy status:");
            for (status, n) in &counts.by_status {
                println!("  {status:<10} {n}");
            }
        }
    }

    Ok(())
}
