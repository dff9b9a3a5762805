// Postgres-backed LeadStore. Schema is created by `migrate`; the
// unique index on interactions (lead_id, source_id) is the durable
// half of the idempotence guarantee — re-ingesting the same
// communication cannot double-count.

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use leadsignal_common::types::{
    CommSource, Direction, Interaction, InteractionType, Lead, LeadStatus, LeadType, RiskLevel,
    Task, TaskPriority, TaskStatus, TaskType,
};

use crate::{LeadCounts, LeadFilter, LeadStore};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS leads (
        lead_id             TEXT PRIMARY KEY,
        identity_key        TEXT NOT NULL UNIQUE,
        source              TEXT NOT NULL,
        lead_type           TEXT NOT NULL,
        contact_name        TEXT NOT NULL,
        contact_email       TEXT,
        company             TEXT,
        status              TEXT NOT NULL,
        score               INT NOT NULL,
        confidence          REAL NOT NULL,
        signals             JSONB NOT NULL DEFAULT '[]',
        context             TEXT NOT NULL,
        first_seen          TIMESTAMPTZ NOT NULL,
        last_contact        TIMESTAMPTZ NOT NULL,
        conversation_count  INT NOT NULL,
        risk_level          TEXT,
        foundershield_score INT,
        risk_verified       BOOLEAN NOT NULL DEFAULT TRUE,
        next_action         TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS interactions (
        interaction_id   UUID PRIMARY KEY,
        lead_id          TEXT NOT NULL REFERENCES leads(lead_id),
        interaction_type TEXT NOT NULL,
        direction        TEXT NOT NULL,
        content_summary  TEXT NOT NULL,
        timestamp        TIMESTAMPTZ NOT NULL,
        source_id        TEXT NOT NULL,
        UNIQUE (lead_id, source_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        task_id      UUID PRIMARY KEY,
        lead_id      TEXT NOT NULL REFERENCES leads(lead_id),
        task_type    TEXT NOT NULL,
        description  TEXT NOT NULL,
        status       TEXT NOT NULL,
        priority     TEXT NOT NULL,
        due_date     TIMESTAMPTZ NOT NULL,
        completed_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_leads_status ON leads(status)",
    "CREATE INDEX IF NOT EXISTS idx_leads_type ON leads(lead_type)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_lead ON tasks(lead_id, status)",
];

pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("connecting to Postgres")?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        for stmt in MIGRATIONS {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        info!("Lead store migrations applied");
        Ok(())
    }
}

fn lead_from_row(row: &PgRow) -> Result<Lead> {
    let source: String = row.try_get("source")?;
    let lead_type: String = row.try_get("lead_type")?;
    let status: String = row.try_get("status")?;
    let risk_level: Option<String> = row.try_get("risk_level")?;
    let score: i32 = row.try_get("score")?;
    let conversation_count: i32 = row.try_get("conversation_count")?;
    let foundershield_score: Option<i32> = row.try_get("foundershield_score")?;
    let signals: serde_json::Value = row.try_get("signals")?;

    Ok(Lead {
        lead_id: row.try_get("lead_id")?,
        source: CommSource::from_str_loose(&source)
            .ok_or_else(|| anyhow::anyhow!("unknown source in store: {source}"))?,
        lead_type: LeadType::from_str_loose(&lead_type),
        contact_name: row.try_get("contact_name")?,
        contact_email: row.try_get("contact_email")?,
        company: row.try_get("company")?,
        status: LeadStatus::from_str_loose(&status)
            .ok_or_else(|| anyhow::anyhow!("unknown status in store: {status}"))?,
        score: score.clamp(0, 100) as u8,
        confidence: row.try_get("confidence")?,
        signals: serde_json::from_value(signals)?,
        context: row.try_get("context")?,
        first_seen: row.try_get("first_seen")?,
        last_contact: row.try_get("last_contact")?,
        conversation_count: conversation_count.max(0) as u32,
        risk_level: risk_level.map(|r| RiskLevel::from_str_loose(&r)),
        foundershield_score: foundershield_score.map(|s| s.clamp(0, 100) as u8),
        risk_verified: row.try_get("risk_verified")?,
        next_action: row.try_get("next_action")?,
    })
}

fn interaction_from_row(row: &PgRow) -> Result<Interaction> {
    let interaction_type: String = row.try_get("interaction_type")?;
    let direction: String = row.try_get("direction")?;
    Ok(Interaction {
        interaction_id: row.try_get("interaction_id")?,
        lead_id: row.try_get("lead_id")?,
        interaction_type: InteractionType::from_str_loose(&interaction_type),
        direction: Direction::from_str_loose(&direction),
        content_summary: row.try_get("content_summary")?,
        timestamp: row.try_get("timestamp")?,
        source_id: row.try_get("source_id")?,
    })
}

fn task_from_row(row: &PgRow) -> Result<Task> {
    let task_type: String = row.try_get("task_type")?;
    let status: String = row.try_get("status")?;
    let priority: String = row.try_get("priority")?;
    Ok(Task {
        task_id: row.try_get("task_id")?,
        lead_id: row.try_get("lead_id")?,
        task_type: TaskType::from_str_loose(&task_type)
            .ok_or_else(|| anyhow::anyhow!("unknown task type in store: {task_type}"))?,
        description: row.try_get("description")?,
        status: TaskStatus::from_str_loose(&status),
        priority: TaskPriority::from_str_loose(&priority),
        due_date: row.try_get("due_date")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn get(&self, lead_id: &str) -> Result<Option<Lead>> {
        let row = sqlx::query("SELECT * FROM leads WHERE lead_id = $1")
            .bind(lead_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(lead_from_row).transpose()
    }

    async fn get_by_identity(&self, identity: &str) -> Result<Option<Lead>> {
        let row = sqlx::query("SELECT * FROM leads WHERE identity_key = $1")
            .bind(identity)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(lead_from_row).transpose()
    }

    async fn upsert_lead(
        &self,
        identity: &str,
        lead: &Lead,
        interaction: &Interaction,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO leads (
                lead_id, identity_key, source, lead_type, contact_name,
                contact_email, company, status, score, confidence, signals,
                context, first_seen, last_contact, conversation_count,
                risk_level, foundershield_score, risk_verified, next_action
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $19
            )
            ON CONFLICT (lead_id) DO UPDATE SET
                status = EXCLUDED.status,
                score = EXCLUDED.score,
                confidence = EXCLUDED.confidence,
                signals = EXCLUDED.signals,
                last_contact = EXCLUDED.last_contact,
                conversation_count = EXCLUDED.conversation_count,
                next_action = EXCLUDED.next_action
            "#,
        )
        .bind(&lead.lead_id)
        .bind(identity)
        .bind(lead.source.to_string())
        .bind(lead.lead_type.to_string())
        .bind(&lead.contact_name)
        .bind(&lead.contact_email)
        .bind(&lead.company)
        .bind(lead.status.to_string())
        .bind(lead.score as i32)
        .bind(lead.confidence)
        .bind(serde_json::to_value(&lead.signals)?)
        .bind(&lead.context)
        .bind(lead.first_seen)
        .bind(lead.last_contact)
        .bind(lead.conversation_count as i32)
        .bind(lead.risk_level.map(|r| r.to_string()))
        .bind(lead.foundershield_score.map(|s| s as i32))
        .bind(lead.risk_verified)
        .bind(&lead.next_action)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO interactions (
                interaction_id, lead_id, interaction_type, direction,
                content_summary, timestamp, source_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (lead_id, source_id) DO NOTHING
            "#,
        )
        .bind(interaction.interaction_id)
        .bind(&interaction.lead_id)
        .bind(interaction.interaction_type.to_string())
        .bind(interaction.direction.to_string())
        .bind(&interaction.content_summary)
        .bind(interaction.timestamp)
        .bind(&interaction.source_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_lead(&self, lead: &Lead) -> Result<()> {
        let result = sqlx::query(
            "UPDATE leads SET status = $2, next_action = $3, score = $4 WHERE lead_id = $1",
        )
        .bind(&lead.lead_id)
        .bind(lead.status.to_string())
        .bind(&lead.next_action)
        .bind(lead.score as i32)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("lead not found: {}", lead.lead_id);
        }
        Ok(())
    }

    async fn list(&self, filter: &LeadFilter) -> Result<Vec<Lead>> {
        let mut builder = sqlx::QueryBuilder::new("SELECT * FROM leads WHERE TRUE");
        if let Some(t) = filter.lead_type {
            builder.push(" AND lead_type = ").push_bind(t.to_string());
        }
        if let Some(s) = filter.status {
            builder.push(" AND status = ").push_bind(s.to_string());
        }
        if let Some(min) = filter.min_score {
            builder.push(" AND score >= ").push_bind(min as i32);
        }
        if let Some(since) = filter.since {
            builder.push(" AND last_contact >= ").push_bind(since);
        }
        builder.push(" ORDER BY last_contact DESC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(lead_from_row).collect()
    }

    async fn interaction_source_ids(&self, lead_id: &str) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT source_id FROM interactions WHERE lead_id = $1")
            .bind(lead_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("source_id").map_err(Into::into))
            .collect()
    }

    async fn interactions_for_lead(&self, lead_id: &str) -> Result<Vec<Interaction>> {
        let rows =
            sqlx::query("SELECT * FROM interactions WHERE lead_id = $1 ORDER BY timestamp ASC")
                .bind(lead_id)
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(interaction_from_row).collect()
    }

    async fn insert_task(&self, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (
                task_id, lead_id, task_type, description, status,
                priority, due_date, completed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(task.task_id)
        .bind(&task.lead_id)
        .bind(task.task_type.to_string())
        .bind(&task.description)
        .bind(task.status.to_string())
        .bind(task.priority.to_string())
        .bind(task.due_date)
        .bind(task.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pending_task_exists(&self, lead_id: &str, task_type: TaskType) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 AS present FROM tasks
             WHERE lead_id = $1 AND task_type = $2 AND status = 'pending' LIMIT 1",
        )
        .bind(lead_id)
        .bind(task_type.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        let result =
            sqlx::query("UPDATE tasks SET status = $2, completed_at = $3 WHERE task_id = $1")
                .bind(task.task_id)
                .bind(task.status.to_string())
                .bind(task.completed_at)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("task not found: {}", task.task_id);
        }
        Ok(())
    }

    async fn tasks_for_lead(&self, lead_id: &str) -> Result<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE lead_id = $1 ORDER BY due_date ASC")
            .bind(lead_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn counts(&self) -> Result<LeadCounts> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS n FROM leads")
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;

        let type_rows = sqlx::query("SELECT lead_type, COUNT(*) AS n FROM leads GROUP BY lead_type")
            .fetch_all(&self.pool)
            .await?;
        let mut by_type = Vec::new();
        for row in &type_rows {
            let t: String = row.try_get("lead_type")?;
            let n: i64 = row.try_get("n")?;
            by_type.push((LeadType::from_str_loose(&t), n as u64));
        }

        let status_rows = sqlx::query("SELECT status, COUNT(*) AS n FROM leads GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        let mut by_status = Vec::new();
        for row in &status_rows {
            let s: String = row.try_get("status")?;
            let n: i64 = row.try_get("n")?;
            if let Some(status) = LeadStatus::from_str_loose(&s) {
                by_status.push((status, n as u64));
            }
        }

        let avg_score: Option<f64> =
            sqlx::query("SELECT AVG(score)::FLOAT8 AS avg FROM leads")
                .fetch_one(&self.pool)
                .await?
                .try_get("avg")?;

        let pending_tasks: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM tasks WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?
                .try_get("n")?;

        Ok(LeadCounts {
            total: total as u64,
            by_type,
            by_status,
            avg_score: avg_score.unwrap_or(0.0),
            pending_tasks: pending_tasks as u64,
        })
    }
}
