// Battle lifecycle and time-window math.
//
// Countdown math is always anchored to the original scheduled_start so
// every client computes identical remaining time without server push; an
// early manual start never moves it.

use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::db::{Battle, Database};
use crate::error::ApiError;
use crate::metrics;

pub const MIN_PARTICIPANTS: usize = 2;
pub const MAX_PARTICIPANTS: usize = 8;
pub const MAX_DURATION_MINUTES: i64 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleStatus {
    Pending,
    InProgress,
    Completed,
}

impl BattleStatus {
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

/// Seconds left in the battle's play window at `now` (unix seconds).
pub fn remaining_seconds(scheduled_start: i64, duration_minutes: i64, now: i64) -> i64 {
    (scheduled_start + duration_minutes * 60 - now).max(0)
}

/// Time-derived expiry. Callers deciding whether a battle is still
/// playable must use this, not the stored status alone (sweep lag).
pub fn is_expired(battle: &Battle, now: i64) -> bool {
    remaining_seconds(battle.scheduled_start, battle.duration_minutes, now) == 0
}

/// Owns battle lifecycle transitions and creation-time validation.
pub struct BattleScheduler {
    db: Arc<Database>,
}

impl BattleScheduler {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a pending battle over a random sample of the question pool.
    pub async fn create_battle(
        &self,
        scheduled_start: i64,
        duration_minutes: i64,
        participants: Vec<String>,
        question_count: usize,
    ) -> Result<Battle, ApiError> {
        if participants.len() < MIN_PARTICIPANTS || participants.len() > MAX_PARTICIPANTS {
            return Err(ApiError::validation(format!(
                "participant count must be between {MIN_PARTICIPANTS} and {MAX_PARTICIPANTS}"
            )));
        }
        let mut seen = std::collections::HashSet::new();
        if !participants.iter().all(|p| seen.insert(p.as_str())) {
            return Err(ApiError::validation("participants must be distinct"));
        }
        if duration_minutes < 1 || duration_minutes > MAX_DURATION_MINUTES {
            return Err(ApiError::validation(format!(
                "duration must be between 1 and {MAX_DURATION_MINUTES} minutes"
            )));
        }
        if question_count == 0 {
            return Err(ApiError::validation("question count must be at least 1"));
        }

        let pool = self.db.list_question_ids().await?;
        if question_count > pool.len() {
            return Err(ApiError::validation(format!(
                "question pool holds only {} questions",
                pool.len()
            )));
        }

        let question_ids: Vec<i64> = pool
            .choose_multiple(&mut rand::thread_rng(), question_count)
            .copied()
            .collect();

        let battle = self
            .db
            .create_battle(scheduled_start, duration_minutes, &question_ids, &participants)
            .await?;

        metrics::BATTLES_CREATED_TOTAL.inc();
        tracing::info!(
            battle_id = battle.id,
            participants = participants.len(),
            questions = question_count,
            "battle created"
        );
        Ok(battle)
    }

    /// Move a pending battle to in_progress. Early start is permitted and
    /// does not move scheduled_start.
    pub async fn start_battle(&self, id: i64, now: i64) -> Result<Battle, ApiError> {
        let battle = self
            .db
            .get_battle(id)
            .await?
            .ok_or_else(|| ApiError::not_found("battle not found"))?;

        if is_expired(&battle, now) {
            return Err(ApiError::conflict("battle time window has already passed"));
        }
        if !self
            .db
            .transition_battle_status(id, "pending", "in_progress")
            .await?
        {
            return Err(ApiError::conflict(format!(
                "battle is {}, cannot start",
                battle.status
            )));
        }

        metrics::ACTIVE_BATTLES.inc();
        tracing::info!(battle_id = id, "battle started");
        self.fetch(id).await
    }

    /// Move a battle to the terminal completed state. Idempotent: repeated
    /// or concurrent calls (other tabs, the expiry sweep) after the first
    /// successful transition are no-ops and never error.
    pub async fn end_battle(&self, id: i64) -> Result<Battle, ApiError> {
        if self.db.get_battle(id).await?.is_none() {
            return Err(ApiError::not_found("battle not found"));
        }

        if self
            .db
            .transition_battle_status(id, "in_progress", "completed")
            .await?
        {
            metrics::ACTIVE_BATTLES.dec();
            metrics::BATTLES_COMPLETED_TOTAL.inc();
            tracing::info!(battle_id = id, "battle completed");
        } else if self
            .db
            .transition_battle_status(id, "pending", "completed")
            .await?
        {
            // Never-started battle closed past its window.
            metrics::BATTLES_COMPLETED_TOTAL.inc();
            tracing::info!(battle_id = id, "pending battle closed");
        }

        self.fetch(id).await
    }

    /// One pass of the server-side sweep: auto-start pending battles whose
    /// scheduled time has arrived, auto-complete battles past their window.
    pub async fn run_sweep_pass(&self, now: i64) -> Result<(), ApiError> {
        for battle in self.db.list_unfinished_battles().await? {
            if is_expired(&battle, now) {
                self.end_battle(battle.id).await?;
            } else if battle.status == "pending" && battle.scheduled_start <= now {
                // Racing an explicit start_battle call is harmless: the
                // conditional transition makes the loser a no-op.
                if self
                    .db
                    .transition_battle_status(battle.id, "pending", "in_progress")
                    .await?
                {
                    metrics::ACTIVE_BATTLES.inc();
                    tracing::info!(battle_id = battle.id, "battle auto-started by sweep");
                }
            }
        }
        Ok(())
    }

    async fn fetch(&self, id: i64) -> Result<Battle, ApiError> {
        self.db
            .get_battle(id)
            .await?
            .ok_or_else(|| ApiError::not_found("battle not found"))
    }
}
