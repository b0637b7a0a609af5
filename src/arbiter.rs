// Concurrent answer arbitration.
//
// Every submitter gets their own attempt recorded; XP for a question goes
// to exactly one participant, decided by the storage-level conditional
// update inside the Database::record_answer transaction.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::{AnswerRow, AnswerWrite, Database};
use crate::error::ApiError;
use crate::metrics;
use crate::scheduler::is_expired;

/// A participant's recorded attempt at one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub answer: String,
    pub is_correct: bool,
    pub xp_earned: i64,
    pub time_taken_seconds: i64,
    pub answered_at: String,
}

impl From<AnswerRow> for Attempt {
    fn from(row: AnswerRow) -> Self {
        Attempt {
            answer: row.answer,
            is_correct: row.is_correct,
            xp_earned: row.xp_earned,
            time_taken_seconds: row.time_taken_seconds,
            answered_at: row.answered_at,
        }
    }
}

/// Outcome of a submission, also returned verbatim for duplicate calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub is_correct: bool,
    pub correct_answer: String,
    pub xp_earned: i64,
    /// True when this call re-read a previously recorded attempt instead
    /// of recording a new one.
    pub already_answered: bool,
    pub attempt: Attempt,
    pub score: i64,
    pub correct_count: i64,
    pub answers_completed: i64,
    pub total_questions: i64,
    pub finished: bool,
}

pub struct AnswerArbiter {
    db: Arc<Database>,
}

impl AnswerArbiter {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record one participant's answer to one question.
    ///
    /// `now` is unix seconds; expiry is derived from the battle's time
    /// window so submissions are rejected the instant the window closes,
    /// even while the stored status still reads in_progress.
    pub async fn submit_answer(
        &self,
        battle_id: i64,
        question_id: i64,
        user_name: &str,
        answer: &str,
        time_taken_seconds: i64,
        now: i64,
    ) -> Result<SubmitOutcome, ApiError> {
        let battle = self
            .db
            .get_battle(battle_id)
            .await?
            .ok_or_else(|| ApiError::not_found("battle not found"))?;

        if battle.status != "in_progress" {
            return Err(ApiError::conflict(format!(
                "battle is {}, not accepting answers",
                battle.status
            )));
        }
        if is_expired(&battle, now) {
            return Err(ApiError::conflict("battle time window has passed"));
        }

        if self.db.get_participant(battle_id, user_name).await?.is_none() {
            return Err(ApiError::forbidden("not a participant of this battle"));
        }

        let question_ids = self.db.battle_question_ids(battle_id).await?;
        if !question_ids.contains(&question_id) {
            return Err(ApiError::not_found("question is not part of this battle"));
        }
        let total_questions = question_ids.len() as i64;

        let question = self
            .db
            .get_question(question_id)
            .await?
            .ok_or_else(|| ApiError::not_found("question not found"))?;

        // Resubmission: hand back the originally recorded result untouched.
        if let Some(existing) = self.db.get_answer(battle_id, user_name, question_id).await? {
            metrics::ANSWERS_SUBMITTED_TOTAL
                .with_label_values(&["duplicate"])
                .inc();
            return self
                .outcome(battle_id, user_name, existing, &question.correct_answer, true, total_questions)
                .await;
        }

        let normalized = answer.trim().to_uppercase();
        if !matches!(normalized.as_str(), "A" | "B" | "C" | "D") {
            return Err(ApiError::validation("answer must be one of A, B, C, D"));
        }

        let is_correct = normalized == question.correct_answer.to_uppercase();

        // Solve race, answer row, and score update commit as one
        // transaction; only a correct answer may claim the solve, and the
        // conditional update inside commits at most one claimant. Timing
        // is recorded for display but never arbitrates. A concurrent
        // duplicate that slipped past the read above loses the UNIQUE race
        // and comes back as the originally recorded row.
        let row = match self
            .db
            .record_answer(
                battle_id,
                user_name,
                question_id,
                &normalized,
                is_correct,
                question.xp_reward,
                time_taken_seconds,
            )
            .await?
        {
            AnswerWrite::Duplicate(existing) => {
                metrics::ANSWERS_SUBMITTED_TOTAL
                    .with_label_values(&["duplicate"])
                    .inc();
                return self
                    .outcome(battle_id, user_name, existing, &question.correct_answer, true, total_questions)
                    .await;
            }
            AnswerWrite::Recorded { row, claimed_solve } => {
                if claimed_solve {
                    metrics::SOLVE_RACE_WINS_TOTAL.inc();
                }
                row
            }
        };

        let answered = self.db.count_answers(battle_id, user_name).await?;
        if answered >= total_questions {
            let finished_at = chrono::Utc::now().to_rfc3339();
            if self
                .db
                .mark_participant_finished(battle_id, user_name, &finished_at)
                .await?
            {
                tracing::info!(battle_id, user_name, "participant finished all questions");
            }
        }

        metrics::ANSWERS_SUBMITTED_TOTAL
            .with_label_values(&[if is_correct { "correct" } else { "incorrect" }])
            .inc();
        metrics::ANSWER_TIME_SECONDS.observe(time_taken_seconds as f64);

        self.outcome(battle_id, user_name, row, &question.correct_answer, false, total_questions)
            .await
    }

    async fn outcome(
        &self,
        battle_id: i64,
        user_name: &str,
        row: AnswerRow,
        correct_answer: &str,
        already_answered: bool,
        total_questions: i64,
    ) -> Result<SubmitOutcome, ApiError> {
        let participant = self
            .db
            .get_participant(battle_id, user_name)
            .await?
            .ok_or_else(|| ApiError::forbidden("not a participant of this battle"))?;
        let answers_completed = self.db.count_answers(battle_id, user_name).await?;

        Ok(SubmitOutcome {
            is_correct: row.is_correct,
            correct_answer: correct_answer.to_string(),
            xp_earned: row.xp_earned,
            already_answered,
            attempt: row.into(),
            score: participant.score,
            correct_count: participant.correct_count,
            answers_completed,
            total_questions,
            finished: participant.finished_at.is_some(),
        })
    }
}
