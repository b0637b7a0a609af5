// Database access layer (SQLite via sqlx).
//
// The question_solves table is the only point of cross-participant
// contention: its unsolved -> solved transition is a single conditional
// UPDATE whose rows_affected decides the solve race.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_answer: String,
    pub xp_reward: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Battle {
    pub id: i64,
    /// Unix seconds; countdown math stays anchored to this even after an
    /// early manual start.
    pub scheduled_start: i64,
    pub duration_minutes: i64,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ParticipantRow {
    pub battle_id: i64,
    pub user_name: String,
    pub score: i64,
    pub correct_count: i64,
    pub time_completed_seconds: Option<i64>,
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnswerRow {
    pub battle_id: i64,
    pub user_name: String,
    pub question_id: i64,
    pub answer: String,
    pub is_correct: bool,
    pub xp_earned: i64,
    pub time_taken_seconds: i64,
    pub answered_at: String,
}

/// Result of the transactional answer write in [`Database::record_answer`].
#[derive(Debug)]
pub enum AnswerWrite {
    /// A new row was committed; `claimed_solve` is true when this write won
    /// the solve race for the question.
    Recorded { row: AnswerRow, claimed_solve: bool },
    /// The user already had a row for this question; nothing was written
    /// and the original row is returned.
    Duplicate(AnswerRow),
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SolveRow {
    pub battle_id: i64,
    pub question_id: i64,
    pub solved: bool,
    pub solved_by: Option<String>,
}

/// A participant's durable per-question record, keyed by question id so a
/// reloading client reconstructs identical state to an uninterrupted
/// session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub battle_id: i64,
    pub user_name: String,
    pub answers: HashMap<i64, ProgressEntry>,
    pub score: i64,
    pub correct_count: i64,
    pub time_completed_seconds: Option<i64>,
    pub finished: bool,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub answer: String,
    pub is_correct: bool,
    pub xp_earned: i64,
    pub time_taken_seconds: i64,
    pub answered_at: String,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        // An in-memory SQLite database exists per connection, so the pool
        // must not hand out a second (empty) one.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                option_a TEXT NOT NULL,
                option_b TEXT NOT NULL,
                option_c TEXT NOT NULL,
                option_d TEXT NOT NULL,
                correct_answer TEXT NOT NULL,
                xp_reward INTEGER NOT NULL DEFAULT 10
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS battles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scheduled_start INTEGER NOT NULL,
                duration_minutes INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS battle_questions (
                battle_id INTEGER NOT NULL REFERENCES battles(id),
                position INTEGER NOT NULL,
                question_id INTEGER NOT NULL REFERENCES questions(id),
                UNIQUE(battle_id, position)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS battle_participants (
                battle_id INTEGER NOT NULL REFERENCES battles(id),
                user_name TEXT NOT NULL,
                score INTEGER NOT NULL DEFAULT 0,
                correct_count INTEGER NOT NULL DEFAULT 0,
                time_completed_seconds INTEGER,
                finished_at TEXT,
                UNIQUE(battle_id, user_name)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS battle_answers (
                battle_id INTEGER NOT NULL REFERENCES battles(id),
                user_name TEXT NOT NULL,
                question_id INTEGER NOT NULL REFERENCES questions(id),
                answer TEXT NOT NULL,
                is_correct INTEGER NOT NULL,
                xp_earned INTEGER NOT NULL DEFAULT 0,
                time_taken_seconds INTEGER NOT NULL DEFAULT 0,
                answered_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(battle_id, user_name, question_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS question_solves (
                battle_id INTEGER NOT NULL REFERENCES battles(id),
                question_id INTEGER NOT NULL REFERENCES questions(id),
                solved INTEGER NOT NULL DEFAULT 0,
                solved_by TEXT,
                UNIQUE(battle_id, question_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Question pool ─────────────────────────────────────────────────

    pub async fn create_question(
        &self,
        text: &str,
        options: [&str; 4],
        correct_answer: &str,
        xp_reward: i64,
    ) -> Result<Question, sqlx::Error> {
        let row = sqlx::query_as::<_, Question>(
            "INSERT INTO questions (text, option_a, option_b, option_c, option_d, correct_answer, xp_reward) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             RETURNING id, text, option_a, option_b, option_c, option_d, correct_answer, xp_reward",
        )
        .bind(text)
        .bind(options[0])
        .bind(options[1])
        .bind(options[2])
        .bind(options[3])
        .bind(correct_answer)
        .bind(xp_reward)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_question(&self, id: i64) -> Result<Option<Question>, sqlx::Error> {
        let row = sqlx::query_as::<_, Question>(
            "SELECT id, text, option_a, option_b, option_c, option_d, correct_answer, xp_reward \
             FROM questions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_question_ids(&self) -> Result<Vec<i64>, sqlx::Error> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM questions ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    // ── Battles ───────────────────────────────────────────────────────

    pub async fn create_battle(
        &self,
        scheduled_start: i64,
        duration_minutes: i64,
        question_ids: &[i64],
        participants: &[String],
    ) -> Result<Battle, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let battle = sqlx::query_as::<_, Battle>(
            "INSERT INTO battles (scheduled_start, duration_minutes) VALUES (?, ?) \
             RETURNING id, scheduled_start, duration_minutes, status, created_at",
        )
        .bind(scheduled_start)
        .bind(duration_minutes)
        .fetch_one(&mut *tx)
        .await?;

        for (position, question_id) in question_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO battle_questions (battle_id, position, question_id) VALUES (?, ?, ?)",
            )
            .bind(battle.id)
            .bind(position as i64)
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
        }

        for user_name in participants {
            sqlx::query("INSERT INTO battle_participants (battle_id, user_name) VALUES (?, ?)")
                .bind(battle.id)
                .bind(user_name)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(battle)
    }

    pub async fn get_battle(&self, id: i64) -> Result<Option<Battle>, sqlx::Error> {
        let row = sqlx::query_as::<_, Battle>(
            "SELECT id, scheduled_start, duration_minutes, status, created_at \
             FROM battles WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_battles(&self) -> Result<Vec<Battle>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Battle>(
            "SELECT id, scheduled_start, duration_minutes, status, created_at \
             FROM battles ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Battles not yet in the terminal completed state, for the expiry sweep.
    pub async fn list_unfinished_battles(&self) -> Result<Vec<Battle>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Battle>(
            "SELECT id, scheduled_start, duration_minutes, status, created_at \
             FROM battles WHERE status != 'completed' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Conditionally move a battle from one status to another. Returns
    /// whether this call performed the transition; concurrent callers get
    /// false instead of an error.
    pub async fn transition_battle_status(
        &self,
        id: i64,
        from: &str,
        to: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE battles SET status = ? WHERE id = ? AND status = ?")
            .bind(to)
            .bind(id)
            .bind(from)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn battle_question_ids(&self, battle_id: i64) -> Result<Vec<i64>, sqlx::Error> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT question_id FROM battle_questions WHERE battle_id = ? ORDER BY position",
        )
        .bind(battle_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    // ── Participants ──────────────────────────────────────────────────

    pub async fn get_participant(
        &self,
        battle_id: i64,
        user_name: &str,
    ) -> Result<Option<ParticipantRow>, sqlx::Error> {
        let row = sqlx::query_as::<_, ParticipantRow>(
            "SELECT battle_id, user_name, score, correct_count, time_completed_seconds, finished_at \
             FROM battle_participants WHERE battle_id = ? AND user_name = ?",
        )
        .bind(battle_id)
        .bind(user_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_participants(
        &self,
        battle_id: i64,
    ) -> Result<Vec<ParticipantRow>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            "SELECT battle_id, user_name, score, correct_count, time_completed_seconds, finished_at \
             FROM battle_participants WHERE battle_id = ? ORDER BY user_name",
        )
        .bind(battle_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Set finished_at once; repeated calls are no-ops.
    pub async fn mark_participant_finished(
        &self,
        battle_id: i64,
        user_name: &str,
        finished_at: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE battle_participants SET finished_at = ? \
             WHERE battle_id = ? AND user_name = ? AND finished_at IS NULL",
        )
        .bind(finished_at)
        .bind(battle_id)
        .bind(user_name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Answers ───────────────────────────────────────────────────────

    pub async fn get_answer(
        &self,
        battle_id: i64,
        user_name: &str,
        question_id: i64,
    ) -> Result<Option<AnswerRow>, sqlx::Error> {
        let row = sqlx::query_as::<_, AnswerRow>(
            "SELECT battle_id, user_name, question_id, answer, is_correct, xp_earned, \
                    time_taken_seconds, answered_at \
             FROM battle_answers WHERE battle_id = ? AND user_name = ? AND question_id = ?",
        )
        .bind(battle_id)
        .bind(user_name)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Record one answer atomically: solve-race claim, answer row, and
    /// participant aggregates commit together or not at all.
    ///
    /// The conditional `solved = 0` update guarantees at most one claimant
    /// per question regardless of how many concurrent correct submissions
    /// arrive; submitted timing never participates in the decision. A
    /// concurrent duplicate from the same user loses the UNIQUE race on
    /// battle_answers; the whole transaction rolls back (the claim
    /// included) and the previously recorded row is returned instead.
    pub async fn record_answer(
        &self,
        battle_id: i64,
        user_name: &str,
        question_id: i64,
        answer: &str,
        is_correct: bool,
        xp_reward: i64,
        time_taken_seconds: i64,
    ) -> Result<AnswerWrite, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT OR IGNORE INTO question_solves (battle_id, question_id) VALUES (?, ?)",
        )
        .bind(battle_id)
        .bind(question_id)
        .execute(&mut *tx)
        .await?;

        let mut claimed_solve = false;
        if is_correct {
            let result = sqlx::query(
                "UPDATE question_solves SET solved = 1, solved_by = ? \
                 WHERE battle_id = ? AND question_id = ? AND solved = 0",
            )
            .bind(user_name)
            .bind(battle_id)
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
            claimed_solve = result.rows_affected() > 0;
        }
        let xp_earned = if claimed_solve { xp_reward } else { 0 };

        let inserted = sqlx::query_as::<_, AnswerRow>(
            "INSERT INTO battle_answers \
                 (battle_id, user_name, question_id, answer, is_correct, xp_earned, time_taken_seconds) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             RETURNING battle_id, user_name, question_id, answer, is_correct, xp_earned, \
                       time_taken_seconds, answered_at",
        )
        .bind(battle_id)
        .bind(user_name)
        .bind(question_id)
        .bind(answer)
        .bind(is_correct)
        .bind(xp_earned)
        .bind(time_taken_seconds)
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                let existing = self
                    .get_answer(battle_id, user_name, question_id)
                    .await?
                    .ok_or(e)?;
                return Ok(AnswerWrite::Duplicate(existing));
            }
            Err(e) => return Err(e),
        };

        sqlx::query(
            "UPDATE battle_participants SET \
                 score = score + ?, \
                 correct_count = correct_count + ?, \
                 time_completed_seconds = COALESCE(time_completed_seconds, 0) + ? \
             WHERE battle_id = ? AND user_name = ?",
        )
        .bind(xp_earned)
        .bind(if is_correct { 1 } else { 0 })
        .bind(time_taken_seconds)
        .bind(battle_id)
        .bind(user_name)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(AnswerWrite::Recorded { row, claimed_solve })
    }

    pub async fn count_answers(
        &self,
        battle_id: i64,
        user_name: &str,
    ) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM battle_answers WHERE battle_id = ? AND user_name = ?",
        )
        .bind(battle_id)
        .bind(user_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Assemble a participant's full progress record. None when the user is
    /// not an authorized participant of the battle.
    pub async fn get_progress(
        &self,
        battle_id: i64,
        user_name: &str,
    ) -> Result<Option<Progress>, sqlx::Error> {
        let Some(participant) = self.get_participant(battle_id, user_name).await? else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, AnswerRow>(
            "SELECT battle_id, user_name, question_id, answer, is_correct, xp_earned, \
                    time_taken_seconds, answered_at \
             FROM battle_answers WHERE battle_id = ? AND user_name = ?",
        )
        .bind(battle_id)
        .bind(user_name)
        .fetch_all(&self.pool)
        .await?;

        let answers = rows
            .into_iter()
            .map(|r| {
                (
                    r.question_id,
                    ProgressEntry {
                        answer: r.answer,
                        is_correct: r.is_correct,
                        xp_earned: r.xp_earned,
                        time_taken_seconds: r.time_taken_seconds,
                        answered_at: r.answered_at,
                    },
                )
            })
            .collect();

        Ok(Some(Progress {
            battle_id,
            user_name: user_name.to_string(),
            answers,
            score: participant.score,
            correct_count: participant.correct_count,
            time_completed_seconds: participant.time_completed_seconds,
            finished: participant.finished_at.is_some(),
            completed_at: participant.finished_at,
        }))
    }

    // ── Question solve records ────────────────────────────────────────

    pub async fn get_solve(
        &self,
        battle_id: i64,
        question_id: i64,
    ) -> Result<Option<SolveRow>, sqlx::Error> {
        let row = sqlx::query_as::<_, SolveRow>(
            "SELECT battle_id, question_id, solved, solved_by \
             FROM question_solves WHERE battle_id = ? AND question_id = ?",
        )
        .bind(battle_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    async fn seed_question(db: &Database) -> Question {
        db.create_question(
            "Which dynasty built the citadel?",
            ["Ly", "Tran", "Nguyen", "Le"],
            "C",
            10,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_battle() {
        let db = test_db().await;
        let q = seed_question(&db).await;

        let battle = db
            .create_battle(1_700_000_000, 10, &[q.id], &["ann".into(), "bob".into()])
            .await
            .unwrap();
        assert_eq!(battle.status, "pending");
        assert_eq!(battle.scheduled_start, 1_700_000_000);
        assert_eq!(battle.duration_minutes, 10);

        let fetched = db.get_battle(battle.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, battle.id);

        let questions = db.battle_question_ids(battle.id).await.unwrap();
        assert_eq!(questions, vec![q.id]);

        let participants = db.list_participants(battle.id).await.unwrap();
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].score, 0);
        assert!(participants[0].finished_at.is_none());

        assert!(db.get_battle(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transition_battle_status_is_conditional() {
        let db = test_db().await;
        let q = seed_question(&db).await;
        let battle = db
            .create_battle(0, 10, &[q.id], &["ann".into(), "bob".into()])
            .await
            .unwrap();

        assert!(db
            .transition_battle_status(battle.id, "pending", "in_progress")
            .await
            .unwrap());
        // Second caller loses the conditional update but sees no error.
        assert!(!db
            .transition_battle_status(battle.id, "pending", "in_progress")
            .await
            .unwrap());

        let fetched = db.get_battle(battle.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, "in_progress");
    }

    #[tokio::test]
    async fn test_solve_race_has_single_winner() {
        let db = test_db().await;
        let q = seed_question(&db).await;
        let battle = db
            .create_battle(0, 10, &[q.id], &["ann".into(), "bob".into()])
            .await
            .unwrap();

        let first = db
            .record_answer(battle.id, "ann", q.id, "C", true, 10, 4)
            .await
            .unwrap();
        assert!(matches!(
            first,
            AnswerWrite::Recorded { claimed_solve: true, ref row } if row.xp_earned == 10
        ));

        // The second correct answer is recorded but earns nothing.
        let second = db
            .record_answer(battle.id, "bob", q.id, "C", true, 10, 2)
            .await
            .unwrap();
        assert!(matches!(
            second,
            AnswerWrite::Recorded { claimed_solve: false, ref row } if row.xp_earned == 0
        ));

        let solve = db.get_solve(battle.id, q.id).await.unwrap().unwrap();
        assert!(solve.solved);
        assert_eq!(solve.solved_by.as_deref(), Some("ann"));
    }

    #[tokio::test]
    async fn test_duplicate_write_rolls_back_and_returns_original() {
        let db = test_db().await;
        let q = seed_question(&db).await;
        let battle = db
            .create_battle(0, 10, &[q.id], &["ann".into(), "bob".into()])
            .await
            .unwrap();

        db.record_answer(battle.id, "ann", q.id, "C", true, 10, 4)
            .await
            .unwrap();
        let dup = db
            .record_answer(battle.id, "ann", q.id, "A", false, 0, 9)
            .await
            .unwrap();

        // No error surfaces; the originally recorded row comes back.
        let AnswerWrite::Duplicate(row) = dup else {
            panic!("expected duplicate, got {dup:?}");
        };
        assert_eq!(row.answer, "C");
        assert_eq!(row.xp_earned, 10);

        // Nothing from the losing write stuck: aggregates count one answer.
        let p = db.get_participant(battle.id, "ann").await.unwrap().unwrap();
        assert_eq!(p.score, 10);
        assert_eq!(p.correct_count, 1);
        assert_eq!(db.count_answers(battle.id, "ann").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incorrect_answer_never_claims_the_solve() {
        let db = test_db().await;
        let q = seed_question(&db).await;
        let battle = db
            .create_battle(0, 10, &[q.id], &["ann".into(), "bob".into()])
            .await
            .unwrap();

        db.record_answer(battle.id, "ann", q.id, "A", false, 10, 4)
            .await
            .unwrap();

        let solve = db.get_solve(battle.id, q.id).await.unwrap().unwrap();
        assert!(!solve.solved);
        assert!(solve.solved_by.is_none());
    }

    #[tokio::test]
    async fn test_progress_assembly() {
        let db = test_db().await;
        let q1 = seed_question(&db).await;
        let q2 = seed_question(&db).await;
        let battle = db
            .create_battle(0, 10, &[q1.id, q2.id], &["ann".into(), "bob".into()])
            .await
            .unwrap();

        // Not a participant
        assert!(db.get_progress(battle.id, "mallory").await.unwrap().is_none());

        // Zero progress still yields an (empty) record
        let empty = db.get_progress(battle.id, "ann").await.unwrap().unwrap();
        assert!(empty.answers.is_empty());
        assert_eq!(empty.score, 0);
        assert!(!empty.finished);

        db.record_answer(battle.id, "ann", q1.id, "C", true, 10, 3)
            .await
            .unwrap();

        let progress = db.get_progress(battle.id, "ann").await.unwrap().unwrap();
        assert_eq!(progress.answers.len(), 1);
        assert_eq!(progress.score, 10);
        assert_eq!(progress.correct_count, 1);
        assert_eq!(progress.time_completed_seconds, Some(3));
        let entry = &progress.answers[&q1.id];
        assert!(entry.is_correct);
        assert_eq!(entry.xp_earned, 10);

        // A second read is identical (durability / idempotence)
        let again = db.get_progress(battle.id, "ann").await.unwrap().unwrap();
        assert_eq!(again.score, progress.score);
        assert_eq!(again.answers.len(), progress.answers.len());
    }

    #[tokio::test]
    async fn test_mark_finished_only_once() {
        let db = test_db().await;
        let q = seed_question(&db).await;
        let battle = db
            .create_battle(0, 10, &[q.id], &["ann".into(), "bob".into()])
            .await
            .unwrap();

        assert!(db
            .mark_participant_finished(battle.id, "ann", "2026-01-01T00:00:00Z")
            .await
            .unwrap());
        assert!(!db
            .mark_participant_finished(battle.id, "ann", "2026-01-01T00:05:00Z")
            .await
            .unwrap());

        let p = db.get_participant(battle.id, "ann").await.unwrap().unwrap();
        assert_eq!(p.finished_at.as_deref(), Some("2026-01-01T00:00:00Z"));
    }
}
