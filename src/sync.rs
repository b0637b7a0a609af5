// Client-side synchronization: a reusable polling session that keeps a
// battle view consistent without any push channel.
//
// Three independent loops: a coarse leaderboard poll, a finer per-question
// solve-status poll, and a countdown recomputed every tick from the
// absolute end timestamp (never a decrementing counter), so correctness
// survives tab suspension and throttling. When the countdown reaches zero
// the session calls the idempotent end_battle and switches to a terminal
// view built from a final leaderboard read.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::db::Progress;
use crate::leaderboard::LeaderboardEntry;

/// Injected time source so tests can simulate arbitrary wall-clock time.
pub trait Clock: Send + Sync + 'static {
    fn now_unix(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A failed poll. Logged and retried on the next tick, never fatal.
#[derive(Debug, Clone)]
pub struct TransientNetwork(pub String);

impl std::fmt::Display for TransientNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transient network error: {}", self.0)
    }
}

impl std::error::Error for TransientNetwork {}

// ── Wire views ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleSummary {
    pub id: i64,
    pub scheduled_start: i64,
    pub duration_minutes: i64,
    pub status: String,
    pub question_ids: Vec<i64>,
}

impl BattleSummary {
    /// Absolute unix timestamp at which the play window closes.
    pub fn end_timestamp(&self) -> i64 {
        self.scheduled_start + self.duration_minutes * 60
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveStatus {
    pub question_id: i64,
    pub solved: bool,
    pub solved_by: Option<String>,
    /// Revealed only once the question is solved.
    pub correct_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResult {
    pub is_correct: bool,
    pub correct_answer: String,
    pub xp_earned: i64,
    pub already_answered: bool,
}

pub type ClientFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransientNetwork>> + Send + 'a>>;

/// Transport-agnostic view of the engine operations the session consumes.
pub trait BattleClient: Send + Sync {
    fn get_battle(&self, battle_id: i64) -> ClientFuture<'_, BattleSummary>;
    fn get_progress(&self, battle_id: i64, user_name: String) -> ClientFuture<'_, Progress>;
    fn get_leaderboard(&self, battle_id: i64) -> ClientFuture<'_, Vec<LeaderboardEntry>>;
    fn get_solve_status(&self, battle_id: i64, question_id: i64) -> ClientFuture<'_, SolveStatus>;
    fn end_battle(&self, battle_id: i64) -> ClientFuture<'_, ()>;
    fn submit_answer(
        &self,
        battle_id: i64,
        question_id: i64,
        user_name: String,
        answer: String,
        time_taken_seconds: i64,
    ) -> ClientFuture<'_, SubmitResult>;
}

// ── Session ───────────────────────────────────────────────────────────

/// Polling cadences. Defaults follow the recommended contract: leaderboard
/// ~3s, solve status ~1.5s, countdown tick 1s.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub leaderboard_interval: Duration,
    pub solve_status_interval: Duration,
    pub countdown_tick: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            leaderboard_interval: Duration::from_secs(3),
            solve_status_interval: Duration::from_millis(1500),
            countdown_tick: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Running,
    Completed,
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    battle: Option<BattleSummary>,
    progress: Option<Progress>,
    leaderboard: Vec<LeaderboardEntry>,
    solve_status: HashMap<i64, SolveStatus>,
    current_question: Option<i64>,
    remaining_seconds: i64,
}

/// Everything a view needs; re-derivable at any point from get_battle +
/// get_progress + get_leaderboard, so no session state outlives a reload.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub battle: Option<BattleSummary>,
    pub progress: Option<Progress>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub solve_status: HashMap<i64, SolveStatus>,
    pub current_question: Option<i64>,
    pub remaining_seconds: i64,
}

pub struct BattleSession<C: BattleClient + 'static, K: Clock> {
    client: Arc<C>,
    clock: Arc<K>,
    config: SyncConfig,
    battle_id: i64,
    user_name: String,
    state: Arc<Mutex<SessionState>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<C: BattleClient + 'static, K: Clock> BattleSession<C, K> {
    pub fn new(
        client: Arc<C>,
        clock: Arc<K>,
        config: SyncConfig,
        battle_id: i64,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            clock,
            config,
            battle_id,
            user_name: user_name.into(),
            state: Arc::new(Mutex::new(SessionState {
                phase: SessionPhase::Idle,
                battle: None,
                progress: None,
                leaderboard: Vec::new(),
                solve_status: HashMap::new(),
                current_question: None,
                remaining_seconds: 0,
            })),
            tasks: Vec::new(),
        }
    }

    /// Fetch the battle definition and own progress (resuming exactly where
    /// a previous session left off), then start the three polling loops.
    pub async fn start(&mut self) -> Result<(), TransientNetwork> {
        let battle = self.client.get_battle(self.battle_id).await?;
        let progress = self
            .client
            .get_progress(self.battle_id, self.user_name.clone())
            .await?;

        // Resume at the first question this participant has not answered.
        let current_question = battle
            .question_ids
            .iter()
            .find(|qid| !progress.answers.contains_key(*qid))
            .copied();

        let end_ts = battle.end_timestamp();
        {
            let mut state = self.state.lock().unwrap();
            state.remaining_seconds = (end_ts - self.clock.now_unix()).max(0);
            state.battle = Some(battle);
            state.progress = Some(progress);
            state.current_question = current_question;
            state.phase = SessionPhase::Running;
        }

        let countdown = self.spawn_countdown_loop(end_ts);
        let leaderboard = self.spawn_leaderboard_loop();
        let solve_status = self.spawn_solve_status_loop();
        self.tasks.extend([countdown, leaderboard, solve_status]);
        Ok(())
    }

    /// Tear down all polling loops. Leaving the view requires nothing else.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().unwrap();
        SessionSnapshot {
            phase: state.phase,
            battle: state.battle.clone(),
            progress: state.progress.clone(),
            leaderboard: state.leaderboard.clone(),
            solve_status: state.solve_status.clone(),
            current_question: state.current_question,
            remaining_seconds: state.remaining_seconds,
        }
    }

    /// Point the solve-status poll at a different question. Participants
    /// navigate questions independently; solve status is always keyed by
    /// explicit question id.
    pub fn set_current_question(&self, question_id: i64) {
        self.state.lock().unwrap().current_question = Some(question_id);
    }

    /// Submit an answer and fold the authoritative result back into the
    /// local projection.
    pub async fn submit(
        &self,
        question_id: i64,
        answer: impl Into<String>,
        time_taken_seconds: i64,
    ) -> Result<SubmitResult, TransientNetwork> {
        let result = self
            .client
            .submit_answer(
                self.battle_id,
                question_id,
                self.user_name.clone(),
                answer.into(),
                time_taken_seconds,
            )
            .await?;

        // The server's progress record is authoritative; re-read it rather
        // than patching the local copy.
        let progress = self
            .client
            .get_progress(self.battle_id, self.user_name.clone())
            .await?;

        let mut state = self.state.lock().unwrap();
        let next_question = state.battle.as_ref().and_then(|battle| {
            battle
                .question_ids
                .iter()
                .find(|qid| !progress.answers.contains_key(*qid))
                .copied()
        });
        if state.battle.is_some() {
            state.current_question = next_question;
        }
        state.progress = Some(progress);
        Ok(result)
    }

    fn spawn_countdown_loop(&self, end_ts: i64) -> JoinHandle<()> {
        let client = self.client.clone();
        let clock = self.clock.clone();
        let state = self.state.clone();
        let battle_id = self.battle_id;
        let tick = self.config.countdown_tick;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;

                let remaining = (end_ts - clock.now_unix()).max(0);
                {
                    let mut s = state.lock().unwrap();
                    if s.phase != SessionPhase::Running {
                        return;
                    }
                    s.remaining_seconds = remaining;
                }
                if remaining > 0 {
                    continue;
                }

                // Time is up. The end call is idempotent and may race other
                // clients or the server sweep; a failure never blocks the
                // terminal view, whose content comes from the leaderboard.
                if let Err(e) = client.end_battle(battle_id).await {
                    tracing::warn!(battle_id, "end_battle call failed: {e}");
                }
                match client.get_leaderboard(battle_id).await {
                    Ok(board) => state.lock().unwrap().leaderboard = board,
                    Err(e) => {
                        tracing::warn!(battle_id, "final leaderboard read failed: {e}")
                    }
                }
                state.lock().unwrap().phase = SessionPhase::Completed;
                return;
            }
        })
    }

    fn spawn_leaderboard_loop(&self) -> JoinHandle<()> {
        let client = self.client.clone();
        let state = self.state.clone();
        let battle_id = self.battle_id;
        let period = self.config.leaderboard_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if state.lock().unwrap().phase != SessionPhase::Running {
                    return;
                }
                match client.get_leaderboard(battle_id).await {
                    Ok(board) => state.lock().unwrap().leaderboard = board,
                    Err(e) => tracing::warn!(battle_id, "leaderboard poll failed: {e}"),
                }
            }
        })
    }

    fn spawn_solve_status_loop(&self) -> JoinHandle<()> {
        let client = self.client.clone();
        let state = self.state.clone();
        let battle_id = self.battle_id;
        let period = self.config.solve_status_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let question_id = {
                    let s = state.lock().unwrap();
                    if s.phase != SessionPhase::Running {
                        return;
                    }
                    s.current_question
                };
                let Some(question_id) = question_id else {
                    continue;
                };
                match client.get_solve_status(battle_id, question_id).await {
                    Ok(status) => {
                        state.lock().unwrap().solve_status.insert(question_id, status);
                    }
                    Err(e) => tracing::warn!(
                        battle_id,
                        question_id,
                        "solve status poll failed: {e}"
                    ),
                }
            }
        })
    }
}

impl<C: BattleClient + 'static, K: Clock> Drop for BattleSession<C, K> {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── In-process client ─────────────────────────────────────────────────

use crate::arbiter::AnswerArbiter;
use crate::db::Database;
use crate::scheduler::BattleScheduler;

/// A BattleClient wired directly to the engine, for tests and local tools.
/// Any JSON-over-HTTP client satisfies the same contract.
pub struct DirectClient {
    db: Arc<Database>,
    scheduler: BattleScheduler,
    arbiter: AnswerArbiter,
    clock: Arc<dyn Clock>,
}

impl DirectClient {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self {
            scheduler: BattleScheduler::new(db.clone()),
            arbiter: AnswerArbiter::new(db.clone()),
            db,
            clock,
        }
    }
}

fn transient(e: impl std::fmt::Display) -> TransientNetwork {
    TransientNetwork(e.to_string())
}

impl BattleClient for DirectClient {
    fn get_battle(&self, battle_id: i64) -> ClientFuture<'_, BattleSummary> {
        Box::pin(async move {
            let battle = self
                .db
                .get_battle(battle_id)
                .await
                .map_err(transient)?
                .ok_or_else(|| TransientNetwork("battle not found".into()))?;
            let question_ids = self
                .db
                .battle_question_ids(battle_id)
                .await
                .map_err(transient)?;
            Ok(BattleSummary {
                id: battle.id,
                scheduled_start: battle.scheduled_start,
                duration_minutes: battle.duration_minutes,
                status: battle.status,
                question_ids,
            })
        })
    }

    fn get_progress(&self, battle_id: i64, user_name: String) -> ClientFuture<'_, Progress> {
        Box::pin(async move {
            self.db
                .get_progress(battle_id, &user_name)
                .await
                .map_err(transient)?
                .ok_or_else(|| TransientNetwork("not a participant".into()))
        })
    }

    fn get_leaderboard(&self, battle_id: i64) -> ClientFuture<'_, Vec<LeaderboardEntry>> {
        Box::pin(async move {
            let participants = self
                .db
                .list_participants(battle_id)
                .await
                .map_err(transient)?;
            Ok(crate::leaderboard::rank_participants(&participants))
        })
    }

    fn get_solve_status(&self, battle_id: i64, question_id: i64) -> ClientFuture<'_, SolveStatus> {
        Box::pin(async move {
            let solve = self
                .db
                .get_solve(battle_id, question_id)
                .await
                .map_err(transient)?;
            let mut status = SolveStatus {
                question_id,
                solved: false,
                solved_by: None,
                correct_answer: None,
            };
            if let Some(solve) = solve {
                if solve.solved {
                    let question = self
                        .db
                        .get_question(question_id)
                        .await
                        .map_err(transient)?;
                    status.solved = true;
                    status.solved_by = solve.solved_by;
                    status.correct_answer = question.map(|q| q.correct_answer);
                }
            }
            Ok(status)
        })
    }

    fn end_battle(&self, battle_id: i64) -> ClientFuture<'_, ()> {
        Box::pin(async move {
            self.scheduler
                .end_battle(battle_id)
                .await
                .map(|_| ())
                .map_err(transient)
        })
    }

    fn submit_answer(
        &self,
        battle_id: i64,
        question_id: i64,
        user_name: String,
        answer: String,
        time_taken_seconds: i64,
    ) -> ClientFuture<'_, SubmitResult> {
        Box::pin(async move {
            let outcome = self
                .arbiter
                .submit_answer(
                    battle_id,
                    question_id,
                    &user_name,
                    &answer,
                    time_taken_seconds,
                    self.clock.now_unix(),
                )
                .await
                .map_err(transient)?;
            Ok(SubmitResult {
                is_correct: outcome.is_correct,
                correct_answer: outcome.correct_answer,
                xp_earned: outcome.xp_earned,
                already_answered: outcome.already_answered,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    use crate::db::ProgressEntry;

    struct MockClock(AtomicI64);

    impl MockClock {
        fn at(t: i64) -> Arc<Self> {
            Arc::new(Self(AtomicI64::new(t)))
        }

        fn set(&self, t: i64) {
            self.0.store(t, Ordering::SeqCst);
        }
    }

    impl Clock for MockClock {
        fn now_unix(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    // ── Loop semantics against a canned engine ────────────────────────
    //
    // The polling loops are driven under paused time against an in-memory
    // engine, so ticks auto-advance instantly and nothing touches a
    // connection pool while the runtime clock is paused.

    struct MockEngine {
        battle: BattleSummary,
        progress: Mutex<Progress>,
        leaderboard: Mutex<Vec<LeaderboardEntry>>,
        solves: Mutex<HashMap<i64, SolveStatus>>,
        end_calls: AtomicUsize,
        polled: Mutex<Vec<i64>>,
    }

    /// Battle 7 with questions [1, 2, 3], running from t=1000 for 10
    /// minutes (ends 1600), participant ann with no progress yet.
    fn mock_engine() -> Arc<MockEngine> {
        Arc::new(MockEngine {
            battle: BattleSummary {
                id: 7,
                scheduled_start: 1000,
                duration_minutes: 10,
                status: "in_progress".into(),
                question_ids: vec![1, 2, 3],
            },
            progress: Mutex::new(Progress {
                battle_id: 7,
                user_name: "ann".into(),
                answers: HashMap::new(),
                score: 0,
                correct_count: 0,
                time_completed_seconds: None,
                finished: false,
                completed_at: None,
            }),
            leaderboard: Mutex::new(Vec::new()),
            solves: Mutex::new(HashMap::new()),
            end_calls: AtomicUsize::new(0),
            polled: Mutex::new(Vec::new()),
        })
    }

    fn board_entry(rank: i64, user_name: &str, score: i64) -> LeaderboardEntry {
        LeaderboardEntry {
            rank,
            user_name: user_name.into(),
            score,
            correct_count: score / 10,
            finished: false,
            time_completed_seconds: None,
        }
    }

    impl BattleClient for MockEngine {
        fn get_battle(&self, _battle_id: i64) -> ClientFuture<'_, BattleSummary> {
            Box::pin(async move { Ok(self.battle.clone()) })
        }

        fn get_progress(&self, _battle_id: i64, _user_name: String) -> ClientFuture<'_, Progress> {
            Box::pin(async move { Ok(self.progress.lock().unwrap().clone()) })
        }

        fn get_leaderboard(&self, _battle_id: i64) -> ClientFuture<'_, Vec<LeaderboardEntry>> {
            Box::pin(async move { Ok(self.leaderboard.lock().unwrap().clone()) })
        }

        fn get_solve_status(&self, _battle_id: i64, question_id: i64) -> ClientFuture<'_, SolveStatus> {
            Box::pin(async move {
                self.polled.lock().unwrap().push(question_id);
                Ok(self
                    .solves
                    .lock()
                    .unwrap()
                    .get(&question_id)
                    .cloned()
                    .unwrap_or(SolveStatus {
                        question_id,
                        solved: false,
                        solved_by: None,
                        correct_answer: None,
                    }))
            })
        }

        fn end_battle(&self, _battle_id: i64) -> ClientFuture<'_, ()> {
            Box::pin(async move {
                self.end_calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }

        fn submit_answer(
            &self,
            _battle_id: i64,
            question_id: i64,
            _user_name: String,
            answer: String,
            time_taken_seconds: i64,
        ) -> ClientFuture<'_, SubmitResult> {
            Box::pin(async move {
                let mut progress = self.progress.lock().unwrap();
                progress.answers.insert(
                    question_id,
                    ProgressEntry {
                        answer,
                        is_correct: true,
                        xp_earned: 10,
                        time_taken_seconds,
                        answered_at: "2026-01-01T00:00:00Z".into(),
                    },
                );
                progress.score += 10;
                progress.correct_count += 1;
                Ok(SubmitResult {
                    is_correct: true,
                    correct_answer: "A".into(),
                    xp_earned: 10,
                    already_answered: false,
                })
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_follows_absolute_clock() {
        let clock = MockClock::at(1000);
        let engine = mock_engine();

        let mut session =
            BattleSession::new(engine, clock.clone(), SyncConfig::default(), 7, "ann");
        session.start().await.unwrap();
        assert_eq!(session.snapshot().remaining_seconds, 600);

        // Simulate a long tab suspension: the wall clock jumps 400 seconds
        // while only a couple of ticks elapse. The countdown follows the
        // absolute end timestamp, not a decrement count.
        clock.set(1400);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(session.snapshot().remaining_seconds, 200);

        session.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_countdown_ends_session() {
        let clock = MockClock::at(1000);
        let engine = mock_engine();
        *engine.leaderboard.lock().unwrap() =
            vec![board_entry(1, "bob", 10), board_entry(2, "ann", 0)];

        let mut session = BattleSession::new(
            engine.clone(),
            clock.clone(),
            SyncConfig::default(),
            7,
            "ann",
        );
        session.start().await.unwrap();

        clock.set(1601);
        tokio::time::sleep(Duration::from_secs(3)).await;

        let snap = session.snapshot();
        assert_eq!(snap.phase, SessionPhase::Completed);
        assert_eq!(snap.remaining_seconds, 0);
        // Terminal view is built from the final leaderboard read
        assert_eq!(snap.leaderboard.len(), 2);
        assert_eq!(snap.leaderboard[0].user_name, "bob");

        // The loop ends the battle once, then terminates
        assert_eq!(engine.end_calls.load(Ordering::SeqCst), 1);

        session.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_solve_status_poll_follows_navigation() {
        let clock = MockClock::at(1100);
        let engine = mock_engine();
        engine.solves.lock().unwrap().insert(
            1,
            SolveStatus {
                question_id: 1,
                solved: true,
                solved_by: Some("bob".into()),
                correct_answer: Some("A".into()),
            },
        );

        let mut session = BattleSession::new(
            engine.clone(),
            clock,
            SyncConfig::default(),
            7,
            "ann",
        );
        session.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let snap = session.snapshot();
        let status = snap.solve_status.get(&1).unwrap();
        assert!(status.solved);
        assert_eq!(status.solved_by.as_deref(), Some("bob"));
        assert_eq!(status.correct_answer.as_deref(), Some("A"));

        // Participants navigate independently; repointing the session moves
        // the poll to the chosen question.
        session.set_current_question(3);
        tokio::time::sleep(Duration::from_secs(2)).await;

        let polled = engine.polled.lock().unwrap();
        assert_eq!(*polled.last().unwrap(), 3);
        drop(polled);
        assert!(session.snapshot().solve_status.contains_key(&3));

        session.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaderboard_poll_updates() {
        let clock = MockClock::at(1100);
        let engine = mock_engine();

        let mut session = BattleSession::new(
            engine.clone(),
            clock,
            SyncConfig::default(),
            7,
            "ann",
        );
        session.start().await.unwrap();
        assert!(session.snapshot().leaderboard.is_empty());

        *engine.leaderboard.lock().unwrap() = vec![board_entry(1, "ann", 10)];
        tokio::time::sleep(Duration::from_secs(4)).await;

        let snap = session.snapshot();
        assert_eq!(snap.leaderboard.len(), 1);
        assert_eq!(snap.leaderboard[0].user_name, "ann");
        assert_eq!(snap.leaderboard[0].rank, 1);

        session.stop();
    }

    // ── Session against the real engine ───────────────────────────────
    //
    // These run on the unpaused runtime clock: sqlx pool acquisition uses
    // real timeouts that misbehave under a paused clock.

    /// In-memory engine with 3 questions (answer "A", 10 XP), participants
    /// ann and bob, battle running from t=1000 for 10 minutes (ends 1600).
    async fn direct_client(clock: Arc<dyn Clock>) -> (Arc<DirectClient>, i64, Vec<i64>) {
        let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
        for i in 0..3 {
            db.create_question(&format!("q{i}"), ["a", "b", "c", "d"], "A", 10)
                .await
                .unwrap();
        }
        let scheduler = BattleScheduler::new(db.clone());
        let battle = scheduler
            .create_battle(1000, 10, vec!["ann".into(), "bob".into()], 3)
            .await
            .unwrap();
        scheduler.start_battle(battle.id, 1000).await.unwrap();
        let question_ids = db.battle_question_ids(battle.id).await.unwrap();
        (
            Arc::new(DirectClient::new(db, clock)),
            battle.id,
            question_ids,
        )
    }

    fn fast_config() -> SyncConfig {
        SyncConfig {
            leaderboard_interval: Duration::from_millis(25),
            solve_status_interval: Duration::from_millis(25),
            countdown_tick: Duration::from_millis(25),
        }
    }

    #[tokio::test]
    async fn test_session_start_resumes_progress() {
        let clock = MockClock::at(1100);
        let (client, battle_id, questions) = direct_client(clock.clone()).await;

        // ann already answered the first question in a previous session
        client
            .submit_answer(battle_id, questions[0], "ann".into(), "A".into(), 5)
            .await
            .unwrap();

        let mut session = BattleSession::new(
            client,
            clock,
            SyncConfig::default(),
            battle_id,
            "ann",
        );
        session.start().await.unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.phase, SessionPhase::Running);
        assert_eq!(snap.remaining_seconds, 500);
        // Resumed past the already-answered question
        assert_eq!(snap.current_question, Some(questions[1]));
        let progress = snap.progress.unwrap();
        assert_eq!(progress.answers.len(), 1);
        assert!(progress.answers[&questions[0]].is_correct);

        session.stop();
    }

    #[tokio::test]
    async fn test_submit_advances_current_question() {
        let clock = MockClock::at(1100);
        let (client, battle_id, questions) = direct_client(clock.clone()).await;

        let mut session = BattleSession::new(
            client,
            clock,
            SyncConfig::default(),
            battle_id,
            "ann",
        );
        session.start().await.unwrap();
        assert_eq!(session.snapshot().current_question, Some(questions[0]));

        let result = session.submit(questions[0], "A", 4).await.unwrap();
        assert!(result.is_correct);
        assert_eq!(result.xp_earned, 10);

        let snap = session.snapshot();
        assert_eq!(snap.current_question, Some(questions[1]));
        assert_eq!(snap.progress.unwrap().score, 10);

        session.stop();
    }

    #[tokio::test]
    async fn test_session_completes_against_engine() {
        let clock = MockClock::at(1100);
        let (client, battle_id, questions) = direct_client(clock.clone()).await;

        client
            .submit_answer(battle_id, questions[0], "bob".into(), "A".into(), 2)
            .await
            .unwrap();

        let mut session = BattleSession::new(
            client.clone(),
            clock.clone(),
            fast_config(),
            battle_id,
            "ann",
        );
        session.start().await.unwrap();

        clock.set(1601);
        tokio::time::sleep(Duration::from_millis(400)).await;

        let snap = session.snapshot();
        assert_eq!(snap.phase, SessionPhase::Completed);
        assert_eq!(snap.remaining_seconds, 0);
        assert_eq!(snap.leaderboard.len(), 2);
        assert_eq!(snap.leaderboard[0].user_name, "bob");
        assert_eq!(snap.leaderboard[0].score, 10);

        // The battle reached completed server-side
        let battle = client.get_battle(battle_id).await.unwrap();
        assert_eq!(battle.status, "completed");

        session.stop();
    }
}
