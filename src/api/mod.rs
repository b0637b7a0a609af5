// HTTP API routes for the battle engine.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::arbiter::{AnswerArbiter, SubmitOutcome};
use crate::db::{Battle, Database, Progress, Question};
use crate::error::ApiError;
use crate::leaderboard::{rank_participants, LeaderboardEntry};
use crate::metrics;
use crate::scheduler::{remaining_seconds, BattleScheduler};

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateBattleRequest {
    pub scheduled_start: i64,
    pub duration_minutes: i64,
    pub participants: Vec<String>,
    pub question_count: usize,
}

#[derive(Deserialize)]
pub struct SubmitAnswerRequest {
    pub user_name: String,
    pub question_id: i64,
    pub answer: String,
    #[serde(default)]
    pub time_taken_seconds: i64,
}

#[derive(Deserialize)]
pub struct ProgressParams {
    pub user_name: String,
}

// ── Response types ────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct BattleResponse {
    #[serde(flatten)]
    pub battle: Battle,
    pub remaining_seconds: i64,
}

/// A battle question as shown to participants: the correct answer is
/// revealed only through submit responses and solve status.
#[derive(Serialize)]
pub struct QuestionView {
    pub id: i64,
    pub text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub xp_reward: i64,
}

impl From<Question> for QuestionView {
    fn from(q: Question) -> Self {
        QuestionView {
            id: q.id,
            text: q.text,
            option_a: q.option_a,
            option_b: q.option_b,
            option_c: q.option_c,
            option_d: q.option_d,
            xp_reward: q.xp_reward,
        }
    }
}

#[derive(Serialize)]
pub struct BattleDetailResponse {
    #[serde(flatten)]
    pub battle: Battle,
    pub remaining_seconds: i64,
    pub participants: Vec<String>,
    pub questions: Vec<QuestionView>,
}

#[derive(Serialize)]
pub struct LeaderboardResponse {
    pub battle_id: i64,
    pub status: String,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Serialize)]
pub struct SolveStatusResponse {
    pub battle_id: i64,
    pub question_id: i64,
    pub solved: bool,
    pub solved_by: Option<String>,
    pub correct_answer: Option<String>,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub scheduler: Arc<BattleScheduler>,
    pub arbiter: Arc<AnswerArbiter>,
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(db: Arc<Database>) -> Router {
    let state = AppState {
        scheduler: Arc::new(BattleScheduler::new(db.clone())),
        arbiter: Arc::new(AnswerArbiter::new(db.clone())),
        db,
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        // Battles
        .route("/api/battles", get(list_battles).post(create_battle))
        .route("/api/battles/{id}", get(get_battle))
        .route("/api/battles/{id}/start", post(start_battle))
        .route("/api/battles/{id}/end", post(end_battle))
        // Answers and progress
        .route("/api/battles/{id}/answers", post(submit_answer))
        .route("/api/battles/{id}/progress", get(get_progress))
        // Live views
        .route("/api/battles/{id}/leaderboard", get(get_leaderboard))
        .route(
            "/api/battles/{id}/questions/{question_id}/status",
            get(get_question_solve_status),
        )
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "battle-backend" }))
}

async fn get_metrics() -> impl IntoResponse {
    metrics::gather_metrics()
}

async fn create_battle(
    State(state): State<AppState>,
    Json(req): Json<CreateBattleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let battle = state
        .scheduler
        .create_battle(
            req.scheduled_start,
            req.duration_minutes,
            req.participants,
            req.question_count,
        )
        .await?;
    let remaining = remaining_seconds(battle.scheduled_start, battle.duration_minutes, now_unix());
    Ok((
        StatusCode::CREATED,
        Json(BattleResponse {
            battle,
            remaining_seconds: remaining,
        }),
    ))
}

async fn list_battles(
    State(state): State<AppState>,
) -> Result<Json<Vec<BattleResponse>>, ApiError> {
    let now = now_unix();
    let battles = state
        .db
        .list_battles()
        .await?
        .into_iter()
        .map(|battle| {
            let remaining =
                remaining_seconds(battle.scheduled_start, battle.duration_minutes, now);
            BattleResponse {
                battle,
                remaining_seconds: remaining,
            }
        })
        .collect();
    Ok(Json(battles))
}

async fn get_battle(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BattleDetailResponse>, ApiError> {
    let battle = state
        .db
        .get_battle(id)
        .await?
        .ok_or_else(|| ApiError::not_found("battle not found"))?;

    let mut questions = Vec::new();
    for question_id in state.db.battle_question_ids(id).await? {
        let question = state
            .db
            .get_question(question_id)
            .await?
            .ok_or_else(|| ApiError::not_found("question not found"))?;
        questions.push(question.into());
    }

    let participants = state
        .db
        .list_participants(id)
        .await?
        .into_iter()
        .map(|p| p.user_name)
        .collect();

    let remaining = remaining_seconds(battle.scheduled_start, battle.duration_minutes, now_unix());
    Ok(Json(BattleDetailResponse {
        battle,
        remaining_seconds: remaining,
        participants,
        questions,
    }))
}

async fn start_battle(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BattleResponse>, ApiError> {
    let now = now_unix();
    let battle = state.scheduler.start_battle(id, now).await?;
    let remaining = remaining_seconds(battle.scheduled_start, battle.duration_minutes, now);
    Ok(Json(BattleResponse {
        battle,
        remaining_seconds: remaining,
    }))
}

async fn end_battle(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BattleResponse>, ApiError> {
    let battle = state.scheduler.end_battle(id).await?;
    let remaining = remaining_seconds(battle.scheduled_start, battle.duration_minutes, now_unix());
    Ok(Json(BattleResponse {
        battle,
        remaining_seconds: remaining,
    }))
}

async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<Json<SubmitOutcome>, ApiError> {
    let outcome = state
        .arbiter
        .submit_answer(
            id,
            req.question_id,
            &req.user_name,
            &req.answer,
            req.time_taken_seconds,
            now_unix(),
        )
        .await?;
    Ok(Json(outcome))
}

async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<ProgressParams>,
) -> Result<Json<Progress>, ApiError> {
    if state.db.get_battle(id).await?.is_none() {
        return Err(ApiError::not_found("battle not found"));
    }
    let progress = state
        .db
        .get_progress(id, &params.user_name)
        .await?
        .ok_or_else(|| ApiError::not_found("not a participant of this battle"))?;
    Ok(Json(progress))
}

async fn get_leaderboard(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let battle = state
        .db
        .get_battle(id)
        .await?
        .ok_or_else(|| ApiError::not_found("battle not found"))?;
    let participants = state.db.list_participants(id).await?;
    Ok(Json(LeaderboardResponse {
        battle_id: battle.id,
        status: battle.status,
        leaderboard: rank_participants(&participants),
    }))
}

async fn get_question_solve_status(
    State(state): State<AppState>,
    Path((id, question_id)): Path<(i64, i64)>,
) -> Result<Json<SolveStatusResponse>, ApiError> {
    if state.db.get_battle(id).await?.is_none() {
        return Err(ApiError::not_found("battle not found"));
    }
    if !state.db.battle_question_ids(id).await?.contains(&question_id) {
        return Err(ApiError::not_found("question is not part of this battle"));
    }

    let solve = state.db.get_solve(id, question_id).await?;
    let solved = solve.as_ref().map_or(false, |s| s.solved);
    // The correct answer is revealed only once someone has solved the
    // question.
    let correct_answer = if solved {
        state
            .db
            .get_question(question_id)
            .await?
            .map(|q| q.correct_answer)
    } else {
        None
    };

    Ok(Json(SolveStatusResponse {
        battle_id: id,
        question_id,
        solved,
        solved_by: solve.and_then(|s| s.solved_by),
        correct_answer,
    }))
}
