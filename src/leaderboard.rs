// Live leaderboard: a pure ranking over participant rows, safe to compute
// at arbitrary frequency.

use serde::{Deserialize, Serialize};

use crate::db::ParticipantRow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_name: String,
    pub score: i64,
    pub correct_count: i64,
    pub finished: bool,
    pub time_completed_seconds: Option<i64>,
}

/// Rank every authorized participant, zero-progress entries included.
///
/// Sort key: score desc, then finished (true first), then completion time
/// asc with unfinished participants last. Ranks are the 1-based positions
/// in that order; ties share a sort position but still receive sequential
/// ranks (positional tie-break, not shared ranks).
pub fn rank_participants(participants: &[ParticipantRow]) -> Vec<LeaderboardEntry> {
    let mut sorted: Vec<&ParticipantRow> = participants.iter().collect();
    sorted.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.finished_at.is_some().cmp(&a.finished_at.is_some()))
            .then_with(|| {
                let ta = completion_key(a);
                let tb = completion_key(b);
                ta.cmp(&tb)
            })
    });

    sorted
        .into_iter()
        .enumerate()
        .map(|(idx, p)| LeaderboardEntry {
            rank: idx as i64 + 1,
            user_name: p.user_name.clone(),
            score: p.score,
            correct_count: p.correct_count,
            finished: p.finished_at.is_some(),
            time_completed_seconds: p.time_completed_seconds,
        })
        .collect()
}

/// Completion time for ordering; unfinished participants sort last.
fn completion_key(p: &ParticipantRow) -> i64 {
    if p.finished_at.is_some() {
        p.time_completed_seconds.unwrap_or(i64::MAX)
    } else {
        i64::MAX
    }
}
