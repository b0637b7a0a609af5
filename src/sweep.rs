// Background expiry sweep.
//
// Clients also call end_battle from their own countdown, but battle
// completion must never depend on a tab staying open; this task converges
// every battle past its window regardless. Racing a client call is
// harmless because the status transition is conditional.

use std::sync::Arc;

use crate::scheduler::BattleScheduler;

/// Spawn the periodic sweep: auto-start due pending battles and
/// auto-complete expired ones.
pub fn spawn_expiry_sweep(scheduler: Arc<BattleScheduler>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let now = chrono::Utc::now().timestamp();
            if let Err(e) = scheduler.run_sweep_pass(now).await {
                tracing::error!("Expiry sweep pass failed: {e}");
            }
        }
    });
}
