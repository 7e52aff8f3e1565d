use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::global::GlobalState;

/// One iteration per second: sweeps every live session for read timeouts and
/// due keep-alives. Runs on the main task alongside the accept loop.
pub async fn run_tick_loop(global: Arc<GlobalState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        interval.tick().await;
        let sessions = global.sessions_snapshot();
        debug!("tick: {} session(s)", sessions.len());
        for session in sessions {
            session.on_tick();
        }
    }
}
