//! Background task that expires stale posts.
//!
//! Reservation attempts already expire posts lazily; the sweeper catches
//! posts nobody touches so the feed query stays cheap.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use crate::api::AppState;
use crate::db;

/// Run the expiry sweep loop as a background [`tokio`] task.
pub async fn run(state: Arc<AppState>) {
    let interval = Duration::from_secs(state.config.expiry_sweep_secs);
    info!("Expiry sweeper starting (interval: {:?})", interval);

    loop {
        match db::expire_stale_posts(&state.pool, Utc::now().timestamp()).await {
            Ok(0) => {}
            Ok(expired) => info!("Expired {expired} stale posts"),
            Err(e) => error!("Expiry sweep failed: {e}"),
        }

        tokio::time::sleep(interval).await;
    }
}
