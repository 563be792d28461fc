use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{error, info};

use crate::config::ReviewConfig;
use crate::metrics;
use crate::repo::prospect::ProspectReviewRepo;

/// Background task driving the time-based review transitions: promoting
/// `Deploying` reviews to `Live` once the deployment delay has passed, and
/// marking overdue reviews `Expired`. All state lives in the database, so the
/// sweeper survives restarts and can run on several instances at once.
pub struct ReviewSweeper {
    prospect_repo: Arc<dyn ProspectReviewRepo + Send + Sync>,
    config: ReviewConfig,
}

impl ReviewSweeper {
    pub fn new(
        prospect_repo: Arc<dyn ProspectReviewRepo + Send + Sync>,
        config: ReviewConfig,
    ) -> Self {
        Self {
            prospect_repo,
            config,
        }
    }

    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            self.sweep_once().await;
        }
    }

    /// One sweep pass. Promotion runs first so a review that finished
    /// deploying right at its deadline still goes live instead of expiring.
    pub async fn sweep_once(&self) {
        let now = Utc::now();
        let promote_after = Duration::from_std(self.config.promote_after)
            .unwrap_or_else(|_| Duration::seconds(5));
        let cutoff = now - promote_after;

        match self.prospect_repo.promote_deploying(cutoff, now).await {
            Ok(promoted) if promoted > 0 => {
                info!("Promoted {} deploying review(s) to live", promoted);
                for _ in 0..promoted {
                    metrics::record_review_transition("Live");
                }
            }
            Ok(_) => {}
            Err(err) => {
                error!("Review promotion sweep failed: {}", err);
            }
        }

        match self.prospect_repo.expire_overdue(now).await {
            Ok(expired) if expired > 0 => {
                info!("Expired {} overdue review(s)", expired);
                for _ in 0..expired {
                    metrics::record_review_transition("Expired");
                }
            }
            Ok(_) => {}
            Err(err) => {
                error!("Review expiry sweep failed: {}", err);
            }
        }
    }
}
