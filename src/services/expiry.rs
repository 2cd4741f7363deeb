use log::{error, info};
use mongodb::bson::DateTime;
use std::sync::Arc;
use std::time::Duration;

use super::error::ServiceResult;
use crate::store::AccountStore;

/// Flips lapsed subscriptions to `expired`.
#[derive(Clone)]
pub struct ExpirySweeper {
    accounts: Arc<dyn AccountStore>,
}

impl ExpirySweeper {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        ExpirySweeper { accounts }
    }

    pub async fn sweep_expired(&self, now: DateTime) -> ServiceResult<u64> {
        let expired = self.accounts.expire_lapsed(now).await?;
        if expired > 0 {
            info!("Expired {} subscription(s)", expired);
        }
        Ok(expired)
    }

    /// Sweeps immediately, then every `interval`, until the runtime shuts down.
    pub fn spawn(self, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep_expired(DateTime::now()).await {
                    error!("Subscription expiry sweep failed: {}", e);
                }
            }
        })
    }
}
