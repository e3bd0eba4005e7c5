//! Background task that expires lapsed entitlements.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use menucard_core::store::EntitlementStore;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Run [`EntitlementStore::expire_lapsed`] every `every`, starting
/// immediately. Failures are logged and the sweep keeps running.
pub fn spawn_expiry_sweep<S>(store: Arc<S>, every: Duration) -> JoinHandle<()>
where
  S: EntitlementStore + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match store.expire_lapsed(Utc::now()).await {
        Ok(0) => tracing::debug!("expiry sweep: nothing lapsed"),
        Ok(n) => tracing::info!(expired = n, "expiry sweep"),
        Err(e) => tracing::error!(error = %e, "expiry sweep failed"),
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use chrono::Duration as ChronoDuration;
  use menucard_core::{
    account::EmailAddress,
    entitlement::{EntitlementStatus, NewEntitlement},
  };
  use menucard_store_sqlite::SqliteStore;
  use uuid::Uuid;

  use super::*;

  #[tokio::test]
  async fn sweep_expires_lapsed_rows() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let created = Utc::now() - ChronoDuration::days(400);
    store
      .upsert_entitlement(NewEntitlement {
        entitlement_id: Uuid::new_v4(),
        order_id:       "old".into(),
        email:          EmailAddress::parse("old@example.com").unwrap(),
        account_id:     Uuid::new_v4(),
        product:        "carta_digital".into(),
        created_at:     created,
        expires_at:     Some(created + ChronoDuration::days(365)),
      })
      .await
      .unwrap();

    let handle = spawn_expiry_sweep(store.clone(), Duration::from_millis(10));
    let mut status = EntitlementStatus::Active;
    for _ in 0..100 {
      tokio::time::sleep(Duration::from_millis(10)).await;
      status = store.get_by_order_id("old").await.unwrap().unwrap().status;
      if status == EntitlementStatus::Expired {
        break;
      }
    }
    handle.abort();
    assert_eq!(status, EntitlementStatus::Expired);
  }
}
