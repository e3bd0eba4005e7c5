//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use menucard_core::{
  account::{AccountCreation, EmailAddress},
  entitlement::{EntitlementStatus, NewEntitlement},
  identity::IdentityProvider,
  store::EntitlementStore,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn email(s: &str) -> EmailAddress { EmailAddress::parse(s).unwrap() }

fn new_entitlement(order_id: &str, address: &str, expires_in: Option<Duration>) -> NewEntitlement {
  let now = Utc::now();
  NewEntitlement {
    entitlement_id: Uuid::new_v4(),
    order_id:       order_id.into(),
    email:          email(address),
    account_id:     Uuid::new_v4(),
    product:        "carta_digital".into(),
    created_at:     now,
    expires_at:     expires_in.map(|d| now + d),
  }
}

// ─── Entitlements ────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_inserts_and_reads_back() {
  let s = store().await;
  let input = new_entitlement("1001", "owner@example.com", Some(Duration::days(365)));
  let account_id = input.account_id;
  let entitlement_id = input.entitlement_id;

  let outcome = s.upsert_entitlement(input).await.unwrap();
  assert!(outcome.inserted);
  assert_eq!(outcome.entitlement.order_id, "1001");
  assert_eq!(outcome.entitlement.account_id, account_id);
  assert_eq!(outcome.entitlement.entitlement_id, entitlement_id);
  assert_eq!(outcome.entitlement.status, EntitlementStatus::Active);
  assert!(outcome.entitlement.expires_at.is_some());

  let fetched = s.get_by_order_id("1001").await.unwrap().unwrap();
  assert_eq!(fetched.entitlement_id, outcome.entitlement.entitlement_id);
}

#[tokio::test]
async fn get_by_order_id_missing_returns_none() {
  let s = store().await;
  assert!(s.get_by_order_id("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn second_upsert_for_same_order_is_a_no_op() {
  let s = store().await;
  let first = s
    .upsert_entitlement(new_entitlement("2002", "a@example.com", None))
    .await
    .unwrap();
  let second = s
    .upsert_entitlement(new_entitlement("2002", "b@example.com", None))
    .await
    .unwrap();

  assert!(first.inserted);
  assert!(!second.inserted);
  assert_eq!(second.entitlement.entitlement_id, first.entitlement.entitlement_id);
  assert_eq!(second.entitlement.email.as_str(), "a@example.com");
  assert_eq!(s.list_for_email(&email("a@example.com")).await.unwrap().len(), 1);
  assert!(s.list_for_email(&email("b@example.com")).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_upserts_produce_one_row() {
  let s = store().await;
  let mut handles = Vec::new();
  for _ in 0..8 {
    let s = s.clone();
    handles.push(tokio::spawn(async move {
      s.upsert_entitlement(new_entitlement("3003", "race@example.com", None))
        .await
        .unwrap()
        .inserted
    }));
  }

  let mut inserted = 0;
  for h in handles {
    if h.await.unwrap() {
      inserted += 1;
    }
  }
  assert_eq!(inserted, 1);
  assert_eq!(s.list_for_email(&email("race@example.com")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn active_for_email_excludes_lapsed_grants() {
  let s = store().await;
  s.upsert_entitlement(new_entitlement("1", "owner@example.com", Some(Duration::days(30))))
    .await
    .unwrap();
  s.upsert_entitlement(new_entitlement("2", "owner@example.com", Some(-Duration::days(1))))
    .await
    .unwrap();
  s.upsert_entitlement(new_entitlement("3", "owner@example.com", None))
    .await
    .unwrap();

  let active = s
    .active_for_email(&email("owner@example.com"), Utc::now())
    .await
    .unwrap();
  let mut orders: Vec<_> = active.iter().map(|e| e.order_id.as_str()).collect();
  orders.sort_unstable();
  assert_eq!(orders, vec!["1", "3"]);

  let all = s.list_for_email(&email("owner@example.com")).await.unwrap();
  assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn expire_lapsed_only_touches_lapsed_active_rows() {
  let s = store().await;
  s.upsert_entitlement(new_entitlement("10", "x@example.com", Some(-Duration::hours(1))))
    .await
    .unwrap();
  s.upsert_entitlement(new_entitlement("11", "x@example.com", Some(Duration::days(1))))
    .await
    .unwrap();
  s.upsert_entitlement(new_entitlement("12", "x@example.com", None))
    .await
    .unwrap();

  assert_eq!(s.expire_lapsed(Utc::now()).await.unwrap(), 1);
  // Already expired rows are not counted twice.
  assert_eq!(s.expire_lapsed(Utc::now()).await.unwrap(), 0);

  let lapsed = s.get_by_order_id("10").await.unwrap().unwrap();
  assert_eq!(lapsed.status, EntitlementStatus::Expired);
  let current = s.get_by_order_id("11").await.unwrap().unwrap();
  assert_eq!(current.status, EntitlementStatus::Active);
  let open_ended = s.get_by_order_id("12").await.unwrap().unwrap();
  assert_eq!(open_ended.status, EntitlementStatus::Active);
}

#[tokio::test]
async fn open_on_disk_persists_across_reopen() {
  let dir = std::env::temp_dir().join(format!("menucard-store-{}", Uuid::new_v4()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("menucard.db");

  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.upsert_entitlement(new_entitlement("disk-1", "disk@example.com", None))
      .await
      .unwrap();
  }

  let reopened = SqliteStore::open(&path).await.unwrap();
  assert!(reopened.get_by_order_id("disk-1").await.unwrap().is_some());

  std::fs::remove_dir_all(&dir).ok();
}

// ─── Local accounts ──────────────────────────────────────────────────────────

#[tokio::test]
async fn create_confirmed_then_find() {
  let s = store().await;
  let addr = email("new@example.com");

  assert!(s.find_by_email(&addr).await.unwrap().is_none());

  let created = match s.create_confirmed(&addr).await.unwrap() {
    AccountCreation::Created(a) => a,
    AccountCreation::AlreadyExists => panic!("fresh store already had the account"),
  };
  assert!(created.email_confirmed_at.is_some());

  let found = s.find_by_email(&addr).await.unwrap().unwrap();
  assert_eq!(found.account_id, created.account_id);
  assert_eq!(found.email, addr);
  assert!(found.email_confirmed_at.is_some());
}

#[tokio::test]
async fn create_confirmed_twice_reports_already_exists() {
  let s = store().await;
  let addr = email("dup@example.com");

  assert!(matches!(s.create_confirmed(&addr).await.unwrap(), AccountCreation::Created(_)));
  assert!(matches!(s.create_confirmed(&addr).await.unwrap(), AccountCreation::AlreadyExists));
}
