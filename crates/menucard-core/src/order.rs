//! Inbound order events as sent by the commerce platform's order webhook.
//!
//! Parsing is lenient: every field the resolver looks at is optional, unknown
//! fields are ignored, and the order id may arrive as a number or a string.
//! Whether a parsed event is *usable* is decided later by the resolver.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ─── Order id ────────────────────────────────────────────────────────────────

/// An upstream order identifier. WooCommerce sends integers; other
/// integrations send strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OrderId {
  Number(u64),
  Text(String),
}

impl OrderId {
  /// The canonical text key stored in the entitlement table, or `None` when
  /// the id is blank.
  pub fn key(&self) -> Option<String> {
    match self {
      Self::Number(n) => Some(n.to_string()),
      Self::Text(s) => {
        let trimmed = s.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_owned())
      }
    }
  }
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// Billing block of an order; only the email is consumed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Billing {
  #[serde(default)]
  pub email: Option<String>,
}

/// Explicit `null` reads as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One `meta_data` entry attached to a line item.
#[derive(Debug, Clone, Deserialize)]
pub struct MetaEntry {
  #[serde(default)]
  pub key:   Option<String>,
  #[serde(default)]
  pub value: Value,
}

impl MetaEntry {
  /// The value as text, if it is a JSON string or number.
  pub fn value_text(&self) -> Option<String> {
    match &self.value {
      Value::String(s) => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    }
  }
}

/// A purchased line item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineItem {
  #[serde(default)]
  pub sku:       Option<String>,
  #[serde(default)]
  pub name:      Option<String>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub meta_data: Vec<MetaEntry>,
}

/// The subset of an order webhook body the resolver needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderEvent {
  #[serde(default)]
  pub id:         Option<OrderId>,
  #[serde(default)]
  pub status:     Option<String>,
  #[serde(default)]
  pub billing:    Option<Billing>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub line_items: Vec<LineItem>,
}

impl OrderEvent {
  /// Canonical order key, if present and non-blank.
  pub fn order_key(&self) -> Option<String> { self.id.as_ref().and_then(OrderId::key) }

  /// The raw billing email, if present and non-blank. Not yet normalised.
  pub fn billing_email(&self) -> Option<&str> {
    self
      .billing
      .as_ref()
      .and_then(|b| b.email.as_deref())
      .map(str::trim)
      .filter(|e| !e.is_empty())
  }

  /// Lower-cased status, if present.
  pub fn normalised_status(&self) -> Option<String> {
    self.status.as_deref().map(|s| s.trim().to_lowercase())
  }
}
