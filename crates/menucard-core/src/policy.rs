//! Qualification policy: which orders grant a digital-menu-card entitlement.

use chrono::Duration;
use serde::Deserialize;

use crate::order::{LineItem, OrderEvent};

/// Which order statuses, and which line items, qualify for provisioning.
///
/// Deserialised from the `[policy]` table of the server configuration; every
/// field has a default matching the production store setup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QualificationPolicy {
  /// Lower-case order statuses that proceed to provisioning.
  pub qualifying_statuses: Vec<String>,
  /// SKU of the digital-menu-card product; also the stored product tag.
  pub product_sku:         String,
  /// Case-insensitive substring of a line item's display name that qualifies.
  pub name_keyword:        String,
  /// Line-item metadata key whose value, when equal to `product_sku`,
  /// qualifies.
  pub meta_key:            String,
  /// Days an entitlement stays valid; `None` issues non-expiring grants.
  pub validity_days:       Option<u32>,
}

impl Default for QualificationPolicy {
  fn default() -> Self {
    Self {
      qualifying_statuses: vec!["completed".into(), "processing".into()],
      product_sku:         "carta_digital".into(),
      name_keyword:        "carta".into(),
      meta_key:            "cartel_tipo".into(),
      validity_days:       Some(365),
    }
  }
}

impl QualificationPolicy {
  /// Whether `status` is in the qualifying set (case-insensitive).
  pub fn status_qualifies(&self, status: &str) -> bool {
    let status = status.trim();
    self
      .qualifying_statuses
      .iter()
      .any(|s| s.eq_ignore_ascii_case(status))
  }

  /// Whether a single line item is the digital-menu-card product.
  ///
  /// Three independent signals are accepted because different storefront
  /// integrations populate different fields.
  pub fn line_item_qualifies(&self, item: &LineItem) -> bool {
    let by_sku = item
      .sku
      .as_deref()
      .is_some_and(|sku| sku.trim() == self.product_sku);

    let keyword = self.name_keyword.to_lowercase();
    let by_name = !keyword.is_empty()
      && item
        .name
        .as_deref()
        .is_some_and(|name| name.to_lowercase().contains(&keyword));

    let by_meta = item.meta_data.iter().any(|m| {
      m.key.as_deref() == Some(self.meta_key.as_str())
        && m.value_text().is_some_and(|v| v.trim() == self.product_sku)
    });

    by_sku || by_name || by_meta
  }

  /// Whether any line item of `event` qualifies.
  pub fn order_qualifies(&self, event: &OrderEvent) -> bool {
    event.line_items.iter().any(|item| self.line_item_qualifies(item))
  }

  /// Validity period applied to new entitlements.
  pub fn validity(&self) -> Option<Duration> {
    self.validity_days.map(|d| Duration::days(i64::from(d)))
  }
}
