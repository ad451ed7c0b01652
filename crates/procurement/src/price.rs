//! Vendor price book: a plain (vendor, material) -> price/unit association.
//!
//! Deliberately not event-sourced: the requirement is last-writer-wins with
//! only a `last_updated` stamp, no history. Storage and lookup, nothing more.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siteops_core::Money;
use siteops_materials::MaterialId;
use siteops_vendors::VendorId;

/// Current price a vendor quotes for a material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialPrice {
    pub vendor_id: VendorId,
    pub material_id: MaterialId,
    pub price: Money,
    pub unit: String,
    pub last_updated: DateTime<Utc>,
}

/// Keyed price store. `set` is an upsert: the last writer wins and stamps
/// `last_updated`.
pub trait PriceBook: Send + Sync {
    fn set(&self, price: MaterialPrice);

    fn get(&self, vendor_id: VendorId, material_id: MaterialId) -> Option<MaterialPrice>;

    fn list_for_vendor(&self, vendor_id: VendorId) -> Vec<MaterialPrice>;

    fn list_for_material(&self, material_id: MaterialId) -> Vec<MaterialPrice>;
}
