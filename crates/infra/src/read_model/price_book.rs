//! In-memory vendor price book.
//!
//! Implements the `PriceBook` seam from `siteops-procurement`: a plain keyed
//! association with last-writer-wins semantics, no history.

use std::collections::HashMap;
use std::sync::RwLock;

use siteops_materials::MaterialId;
use siteops_procurement::{MaterialPrice, PriceBook};
use siteops_vendors::VendorId;

#[derive(Debug, Default)]
pub struct InMemoryPriceBook {
    inner: RwLock<HashMap<(VendorId, MaterialId), MaterialPrice>>,
}

impl InMemoryPriceBook {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PriceBook for InMemoryPriceBook {
    fn set(&self, price: MaterialPrice) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((price.vendor_id, price.material_id), price);
        }
    }

    fn get(&self, vendor_id: VendorId, material_id: MaterialId) -> Option<MaterialPrice> {
        let map = self.inner.read().ok()?;
        map.get(&(vendor_id, material_id)).cloned()
    }

    fn list_for_vendor(&self, vendor_id: VendorId) -> Vec<MaterialPrice> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.values()
            .filter(|p| p.vendor_id == vendor_id)
            .cloned()
            .collect()
    }

    fn list_for_material(&self, material_id: MaterialId) -> Vec<MaterialPrice> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.values()
            .filter(|p| p.material_id == material_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use siteops_core::{AggregateId, Money};

    fn price(vendor_id: VendorId, material_id: MaterialId, minor: i64) -> MaterialPrice {
        MaterialPrice {
            vendor_id,
            material_id,
            price: Money::from_minor(minor),
            unit: "bags".to_string(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn set_is_last_writer_wins() {
        let book = InMemoryPriceBook::new();
        let vendor_id = VendorId::new(AggregateId::new());
        let material_id = MaterialId::new(AggregateId::new());

        book.set(price(vendor_id, material_id, 1200));
        book.set(price(vendor_id, material_id, 1350));

        let current = book.get(vendor_id, material_id).unwrap();
        assert_eq!(current.price, Money::from_minor(1350));
        assert_eq!(book.list_for_vendor(vendor_id).len(), 1);
    }

    #[test]
    fn listings_filter_by_key() {
        let book = InMemoryPriceBook::new();
        let vendor_a = VendorId::new(AggregateId::new());
        let vendor_b = VendorId::new(AggregateId::new());
        let cement = MaterialId::new(AggregateId::new());
        let sand = MaterialId::new(AggregateId::new());

        book.set(price(vendor_a, cement, 1200));
        book.set(price(vendor_a, sand, 300));
        book.set(price(vendor_b, cement, 1150));

        assert_eq!(book.list_for_vendor(vendor_a).len(), 2);
        assert_eq!(book.list_for_material(cement).len(), 2);
        assert_eq!(book.list_for_material(sand).len(), 1);
        assert!(book.get(vendor_b, sand).is_none());
    }
}
