//! Vendor directory projection.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use siteops_events::EventEnvelope;
use siteops_vendors::{VendorContact, VendorEvent, VendorId};

use crate::read_model::ReadStore;

use super::ProjectionError;
use super::cursors::StreamCursors;

/// Queryable vendor read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorReadModel {
    pub vendor_id: VendorId,
    pub name: String,
    pub contact: VendorContact,
}

#[derive(Debug)]
pub struct VendorDirectoryProjection<S>
where
    S: ReadStore<VendorId, VendorReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> VendorDirectoryProjection<S>
where
    S: ReadStore<VendorId, VendorReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, vendor_id: &VendorId) -> Option<VendorReadModel> {
        self.store.get(vendor_id)
    }

    pub fn list(&self) -> Vec<VendorReadModel> {
        self.store.list()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_gated(aggregate_id, envelope.sequence_number(), || {
                let event: VendorEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                match event {
                    VendorEvent::VendorRegistered {
                        vendor_id,
                        name,
                        contact,
                        ..
                    } => {
                        if vendor_id.0 != aggregate_id {
                            return Err(ProjectionError::StreamMismatch(
                                "event vendor_id does not match envelope aggregate_id".to_string(),
                            ));
                        }
                        self.store.upsert(
                            vendor_id,
                            VendorReadModel {
                                vendor_id,
                                name,
                                contact,
                            },
                        );
                    }
                    VendorEvent::VendorContactUpdated {
                        vendor_id, contact, ..
                    } => {
                        if let Some(mut rm) = self.store.get(&vendor_id) {
                            rm.contact = contact;
                            self.store.upsert(vendor_id, rm);
                        }
                    }
                }

                Ok(())
            })
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.clear();
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
