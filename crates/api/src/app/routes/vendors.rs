//! Vendor directory and price book routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use siteops_auth::Permission;
use siteops_core::{AggregateId, Money};
use siteops_materials::MaterialId;
use siteops_procurement::{MaterialPrice, PriceBook};
use siteops_vendors::{
    RegisterVendor, UpdateVendorContact, Vendor, VendorCommand, VendorContact, VendorId,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_vendor).get(list_vendors))
        .route("/:id", get(get_vendor))
        .route("/:id/contact", post(update_contact))
        .route("/:id/prices", get(list_prices))
        .route("/:id/prices/:material_id", axum::routing::put(set_price))
}

pub async fn register_vendor(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RegisterVendorRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let vendor_id = VendorId::new(agg);

    let cmd = VendorCommand::RegisterVendor(RegisterVendor {
        vendor_id,
        name: body.name,
        contact: VendorContact {
            contact_person: body.contact_person,
            email: body.email,
            phone: body.phone,
            address: body.address,
        },
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("vendors.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<Vendor>(agg, "vendors.vendor", cmd_auth.inner, |id| {
            Vendor::empty(VendorId::new(id))
        })
        .await
    {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": agg.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn update_contact(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateVendorContactRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("vendor"),
    };

    let cmd = VendorCommand::UpdateVendorContact(UpdateVendorContact {
        vendor_id: VendorId::new(agg),
        contact: VendorContact {
            contact_person: body.contact_person,
            email: body.email,
            phone: body.phone,
            address: body.address,
        },
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("vendors.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<Vendor>(agg, "vendors.vendor", cmd_auth.inner, |id| {
            Vendor::empty(VendorId::new(id))
        })
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_vendors(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "vendors.read") {
        return errors::forbidden(e);
    }

    (StatusCode::OK, Json(services.projections().vendors.list())).into_response()
}

pub async fn get_vendor(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "vendors.read") {
        return errors::forbidden(e);
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("vendor"),
    };

    match services.projections().vendors.get(&VendorId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "vendor not found"),
    }
}

/// Last-writer-wins price upsert for a (vendor, material) pair.
///
/// The vendor must exist in the directory; the price book itself keeps no
/// history beyond `last_updated`.
pub async fn set_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, material_id)): Path<(String, String)>,
    Json(body): Json<dto::SetPriceRequest>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "vendors.prices.set") {
        return errors::forbidden(e);
    }

    let vendor_agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("vendor"),
    };
    let material_agg: AggregateId = match material_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("material"),
    };

    let vendor_id = VendorId::new(vendor_agg);
    if services.projections().vendors.get(&vendor_id).is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "vendor not found");
    }
    if body.price_minor < 0 {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "price cannot be negative",
        );
    }

    let price = MaterialPrice {
        vendor_id,
        material_id: MaterialId::new(material_agg),
        price: Money::from_minor(body.price_minor),
        unit: body.unit,
        last_updated: Utc::now(),
    };
    services.price_book().set(price.clone());

    (StatusCode::OK, Json(price)).into_response()
}

pub async fn list_prices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "vendors.read") {
        return errors::forbidden(e);
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("vendor"),
    };

    (
        StatusCode::OK,
        Json(services.price_book().list_for_vendor(VendorId::new(agg))),
    )
        .into_response()
}
