//! Request DTOs.
//!
//! Read models serialize directly as responses; only incoming payloads need
//! dedicated shapes here. Monetary fields travel as integer minor units.

use chrono::NaiveDate;
use serde::Deserialize;

use siteops_core::Priority;
use siteops_materials::{MaterialId, RequestDecision, TransactionType};
use siteops_projects::{ProjectId, ProjectRole};
use siteops_vendors::VendorId;

fn default_priority() -> Priority {
    Priority::Medium
}

// Materials

#[derive(Debug, Deserialize)]
pub struct CreateMaterialRequest {
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub reorder_level: i64,
    #[serde(default)]
    pub initial_quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMaterialRequest {
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub reorder_level: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecordTransactionRequest {
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub unit_price_minor: Option<i64>,
    pub vendor_id: Option<VendorId>,
    pub project_id: Option<ProjectId>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitMaterialRequest {
    pub material_id: MaterialId,
    pub project_id: ProjectId,
    pub quantity: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecideRequestBody {
    pub decision: RequestDecision,
}

// Vendors & pricing

#[derive(Debug, Deserialize)]
pub struct RegisterVendorRequest {
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVendorContactRequest {
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetPriceRequest {
    pub price_minor: i64,
    pub unit: String,
}

// Procurement

#[derive(Debug, Deserialize)]
pub struct OpenPurchaseOrderRequest {
    pub po_number: String,
    pub vendor_id: VendorId,
    pub project_id: Option<ProjectId>,
    pub order_date: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddOrderLineRequest {
    pub material_id: MaterialId,
    pub quantity: i64,
    pub unit_price_minor: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveGoodsRequest {
    pub delivered_on: NaiveDate,
}

// Projects & tasks

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub budget_minor: Option<i64>,
    pub client_id: Option<uuid::Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct AssignMemberRequest {
    pub user_id: uuid::Uuid,
    pub role: ProjectRole,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub assigned_to: Option<uuid::Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
    pub assignee: uuid::Uuid,
}

// Issues

#[derive(Debug, Deserialize)]
pub struct OpenTicketRequest {
    pub project_id: ProjectId,
    pub title: String,
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: Priority,
}

#[derive(Debug, Deserialize)]
pub struct RaiseNcrRequest {
    pub ncr_number: String,
    pub project_id: ProjectId,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default = "default_priority")]
    pub severity: Priority,
}

#[derive(Debug, Deserialize)]
pub struct ResolveNcrRequest {
    pub root_cause: String,
    pub corrective_action: String,
}

// Equipment

#[derive(Debug, Deserialize)]
pub struct RegisterEquipmentRequest {
    pub name: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub location: Option<String>,
    pub next_maintenance: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct AllocateEquipmentRequest {
    pub project_id: ProjectId,
}

#[derive(Debug, Deserialize)]
pub struct CompleteMaintenanceRequest {
    pub performed_on: NaiveDate,
    pub next_maintenance: Option<NaiveDate>,
}
