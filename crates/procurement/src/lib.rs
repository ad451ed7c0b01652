//! `siteops-procurement` — purchase orders and vendor pricing.

pub mod order;
pub mod price;

pub use order::{
    AddOrderLine, CancelOrder, CloseOrder, GoodsReceived, OpenPurchaseOrder, OrderLine,
    PurchaseOrder, PurchaseOrderCommand, PurchaseOrderEvent, PurchaseOrderId,
    PurchaseOrderStatus, ReceiveGoods, SubmitOrder,
};
pub use price::{MaterialPrice, PriceBook};
