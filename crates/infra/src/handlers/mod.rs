//! Cross-domain event handlers.

pub mod goods_receipt;

pub use goods_receipt::GoodsReceiptHandler;
