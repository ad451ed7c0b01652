//! `siteops-vendors` — supplier directory.

pub mod vendor;

pub use vendor::{
    RegisterVendor, UpdateVendorContact, Vendor, VendorCommand, VendorContact, VendorEvent,
    VendorId,
};
