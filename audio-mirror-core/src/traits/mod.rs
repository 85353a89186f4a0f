pub mod backend;
pub mod device_catalog;
pub mod router_delegate;
