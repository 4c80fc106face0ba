pub mod assortment;
pub mod definition;
pub mod generator;
pub mod registry;
pub mod service;

pub use assortment::ShopAssortment;
pub use generator::ShopGenerator;
pub use registry::VendorRegistry;
pub use service::{ShopError, ShopService};
