pub mod inspect;
pub mod nldas;
pub mod nldi;

pub use inspect::{inspect_export, inspect_footprint, inspect_mask};
pub use nldas::nldas_hourly;
pub use nldi::nldi;
