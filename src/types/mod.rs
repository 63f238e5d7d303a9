mod access_mode;
mod models;
mod unit;

pub use access_mode::AccessMode;
pub use models::*;
pub use unit::UnitType;
