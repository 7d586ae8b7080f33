pub mod types;
pub mod classification;

pub use types::AutopatchError;
pub use classification::ErrorClassification;
