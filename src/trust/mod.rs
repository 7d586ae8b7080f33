pub mod resolver;
pub mod integrity;

pub use resolver::{ResolvedPackage, TrustStore, SPEC_FILE_NAME};
pub use integrity::{verify_artifact, verify_specification};
