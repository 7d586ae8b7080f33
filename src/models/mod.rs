pub mod vulnerability;
pub mod specification;
pub mod plan;
pub mod outcome;

pub use vulnerability::*;
pub use specification::*;
pub use plan::*;
pub use outcome::*;
