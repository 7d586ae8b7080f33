pub mod composer;
pub mod lease;

pub use composer::{branch_name, ChangeComposer, ComposedChange};
pub use lease::CheckoutLeases;
