//! Immutable schema model. Produced by the builders in [`crate::builder`].

mod action;
mod column;
mod field;
mod filter;
mod form;
mod table;

pub use action::*;
pub use column::*;
pub use field::*;
pub use filter::*;
pub use form::*;
pub use table::*;
