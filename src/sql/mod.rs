//! Safe SQL builder: identifiers from the schema only, values as parameters.

mod builder;
pub mod params;
pub mod placeholders;
pub use builder::*;
pub use params::*;
pub use placeholders::to_numbered;
