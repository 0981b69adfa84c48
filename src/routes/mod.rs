mod common;
mod module;

pub use common::{common_routes, common_routes_with_ready};
pub use module::{module_routes, MAX_BODY_BYTES};
