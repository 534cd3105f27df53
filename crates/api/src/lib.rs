pub mod error;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::{build_router, ApiState};
