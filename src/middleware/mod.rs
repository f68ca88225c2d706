pub mod auth;
pub mod errors;
pub mod extract;
pub mod response;

pub use auth::{protect, restrict_to, CurrentUser, RoleGuard};
pub use errors::normalize_errors;
pub use extract::{AppJson, AppPath, AppQuery};
pub use response::{ApiResponse, ApiResult};
