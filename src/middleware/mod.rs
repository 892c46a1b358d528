pub mod auth;
pub mod context;
pub mod json;
pub mod response;

pub use auth::{extract_bearer_token, extract_principal, require_authentication, Principal};
pub use context::inject_repositories;
pub use json::{parse_id, JsonBody, RawBody};
pub use response::{ApiResponse, ApiResult};
