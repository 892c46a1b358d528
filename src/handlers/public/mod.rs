// handlers/public/mod.rs - Endpoints reachable without a token
pub mod health;
pub mod login;
pub mod register;

pub use health::get as health_get;
pub use login::post as login_post;
pub use register::post as register_post;
