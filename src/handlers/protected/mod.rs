// handlers/protected/mod.rs - Endpoints that require a bearer token
//
// Route layers run authentication first, then bind the request's Repositories.
// Handlers that mutate a resource compare its owner with the Principal before
// calling the store.
pub mod follow;
pub mod posts;
pub mod users;
