// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) and Protected (bearer token required). Every protected
// handler receives its Principal from the auth layer and its Repositories from
// the per-request context; neither is ever read from a global.
pub mod protected;
pub mod public;
