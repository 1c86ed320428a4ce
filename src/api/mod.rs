//! JSON HTTP API.

mod server;

pub use server::{ApiHandle, JsonBody, USER_HEADER, UserId, build_router, start_server};
