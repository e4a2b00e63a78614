//! Gateway: HTTP server for the LINE webhook and a health probe.
//!
//! Webhook requests are verified and parsed on the request task; events are
//! queued and answered by a single processor task.

mod server;

pub use server::{run_gateway, GatewayState};
