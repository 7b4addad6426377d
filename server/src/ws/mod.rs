pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod registry;

pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, ConnectionSender};
