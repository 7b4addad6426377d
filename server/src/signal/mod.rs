//! The DOT/DASH symbol and the publish path that fans it out.

pub mod publish;
pub mod symbol;

pub use symbol::{BroadcastMessage, Symbol};
