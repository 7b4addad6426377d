//! dotdash signaling hub library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod config;
pub mod db;
pub mod routes;
pub mod signal;
pub mod state;
pub mod store;
pub mod ws;
