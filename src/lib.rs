//! Kanbe kanban board library
//!
//! This module exports the core components for testing and integration.

pub mod api;
pub mod backup;
pub mod board;
pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod scheduler;
pub mod store;
pub mod types;
