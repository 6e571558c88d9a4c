//! Hex Tactics - turn-based hex-grid battle core

pub mod battle;
pub mod core;
