//! Foundation module - Core utilities and types
//!
//! This module provides the low-level building blocks the RHI is assembled from:
//! - Random handle identifiers
//! - Lock-free ring buffers for command list recycling
//! - Logging utilities

pub mod collections;
pub mod id;
pub mod logging;
pub mod ring_buffer;
