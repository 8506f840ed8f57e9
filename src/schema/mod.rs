//! Session label log schema
//!
//! This module defines the line format of per-session label logs and the
//! static channel vocabulary used to resolve raw channel names.

mod raw_event;
mod adapter;

pub use raw_event::*;
pub use adapter::*;
