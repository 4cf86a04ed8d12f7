//! # ShelfSync Common Library
//!
//! Shared code for the ShelfSync crates:
//! - Error type
//! - Configuration loading and root folder resolution
//! - Domain enums (status, lifecycle stage, archive category, brand tier, ...)
//! - Time helpers and the injectable clock

pub mod config;
pub mod error;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use time::{Clock, FixedClock, SystemClock};
