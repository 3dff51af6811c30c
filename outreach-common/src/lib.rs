//! # Outreach Common Library
//!
//! Shared code for the outreach services:
//! - Campaign, contact and delivery-log models
//! - Database schema initialization
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
