//! Common utilities and types shared across the session client crates.

#![warn(clippy::pedantic)]

/// Module for identifier newtypes
pub mod types;

/// Module for shared configuration types
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;
