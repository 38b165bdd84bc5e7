//! `storefront-core`: shared building blocks for the storefront backend.
//!
//! Identifiers and the domain error model. No infrastructure concerns live here.

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::{AccountId, TokenId};
