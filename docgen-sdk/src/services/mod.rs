//! Upstream client implementations
//!
//! This module contains clients for specific generation services.

pub mod common;
pub mod openai;

pub use common::UserAgent;
pub use openai::OpenAIClient;
