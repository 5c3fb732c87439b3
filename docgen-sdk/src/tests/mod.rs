//! Unit tests for docgen-sdk
//!
//! This module contains cross-component tests for the engine.

pub mod fixtures;

pub mod config_tests;
pub mod engine_tests;
pub mod openai_mock_tests;
pub mod resilience_tests;
