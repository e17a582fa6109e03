//! Shared helpers for brx-ai integration tests

#![allow(dead_code)]

pub mod audio_generator;
pub mod model_fixture;
