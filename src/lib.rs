//! Chunkflow: chunk-to-buffer handoff for adaptive media playback.
//!
//! The library crates do the work (`chunkflow-media` binds and loads chunks,
//! `chunkflow-common` carries shared types). This crate adds the
//! application layer around them:
//!
//! - `config` - TOML configuration with defaults and validation
//! - `manifest` - JSON chunk manifests describing what to load
//! - `simulate` - Runs a manifest through a sample source and reports the
//!   buffer range each chunk ended up with

pub mod config;
pub mod manifest;
pub mod simulate;
