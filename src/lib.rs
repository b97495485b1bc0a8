//! Letterbox: a session-scoped query cache and mutation synchronizer for the letter archive
//! admin.
//!
//! Reads go through [`application::QueryCoordinator`], which de-duplicates fetches per
//! [`cache::CacheKey`]. Writes go through [`application::MutationCoordinator`], which applies
//! [`application::UpdateRule`]s to every bound key in one batch after the write succeeded.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
