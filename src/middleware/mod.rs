//! HTTP middleware for Dockhand

pub mod auth;
