// ABOUTME: API module containing the HTTP handler functions for the filtertrail REST API.
// ABOUTME: Split into read-only views, mutating commands, and the notice stream.

pub mod commands;
pub mod stream;
pub mod views;
