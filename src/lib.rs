//! Sprint dashboard core.
//!
//! Two leaf components consumed by a presentation layer:
//! - `session` + `google::auth`: session-scoped OAuth2 credential lifecycle
//!   (authorize, exchange, transparent refresh, logout)
//! - `table`: normalization of ragged spreadsheet grids into typed,
//!   length-consistent columns
//!
//! `google::sheets` is the thin read client feeding the table layer, and
//! `insights` holds the derived sprint metrics (velocity, risk distribution,
//! per-task status) computed from a normalized table.

pub mod config;
pub mod google;
pub mod insights;
pub mod session;
pub mod table;
