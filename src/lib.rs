//! Backup, restore and retention management for a Dockerized Vaultwarden
//! instance.
//!
//! The crate stops the vaultwarden container, snapshots its data directory
//! into a (optionally gpg-encrypted) tar.gz in a local destination,
//! restarts the container and prunes old snapshots under a
//! daily/weekly/monthly retention policy. The inverse restore workflow
//! replaces the data directory from a chosen snapshot behind an explicit
//! confirmation gate.

pub mod cli;
pub mod core;
pub mod utils;
