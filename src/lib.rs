//! Samba share and ZFS dataset orchestration.
//!
//! `smb-zfs` keeps three things in step: the Samba configuration, the ZFS
//! datasets backing home directories and shares, and the OS users and
//! groups that access them.  A JSON ledger records everything the tool
//! manages.
//!
//! The library is organised in layers:
//!
//! - **[`state`]** is the ledger with locking, backup and atomic replace
//! - **[`resources`]** holds one adapter per external system behind a trait
//! - **[`operations`]** validates requests and drives the adapters
//! - **[`commands`]** and **[`cli`]** form the command-line surface
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod operations;
pub mod platform;
pub mod resources;
pub mod state;
