// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Library root.
//!
//! # Crate Architecture
//!
//! ```text
//!                        main.rs
//!                           |
//!                +----------+----------+
//!                v                     v
//!             cli (clap)          cmd (handlers)
//!                |            config / repo
//!                +----------+----------+
//!                           v
//!              ,---------------------------,
//!              |          config           |
//!              |   TOML, layered settings  |
//!              '-------------+-------------'
//!                            v
//!   ,-----------------------------------------------------,
//!   |                       engine                        |
//!   |   lock --> status --> sync / mutation / history     |
//!   |              \            |           /             |
//!   |               `------ invoker -------'              |
//!   '--------+-----------------+------------------+-------'
//!            v                 v                  v
//!          auth           git (runner)        activity
//!     tokens, redact    CLI / gix discover   record sinks
//!
//!   +-----------------------------------------+
//!   |  core      process (tokio, timeouts)    |
//!   +-----------------------------------------+
//!   |  foundation      error, logging         |
//!   +-----------------------------------------+
//! ```

pub mod activity;
pub mod auth;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod git;
pub mod logging;
