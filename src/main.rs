// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Entry point.
//!
//! ```text
//! cli::parse() --> Config (gitdock.toml, --ini, GITDOCK_*, --set)
//!              --> Logging --> Command Dispatch
//!   Version | Options | Inis | Repo (status, sync, stash, ...)
//! ```

use std::process::ExitCode;

use gitdock::cli::global::GlobalOptions;
use gitdock::cli::{self, Command};
use gitdock::cmd::config::{run_inis_command, run_options_command};
use gitdock::cmd::repo::run_repo_command;
use gitdock::config::Config;
use gitdock::config::loader::ConfigLoader;
use gitdock::logging::{LogConfig, LogGuard, init_logging};

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const DEFAULT_CONFIG_FILE: &str = "gitdock.toml";
const ENV_PREFIX: &str = "GITDOCK";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();

    let Some(command) = &cli.command else {
        eprintln!("No command specified. Use --help for usage information.");
        return ExitCode::FAILURE;
    };
    if matches!(command, Command::Version) {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let loader = match build_config_loader(&cli.global) {
        Ok(loader) => loader,
        Err(e) => {
            eprintln!("Failed to load config: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let loaded_files = loader.format_loaded_files();
    let config = match loader.build() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match start_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match command {
        Command::Version => Ok(true),
        Command::Options => {
            run_options_command(&config);
            Ok(true)
        }
        Command::Inis => {
            run_inis_command(&loaded_files);
            Ok(true)
        }
        Command::Repo(repo_command) => run_repo_command(repo_command, &config).await,
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Layers `gitdock.toml`, `--ini` files, environment and `--set` overrides.
fn build_config_loader(global: &GlobalOptions) -> gitdock::error::Result<ConfigLoader> {
    let mut loader = ConfigLoader::new().add_toml_file_optional(DEFAULT_CONFIG_FILE);
    for ini_path in &global.inis {
        loader = loader.add_toml_file(ini_path);
    }
    loader = loader.with_env_prefix(ENV_PREFIX);
    for assignment in global.to_config_overrides() {
        loader = loader.set_from_str(&assignment)?;
    }
    Ok(loader)
}

fn start_logging(config: &Config) -> gitdock::error::Result<LogGuard> {
    init_logging(&LogConfig::from(&config.global))
}
