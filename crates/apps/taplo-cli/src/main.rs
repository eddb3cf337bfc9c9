use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use taplo_core::InstallPaths;

mod handlers;
mod host;
mod lifecycle;
mod logging;
mod ui;

use handlers::relay::RelayAction;
use host::LineRange;

#[derive(Parser)]
#[command(name = "taplo-ext")]
#[command(version)]
#[command(about = "Installs and drives the taplo TOML language server", long_about = None)]
#[command(styles = styles())]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

fn styles() -> clap::builder::Styles {
    use clap::builder::styling::{AnsiColor, Effects, Styles};
    Styles::styled()
        .header(AnsiColor::Magenta.on_default() | Effects::BOLD)
        .usage(AnsiColor::Magenta.on_default() | Effects::BOLD)
        .literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Subcommand)]
enum Commands {
    /// Show the installed server and where its files live
    Status,
    /// Check for a new server release and install it
    Update {
        /// Ignore the update check window
        #[arg(long)]
        force: bool,
    },
    /// Remove the installed server
    Uninstall,
    /// Show or change settings
    Config {
        /// Release tag to install, or "latest"
        #[arg(long)]
        server_version: Option<String>,
    },
    /// Convert a TOML file (or some of its lines) to JSON on stdout
    CopyJson {
        file: PathBuf,
        /// Only convert these lines, e.g. 3 or 3:10
        #[arg(long)]
        lines: Option<LineRange>,
    },
    /// Convert TOML from stdin to JSON on stdout
    PasteJson,
    /// Convert JSON from stdin to TOML on stdout
    PasteToml,
    /// Associate a schema with a TOML file
    Schema {
        file: PathBuf,
        /// Pick this entry (1-based) instead of prompting
        #[arg(long)]
        pick: Option<usize>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let paths = InstallPaths::from_env()?;
    let _logger = logging::init(&paths.log_dir())?;

    let relay = |action| handlers::relay::handle_relay(&paths, action);
    let done = |result: Result<()>| result.map(|_| ExitCode::SUCCESS);

    match cli.command {
        None | Some(Commands::Status) => done(handlers::status::handle_status(&paths)),
        Some(Commands::Update { force }) => done(handlers::update::handle_update(&paths, force)),
        Some(Commands::Uninstall) => done(handlers::uninstall::handle_uninstall(&paths)),
        Some(Commands::Config { server_version }) => {
            done(handlers::config::handle_config(&paths, server_version))
        }
        Some(Commands::CopyJson { file, lines }) => relay(RelayAction::CopyJson { file, lines }),
        Some(Commands::PasteJson) => relay(RelayAction::PasteJson),
        Some(Commands::PasteToml) => relay(RelayAction::PasteToml),
        Some(Commands::Schema { file, pick }) => relay(RelayAction::Schema { file, pick }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_relay_arguments() {
        let cli = Cli::try_parse_from(["taplo-ext", "copy-json", "Cargo.toml", "--lines", "2:4"])
            .unwrap();
        match cli.command {
            Some(Commands::CopyJson { file, lines }) => {
                assert_eq!(file, PathBuf::from("Cargo.toml"));
                assert_eq!(lines, Some("2:4".parse().unwrap()));
            }
            _ => panic!("expected copy-json"),
        }

        assert!(Cli::try_parse_from(["taplo-ext", "copy-json", "a.toml", "--lines", "0"]).is_err());
    }
}
