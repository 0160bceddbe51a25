//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Live JSON document server
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true, disable_version_flag = true)]
pub struct Cli {
    /// Print version
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: livedoc.toml)
    #[arg(short = 'C', long, global = true, default_value = "livedoc.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the document over REST and WebSocket
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        doc: DocumentArgs,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// HTTP port for the REST API
        #[arg(short, long)]
        port: Option<u16>,

        /// WebSocket port for live sessions
        #[arg(short = 'w', long = "ws-port")]
        ws_port: Option<u16>,

        /// Watch the backing file for external edits
        #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,
    },

    /// Print the current document
    Show {
        #[command(flatten)]
        doc: DocumentArgs,

        /// Print on one line instead of pretty-printing
        #[arg(long)]
        compact: bool,
    },

    /// Create the backing file if it does not exist
    #[command(visible_alias = "i")]
    Init {
        #[command(flatten)]
        doc: DocumentArgs,
    },
}

/// Backing file override shared by all subcommands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DocumentArgs {
    /// Backing JSON file (relative to the current directory)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub document: Option<PathBuf>,
}

impl Cli {
    pub const fn document_args(&self) -> &DocumentArgs {
        match &self.command {
            Commands::Serve { doc, .. } | Commands::Show { doc, .. } | Commands::Init { doc } => doc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_flags() {
        let cli = Cli::try_parse_from([
            "livedoc", "serve", "-i", "0.0.0.0", "-p", "9000", "-w", "9001", "--watch", "false",
            "-d", "db.json",
        ])
        .unwrap();

        let Commands::Serve { doc, interface, port, ws_port, watch } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(interface, Some("0.0.0.0".parse().unwrap()));
        assert_eq!(port, Some(9000));
        assert_eq!(ws_port, Some(9001));
        assert_eq!(watch, Some(false));
        assert_eq!(doc.document, Some(PathBuf::from("db.json")));
    }

    #[test]
    fn test_watch_flag_without_value() {
        let cli = Cli::try_parse_from(["livedoc", "serve", "--watch"]).unwrap();
        let Commands::Serve { watch, .. } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(watch, Some(true));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["livedoc", "show", "--compact", "-V", "-C", "alt.toml"]).unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
        assert!(matches!(cli.command, Commands::Show { compact: true, .. }));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_document_args_accessor() {
        let cli = Cli::try_parse_from(["livedoc", "init", "-d", "x/y.json"]).unwrap();
        assert_eq!(cli.document_args().document, Some(PathBuf::from("x/y.json")));
    }
}
