//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uuid::Uuid;

/// streams-cache - versioned asset-caching proxy
///
/// Installs worker versions, serves requests cache-first and manages
/// application files through control messages.
#[derive(Parser, Debug)]
#[command(name = "streams-cache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "STREAMS_CACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// State directory (registration, event log, disk caches)
    #[arg(long, global = true, env = "STREAMS_CACHE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install the configured worker version
    Install,

    /// Activate the waiting worker without waiting for clients to detach
    SkipWaiting,

    /// Post a control message to a worker
    Send(SendArgs),

    /// Fetch a URL through the active worker
    Fetch(FetchArgs),

    /// List cache namespaces
    Caches(CachesArgs),

    /// List the entries of a cache
    Entries(EntriesArgs),

    /// Manage attached clients
    Clients(ClientsArgs),

    /// Show registration, workers and clients
    Status,

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the send command
#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Message as JSON, e.g. '{"action":"cache-app","files":["/app.js"]}'
    pub message: String,

    /// Deliver to the waiting worker instead of the active one
    #[arg(long)]
    pub waiting: bool,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Absolute URL, or a path relative to network.origin
    pub url: String,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request headers (Name: value)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body
    #[arg(short, long)]
    pub data: Option<String>,

    /// Issue the request in no-cors mode (cross-origin responses become opaque)
    #[arg(long)]
    pub no_cors: bool,

    /// Write the body to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print status and headers before the body
    #[arg(short, long)]
    pub include: bool,
}

/// Arguments for the caches command
#[derive(Parser, Debug)]
pub struct CachesArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the entries command
#[derive(Parser, Debug)]
pub struct EntriesArgs {
    /// Cache name (defaults to the configured worker's cache)
    #[arg(long)]
    pub cache: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the clients command
#[derive(Parser, Debug)]
pub struct ClientsArgs {
    /// Subcommand for clients
    #[command(subcommand)]
    pub action: ClientsAction,
}

/// Client subcommands
#[derive(Subcommand, Debug)]
pub enum ClientsAction {
    /// List attached clients
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Attach a new client under the active worker and print its id
    Attach,

    /// Detach a client; a waiting worker activates when the last one leaves
    Detach {
        /// Client id
        id: Uuid,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., worker.version)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Parse a header in `Name: value` format
fn parse_header(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find(':')
        .ok_or_else(|| format!("invalid 'Name: value' format: no ':' found in '{s}'"))?;
    let name = s[..pos].trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{s}'"));
    }
    Ok((name.to_string(), s[pos + 1..].trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_header_valid() {
        let (k, v) = parse_header("Accept: text/html").unwrap();
        assert_eq!(k, "Accept");
        assert_eq!(v, "text/html");
    }

    #[test]
    fn parse_header_keeps_colons_in_value() {
        let (k, v) = parse_header("Referer: http://localhost:8080/").unwrap();
        assert_eq!(k, "Referer");
        assert_eq!(v, "http://localhost:8080/");
    }

    #[test]
    fn parse_header_invalid() {
        assert!(parse_header("Accept").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn cli_parses_fetch() {
        let cli = Cli::parse_from([
            "streams-cache",
            "fetch",
            "/index.html",
            "-X",
            "post",
            "-H",
            "Accept: */*",
            "--no-cors",
            "-i",
        ]);
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.url, "/index.html");
                assert_eq!(args.method, "post");
                assert_eq!(args.headers.len(), 1);
                assert!(args.no_cors);
                assert!(args.include);
                assert!(args.output.is_none());
            }
            _ => panic!("expected Fetch command"),
        }
    }

    #[test]
    fn cli_parses_send() {
        let cli = Cli::parse_from(["streams-cache", "send", r#"{"action":"skipWaiting"}"#, "--waiting"]);
        match cli.command {
            Commands::Send(args) => {
                assert!(args.waiting);
                assert_eq!(args.format, OutputFormat::Table);
            }
            _ => panic!("expected Send command"),
        }
    }

    #[test]
    fn cli_parses_clients_detach() {
        let id = Uuid::new_v4();
        let cli = Cli::parse_from(["streams-cache", "clients", "detach", &id.to_string()]);
        match cli.command {
            Commands::Clients(ClientsArgs {
                action: ClientsAction::Detach { id: parsed },
            }) => assert_eq!(parsed, id),
            _ => panic!("expected clients detach"),
        }
    }

    #[test]
    fn cli_rejects_bad_client_id() {
        assert!(Cli::try_parse_from(["streams-cache", "clients", "detach", "nope"]).is_err());
    }

    #[test]
    fn cli_parses_entries() {
        let cli = Cli::parse_from(["streams-cache", "entries", "--cache", "streams-cache-v13.1", "-f", "json"]);
        match cli.command {
            Commands::Entries(args) => {
                assert_eq!(args.cache.as_deref(), Some("streams-cache-v13.1"));
                assert_eq!(args.format, OutputFormat::Json);
            }
            _ => panic!("expected Entries command"),
        }
    }

    #[test]
    fn cli_global_flags() {
        let cli = Cli::parse_from(["streams-cache", "-vv", "--state-dir", "/tmp/sc", "status"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/sc")));
        assert!(matches!(cli.command, Commands::Status));
    }
}
