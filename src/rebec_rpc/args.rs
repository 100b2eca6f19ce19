use clap::{Parser, Subcommand};
use rebec_rpc::Protocol;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rebec-rpc", version)]
#[command(about = "Call gRPC+JSON and Connect+JSON services from the command line", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Server base URL, e.g. http://localhost:8080
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Wire protocol
    #[arg(long, value_enum, global = true)]
    pub protocol: Option<Protocol>,

    /// Fully-qualified service name
    #[arg(long, global = true)]
    pub service: Option<String>,

    /// JSON schema document with additional descriptors
    #[arg(long, global = true)]
    pub schema: Option<PathBuf>,

    /// Call deadline in milliseconds (0 disables)
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Extra header, as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", global = true)]
    pub headers: Vec<String>,

    /// Use the global config instead of the project one
    #[arg(short, long, global = true)]
    pub global: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print JSON on one line
    #[arg(long, global = true)]
    pub compact: bool,
}

#[derive(clap::Args, Debug)]
pub struct DataArgs {
    /// Request document as inline JSON
    #[arg(short, long, conflicts_with = "data_file")]
    pub data: Option<String>,

    /// Read the document from a file ("-" for stdin)
    #[arg(long)]
    pub data_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Call a method (Method, Service/Method or pkg.Service/Method)
    #[command(alias = "c")]
    Call {
        method: String,

        #[command(flatten)]
        data: DataArgs,
    },

    /// Validate a document against a method's descriptors without calling it
    Check {
        method: String,

        #[command(flatten)]
        data: DataArgs,

        /// Treat the document as a response instead of a request
        #[arg(long)]
        response: bool,
    },

    /// List services and methods
    #[command(alias = "ls")]
    Methods,

    /// Show the fields of a message type
    Describe {
        /// Full or short message name
        type_name: String,
    },

    /// Get or set configuration
    Config {
        /// Setting to read or change (base_url, protocol, schema, ...)
        key: Option<String>,

        /// New value; an empty string clears base_url, schema or headers
        value: Option<String>,

        /// Put the setting back to its default
        #[arg(long, requires = "key", conflicts_with = "value")]
        unset: bool,
    },

    /// Write a default config file
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_call_with_globals_after_subcommand() {
        let cli = Cli::parse_from([
            "rebec-rpc",
            "call",
            "Run",
            "--data",
            "{}",
            "--protocol",
            "connect",
            "-H",
            "x-a: 1",
            "-H",
            "x-b: 2",
        ]);
        assert_eq!(cli.protocol, Some(Protocol::Connect));
        assert_eq!(cli.headers.len(), 2);
        match cli.command {
            Commands::Call { method, data } => {
                assert_eq!(method, "Run");
                assert_eq!(data.data.as_deref(), Some("{}"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn data_and_data_file_conflict() {
        let res = Cli::try_parse_from([
            "rebec-rpc",
            "check",
            "Run",
            "--data",
            "{}",
            "--data-file",
            "x.json",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn unset_needs_a_key_and_no_value() {
        let cli = Cli::parse_from(["rebec-rpc", "config", "protocol", "--unset"]);
        assert!(matches!(cli.command, Commands::Config { unset: true, .. }));
        assert!(Cli::try_parse_from(["rebec-rpc", "config", "--unset"]).is_err());
        assert!(Cli::try_parse_from(["rebec-rpc", "config", "protocol", "grpc", "--unset"]).is_err());
    }
}
