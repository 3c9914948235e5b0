use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// csr-approver: Policy-driven approval of certificate signing requests
#[derive(Parser)]
#[command(name = "csr-approver", version, about)]
pub struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List registered approvers and inspectors
    Plugins,

    /// Build an inspector policy and print it back, or report why it is invalid
    Check {
        /// Inspector policy, e.g. "group=system:nodes,usages"
        #[arg(long)]
        inspectors: Option<String>,
    },

    /// Decide on every pending request in a JSON or YAML file
    Run {
        /// File holding certificate signing requests (a list, or a
        /// `kubectl get csr -o json` dump)
        #[arg(long, env = "CSR_APPROVER_REQUESTS")]
        requests: PathBuf,

        /// Approver to consult when no inspector objects ("" for none)
        #[arg(long)]
        approver: Option<String>,

        /// Inspector policy (overrides CSR_APPROVER_INSPECTORS)
        #[arg(long)]
        inspectors: Option<String>,

        /// Update attempts per request before giving up
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Print Prometheus metrics after the run
        #[arg(long)]
        metrics: bool,
    },
}
