use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "textgate",
    about = "Textgate: fail-closed policy gate between a text generator and its consumer",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate one candidate output and print the decision
    ///
    /// Exits 0 for allow/warn/review and 2 for block.
    Evaluate {
        /// The prompt the generator was answering
        input: String,

        /// The candidate output to evaluate
        output: String,

        /// Path to a policy document (TOML or JSON); built-in defaults
        /// when omitted or malformed
        #[arg(long)]
        policy: Option<String>,

        /// Append the decision's record to this audit JSONL file
        #[arg(long)]
        audit: Option<String>,

        /// Caller context entry, `key=value` (repeatable)
        #[arg(long = "context")]
        context: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Policy document operations
    Policy {
        #[command(subcommand)]
        command: PolicyCommands,
    },

    /// Audit log operations
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },
}

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// Parse a policy document and print the effective configuration
    Check {
        /// Path to the policy document; omit for built-in defaults
        path: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Recompute every link of an audit JSONL file
    ///
    /// Exits 1 when the chain does not verify.
    Verify {
        /// Path to the audit JSONL file
        records: String,

        /// Link value the window verifies from
        #[arg(long, default_value = textgate_audit::GENESIS)]
        anchor: String,

        /// Externally known tail link to compare against
        #[arg(long)]
        expected: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Select records from an audit JSONL file
    Export {
        /// Path to the audit JSONL file
        records: String,

        /// Lowest sequence id to include
        #[arg(long)]
        from: Option<u64>,

        /// Highest sequence id to include
        #[arg(long)]
        to: Option<u64>,

        /// Only records with this action (allow, warn, review, block)
        #[arg(long)]
        action: Option<String>,

        /// Write the selection to this file instead of stdout
        #[arg(long)]
        out: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
