//! # CLI Interface
//!
//! Defines the command-line argument structure for `cosign` using `clap`
//! derive. Supports four subcommands: `digest`, `sign`, `verify`, and
//! `demo`.
//!
//! Artifacts are passed inline as JSON. A value of `-` reads the artifact
//! from stdin instead, so the commands compose in a pipe:
//!
//! ```text
//! cosign sign --transfer - < transfer.json | cosign verify --signature -
//! ```

use clap::{Args, Parser, Subcommand};

/// Off-ledger companion for the two-approver cosign vault.
///
/// Computes transfer digests, signs them as approver B, and checks signature
/// artifacts before they are submitted to the vault.
#[derive(Parser, Debug)]
#[command(
    name = "cosign",
    about = "Off-ledger tooling for the two-approver cosign vault",
    version,
    propagate_version = true
)]
pub struct CosignCli {
    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, global = true, env = "COSIGN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format: `pretty` or `json`. Logs go to stderr.
    #[arg(long, global = true, env = "COSIGN_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `cosign` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the canonical and signing-context digests of a transfer.
    Digest(DigestArgs),
    /// Sign an exported transfer record as approver B.
    Sign(SignArgs),
    /// Check that a signature record was produced by the signer it names.
    Verify(VerifyArgs),
    /// Run the reference scenarios on an in-memory ledger.
    Demo,
}

/// Arguments for the `digest` subcommand.
#[derive(Args, Debug)]
pub struct DigestArgs {
    /// Address of the vault holding the funds.
    #[arg(long)]
    pub vault: String,

    /// Transfer id within the vault.
    #[arg(long)]
    pub id: u64,

    /// Address of the recipient.
    #[arg(long)]
    pub recipient: String,

    /// Amount in the ledger's native unit.
    #[arg(long)]
    pub amount: u64,
}

/// Arguments for the `sign` subcommand.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Hex-encoded secp256k1 secret key of the signer.
    ///
    /// **Prefer the environment variable**: flags end up in shell history.
    #[arg(long, env = "COSIGN_SIGNER_KEY", hide_env_values = true)]
    pub key: String,

    /// Transfer record JSON, or `-` for stdin.
    #[arg(long)]
    pub transfer: String,
}

/// Arguments for the `verify` subcommand.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Signature record JSON, or `-` for stdin.
    #[arg(long)]
    pub signature: String,
}
