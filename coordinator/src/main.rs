// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # cosign
//!
//! Entry point for the `cosign` binary. Parses CLI arguments, initializes
//! logging, and dispatches to the approval tooling in `cosign_coordinator`.
//!
//! The binary supports four subcommands:
//!
//! - `digest` — compute a transfer's canonical and signing-context digests
//! - `sign`   — sign an exported transfer record as approver B
//! - `verify` — check a signature record against its declared signer
//! - `demo`   — run the reference scenarios on an in-memory ledger
//!
//! Artifacts go to stdout as JSON; logs go to stderr.

mod cli;
mod demo;
mod logging;

use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;

use cosign_coordinator::artifacts::{from_json, to_json};
use cosign_coordinator::{check_signature, sign_transfer, SignatureRecord, TransferRecord};
use cosign_protocol::config::{PROTOCOL_FINGERPRINT, PROTOCOL_VERSION};
use cosign_protocol::crypto::hash::to_hex;
use cosign_protocol::crypto::keys::{Address, CosignKeypair};
use cosign_protocol::digest::{canonical_transfer_digest, signing_digest};

use cli::{Commands, CosignCli};
use logging::LogFormat;

fn main() -> Result<()> {
    let cli = CosignCli::parse();
    logging::init_logging(&cli.log_level, LogFormat::from_str_lossy(&cli.log_format));
    tracing::debug!(
        version = PROTOCOL_VERSION,
        fingerprint = PROTOCOL_FINGERPRINT,
        "cosign starting"
    );

    match cli.command {
        Commands::Digest(args) => print_digest(args),
        Commands::Sign(args) => sign_record(args),
        Commands::Verify(args) => verify_record(args),
        Commands::Demo => demo::run(),
    }
}

/// Prints both digests of a transfer, the one approver B's wallet displays
/// and the one it actually signs.
fn print_digest(args: cli::DigestArgs) -> Result<()> {
    let vault: Address = args
        .vault
        .parse()
        .with_context(|| format!("invalid vault address: {}", args.vault))?;
    let recipient: Address = args
        .recipient
        .parse()
        .with_context(|| format!("invalid recipient address: {}", args.recipient))?;

    let canonical = canonical_transfer_digest(&vault, args.id, &recipient, args.amount);
    let output = json!({
        "vault": vault,
        "id": args.id,
        "recipient": recipient,
        "amount": args.amount,
        "protocol": PROTOCOL_VERSION,
        "canonical_digest": to_hex(&canonical),
        "signing_digest": to_hex(&signing_digest(&canonical)),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Signs a transfer record and prints the resulting signature record.
fn sign_record(args: cli::SignArgs) -> Result<()> {
    let keypair = CosignKeypair::from_hex(args.key.trim()).context("invalid signer key")?;
    let transfer: TransferRecord =
        from_json(&read_artifact(&args.transfer)?).context("invalid transfer record")?;

    tracing::info!(
        vault = %transfer.vault,
        id = transfer.id,
        signer = %keypair.address(),
        "signing transfer record"
    );

    let record = sign_transfer(&keypair, &transfer)?;
    println!("{}", to_json(&record)?);
    Ok(())
}

/// Recovers the signer of a signature record and checks it against the
/// declared one. Exits non-zero on mismatch.
fn verify_record(args: cli::VerifyArgs) -> Result<()> {
    let record: SignatureRecord =
        from_json(&read_artifact(&args.signature)?).context("invalid signature record")?;
    check_signature(&record).with_context(|| format!("signature for transfer {}", record.id))?;

    let output = json!({
        "id": record.id,
        "signer": record.signer,
        "digest": to_hex(&record.digest),
        "valid": true,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Returns the artifact text, reading stdin when the argument is `-`.
fn read_artifact(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read artifact from stdin")?;
    Ok(buf)
}
