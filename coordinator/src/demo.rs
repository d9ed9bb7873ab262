//! # Reference Scenarios
//!
//! `cosign demo` walks the full approval flow on an in-memory ledger, with
//! artifacts serialized to JSON and parsed back at every hand-off so the
//! run exercises exactly what two separate operators would exchange.
//!
//! | Scenario | Setup                | What it shows                               |
//! |----------|----------------------|---------------------------------------------|
//! | A        | balance 10           | one transfer of 5 initiated and completed   |
//! | B        | balance 5 (after A)  | an over-budget initiate burns no id         |
//! | C        | balance 10           | two transfers completed in reverse order    |

use anyhow::{ensure, Context, Result};
use tracing::{info, warn};

use cosign_contracts::{VaultError, VaultHandle};
use cosign_coordinator::artifacts::{from_json, to_json};
use cosign_coordinator::{
    assemble, check_signature, sign_transfer, ApprovalCoordinator, SignatureRecord, TransferRecord,
};
use cosign_protocol::crypto::keys::{Address, CosignKeypair};
use cosign_protocol::digest::TransferId;
use cosign_protocol::ledger::Ledger;

struct Demo {
    ledger: Ledger,
    deployer: Address,
    approver_a: CosignKeypair,
    approver_b: CosignKeypair,
}

impl Demo {
    fn new() -> Self {
        Self {
            ledger: Ledger::new(),
            deployer: CosignKeypair::generate().address(),
            approver_a: CosignKeypair::generate(),
            approver_b: CosignKeypair::generate(),
        }
    }

    fn vault_with_balance(&mut self, balance: u64) -> Result<VaultHandle> {
        let vault = VaultHandle::deploy(
            &mut self.ledger,
            &self.deployer,
            self.approver_a.address(),
            self.approver_b.address(),
        )?;
        self.ledger.credit_genesis(&self.deployer, balance)?;
        vault.deposit(&mut self.ledger, &self.deployer, balance)?;
        Ok(vault)
    }

    fn initiate(
        &mut self,
        vault: &VaultHandle,
        recipient: &Address,
        amount: u64,
    ) -> Result<TransferId, VaultError> {
        vault.initiate(&mut self.ledger, &self.approver_a.address(), recipient, amount)
    }

    /// Export, sign off-line, check, assemble, submit.
    fn approve_and_complete(&mut self, vault: &VaultHandle, id: TransferId) -> Result<()> {
        let transfer_json = {
            let coordinator = ApprovalCoordinator::new(vault.view(&self.ledger));
            to_json(&coordinator.transfer_record(id)?)?
        };

        // Approver B's side: only the JSON crosses over.
        let transfer: TransferRecord = from_json(&transfer_json)?;
        let signature_json = to_json(&sign_transfer(&self.approver_b, &transfer)?)?;

        // Back with approver A.
        let signature: SignatureRecord = from_json(&signature_json)?;
        check_signature(&signature)?;
        let approval = assemble(&transfer, &signature)?;
        vault
            .complete(
                &mut self.ledger,
                &self.approver_a.address(),
                approval.id,
                approval.signature.as_bytes(),
            )
            .with_context(|| format!("completing transfer {id}"))?;
        Ok(())
    }
}

/// Run every scenario, printing a summary to stdout.
pub fn run() -> Result<()> {
    let mut demo = Demo::new();
    info!(
        approver_a = %demo.approver_a.address(),
        approver_b = %demo.approver_b.address(),
        "starting reference scenarios"
    );

    let vault = scenario_a(&mut demo).context("scenario A")?;
    scenario_b(&mut demo, &vault).context("scenario B")?;
    scenario_c(&mut demo).context("scenario C")?;

    println!("All scenarios passed.");
    Ok(())
}

fn scenario_a(demo: &mut Demo) -> Result<VaultHandle> {
    let vault = demo.vault_with_balance(10)?;
    let recipient = Address::new([0x0A; 20]);

    let id = demo.initiate(&vault, &recipient, 5)?;
    ensure!(id == 0, "first transfer got id {id}");
    demo.approve_and_complete(&vault, id)?;

    let record = vault
        .transfer_details(&demo.ledger, id)?
        .context("transfer 0 vanished")?;
    ensure!(record.completed, "transfer 0 not marked completed");
    ensure!(demo.ledger.balance_of(&recipient) == 5, "recipient not paid");
    ensure!(vault.balance(&demo.ledger) == 5, "vault balance is not 5");

    info!(vault = %vault.address(), "scenario A complete");
    println!("Scenario A: transfer 0 paid 5, vault balance {}", vault.balance(&demo.ledger));
    Ok(vault)
}

fn scenario_b(demo: &mut Demo, vault: &VaultHandle) -> Result<()> {
    let recipient = Address::new([0x0B; 20]);

    match demo.initiate(vault, &recipient, 6) {
        Err(VaultError::InsufficientBalance { required, available }) => {
            warn!(required, available, "over-budget initiate rejected as expected");
        }
        other => anyhow::bail!("expected an insufficient balance rejection, got {other:?}"),
    }
    let next = vault.next_transfer_id(&demo.ledger)?;
    ensure!(next == 1, "failed initiate moved the counter to {next}");

    info!(vault = %vault.address(), next_id = next, "scenario B complete");
    println!("Scenario B: initiate(6) rejected, next transfer id still {next}");
    Ok(())
}

fn scenario_c(demo: &mut Demo) -> Result<()> {
    let vault = demo.vault_with_balance(10)?;
    let first = demo.initiate(&vault, &Address::new([0x0C; 20]), 5)?;
    let second = demo.initiate(&vault, &Address::new([0x0D; 20]), 3)?;
    ensure!((first, second) == (0, 1), "ids were {first} and {second}");

    demo.approve_and_complete(&vault, second)?;
    demo.approve_and_complete(&vault, first)?;

    let balance = vault.balance(&demo.ledger);
    ensure!(balance == 2, "vault balance is {balance}, expected 2");

    info!(vault = %vault.address(), balance, "scenario C complete");
    println!("Scenario C: transfers 1 then 0 completed, vault balance {balance}");
    Ok(())
}
