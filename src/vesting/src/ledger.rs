//! Interfaces to the ledger, the signing wallet and local preferences

use solana_program::{hash::Hash, instruction::Instruction, pubkey::Pubkey};
use solana_sdk::signature::Signature;

use crate::error::VestingError;

/// Read access to ledger state.
///
/// `Ok(None)` means the account does not exist; an `Err` means the lookup
/// itself failed and should be reported as [`VestingError::AccountLookupFailed`].
pub trait Ledger {
    /// Raw data of one account
    fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, VestingError>;

    /// Results are returned in the order of `addresses`
    fn get_multiple_account_data(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<Option<Vec<u8>>>, VestingError>;

    /// Decimals of an spl-token mint
    fn get_mint_decimals(&self, mint: &Pubkey) -> Result<u8, VestingError>;

    /// Token balance in base units, `None` if the token account does not exist
    fn get_token_account_amount(&self, account: &Pubkey) -> Result<Option<u64>, VestingError>;

    /// Blockhash to sign a new transaction against
    fn get_recent_blockhash(&self) -> Result<Hash, VestingError>;
}

/// A wallet able to approve and broadcast transactions
pub trait SigningAgent {
    /// Returns the wallet's public key
    fn connect(&mut self) -> Result<Pubkey, VestingError>;

    /// Forget the current session
    fn disconnect(&mut self);

    /// Sign a transaction paid by `payer` and broadcast it
    fn sign_and_submit(
        &self,
        payer: &Pubkey,
        instructions: &[Instruction],
        recent_blockhash: Hash,
    ) -> Result<Signature, VestingError>;
}

/// Small key/value store for settings that outlive a single run
pub trait PreferenceStore {
    /// Value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>, VestingError>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&mut self, key: &str, value: &str) -> Result<(), VestingError>;
}
