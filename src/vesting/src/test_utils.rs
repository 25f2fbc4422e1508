use std::{cell::RefCell, collections::HashMap};

use solana_program::{hash::Hash, instruction::Instruction, pubkey::Pubkey};
use solana_sdk::{
    signature::{Keypair, Signature},
    signer::Signer,
};

use crate::{
    error::VestingError,
    ledger::{Ledger, PreferenceStore, SigningAgent},
    state::ContractInfo,
};

/// Size of an spl-token account, used as placeholder data
const TOKEN_ACCOUNT_LEN: usize = 165;

#[derive(Default)]
pub struct MockLedger {
    accounts: HashMap<Pubkey, Vec<u8>>,
    token_amounts: HashMap<Pubkey, u64>,
    decimals: HashMap<Pubkey, u8>,
    offline: bool,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mint(mut self, mint: Pubkey, decimals: u8) -> Self {
        self.decimals.insert(mint, decimals);
        self
    }

    pub fn with_token_account(mut self, address: Pubkey, amount: u64) -> Self {
        self.accounts.insert(address, vec![0; TOKEN_ACCOUNT_LEN]);
        self.token_amounts.insert(address, amount);
        self
    }

    pub fn with_account(mut self, address: Pubkey, data: Vec<u8>) -> Self {
        self.accounts.insert(address, data);
        self
    }

    pub fn with_contract(self, address: Pubkey, contract: &ContractInfo) -> Self {
        self.with_account(address, contract.pack())
    }

    /// Every lookup fails as if the RPC node were unreachable
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    fn check_online(&self) -> Result<(), VestingError> {
        if self.offline {
            Err(VestingError::AccountLookupFailed(
                "connection refused".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl Ledger for MockLedger {
    fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, VestingError> {
        self.check_online()?;
        Ok(self.accounts.get(address).cloned())
    }

    fn get_multiple_account_data(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<Option<Vec<u8>>>, VestingError> {
        self.check_online()?;
        Ok(addresses
            .iter()
            .map(|address| self.accounts.get(address).cloned())
            .collect())
    }

    fn get_mint_decimals(&self, mint: &Pubkey) -> Result<u8, VestingError> {
        self.check_online()?;
        self.decimals
            .get(mint)
            .copied()
            .ok_or_else(|| VestingError::AccountLookupFailed(format!("mint {} not found", mint)))
    }

    fn get_token_account_amount(&self, account: &Pubkey) -> Result<Option<u64>, VestingError> {
        self.check_online()?;
        Ok(self.token_amounts.get(account).copied())
    }

    fn get_recent_blockhash(&self) -> Result<Hash, VestingError> {
        self.check_online()?;
        Ok(Hash::new_unique())
    }
}

pub struct MockSigner {
    keypair: Keypair,
    connected: bool,
    pub submitted: RefCell<Vec<(Pubkey, Vec<Instruction>, Hash)>>,
}

impl MockSigner {
    pub fn new() -> Self {
        MockSigner {
            keypair: Keypair::new(),
            connected: false,
            submitted: RefCell::new(vec![]),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

impl SigningAgent for MockSigner {
    fn connect(&mut self) -> Result<Pubkey, VestingError> {
        self.connected = true;
        Ok(self.keypair.pubkey())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn sign_and_submit(
        &self,
        payer: &Pubkey,
        instructions: &[Instruction],
        recent_blockhash: Hash,
    ) -> Result<Signature, VestingError> {
        if !self.connected {
            return Err(VestingError::SubmissionFailed(
                "wallet not connected".to_string(),
            ));
        }
        self.submitted
            .borrow_mut()
            .push((*payer, instructions.to_vec(), recent_blockhash));
        Ok(Signature::new_unique())
    }
}

#[derive(Default)]
pub struct MemoryStore(HashMap<String, String>);

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, VestingError> {
        Ok(self.0.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), VestingError> {
        self.0.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
