use solana_account_decoder::{UiAccountEncoding, UiDataSliceConfig};
use solana_client::{
    client_error::ClientError,
    rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
};
use solana_program::{
    hash::Hash, instruction::Instruction, program_pack::Pack, pubkey::Pubkey,
};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};
use spl_token::state::{Account as TokenAccount, Mint};
use std::{error::Error, fs, path::Path};
use token_vesting::{
    error::VestingError,
    ledger::{Ledger, SigningAgent},
};

/// Upper bound the RPC node accepts for `getMultipleAccounts`
const MAX_MULTIPLE_ACCOUNTS: usize = 100;

fn lookup_failed(err: ClientError) -> VestingError {
    VestingError::AccountLookupFailed(err.to_string())
}

/// Ledger reads over JSON RPC
pub struct RpcLedger {
    rpc_client: RpcClient,
}

impl RpcLedger {
    pub fn new(url: &str) -> Self {
        RpcLedger {
            rpc_client: RpcClient::new_with_commitment(
                url.to_string(),
                CommitmentConfig::confirmed(),
            ),
        }
    }

    pub fn rpc_client(&self) -> &RpcClient {
        &self.rpc_client
    }

    /// Every account owned by `program_id`, without downloading account data
    pub fn program_accounts(&self, program_id: &Pubkey) -> Result<Vec<Pubkey>, VestingError> {
        Ok(self
            .rpc_client
            .get_program_accounts_with_config(
                program_id,
                addresses_only_config(self.rpc_client.commitment()),
            )
            .map_err(lookup_failed)?
            .into_iter()
            .map(|(address, _)| address)
            .collect())
    }
}

fn addresses_only_config(commitment: CommitmentConfig) -> RpcProgramAccountsConfig {
    RpcProgramAccountsConfig {
        account_config: RpcAccountInfoConfig {
            encoding: Some(UiAccountEncoding::Base64),
            data_slice: Some(UiDataSliceConfig {
                offset: 0,
                length: 0,
            }),
            commitment: Some(commitment),
            ..RpcAccountInfoConfig::default()
        },
        ..RpcProgramAccountsConfig::default()
    }
}

impl Ledger for RpcLedger {
    fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, VestingError> {
        Ok(self
            .rpc_client
            .get_account_with_commitment(address, self.rpc_client.commitment())
            .map_err(lookup_failed)?
            .value
            .map(|account| account.data))
    }

    fn get_multiple_account_data(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<Option<Vec<u8>>>, VestingError> {
        let mut accounts = Vec::with_capacity(addresses.len());
        for chunk in addresses.chunks(MAX_MULTIPLE_ACCOUNTS) {
            accounts.extend(
                self.rpc_client
                    .get_multiple_accounts(chunk)
                    .map_err(lookup_failed)?
                    .into_iter()
                    .map(|account| account.map(|account| account.data)),
            );
        }
        Ok(accounts)
    }

    fn get_mint_decimals(&self, mint: &Pubkey) -> Result<u8, VestingError> {
        let data = self
            .get_account_data(mint)?
            .ok_or_else(|| VestingError::AccountLookupFailed(format!("Mint {} not found", mint)))?;
        let mint_state = Mint::unpack(&data)
            .map_err(|_| VestingError::AccountLookupFailed(format!("{} is not a mint", mint)))?;
        Ok(mint_state.decimals)
    }

    fn get_token_account_amount(&self, account: &Pubkey) -> Result<Option<u64>, VestingError> {
        match self.get_account_data(account)? {
            Some(data) => {
                let token_account = TokenAccount::unpack(&data).map_err(|_| {
                    VestingError::AccountLookupFailed(format!("{} is not a token account", account))
                })?;
                Ok(Some(token_account.amount))
            }
            None => Ok(None),
        }
    }

    fn get_recent_blockhash(&self) -> Result<Hash, VestingError> {
        self.rpc_client.get_latest_blockhash().map_err(lookup_failed)
    }
}

/// A local keypair acting as the wallet
pub struct KeypairSigner<'a> {
    rpc_client: &'a RpcClient,
    keypair: Keypair,
    connected: bool,
}

impl<'a> KeypairSigner<'a> {
    pub fn new(rpc_client: &'a RpcClient, keypair: Keypair) -> Self {
        KeypairSigner {
            rpc_client,
            keypair,
            connected: false,
        }
    }
}

impl SigningAgent for KeypairSigner<'_> {
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
                "wallet is not connected".to_string(),
            ));
        }

        let mut transaction = Transaction::new_with_payer(instructions, Some(payer));
        transaction
            .try_sign(&[&self.keypair], recent_blockhash)
            .map_err(|err| VestingError::SubmissionFailed(err.to_string()))?;

        self.rpc_client
            .send_and_confirm_transaction(&transaction)
            .map_err(|err| VestingError::SubmissionFailed(err.to_string()))
    }
}

/// Load a keypair stored as a JSON array of bytes
pub fn load_keypair(path: &Path) -> Result<Keypair, Box<dyn Error>> {
    let keypair_secret_json = fs::read_to_string(path)
        .map_err(|err| format!("Unable to read keypair {}: {}", path.display(), err))?;
    let keypair_secret: Vec<u8> = serde_json::from_str(&keypair_secret_json)?;
    Ok(Keypair::from_bytes(&keypair_secret)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn loads_json_keypair() {
        let keypair = Keypair::new();
        let path = env::temp_dir().join(format!("vesting-key-{}.json", keypair.pubkey()));
        fs::write(&path, serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap()).unwrap();

        let loaded = load_keypair(&path).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn program_accounts_skip_account_data() {
        let config = addresses_only_config(CommitmentConfig::confirmed());
        let account_config = config.account_config;
        assert_eq!(account_config.encoding, Some(UiAccountEncoding::Base64));
        assert_eq!(
            account_config.data_slice,
            Some(UiDataSliceConfig {
                offset: 0,
                length: 0,
            })
        );
        assert_eq!(
            account_config.commitment,
            Some(CommitmentConfig::confirmed())
        );
        assert!(config.filters.is_none());
    }

    #[test]
    fn rejects_missing_keypair() {
        assert!(load_keypair(Path::new("/nonexistent/vesting-key.json")).is_err());
    }
}
