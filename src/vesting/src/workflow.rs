//! Lock, unlock and change-destination workflows
use solana_program::{instruction::Instruction, message::Message, msg, pubkey::Pubkey};
use solana_sdk::{
    packet::PACKET_DATA_SIZE,
    signature::{Signature, SIGNATURE_BYTES},
};
use spl_associated_token_account::create_associated_token_account;

use crate::{
    error::VestingError,
    instruction,
    ledger::{Ledger, PreferenceStore, SigningAgent},
    pda::{
        derive_contract_address, derive_token_account, derive_vesting_token_account,
        generate_seed,
    },
    state::{ContractInfo, Schedule},
};

/// Tokens to lock and who receives them as they vest
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LockRequest {
    /// Mint of the tokens to lock
    pub mint: Pubkey,
    /// Owner of the token account the tokens are taken from; also pays for the new accounts
    pub source_owner: Pubkey,
    /// Wallet whose associated token account receives the releases
    pub destination_owner: Pubkey,
    /// Releases in base units
    pub schedules: Vec<Schedule>,
}

/// Ready-to-submit lock instructions and the accounts they touch
#[derive(Clone, Debug, PartialEq)]
pub struct LockPlan {
    /// Needed for every later unlock or change of destination
    pub seed: String,
    /// Program-derived account holding the contract state
    pub vesting_account: Pubkey,
    /// Token account holding the locked balance
    pub vesting_token_account: Pubkey,
    /// Token account the tokens are taken from
    pub source_token_account: Pubkey,
    /// Token account receiving the releases
    pub destination_token_account: Pubkey,
    /// Fits in a single transaction paid by the source owner
    pub instructions: Vec<Instruction>,
}

/// Ready-to-submit unlock instruction
#[derive(Clone, Debug, PartialEq)]
pub struct UnlockPlan {
    /// Program-derived account holding the contract state
    pub vesting_account: Pubkey,
    /// Token account holding the locked balance
    pub vesting_token_account: Pubkey,
    /// Contract state read just before the instruction was built
    pub contract: ContractInfo,
    /// The single Unlock instruction
    pub instructions: Vec<Instruction>,
}

/// Ready-to-submit change-destination instruction
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeDestinationPlan {
    /// Program-derived account holding the contract state
    pub vesting_account: Pubkey,
    /// Destination being replaced
    pub current_destination_token_account: Pubkey,
    /// Destination receiving future releases
    pub new_destination_token_account: Pubkey,
    /// Contract state read just before the instruction was built
    pub contract: ContractInfo,
    /// The single ChangeDestination instruction
    pub instructions: Vec<Instruction>,
}

/// Where unlocked tokens should go after a change of destination
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NewDestination {
    /// The associated token account of this wallet for the contract's mint
    Owner(Pubkey),
    /// An explicit token account
    TokenAccount(Pubkey),
}

impl NewDestination {
    /// An explicit token account wins over an owner when both are given
    pub fn from_options(
        owner: Option<Pubkey>,
        token_account: Option<Pubkey>,
    ) -> Result<Self, VestingError> {
        match (token_account, owner) {
            (Some(token_account), _) => Ok(NewDestination::TokenAccount(token_account)),
            (None, Some(owner)) => Ok(NewDestination::Owner(owner)),
            (None, None) => Err(VestingError::InvalidArguments(
                "a new destination owner or token account is required".to_string(),
            )),
        }
    }
}

/// Builds vesting program transactions against a ledger.
///
/// State is read fresh on every call; nothing is cached between workflows.
pub struct VestingClient<'a, L: Ledger> {
    ledger: &'a L,
    program_id: Pubkey,
    fee_wallet: Pubkey,
}

impl<'a, L: Ledger> VestingClient<'a, L> {
    /// A client for the deployed vesting program
    pub fn new(ledger: &'a L) -> Self {
        Self::with_program(ledger, crate::id(), crate::fee_wallet::id())
    }

    /// A client for another deployment of the vesting program
    pub fn with_program(ledger: &'a L, program_id: Pubkey, fee_wallet: Pubkey) -> Self {
        VestingClient {
            ledger,
            program_id,
            fee_wallet,
        }
    }

    /// Program the instructions are addressed to
    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// One schedule per release time, each worth `amount_per_schedule` whole tokens
    pub fn schedules_from_ui_amount(
        &self,
        mint: &Pubkey,
        release_times: &[u64],
        amount_per_schedule: f64,
    ) -> Result<Vec<Schedule>, VestingError> {
        if release_times.is_empty() {
            return Err(VestingError::InvalidArguments(
                "at least one release time is required".to_string(),
            ));
        }
        if !amount_per_schedule.is_finite() || amount_per_schedule <= 0.0 {
            return Err(VestingError::InvalidArguments(format!(
                "invalid token amount {}, it should be greater than 0",
                amount_per_schedule
            )));
        }

        let decimals = self.ledger.get_mint_decimals(mint)?;
        let amount = spl_token::ui_amount_to_amount(amount_per_schedule, decimals);
        if amount == 0 {
            return Err(VestingError::InvalidArguments(format!(
                "{} is below the smallest unit of a {}-decimal mint",
                amount_per_schedule, decimals
            )));
        }

        Ok(release_times
            .iter()
            .map(|&release_time| Schedule {
                release_time,
                amount,
            })
            .collect())
    }

    /// Lock tokens under a freshly generated seed
    pub fn lock(&self, request: &LockRequest) -> Result<LockPlan, VestingError> {
        self.lock_with_seed(request, generate_seed())
    }

    /// Lock tokens under `seed`, which must not already name a contract
    pub fn lock_with_seed(
        &self,
        request: &LockRequest,
        seed: String,
    ) -> Result<LockPlan, VestingError> {
        msg!("Vesting::Lock");

        let LockRequest {
            mint,
            source_owner,
            destination_owner,
            schedules,
        } = request;

        if schedules.is_empty() {
            return Err(VestingError::InvalidArguments(
                "at least one schedule is required".to_string(),
            ));
        }
        let required = schedules.iter().try_fold(0u64, |total, schedule| {
            total.checked_add(schedule.amount).ok_or_else(|| {
                VestingError::InvalidArguments("schedule amounts overflow u64".to_string())
            })
        })?;

        let source_token_account = derive_token_account(mint, source_owner);
        let destination_token_account = derive_token_account(mint, destination_owner);

        let available = self
            .ledger
            .get_token_account_amount(&source_token_account)?
            .ok_or(VestingError::TokenAccountNotFound(source_token_account))?;
        if available < required {
            return Err(VestingError::InsufficientBalance {
                required,
                available,
            });
        }

        let (vesting_account, seeds) = derive_contract_address(seed.as_bytes(), &self.program_id)?;
        let vesting_token_account = derive_vesting_token_account(mint, &vesting_account);

        let existing = self
            .ledger
            .get_multiple_account_data(&[destination_token_account, vesting_account])?;
        let (destination_exists, vesting_exists) = match existing.as_slice() {
            [destination, vesting] => (destination.is_some(), vesting.is_some()),
            _ => {
                return Err(VestingError::AccountLookupFailed(format!(
                    "expected 2 accounts, got {}",
                    existing.len()
                )))
            }
        };
        if vesting_exists {
            return Err(VestingError::ContractAlreadyExists(vesting_account));
        }

        let mut instructions = Vec::with_capacity(4);
        if !destination_exists {
            msg!(
                "Creating destination token account {}",
                destination_token_account
            );
            instructions.push(create_associated_token_account(
                source_owner,
                destination_owner,
                mint,
            ));
        }
        instructions.push(instruction::init(
            &self.program_id,
            source_owner,
            &vesting_account,
            &seeds,
            schedules.len(),
        )?);
        instructions.push(create_associated_token_account(
            source_owner,
            &vesting_account,
            mint,
        ));
        instructions.push(instruction::create(
            &self.program_id,
            &vesting_account,
            &vesting_token_account,
            source_owner,
            &source_token_account,
            &destination_token_account,
            mint,
            schedules,
            &seeds,
            &self.fee_wallet,
        )?);
        check_transaction_len(&instructions, source_owner)?;

        msg!(
            "Locking {} tokens of mint {} in vesting account {} over {} schedules",
            required,
            mint,
            vesting_account,
            schedules.len()
        );

        Ok(LockPlan {
            seed,
            vesting_account,
            vesting_token_account,
            source_token_account,
            destination_token_account,
            instructions,
        })
    }

    /// Release every schedule that has come due to the contract's destination
    pub fn unlock(&self, seed: &[u8], mint: &Pubkey) -> Result<UnlockPlan, VestingError> {
        msg!("Vesting::Unlock");

        let (vesting_account, seeds) = derive_contract_address(seed, &self.program_id)?;
        let vesting_token_account = derive_vesting_token_account(mint, &vesting_account);

        let contract = self.contract_info(&vesting_account)?;
        if contract.mint_address != *mint {
            return Err(VestingError::MintMismatch {
                expected: *mint,
                found: contract.mint_address,
            });
        }

        let instructions = vec![instruction::unlock(
            &self.program_id,
            &vesting_account,
            &vesting_token_account,
            &contract.destination_address,
            &seeds,
        )?];

        msg!(
            "Unlocking vesting account {} to {}",
            vesting_account,
            contract.destination_address
        );

        Ok(UnlockPlan {
            vesting_account,
            vesting_token_account,
            contract,
            instructions,
        })
    }

    /// Reassign a contract's destination; `current_owner` must sign.
    ///
    /// `current_destination_account` defaults to the destination recorded on
    /// the contract and must match it when given.
    pub fn change_destination(
        &self,
        seed: &[u8],
        current_owner: &Pubkey,
        current_destination_account: Option<&Pubkey>,
        new_destination: NewDestination,
    ) -> Result<ChangeDestinationPlan, VestingError> {
        msg!("Vesting::ChangeDestination");

        let (vesting_account, seeds) = derive_contract_address(seed, &self.program_id)?;
        let contract = self.contract_info(&vesting_account)?;

        let current_destination_token_account = match current_destination_account {
            Some(account) if *account != contract.destination_address => {
                return Err(VestingError::DestinationMismatch {
                    expected: *account,
                    found: contract.destination_address,
                })
            }
            _ => contract.destination_address,
        };

        let new_destination_token_account = match new_destination {
            NewDestination::Owner(owner) => derive_token_account(&contract.mint_address, &owner),
            NewDestination::TokenAccount(account) => account,
        };

        let instructions = vec![instruction::change_destination(
            &self.program_id,
            &vesting_account,
            current_owner,
            &current_destination_token_account,
            &new_destination_token_account,
            &seeds,
        )?];

        msg!(
            "Changing destination of vesting account {} from {} to {}",
            vesting_account,
            current_destination_token_account,
            new_destination_token_account
        );

        Ok(ChangeDestinationPlan {
            vesting_account,
            current_destination_token_account,
            new_destination_token_account,
            contract,
            instructions,
        })
    }

    /// Read and decode one vesting account
    pub fn contract_info(&self, vesting_account: &Pubkey) -> Result<ContractInfo, VestingError> {
        msg!("Fetching contract {}", vesting_account);

        let data = self
            .ledger
            .get_account_data(vesting_account)?
            .ok_or(VestingError::ContractNotFound(*vesting_account))?;

        ContractInfo::decode(&data)
    }

    /// Read several vesting accounts, oldest first.
    ///
    /// Absent, uninitialized and malformed accounts are left out.
    pub fn fetch_contracts(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<(Pubkey, ContractInfo)>, VestingError> {
        let accounts = self.ledger.get_multiple_account_data(addresses)?;

        let mut contracts: Vec<(Pubkey, ContractInfo)> = addresses
            .iter()
            .zip(accounts)
            .filter_map(|(address, data)| {
                data.and_then(|data| ContractInfo::unpack(&data))
                    .map(|contract| (*address, contract))
            })
            .collect();
        contracts.sort_by_key(|(_, contract)| contract.creation_time);

        Ok(contracts)
    }

    /// Hand `instructions` to the wallet with a fresh blockhash
    pub fn submit<S: SigningAgent>(
        &self,
        signer: &S,
        payer: &Pubkey,
        instructions: &[Instruction],
    ) -> Result<Signature, VestingError> {
        let recent_blockhash = self.ledger.get_recent_blockhash()?;
        let signature = signer.sign_and_submit(payer, instructions, recent_blockhash)?;

        msg!("Transaction {} submitted", signature);
        Ok(signature)
    }
}

/// Serialized size of a transaction carrying `instructions`, signatures included
fn transaction_len(instructions: &[Instruction], payer: &Pubkey) -> usize {
    let message = Message::new(instructions, Some(payer));
    let signatures = usize::from(message.header.num_required_signatures);

    // signature count is a compact-u16: 7 bits per byte
    let mut count_len = 1;
    let mut remaining = signatures >> 7;
    while remaining > 0 {
        count_len += 1;
        remaining >>= 7;
    }

    count_len + signatures * SIGNATURE_BYTES + message.serialize().len()
}

fn check_transaction_len(
    instructions: &[Instruction],
    payer: &Pubkey,
) -> Result<(), VestingError> {
    let len = transaction_len(instructions, payer);
    if len > PACKET_DATA_SIZE {
        return Err(VestingError::InstructionTooLarge {
            len,
            max: PACKET_DATA_SIZE,
        });
    }
    Ok(())
}

fn seed_key(vesting_account: &Pubkey) -> String {
    format!("seed.{}", vesting_account)
}

/// Keep a lock's seed so the contract can be unlocked later
pub fn remember_seed<P: PreferenceStore>(
    store: &mut P,
    plan: &LockPlan,
) -> Result<(), VestingError> {
    store.set(&seed_key(&plan.vesting_account), &plan.seed)
}

/// The seed remembered for `vesting_account`, if any
pub fn recall_seed<P: PreferenceStore>(
    store: &P,
    vesting_account: &Pubkey,
) -> Result<Option<String>, VestingError> {
    store.get(&seed_key(vesting_account))
}
