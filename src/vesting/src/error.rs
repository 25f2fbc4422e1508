//! Error types

use solana_program::{program_error::ProgramError, pubkey::Pubkey};
use thiserror::Error;

/// Errors raised while encoding, decoding or orchestrating vesting instructions
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum VestingError {
    /// A buffer was shorter than its layout requires or had trailing bytes
    #[error("Malformed buffer: the data does not match the vesting program layout")]
    MalformedBuffer,
    /// A transaction or its instruction data would not fit in a single ledger packet
    #[error("Instruction too large: {len} bytes, at most {max} allowed")]
    InstructionTooLarge {
        /// Serialized size
        len: usize,
        /// Packet limit
        max: usize,
    },
    /// Seeds are either too long for the ledger's seed cap or too short for
    /// the fixed-width seed the vesting program reads
    #[error("Invalid seed length: {0} bytes")]
    InvalidSeedLength(usize),
    /// No bump seed produced an address off the curve
    #[error("Unable to find a viable program address bump seed")]
    AddressDerivationExhausted,
    /// The source token account holds less than the schedules lock up
    #[error("Insufficient balance: {required} required, {available} available")]
    InsufficientBalance {
        /// Sum of every schedule amount
        required: u64,
        /// Current source balance
        available: u64,
    },
    /// A token account the workflow reads from is absent
    #[error("Token account {0} does not exist")]
    TokenAccountNotFound(Pubkey),
    /// The seed derives to an account that already exists
    #[error("Contract already exists at {0}")]
    ContractAlreadyExists(Pubkey),
    /// No account at the derived vesting address
    #[error("Vesting contract account {0} is unavailable")]
    ContractNotFound(Pubkey),
    /// The vesting account exists but its header is not initialized
    #[error("Vesting contract account is not initialized")]
    ContractNotInitialized,
    /// The contract locks a different mint than the one given
    #[error("Contract vests mint {found}, not {expected}")]
    MintMismatch {
        /// Mint named by the caller
        expected: Pubkey,
        /// Mint recorded on the contract
        found: Pubkey,
    },
    /// The caller's idea of the current destination is stale
    #[error("Current destination is {found}, not {expected}")]
    DestinationMismatch {
        /// Destination named by the caller
        expected: Pubkey,
        /// Destination recorded on the contract
        found: Pubkey,
    },
    /// A string is not a base58 public key
    #[error("Invalid address: {0}")]
    InvalidAddressFormat(String),
    /// Caller input is unusable
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    /// The ledger client failed, as opposed to an account being legitimately absent
    #[error("Account lookup failed: {0}")]
    AccountLookupFailed(String),
    /// The wallet rejected or could not broadcast the transaction
    #[error("Transaction submission failed: {0}")]
    SubmissionFailed(String),
    /// Local preferences could not be read or written
    #[error("Preference store failed: {0}")]
    PreferenceStoreFailed(String),
}

impl From<ProgramError> for VestingError {
    fn from(_: ProgramError) -> Self {
        VestingError::MalformedBuffer
    }
}
