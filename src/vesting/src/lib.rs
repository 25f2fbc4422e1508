//! Client for the token vesting program: instruction and account codecs plus
//! the lock, unlock and change-destination workflows built on them
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod instruction;
pub mod ledger;
pub mod pack_utils;
pub mod pda;
pub mod state;
pub mod workflow;

#[cfg(test)]
mod test_utils;

solana_program::declare_id!("7goRg4PCntCSBsAKKTvajQ4aJoXqT8ZF7ciKMmxBQ4zD");

/// Wallet collecting the vesting program's creation fee
pub mod fee_wallet {
    solana_program::declare_id!("8qQKCLffmpp9415i4g6WdibjA146UMFk4MndxfWuGVZc");
}
