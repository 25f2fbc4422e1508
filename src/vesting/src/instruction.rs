//! The definitions for vesting program instructions

use std::convert::TryFrom;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::{Pubkey, MAX_SEED_LEN},
    system_program, sysvar,
};
use solana_sdk::packet::PACKET_DATA_SIZE;

use crate::{
    error::VestingError,
    pack_utils::{decode_pubkey, decode_u32, encode_u32},
    state::{Schedule, SCHEDULE_LEN},
};

/// Seed length the deployed program reads from instruction data
pub const PROGRAM_SEED_LEN: usize = 32;

/// Leading byte of every instruction's data
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[repr(u8)]
pub enum InstructionTag {
    /// Allocate a vesting account
    Init = 0,
    /// Fund a vesting account and record its schedules
    Create = 1,
    /// Pay out due schedules
    Unlock = 2,
    /// Reassign the destination token account
    ChangeDestination = 3,
}

/// A vesting program instruction
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VestingInstruction {
    /// Allocate the vesting account for `number_of_schedules` schedules
    ///
    /// # Account references
    ///   0. `[]` System program account
    ///   1. `[]` Rent sysvar
    ///   2. `[SIGNER, WRITE]` Fee payer
    ///   3. `[WRITE]` Vesting account
    Init {
        /// Extended seed of the vesting account
        seeds: Vec<u8>,
        /// Schedules the account is sized for
        number_of_schedules: u32,
    },

    /// Move the locked tokens into the vesting token account and record the schedules
    ///
    /// # Account references
    ///   0. `[]` System program account
    ///   1. `[]` Token program account
    ///   2. `[WRITE]` Fee wallet
    ///   3. `[WRITE]` Vesting account
    ///   4. `[WRITE]` Vesting token account
    ///   5. `[SIGNER]` Source token account owner
    ///   6. `[WRITE]` Source token account
    Create {
        /// Extended seed of the vesting account
        seeds: Vec<u8>,
        /// Mint of the locked tokens
        mint_address: Pubkey,
        /// Token account receiving unlocked tokens
        destination_token_address: Pubkey,
        /// Releases, in order
        schedules: Vec<Schedule>,
    },

    /// Pay out every schedule whose release time has passed
    ///
    /// # Account references
    ///   0. `[]` Token program account
    ///   1. `[]` Clock sysvar
    ///   2. `[WRITE]` Vesting account
    ///   3. `[WRITE]` Vesting token account
    ///   4. `[WRITE]` Destination token account
    Unlock {
        /// Extended seed of the vesting account
        seeds: Vec<u8>,
    },

    /// Point the contract at a new destination token account
    ///
    /// # Account references
    ///   0. `[WRITE]` Vesting account
    ///   1. `[]` Current destination token account
    ///   2. `[SIGNER]` Current destination token account owner
    ///   3. `[]` New destination token account
    ChangeDestination {
        /// Extended seed of the vesting account
        seeds: Vec<u8>,
    },
}

impl VestingInstruction {
    /// Discriminant written as the first data byte
    pub fn tag(&self) -> InstructionTag {
        match self {
            VestingInstruction::Init { .. } => InstructionTag::Init,
            VestingInstruction::Create { .. } => InstructionTag::Create,
            VestingInstruction::Unlock { .. } => InstructionTag::Unlock,
            VestingInstruction::ChangeDestination { .. } => InstructionTag::ChangeDestination,
        }
    }

    /// Serialize into instruction data
    pub fn pack(&self) -> Vec<u8> {
        let mut data = vec![self.tag() as u8];
        match self {
            VestingInstruction::Init {
                seeds,
                number_of_schedules,
            } => {
                data.extend_from_slice(seeds);
                data.extend_from_slice(&encode_u32(*number_of_schedules));
            }
            VestingInstruction::Create {
                seeds,
                mint_address,
                destination_token_address,
                schedules,
            } => {
                data.reserve(seeds.len() + 64 + schedules.len() * SCHEDULE_LEN);
                data.extend_from_slice(seeds);
                data.extend_from_slice(mint_address.as_ref());
                data.extend_from_slice(destination_token_address.as_ref());
                for schedule in schedules {
                    data.extend_from_slice(&schedule.encode());
                }
            }
            VestingInstruction::Unlock { seeds }
            | VestingInstruction::ChangeDestination { seeds } => {
                data.extend_from_slice(seeds);
            }
        }
        data
    }

    /// Decode instruction data produced for the deployed program, whose
    /// seeds are always [`PROGRAM_SEED_LEN`] bytes long
    pub fn unpack(data: &[u8]) -> Result<Self, VestingError> {
        Self::unpack_with_seed_len(data, PROGRAM_SEED_LEN)
    }

    /// Decode instruction data whose embedded seed is `seeds_len` bytes long
    pub fn unpack_with_seed_len(data: &[u8], seeds_len: usize) -> Result<Self, VestingError> {
        let (&tag, rest) = data.split_first().ok_or(VestingError::MalformedBuffer)?;
        let tag = InstructionTag::from_u8(tag).ok_or(VestingError::MalformedBuffer)?;

        let seeds = rest
            .get(..seeds_len)
            .ok_or(VestingError::MalformedBuffer)?
            .to_vec();
        let offset = 1 + seeds_len;

        let instruction = match tag {
            InstructionTag::Init => {
                let (number_of_schedules, end) = decode_u32(data, offset)?;
                if end != data.len() {
                    return Err(VestingError::MalformedBuffer);
                }
                VestingInstruction::Init {
                    seeds,
                    number_of_schedules,
                }
            }
            InstructionTag::Create => {
                let (mint_address, offset) = decode_pubkey(data, offset)?;
                let (destination_token_address, mut offset) = decode_pubkey(data, offset)?;
                if (data.len() - offset) % SCHEDULE_LEN != 0 {
                    return Err(VestingError::MalformedBuffer);
                }
                let mut schedules = Vec::with_capacity((data.len() - offset) / SCHEDULE_LEN);
                while offset < data.len() {
                    let (schedule, next) = Schedule::decode(data, offset)?;
                    schedules.push(schedule);
                    offset = next;
                }
                VestingInstruction::Create {
                    seeds,
                    mint_address,
                    destination_token_address,
                    schedules,
                }
            }
            InstructionTag::Unlock | InstructionTag::ChangeDestination => {
                if offset != data.len() {
                    return Err(VestingError::MalformedBuffer);
                }
                if tag == InstructionTag::Unlock {
                    VestingInstruction::Unlock { seeds }
                } else {
                    VestingInstruction::ChangeDestination { seeds }
                }
            }
        };

        Ok(instruction)
    }
}

fn assert_seeds_len(seeds: &[u8]) -> Result<(), VestingError> {
    if seeds.len() > MAX_SEED_LEN {
        Err(VestingError::InvalidSeedLength(seeds.len()))
    } else {
        Ok(())
    }
}

fn packed_data(instruction: &VestingInstruction) -> Result<Vec<u8>, VestingError> {
    let data = instruction.pack();
    if data.len() > PACKET_DATA_SIZE {
        return Err(VestingError::InstructionTooLarge {
            len: data.len(),
            max: PACKET_DATA_SIZE,
        });
    }
    Ok(data)
}

/// Creates an `Init` instruction
pub fn init(
    program_id: &Pubkey,
    payer: &Pubkey,
    vesting_account: &Pubkey,
    seeds: &[u8],
    number_of_schedules: usize,
) -> Result<Instruction, VestingError> {
    assert_seeds_len(seeds)?;
    let number_of_schedules = u32::try_from(number_of_schedules).map_err(|_| {
        VestingError::InvalidArguments(format!("{} schedules", number_of_schedules))
    })?;

    let data = packed_data(&VestingInstruction::Init {
        seeds: seeds.to_vec(),
        number_of_schedules,
    })?;
    let accounts = vec![
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
        AccountMeta::new(*payer, true),
        AccountMeta::new(*vesting_account, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Creates a `Create` instruction
#[allow(clippy::too_many_arguments)]
pub fn create(
    program_id: &Pubkey,
    vesting_account: &Pubkey,
    vesting_token_account: &Pubkey,
    source_token_account_owner: &Pubkey,
    source_token_account: &Pubkey,
    destination_token_account: &Pubkey,
    mint_address: &Pubkey,
    schedules: &[Schedule],
    seeds: &[u8],
    fee_wallet: &Pubkey,
) -> Result<Instruction, VestingError> {
    assert_seeds_len(seeds)?;

    let data = packed_data(&VestingInstruction::Create {
        seeds: seeds.to_vec(),
        mint_address: *mint_address,
        destination_token_address: *destination_token_account,
        schedules: schedules.to_vec(),
    })?;
    let accounts = vec![
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new(*fee_wallet, false),
        AccountMeta::new(*vesting_account, false),
        AccountMeta::new(*vesting_token_account, false),
        AccountMeta::new_readonly(*source_token_account_owner, true),
        AccountMeta::new(*source_token_account, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Creates an `Unlock` instruction
pub fn unlock(
    program_id: &Pubkey,
    vesting_account: &Pubkey,
    vesting_token_account: &Pubkey,
    destination_token_account: &Pubkey,
    seeds: &[u8],
) -> Result<Instruction, VestingError> {
    assert_seeds_len(seeds)?;

    let data = packed_data(&VestingInstruction::Unlock {
        seeds: seeds.to_vec(),
    })?;
    let accounts = vec![
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
        AccountMeta::new(*vesting_account, false),
        AccountMeta::new(*vesting_token_account, false),
        AccountMeta::new(*destination_token_account, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Creates a `ChangeDestination` instruction
pub fn change_destination(
    program_id: &Pubkey,
    vesting_account: &Pubkey,
    current_destination_token_account_owner: &Pubkey,
    current_destination_token_account: &Pubkey,
    new_destination_token_account: &Pubkey,
    seeds: &[u8],
) -> Result<Instruction, VestingError> {
    assert_seeds_len(seeds)?;

    let data = packed_data(&VestingInstruction::ChangeDestination {
        seeds: seeds.to_vec(),
    })?;
    let accounts = vec![
        AccountMeta::new(*vesting_account, false),
        AccountMeta::new_readonly(*current_destination_token_account, false),
        AccountMeta::new_readonly(*current_destination_token_account_owner, true),
        AccountMeta::new_readonly(*new_destination_token_account, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}
