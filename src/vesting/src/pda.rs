//! Vesting account and token account derivation

use std::str::FromStr;

use rand::Rng;
use solana_program::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;

use crate::{error::VestingError, instruction::PROGRAM_SEED_LEN};

/// Bytes of a raw seed that participate in derivation; the bump takes the last seed byte
pub const VESTING_SEED_LEN: usize = 31;

/// Number of decimal digits in a generated seed
pub const GENERATED_SEED_DIGITS: usize = 64;

/// Derive the vesting account for `raw_seed`.
///
/// Returns the account together with the seed the vesting program expects in
/// every instruction: the truncated seed followed by the bump.
pub fn derive_vesting_address(
    raw_seed: &[u8],
    program_id: &Pubkey,
) -> Result<(Pubkey, Vec<u8>), VestingError> {
    let truncated = &raw_seed[..raw_seed.len().min(VESTING_SEED_LEN)];

    let (vesting_account, bump) = Pubkey::try_find_program_address(&[truncated], program_id)
        .ok_or(VestingError::AddressDerivationExhausted)?;

    let mut seeds = Vec::with_capacity(truncated.len() + 1);
    seeds.extend_from_slice(truncated);
    seeds.push(bump);

    Ok((vesting_account, seeds))
}

/// Derive the vesting account for a seed the deployed program can read back.
///
/// The program reads a fixed [`PROGRAM_SEED_LEN`]-byte extended seed, so raw
/// seeds shorter than [`VESTING_SEED_LEN`] are rejected with
/// [`VestingError::InvalidSeedLength`].
pub fn derive_contract_address(
    raw_seed: &[u8],
    program_id: &Pubkey,
) -> Result<(Pubkey, Vec<u8>), VestingError> {
    if raw_seed.len() < VESTING_SEED_LEN {
        return Err(VestingError::InvalidSeedLength(raw_seed.len()));
    }
    derive_vesting_address(raw_seed, program_id)
}

/// The token account holding a contract's locked balance
pub fn derive_vesting_token_account(mint: &Pubkey, vesting_account: &Pubkey) -> Pubkey {
    get_associated_token_address(vesting_account, mint)
}

/// The canonical token account of `owner` for `mint`
pub fn derive_token_account(mint: &Pubkey, owner: &Pubkey) -> Pubkey {
    get_associated_token_address(owner, mint)
}

/// A fresh random seed for a new contract
pub fn generate_seed() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_SEED_DIGITS)
        .map(|_| char::from(b'0' + rng.gen_range(0, 10)))
        .collect()
}

/// Parse a base58 address, ignoring surrounding whitespace
pub fn parse_address(address: &str) -> Result<Pubkey, VestingError> {
    Pubkey::from_str(address.trim())
        .map_err(|_| VestingError::InvalidAddressFormat(address.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_and_appends_bump() {
        let program_id = crate::id();
        let raw_seed = generate_seed();

        let (vesting_account, seeds) =
            derive_vesting_address(raw_seed.as_bytes(), &program_id).unwrap();

        assert_eq!(seeds.len(), VESTING_SEED_LEN + 1);
        assert_eq!(&seeds[..VESTING_SEED_LEN], &raw_seed.as_bytes()[..VESTING_SEED_LEN]);

        let (expected, bump) = Pubkey::find_program_address(
            &[&raw_seed.as_bytes()[..VESTING_SEED_LEN]],
            &program_id,
        );
        assert_eq!(vesting_account, expected);
        assert_eq!(seeds[VESTING_SEED_LEN], bump);
    }

    #[test]
    fn extended_seed_rederives_vesting_account() {
        let program_id = crate::id();
        for raw_seed in [&b"short"[..], &[7u8; 31][..], &[9u8; 64][..]] {
            let (vesting_account, seeds) = derive_vesting_address(raw_seed, &program_id).unwrap();
            assert_eq!(seeds.len(), raw_seed.len().min(VESTING_SEED_LEN) + 1);
            assert_eq!(
                Pubkey::create_program_address(&[&seeds], &program_id).unwrap(),
                vesting_account
            );
        }
    }

    #[test]
    fn seeds_differing_after_truncation_share_an_account() {
        let program_id = Pubkey::new_unique();
        let mut a = [1u8; 40];
        let b = [1u8; 40];
        a[35] = 2;
        assert_eq!(
            derive_vesting_address(&a, &program_id).unwrap(),
            derive_vesting_address(&b, &program_id).unwrap()
        );
    }

    #[test]
    fn contract_seeds_fill_the_program_seed() {
        let program_id = crate::id();
        assert_eq!(
            derive_contract_address(b"42", &program_id),
            Err(VestingError::InvalidSeedLength(2))
        );
        assert_eq!(
            derive_contract_address(&[3u8; 30], &program_id),
            Err(VestingError::InvalidSeedLength(30))
        );

        let raw_seed = generate_seed();
        let (vesting_account, seeds) =
            derive_contract_address(raw_seed.as_bytes(), &program_id).unwrap();
        assert_eq!(seeds.len(), PROGRAM_SEED_LEN);
        assert_eq!(
            (vesting_account, seeds),
            derive_vesting_address(raw_seed.as_bytes(), &program_id).unwrap()
        );
    }

    #[test]
    fn token_accounts_are_associated_addresses() {
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        assert_eq!(
            derive_token_account(&mint, &owner),
            get_associated_token_address(&owner, &mint)
        );
        assert_eq!(
            derive_vesting_token_account(&mint, &owner),
            derive_token_account(&mint, &owner)
        );
    }

    #[test]
    fn generated_seeds_are_digits() {
        let seed = generate_seed();
        assert_eq!(seed.len(), GENERATED_SEED_DIGITS);
        assert!(seed.bytes().all(|b| b.is_ascii_digit()));
        assert_ne!(seed, generate_seed());
    }

    #[test]
    fn parses_addresses() {
        let key = Pubkey::new_unique();
        assert_eq!(parse_address(&key.to_string()).unwrap(), key);
        assert_eq!(
            parse_address("not-a-key"),
            Err(VestingError::InvalidAddressFormat("not-a-key".to_string()))
        );
    }
}
