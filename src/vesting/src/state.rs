//! Vesting account state as persisted by the vesting program

use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};

use crate::{
    error::VestingError,
    pack_utils::{decode_u64, encode_u64, PUBKEY_LEN, U64_LEN},
};

/// Size of one encoded schedule
pub const SCHEDULE_LEN: usize = U64_LEN + U64_LEN;

/// Size of the initialized flag
pub const IS_INITIALIZED_LEN: usize = 1;
/// Size of the creation timestamp
pub const CREATION_TIME_LEN: usize = U64_LEN;

/// Size of the fixed header preceding the schedules
pub const HEADER_LEN: usize = IS_INITIALIZED_LEN + PUBKEY_LEN + PUBKEY_LEN + CREATION_TIME_LEN;

/// A single release: `amount` base units become unlockable at `release_time`
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Schedule {
    /// Unix timestamp in seconds
    pub release_time: u64,
    /// Token amount in base units
    pub amount: u64,
}

impl Schedule {
    /// Release time then amount, both little-endian
    pub fn encode(&self) -> [u8; SCHEDULE_LEN] {
        let mut dst = [0u8; SCHEDULE_LEN];
        let (release_time_dst, amount_dst) = mut_array_refs![&mut dst, U64_LEN, U64_LEN];
        *release_time_dst = encode_u64(self.release_time);
        *amount_dst = encode_u64(self.amount);
        dst
    }

    /// Decode the schedule starting at `offset`, returning it with the offset that follows it
    pub fn decode(src: &[u8], offset: usize) -> Result<(Self, usize), VestingError> {
        let (release_time, offset) = decode_u64(src, offset)?;
        let (amount, offset) = decode_u64(src, offset)?;
        Ok((
            Schedule {
                release_time,
                amount,
            },
            offset,
        ))
    }
}

/// The fixed-size part of a vesting account
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ContractHeader {
    /// Set by the program once the account is funded
    pub is_initialized: bool,
    /// Token account receiving unlocked tokens
    pub destination_address: Pubkey,
    /// Mint of the locked tokens
    pub mint_address: Pubkey,
    /// Unix timestamp of the Create instruction
    pub creation_time: u64,
}

impl IsInitialized for ContractHeader {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Sealed for ContractHeader {}
impl Pack for ContractHeader {
    const LEN: usize = HEADER_LEN;

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, HEADER_LEN];

        let (is_initialized_dst, destination_dst, mint_dst, creation_time_dst) = mut_array_refs![
            dst,
            IS_INITIALIZED_LEN,
            PUBKEY_LEN,
            PUBKEY_LEN,
            CREATION_TIME_LEN
        ];

        is_initialized_dst[0] = self.is_initialized as u8;
        destination_dst.copy_from_slice(self.destination_address.as_ref());
        mint_dst.copy_from_slice(self.mint_address.as_ref());
        *creation_time_dst = encode_u64(self.creation_time);
    }

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        if src.len() < HEADER_LEN {
            return Err(ProgramError::InvalidAccountData);
        }
        let src = array_ref![src, 0, HEADER_LEN];

        let (is_initialized_src, destination_src, mint_src, creation_time_src) = array_refs![
            src,
            IS_INITIALIZED_LEN,
            PUBKEY_LEN,
            PUBKEY_LEN,
            CREATION_TIME_LEN
        ];

        let is_initialized = match is_initialized_src[0] {
            0 => false,
            1 => true,
            _ => return Err(ProgramError::InvalidAccountData),
        };

        Ok(ContractHeader {
            is_initialized,
            destination_address: Pubkey::new_from_array(*destination_src),
            mint_address: Pubkey::new_from_array(*mint_src),
            creation_time: u64::from_le_bytes(*creation_time_src),
        })
    }
}

/// Lifecycle of a contract as observed through its decoded state
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContractStatus {
    /// No schedule has been paid out yet
    Active,
    /// Some schedules have been paid out
    PartiallyUnlocked,
    /// Every schedule has been paid out
    FullyUnlocked,
}

/// A decoded vesting account
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ContractInfo {
    /// Always true for a decoded contract
    pub is_initialized: bool,
    /// Token account receiving unlocked tokens
    pub destination_address: Pubkey,
    /// Mint of the locked tokens
    pub mint_address: Pubkey,
    /// Unix timestamp of the Create instruction
    pub creation_time: u64,
    /// Releases in the order they were created
    pub schedules: Vec<Schedule>,
}

impl ContractInfo {
    /// Account size for a contract holding `number_of_schedules` schedules
    pub fn account_len(number_of_schedules: usize) -> usize {
        HEADER_LEN + number_of_schedules * SCHEDULE_LEN
    }

    /// Strictly decode a vesting account.
    ///
    /// The buffer must be exactly a header followed by whole schedules; any
    /// trailing bytes make the account malformed rather than truncated.
    pub fn decode(src: &[u8]) -> Result<Self, VestingError> {
        if src.len() < HEADER_LEN {
            return Err(VestingError::MalformedBuffer);
        }
        let (header_src, body) = src.split_at(HEADER_LEN);

        let header = ContractHeader::unpack_unchecked(header_src)?;
        if !header.is_initialized() {
            return Err(VestingError::ContractNotInitialized);
        }

        let body_len = body.len();
        if body_len % SCHEDULE_LEN != 0 {
            return Err(VestingError::MalformedBuffer);
        }

        let mut schedules = Vec::with_capacity(body_len / SCHEDULE_LEN);
        let mut offset = HEADER_LEN;
        while offset < src.len() {
            let (schedule, next) = Schedule::decode(src, offset)?;
            schedules.push(schedule);
            offset = next;
        }

        Ok(ContractInfo {
            is_initialized: header.is_initialized,
            destination_address: header.destination_address,
            mint_address: header.mint_address,
            creation_time: header.creation_time,
            schedules,
        })
    }

    /// Decode a vesting account, treating every failure as an absent contract
    pub fn unpack(src: &[u8]) -> Option<Self> {
        Self::decode(src).ok()
    }

    /// Encode in the program's account layout
    pub fn pack(&self) -> Vec<u8> {
        let mut dst = vec![0u8; Self::account_len(self.schedules.len())];
        self.header().pack_into_slice(&mut dst[..HEADER_LEN]);
        for (schedule, chunk) in self
            .schedules
            .iter()
            .zip(dst[HEADER_LEN..].chunks_exact_mut(SCHEDULE_LEN))
        {
            chunk.copy_from_slice(&schedule.encode());
        }
        dst
    }

    /// The fixed-size part of this contract
    pub fn header(&self) -> ContractHeader {
        ContractHeader {
            is_initialized: self.is_initialized,
            destination_address: self.destination_address,
            mint_address: self.mint_address,
            creation_time: self.creation_time,
        }
    }

    /// Schedules releasing after `now`; everything else is unlockable
    pub fn pending_schedules(&self, now: u64) -> Vec<Schedule> {
        self.schedules
            .iter()
            .filter(|schedule| schedule.release_time > now)
            .copied()
            .collect()
    }

    /// Amount an unlock at `now` would pay out
    pub fn unlockable_amount(&self, now: u64) -> u64 {
        self.schedules
            .iter()
            .filter(|schedule| schedule.release_time <= now)
            .fold(0u64, |total, schedule| total.saturating_add(schedule.amount))
    }

    /// Amount still held by the vesting token account
    pub fn locked_amount(&self) -> u64 {
        self.schedules
            .iter()
            .fold(0u64, |total, schedule| total.saturating_add(schedule.amount))
    }

    /// Paid-out schedules have their amount zeroed by the program
    pub fn status(&self) -> ContractStatus {
        let paid_out = self
            .schedules
            .iter()
            .filter(|schedule| schedule.amount == 0)
            .count();

        match paid_out {
            0 => ContractStatus::Active,
            n if n == self.schedules.len() => ContractStatus::FullyUnlocked,
            _ => ContractStatus::PartiallyUnlocked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(schedules: Vec<Schedule>) -> ContractInfo {
        ContractInfo {
            is_initialized: true,
            destination_address: Pubkey::new_unique(),
            mint_address: Pubkey::new_unique(),
            creation_time: 1_690_000_000,
            schedules,
        }
    }

    fn schedule(release_time: u64, amount: u64) -> Schedule {
        Schedule {
            release_time,
            amount,
        }
    }

    #[test]
    fn schedule_round_trip() {
        for s in [
            schedule(0, 0),
            schedule(1_700_000_000, 5_000_000),
            schedule(u64::MAX, u64::MAX),
        ] {
            let bytes = s.encode();
            assert_eq!(Schedule::decode(&bytes, 0).unwrap(), (s, SCHEDULE_LEN));
        }
    }

    #[test]
    fn schedule_layout() {
        let bytes = schedule(1, 2).encode();
        assert_eq!(&bytes[..8], &[1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[8..], &[2, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn schedule_decode_short_buffer() {
        let bytes = schedule(1, 2).encode();
        assert_eq!(
            Schedule::decode(&bytes[..15], 0),
            Err(VestingError::MalformedBuffer)
        );
        assert_eq!(
            Schedule::decode(&bytes, 1),
            Err(VestingError::MalformedBuffer)
        );
    }

    #[test]
    fn contract_round_trip() {
        for n in [0usize, 1, 3, 12] {
            let info = contract(
                (0..n as u64)
                    .map(|i| schedule(1_700_000_000 + i * 86_400, 1_000 * (i + 1)))
                    .collect(),
            );
            let data = info.pack();
            assert_eq!(data.len(), HEADER_LEN + n * SCHEDULE_LEN);
            assert_eq!(ContractInfo::decode(&data).unwrap(), info);
        }
    }

    #[test]
    fn header_layout() {
        let info = contract(vec![schedule(10, 20)]);
        let data = info.pack();
        assert_eq!(HEADER_LEN, 73);
        assert_eq!(data[0], 1);
        assert_eq!(&data[1..33], info.destination_address.as_ref());
        assert_eq!(&data[33..65], info.mint_address.as_ref());
        assert_eq!(&data[65..73], &info.creation_time.to_le_bytes());
        assert_eq!(&data[73..], &schedule(10, 20).encode());
    }

    #[test]
    fn rejects_short_buffer() {
        let data = contract(vec![]).pack();
        for len in [0, 1, HEADER_LEN - 1] {
            assert_eq!(
                ContractInfo::decode(&data[..len]),
                Err(VestingError::MalformedBuffer)
            );
            assert!(ContractInfo::unpack(&data[..len]).is_none());
        }
    }

    #[test]
    fn rejects_misaligned_trailing_bytes() {
        let mut data = contract(vec![schedule(1, 1), schedule(2, 2)]).pack();
        data.extend_from_slice(&[0, 0, 0]);
        assert_eq!(
            ContractInfo::decode(&data),
            Err(VestingError::MalformedBuffer)
        );
        assert!(ContractInfo::unpack(&data).is_none());
    }

    #[test]
    fn rejects_uninitialized() {
        let mut info = contract(vec![schedule(1, 1)]);
        info.is_initialized = false;
        let data = info.pack();
        assert_eq!(
            ContractInfo::decode(&data),
            Err(VestingError::ContractNotInitialized)
        );
        assert!(ContractInfo::unpack(&data).is_none());
    }

    #[test]
    fn rejects_invalid_initialized_flag() {
        let mut data = contract(vec![]).pack();
        data[0] = 7;
        assert_eq!(
            ContractInfo::decode(&data),
            Err(VestingError::MalformedBuffer)
        );
    }

    #[test]
    fn progress_queries() {
        let info = contract(vec![schedule(100, 10), schedule(200, 20), schedule(300, 30)]);
        assert_eq!(info.locked_amount(), 60);
        assert_eq!(info.unlockable_amount(99), 0);
        assert_eq!(info.unlockable_amount(200), 30);
        assert_eq!(info.pending_schedules(200), vec![schedule(300, 30)]);
        assert_eq!(info.pending_schedules(199), vec![schedule(200, 20), schedule(300, 30)]);
        assert_eq!(info.status(), ContractStatus::Active);
    }

    #[test]
    fn due_and_pending_schedules_do_not_overlap() {
        let info = contract(vec![schedule(100, 10), schedule(200, 20), schedule(300, 30)]);
        for now in [0, 99, 100, 150, 200, 300, 301] {
            let pending: u64 = info
                .pending_schedules(now)
                .iter()
                .map(|schedule| schedule.amount)
                .sum();
            assert_eq!(
                pending + info.unlockable_amount(now),
                info.locked_amount(),
                "at {}",
                now
            );
        }
    }

    #[test]
    fn status_follows_paid_out_schedules() {
        let partial = contract(vec![schedule(100, 0), schedule(200, 20)]);
        assert_eq!(partial.status(), ContractStatus::PartiallyUnlocked);
        assert_eq!(partial.locked_amount(), 20);

        let done = contract(vec![schedule(100, 0), schedule(200, 0)]);
        assert_eq!(done.status(), ContractStatus::FullyUnlocked);
        assert_eq!(done.locked_amount(), 0);
    }
}
