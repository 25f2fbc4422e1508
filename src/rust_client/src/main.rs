use chrono::prelude::*;
use clap::{Args, Parser, Subcommand};
use solana_program::{instruction::Instruction, pubkey::Pubkey};
use std::{error::Error, path::PathBuf};
use token_vesting::{
    error::VestingError,
    instruction::VestingInstruction,
    ledger::SigningAgent,
    pda::{derive_contract_address, parse_address},
    state::ContractInfo,
    workflow::{recall_seed, remember_seed, LockRequest, NewDestination, VestingClient},
};

use explorer::{explorer_link, Cluster, LinkKind};
use history::{JsonFileStore, LockRecord};
use transaction::{load_keypair, KeypairSigner, RpcLedger};

mod explorer;
mod history;
mod transaction;

#[derive(Parser)]
#[command(name = "vesting", about = "Lock SPL tokens under a vesting schedule")]
struct Cli {
    /// RPC URL or moniker (mainnet, testnet, devnet, localhost)
    #[arg(short = 'u', long, env = "VESTING_RPC_URL", default_value = "localhost")]
    url: String,

    /// Keypair file holding a JSON byte array
    #[arg(short, long, env = "VESTING_KEYPAIR", default_value = "keys/key.json")]
    keypair: PathBuf,

    /// Where seeds and submitted locks are remembered
    #[arg(long, env = "VESTING_HISTORY", default_value = "vesting-history.json")]
    history: PathBuf,

    /// Print the instructions instead of submitting them
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ContractArgs {
    /// Seed the contract was created with
    #[arg(long, conflicts_with = "vesting_account")]
    seed: Option<String>,

    /// Vesting account whose seed was remembered by a previous lock
    #[arg(long, value_parser = parse_address)]
    vesting_account: Option<Pubkey>,
}

#[derive(Subcommand)]
enum Command {
    /// Lock tokens from the keypair's token account
    Lock {
        #[arg(long, value_parser = parse_address)]
        mint: Pubkey,

        /// Wallet receiving the tokens as they vest
        #[arg(long, value_parser = parse_address)]
        destination: Pubkey,

        /// Release time as unix seconds, RFC 3339 or YYYY-MM-DD; repeat for more schedules
        #[arg(long = "release", required = true, value_parser = parse_release_time)]
        releases: Vec<u64>,

        /// Whole tokens released at each release time
        #[arg(long)]
        amount: f64,
    },
    /// Release every schedule that has come due
    Unlock {
        #[command(flatten)]
        contract: ContractArgs,

        #[arg(long, value_parser = parse_address)]
        mint: Pubkey,
    },
    /// Send future releases somewhere else; the keypair must own the current destination
    ChangeDestination {
        #[command(flatten)]
        contract: ContractArgs,

        /// Defaults to the destination recorded on the contract
        #[arg(long, value_parser = parse_address)]
        current_account: Option<Pubkey>,

        /// New wallet; its associated token account receives the tokens
        #[arg(long, value_parser = parse_address)]
        new_owner: Option<Pubkey>,

        /// New token account; takes precedence over --new-owner
        #[arg(long, value_parser = parse_address)]
        new_account: Option<Pubkey>,
    },
    /// Show one contract
    Info {
        #[arg(long, conflicts_with = "address")]
        seed: Option<String>,

        #[arg(long, value_parser = parse_address)]
        address: Option<Pubkey>,
    },
    /// Show every contract owned by the vesting program
    List,
    /// Show locks submitted from this machine
    History,
}

fn parse_release_time(value: &str) -> Result<u64, String> {
    if let Ok(timestamp) = value.parse::<u64>() {
        return Ok(timestamp);
    }

    let timestamp = if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        datetime.timestamp()
    } else if let Some(midnight) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        midnight.timestamp()
    } else {
        return Err(format!(
            "{} is not unix seconds, an RFC 3339 time or a YYYY-MM-DD date",
            value
        ));
    };

    u64::try_from(timestamp).map_err(|_| format!("{} is before the unix epoch", value))
}

fn format_time(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|datetime| datetime.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}

fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

/// The raw seed of a contract, given directly or recalled from history
fn resolve_seed(args: &ContractArgs, store: &JsonFileStore) -> Result<String, VestingError> {
    match (&args.seed, &args.vesting_account) {
        (Some(seed), _) => Ok(seed.clone()),
        (None, Some(vesting_account)) => recall_seed(store, vesting_account)?.ok_or_else(|| {
            VestingError::InvalidArguments(format!(
                "no seed remembered for {}, pass --seed",
                vesting_account
            ))
        }),
        (None, None) => Err(VestingError::InvalidArguments(
            "--seed or --vesting-account is required".to_string(),
        )),
    }
}

fn print_instructions(program_id: &Pubkey, instructions: &[Instruction]) {
    for (index, instruction) in instructions.iter().enumerate() {
        if instruction.program_id == *program_id {
            match VestingInstruction::unpack(&instruction.data) {
                Ok(decoded) => println!("#{} {:?}", index, decoded),
                Err(err) => println!("#{} undecodable vesting instruction: {}", index, err),
            }
        } else {
            println!("#{} program {}", index, instruction.program_id);
        }
        for account in &instruction.accounts {
            println!(
                "    {} signer={} writable={}",
                account.pubkey, account.is_signer, account.is_writable
            );
        }
    }
}

fn print_contract(address: &Pubkey, contract: &ContractInfo, cluster: &Cluster) {
    let now = unix_now();
    println!("Contract:    {}", address);
    println!(
        "  Explorer:    {}",
        explorer_link(LinkKind::Address, &address.to_string(), cluster)
    );
    println!("  Status:      {:?}", contract.status());
    println!("  Mint:        {}", contract.mint_address);
    println!("  Destination: {}", contract.destination_address);
    println!("  Created:     {}", format_time(contract.creation_time));
    println!("  Locked:      {}", contract.locked_amount());
    println!("  Unlockable:  {}", contract.unlockable_amount(now));
    for schedule in &contract.schedules {
        println!(
            "    {}  {}",
            format_time(schedule.release_time),
            schedule.amount
        );
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let cluster = Cluster::parse(&cli.url);
    let ledger = RpcLedger::new(cluster.rpc_url());
    let client = VestingClient::new(&ledger);
    let mut store = JsonFileStore::open(&cli.history)?;

    match &cli.command {
        Command::Info { seed, address } => {
            let address = match (seed, address) {
                (Some(seed), _) => {
                    derive_contract_address(seed.as_bytes(), client.program_id())?.0
                }
                (None, Some(address)) => *address,
                (None, None) => return Err("--seed or --address is required".into()),
            };
            let contract = client.contract_info(&address)?;
            print_contract(&address, &contract, &cluster);
            return Ok(());
        }
        Command::List => {
            let addresses = ledger.program_accounts(client.program_id())?;
            let contracts = client.fetch_contracts(&addresses)?;
            println!("{} contracts", contracts.len());
            for (address, contract) in &contracts {
                print_contract(address, contract, &cluster);
            }
            return Ok(());
        }
        Command::History => {
            for record in store.locks() {
                println!(
                    "{}  {}  seed {}",
                    format_time(u64::try_from(record.created_at).unwrap_or_default()),
                    record.vesting_account,
                    record.seed
                );
                println!(
                    "    {}",
                    explorer_link(LinkKind::Transaction, &record.signature, &cluster)
                );
            }
            return Ok(());
        }
        _ => {}
    }

    let keypair = load_keypair(&cli.keypair)?;
    let mut signer = KeypairSigner::new(ledger.rpc_client(), keypair);
    signer.disconnect();
    let owner = signer.connect()?;
    println!("Wallet: {}", owner);

    match cli.command {
        Command::Lock {
            mint,
            destination,
            releases,
            amount,
        } => {
            let schedules = client.schedules_from_ui_amount(&mint, &releases, amount)?;
            let plan = client.lock(&LockRequest {
                mint,
                source_owner: owner,
                destination_owner: destination,
                schedules,
            })?;

            println!("Seed: {}", plan.seed);
            println!("Vesting account: {}", plan.vesting_account);
            if cli.dry_run {
                print_instructions(client.program_id(), &plan.instructions);
                return Ok(());
            }

            let signature = client.submit(&signer, &owner, &plan.instructions)?;
            remember_seed(&mut store, &plan)?;
            store.record_lock(&LockRecord::new(
                &plan,
                &mint.to_string(),
                &signature.to_string(),
                Utc::now().timestamp(),
            ))?;

            println!(
                "Locked: {}",
                explorer_link(LinkKind::Transaction, &signature.to_string(), &cluster)
            );
            println!(
                "Contract: {}",
                explorer_link(LinkKind::Address, &plan.vesting_account.to_string(), &cluster)
            );
        }
        Command::Unlock { contract, mint } => {
            let seed = resolve_seed(&contract, &store)?;
            let plan = client.unlock(seed.as_bytes(), &mint)?;

            let now = unix_now();
            println!(
                "Unlockable now: {} of {}",
                plan.contract.unlockable_amount(now),
                plan.contract.locked_amount()
            );
            if cli.dry_run {
                print_instructions(client.program_id(), &plan.instructions);
                return Ok(());
            }

            let signature = client.submit(&signer, &owner, &plan.instructions)?;
            println!(
                "Unlocked: {}",
                explorer_link(LinkKind::Transaction, &signature.to_string(), &cluster)
            );
        }
        Command::ChangeDestination {
            contract,
            current_account,
            new_owner,
            new_account,
        } => {
            let seed = resolve_seed(&contract, &store)?;
            let new_destination = NewDestination::from_options(new_owner, new_account)?;
            let plan = client.change_destination(
                seed.as_bytes(),
                &owner,
                current_account.as_ref(),
                new_destination,
            )?;

            println!(
                "Destination: {} -> {}",
                plan.current_destination_token_account, plan.new_destination_token_account
            );
            if cli.dry_run {
                print_instructions(client.program_id(), &plan.instructions);
                return Ok(());
            }

            let signature = client.submit(&signer, &owner, &plan.instructions)?;
            println!(
                "Changed: {}",
                explorer_link(LinkKind::Transaction, &signature.to_string(), &cluster)
            );
        }
        Command::Info { .. } | Command::List | Command::History => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_release_times() {
        assert_eq!(parse_release_time("1700000000"), Ok(1_700_000_000));
        assert_eq!(parse_release_time("1970-01-02"), Ok(86_400));
        assert_eq!(parse_release_time("1970-01-01T01:00:00+00:00"), Ok(3_600));
        assert!(parse_release_time("1969-12-31").is_err());
        assert!(parse_release_time("next tuesday").is_err());
    }

    #[test]
    fn formats_times() {
        assert_eq!(format_time(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(format_time(u64::MAX), u64::MAX.to_string());
    }

    #[test]
    fn parses_lock_arguments() {
        let cli = Cli::try_parse_from([
            "vesting",
            "--dry-run",
            "lock",
            "--mint",
            "So11111111111111111111111111111111111111112",
            "--destination",
            "11111111111111111111111111111111",
            "--release",
            "1970-01-02",
            "--release",
            "172800",
            "--amount",
            "1.5",
        ])
        .unwrap();

        assert!(cli.dry_run);
        match cli.command {
            Command::Lock {
                releases, amount, ..
            } => {
                assert_eq!(releases, vec![86_400, 172_800]);
                assert_eq!(amount, 1.5);
            }
            _ => panic!("expected lock"),
        }
    }

    #[test]
    fn rejects_malformed_address() {
        assert!(Cli::try_parse_from(["vesting", "unlock", "--seed", "1", "--mint", "nope"]).is_err());
    }

    #[test]
    fn resolves_seed_from_history() {
        let path = std::env::temp_dir().join(format!("vesting-cli-seed-{}.json", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let mut store = JsonFileStore::open(&path).unwrap();
        let vesting_account = Pubkey::new_unique();
        token_vesting::ledger::PreferenceStore::set(
            &mut store,
            &format!("seed.{}", vesting_account),
            "42",
        )
        .unwrap();

        let args = ContractArgs {
            seed: None,
            vesting_account: Some(vesting_account),
        };
        assert_eq!(resolve_seed(&args, &store).unwrap(), "42");

        let unknown = ContractArgs {
            seed: None,
            vesting_account: Some(Pubkey::new_unique()),
        };
        assert!(matches!(
            resolve_seed(&unknown, &store),
            Err(VestingError::InvalidArguments(_))
        ));

        std::fs::remove_file(&path).unwrap();
    }
}
