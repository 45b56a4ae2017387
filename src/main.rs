// Entry point for the datum CLI. Every command opens the chain named in the
// settings (or --chain), does one thing and exits.
use clap::Parser;
use datum_chain::{
    validate_address, ChainPhase, Command, DeadDrop, Ledger, LedgerError, Notary, Opt, Settings,
    VerificationResult, Wallets,
};
use log::{error, info, LevelFilter};
use std::env;
use std::process;

// Read from the environment so the passphrase never shows up in argv
const WALLET_PASSWORD_KEY: &str = "DATUM_WALLET_PASSWORD";

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn load_settings(opt: &Opt) -> Result<Settings, LedgerError> {
    let mut settings = Settings::load(opt.config.as_deref())?;
    if let Some(chain) = &opt.chain {
        settings.chain_name = chain.clone();
    }
    Ok(settings)
}

fn open_ledger(settings: &Settings) -> Result<Ledger, LedgerError> {
    Ledger::open(
        settings.chain_config(),
        &settings.chain_path(&settings.chain_name),
    )
}

fn open_wallets(settings: &Settings) -> Result<Wallets, LedgerError> {
    match env::var(WALLET_PASSWORD_KEY) {
        Ok(password) => Wallets::open_encrypted(&settings.wallet_path(), &password),
        Err(_) => Wallets::open(&settings.wallet_path()),
    }
}

/// A local wallet name resolves to its address; anything else is taken as is
fn resolve_address(wallets: &Wallets, name_or_address: &str) -> String {
    wallets
        .get_wallet(name_or_address)
        .map(|wallet| wallet.get_address())
        .unwrap_or_else(|| name_or_address.to_string())
}

fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings(&opt)?;

    match opt.command {
        Command::Info => {
            let ledger = open_ledger(&settings)?;
            let status = ledger.status();
            let config = ledger.config();
            println!("Chain:       {}", status.name);
            println!("Data dir:    {}", settings.data_dir.display());
            println!("Height:      {}", status.height);
            println!("Tip:         {}", status.tip_hash);
            println!("Phase:       {}", status.phase);
            println!("Pending:     {}", status.pending);
            println!("Difficulty:  {} bits", status.difficulty);
            println!(
                "Reward:      {} to {}",
                config.mining_reward, config.miner_address
            );
            println!("Batch cap:   {}", config.max_block_transactions);
        }
        Command::Createwallet { name } => {
            let mut wallets = open_wallets(&settings)?;
            let address = wallets.create_wallet(&name)?;
            let wallet = wallets.require_wallet(&name)?;
            println!("Your new address: {address}");
            println!("Inbox key:        {}", wallet.get_inbox_key());
        }
        Command::Listwallets => {
            let wallets = open_wallets(&settings)?;
            for (name, address) in wallets.list() {
                println!("{name}\t{address}");
            }
        }
        Command::Transfer {
            from,
            to,
            amount,
            mine,
        } => {
            let wallets = open_wallets(&settings)?;
            let wallet = wallets.require_wallet(&from)?;
            let to = resolve_address(&wallets, &to);
            if !validate_address(&to) {
                info!("Recipient {to} is not a wallet address; sending anyway");
            }

            let ledger = open_ledger(&settings)?;
            let id = ledger.submit_transfer(wallet, &to, amount)?;
            println!("Submitted transfer {id}");
            if mine {
                let summary = ledger.mine()?;
                println!("Mined block #{} {}", summary.index, summary.hash);
            }
        }
        Command::Mine => {
            let ledger = open_ledger(&settings)?;
            if ledger.status().phase == ChainPhase::Created {
                info!("No pending transactions; mining an empty block");
            }
            let summary = ledger.mine()?;
            println!("Block #{} successfully mined!", summary.index);
            println!("Hash: {}", summary.hash);
            println!("Transactions: {}", summary.transaction_count);
        }
        Command::Balance { address } => {
            let wallets = open_wallets(&settings)?;
            let address = resolve_address(&wallets, &address);
            let ledger = open_ledger(&settings)?;
            println!("Balance of {address}: {}", ledger.balance_of(&address));
        }
        Command::Notarize {
            wallet,
            file,
            owner,
        } => {
            let wallets = open_wallets(&settings)?;
            let signer = wallets.require_wallet(&wallet)?;
            let owner = owner.unwrap_or(wallet);
            let ledger = open_ledger(&settings)?;
            let tx = Notary::new(&ledger).notarize_file(signer, &owner, &file)?;
            println!("Submitted notarization {} (mine to confirm)", tx.id());
        }
        Command::Verify { file } => {
            let ledger = open_ledger(&settings)?;
            match Notary::new(&ledger).verify_file(&file)? {
                VerificationResult::Verified {
                    first_seen_block_index,
                    owner,
                    timestamp,
                } => {
                    println!("File verified!");
                    println!("Found in block #{first_seen_block_index}");
                    println!("Owner: {owner}");
                    println!("Timestamp: {timestamp}");
                }
                VerificationResult::Modified {
                    latest_block_index,
                    recorded_hash,
                } => {
                    println!("File has changed since it was notarized");
                    println!("Latest record in block #{latest_block_index}: {recorded_hash}");
                }
                VerificationResult::NotFound => println!("File not found in the chain"),
            }
        }
        Command::History { label } => {
            let ledger = open_ledger(&settings)?;
            let history = Notary::new(&ledger).history(&label);
            if history.is_empty() {
                println!("No notarizations for '{label}'");
            }
            for record in history {
                println!(
                    "#{}\t{}\t{}\t{}",
                    record.block_index, record.timestamp, record.owner, record.file_hash
                );
            }
        }
        Command::SendMessage { from, to, message } => {
            let wallets = open_wallets(&settings)?;
            let sender = wallets.require_wallet(&from)?;
            let inbox_key = match wallets.get_wallet(&to) {
                Some(recipient) => recipient.get_inbox_key(),
                None => to,
            };
            let ledger = open_ledger(&settings)?;
            let id = DeadDrop::new(&ledger).send_message(sender, &inbox_key, message.as_bytes())?;
            println!("Dropped message {id}");
        }
        Command::ReadMessage { wallet, txid } => {
            let wallets = open_wallets(&settings)?;
            let recipient = wallets.require_wallet(&wallet)?;
            let ledger = open_ledger(&settings)?;
            let plaintext = DeadDrop::new(&ledger).receive_message(recipient, &txid)?;
            println!("{}", String::from_utf8_lossy(&plaintext));
        }
        Command::Inbox { wallet } => {
            let wallets = open_wallets(&settings)?;
            let recipient = wallets.require_wallet(&wallet)?;
            let ledger = open_ledger(&settings)?;
            for entry in DeadDrop::new(&ledger).inbox(&recipient.get_inbox_key())? {
                println!(
                    "#{}\t{}\tfrom {}\t{} bytes",
                    entry.block_index, entry.transaction_id, entry.sender, entry.ciphertext_len
                );
            }
        }
        Command::Show { count } => {
            let ledger = open_ledger(&settings)?;
            let chain = ledger.dump_chain();
            let start = chain.len().saturating_sub(count);
            for block in &chain[start..] {
                println!("Block #{}", block.get_index());
                println!("  Timestamp:  {}", block.get_timestamp());
                println!("  Prev hash:  {}", block.get_previous_hash());
                println!("  Hash:       {}", block.get_hash());
                println!("  Difficulty: {} nonce {}", block.get_difficulty(), block.get_nonce());
                for tx in block.get_transactions() {
                    println!("  - {} {}", tx.id(), tx.summary());
                }
                println!();
            }
        }
        Command::Validate => {
            let ledger = open_ledger(&settings)?;
            ledger.validate_chain()?;
            println!("Chain '{}' is valid ({} blocks)", ledger.name(), ledger.height() + 1);
        }
    }
    Ok(())
}
