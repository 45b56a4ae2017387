use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "datum", about = "A local truth ledger")]
pub struct Opt {
    #[arg(long, global = true, help = "Chain to operate on (default from settings)")]
    pub chain: Option<String>,
    #[arg(long, global = true, help = "TOML settings file")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "info", about = "Show chain status and settings")]
    Info,
    #[command(name = "createwallet", about = "Create a new named wallet")]
    Createwallet {
        #[arg(help = "Wallet name")]
        name: String,
    },
    #[command(name = "listwallets", about = "Print local wallets and their addresses")]
    Listwallets,
    #[command(name = "transfer", about = "Submit a transfer between addresses")]
    Transfer {
        #[arg(help = "Source wallet name or address")]
        from: String,
        #[arg(help = "Destination address or local wallet name")]
        to: String,
        #[arg(help = "Amount in base units")]
        amount: u64,
        #[arg(long, help = "Mine a block right after submitting")]
        mine: bool,
    },
    #[command(name = "mine", about = "Mine pending transactions into a block")]
    Mine,
    #[command(name = "balance", about = "Get the mined balance of an address")]
    Balance {
        #[arg(help = "Address or local wallet name")]
        address: String,
    },
    #[command(name = "notarize", about = "Record a file's hash on the chain")]
    Notarize {
        #[arg(help = "Signing wallet name or address")]
        wallet: String,
        #[arg(help = "File to notarize")]
        file: PathBuf,
        #[arg(long, help = "Owner label (defaults to the wallet name)")]
        owner: Option<String>,
    },
    #[command(name = "verify", about = "Check a file against mined notarizations")]
    Verify {
        #[arg(help = "File to verify")]
        file: PathBuf,
    },
    #[command(name = "history", about = "List every notarization of a file label")]
    History {
        #[arg(help = "File label, usually the file name")]
        label: String,
    },
    #[command(name = "send-message", about = "Drop an encrypted message for an inbox")]
    SendMessage {
        #[arg(help = "Sending wallet name or address")]
        from: String,
        #[arg(help = "Recipient inbox key or local wallet name")]
        to: String,
        #[arg(help = "Message text")]
        message: String,
    },
    #[command(name = "read-message", about = "Decrypt a message addressed to a wallet")]
    ReadMessage {
        #[arg(help = "Receiving wallet name or address")]
        wallet: String,
        #[arg(help = "Transaction id of the message")]
        txid: String,
    },
    #[command(name = "inbox", about = "List mined messages for a wallet")]
    Inbox {
        #[arg(help = "Wallet name or address")]
        wallet: String,
    },
    #[command(name = "show", about = "Print the most recent blocks")]
    Show {
        #[arg(short = 'n', long, default_value_t = 5, help = "Number of blocks")]
        count: usize,
    },
    #[command(name = "validate", about = "Validate the whole chain")]
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_options_after_subcommand() {
        let opt = Opt::try_parse_from(["datum", "balance", "alice", "--chain", "side"]).unwrap();
        assert_eq!(opt.chain.as_deref(), Some("side"));
        assert!(matches!(opt.command, Command::Balance { address } if address == "alice"));
    }

    #[test]
    fn test_transfer_flags() {
        let opt = Opt::try_parse_from(["datum", "transfer", "alice", "bob", "30", "--mine"]).unwrap();
        assert!(matches!(
            opt.command,
            Command::Transfer { amount: 30, mine: true, .. }
        ));
        assert!(Opt::try_parse_from(["datum", "transfer", "alice", "bob", "-3"]).is_err());
    }
}
