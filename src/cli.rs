use clap::{Args, Parser, Subcommand};
use ethers::types::Address;
use std::path::PathBuf;
use std::str::FromStr;

/// Bridge end-to-end test harness (library-facing definitions)
#[derive(Debug, Parser)]
#[command(name = "bridge-e2e", about = "End-to-end cross-chain bridge test harness", version)]
pub struct Cli {
    /// Configuration file (defaults to $CONFIG_PATH, then bridge-e2e.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging and full error chains
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the scenario suite and write a report
    Run(RunArgs),
    /// Claim transfers left unclaimed by earlier runs
    Claims {
        /// Simulate the claims instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Print native and token balances on every chain
    Balances {
        /// Address to inspect (defaults to the harness wallet)
        #[arg(long, value_parser = parse_address)]
        address: Option<Address>,
    },
    /// Deploy a test token from a compiled artifact
    DeployToken(DeployArgs),
    /// Follow a transaction's receipt and bridge status
    Track(TrackArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Simulate every transaction
    #[arg(long)]
    pub dry_run: bool,
    /// Skip scenarios completed by the previous run
    #[arg(long)]
    pub resume: bool,
    /// Only run scenarios whose label contains this text
    #[arg(long)]
    pub only: Option<String>,
    /// Do not scan for unclaimed transfers before running
    #[arg(long)]
    pub no_existing_claims: bool,
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Chain key, e.g. katana
    #[arg(long)]
    pub chain: String,
    /// Compiled contract artifact (JSON with abi and bytecode)
    #[arg(long)]
    pub artifact: PathBuf,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub symbol: String,
    /// Initial supply in whole tokens
    #[arg(long)]
    pub supply: String,
    #[arg(long, default_value_t = 18)]
    pub decimals: u8,
}

#[derive(Debug, Args)]
pub struct TrackArgs {
    #[arg(long)]
    pub chain: String,
    #[arg(long)]
    pub hash: String,
    /// Keep polling until the transfer settles
    #[arg(long)]
    pub watch: bool,
    /// Seconds between polls
    #[arg(long, default_value_t = 15)]
    pub interval: u64,
    #[arg(long, default_value_t = 40)]
    pub max_polls: u32,
}

fn parse_address(s: &str) -> Result<Address, String> {
    Address::from_str(s.trim()).map_err(|e| format!("invalid address '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from(["bridge-e2e", "run", "--dry-run", "--only", "katana", "--verbose"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run(args) => {
                assert!(args.dry_run);
                assert!(!args.resume);
                assert_eq!(args.only.as_deref(), Some("katana"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn track_defaults() {
        let cli = Cli::try_parse_from(["bridge-e2e", "track", "--chain", "base", "--hash", "0xabc"]).unwrap();
        let Commands::Track(args) = cli.command else { panic!("expected track") };
        assert!(!args.watch);
        assert_eq!(args.interval, 15);
        assert_eq!(args.max_polls, 40);
    }

    #[test]
    fn balances_rejects_bad_address() {
        assert!(Cli::try_parse_from(["bridge-e2e", "balances", "--address", "0xnope"]).is_err());
    }

    #[test]
    fn deploy_token_requires_artifact() {
        assert!(Cli::try_parse_from(["bridge-e2e", "deploy-token", "--chain", "katana"]).is_err());
        let cli = Cli::try_parse_from([
            "bridge-e2e", "--config", "custom.toml", "deploy-token", "--chain", "katana", "--artifact", "out/T.json",
            "--name", "Test", "--symbol", "ASTEST", "--supply", "1000",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        let Commands::DeployToken(args) = cli.command else { panic!("expected deploy-token") };
        assert_eq!(args.decimals, 18);
    }
}
