use afcaptcha::{
    Challenge,
    PuzzleState,
};
use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use faucet_client::{
    address::Address,
    challenge::derive_challenge,
    config::{
        FaucetConfig,
        Network,
    },
    fee_payer::{
        FeePayerCache,
        fee_payer_source,
    },
    init_tracing,
    node::algod::AlgodClient,
    verification::{
        ClaimAvailability,
        VerificationClient,
    },
};

#[derive(Parser, Debug)]
#[command(version, about = "AlgoFaucet claim tooling", long_about = None)]
struct Args {
    #[arg(long, value_enum, default_value_t = Network::MainNet)]
    network: Network,

    /// Overrides ALGOD_SERVER and the network default.
    #[arg(long)]
    node_url: Option<String>,

    #[arg(long)]
    node_token: Option<String>,

    #[arg(short, long, default_value = "false")]
    tracing: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Network check, chain height and faucet escrow balance.
    Status,
    /// Derives the captcha a first-time claimant would get right now.
    Challenge,
    /// Claim eligibility of an account.
    Eligibility {
        #[arg(long)]
        address: String,
    },
    /// Compiles the fee payer and prints its address.
    FeePayer {
        /// Print the program source without compiling it.
        #[arg(long)]
        source_only: bool,
    },
    /// Derives a challenge from a given height and block seed, offline.
    Derive {
        #[arg(long)]
        height: u64,
        #[arg(long)]
        seed_hex: String,
    },
}

fn print_board(state: &PuzzleState) {
    for row in state.tiles().chunks(3) {
        let cells: Vec<String> = row
            .iter()
            .map(|t| if *t == 0 { ".".to_string() } else { t.to_string() })
            .collect();
        println!("  {}", cells.join(" "));
    }
}

fn print_challenge(challenge: &Challenge) {
    println!("reference round: {}", challenge.reference_round());
    println!("catalog index:   {}", challenge.catalog_index());
    println!("initial state:   {}", challenge.initial_state_str());
    print_board(&challenge.initial_state());
}

fn load_config(args: &Args) -> Result<FaucetConfig> {
    let mut config = FaucetConfig::from_env(args.network).wrap_err("reading configuration")?;
    if let Some(url) = &args.node_url {
        config.node_url = url.clone();
    }
    if let Some(token) = &args.node_token {
        config.node_token = Some(token.clone());
    }
    Ok(config)
}

fn connect(config: &FaucetConfig) -> Result<VerificationClient<AlgodClient>> {
    tracing::info!(network = %config.network, node = %config.node_url, "connecting to node");
    let node = AlgodClient::new(
        config.node_url.clone(),
        config.node_token.clone(),
        config.request_timeout,
    )
    .wrap_err("creating node client")?;
    Ok(VerificationClient::new(node, config))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    if args.tracing {
        init_tracing("info");
    }
    let config = load_config(&args)?;

    match args.command {
        Command::Status => {
            let verifier = connect(&config)?;
            let params = verifier
                .verify_network()
                .await
                .wrap_err("checking network")?;
            let balance = verifier.faucet_balance().await;
            println!("network:     {} ({})", config.network, params.genesis_id);
            println!("last round:  {}", verifier.current_height().await);
            println!("min fee:     {}", params.min_fee);
            println!(
                "faucet:      {} microAlgos ({} spendable)",
                balance.amount,
                balance.spendable()
            );
            match verifier.claimant_count().await {
                Ok(count) => println!("claimants:   {count}"),
                Err(err) => println!("claimants:   unknown ({err})"),
            }
        }
        Command::Challenge => {
            let verifier = connect(&config)?;
            print_challenge(&derive_challenge(&verifier).await);
        }
        Command::Eligibility { address } => {
            let address: Address = address
                .parse()
                .wrap_err_with(|| format!("parsing address {address}"))?;
            let verifier = connect(&config)?;
            let height = verifier.current_height().await;
            let availability = verifier
                .claim_availability(&address, height)
                .await
                .wrap_err("reading claim record")?;
            match availability {
                ClaimAvailability::Available => println!("claim:   available"),
                ClaimAvailability::Wait {
                    remaining,
                    next_round,
                } => println!("claim:   in {remaining} blocks (round {next_round})"),
            }
            let captcha = verifier.is_new_beneficiary(&address).await;
            println!("captcha: {}", if captcha { "required" } else { "not required" });
        }
        Command::FeePayer { source_only: true } => {
            println!("{}", fee_payer_source(config.apps.faucet));
        }
        Command::FeePayer { source_only: false } => {
            let verifier = connect(&config)?;
            let cache = FeePayerCache::new(config.apps.faucet);
            let payer = cache
                .get_or_compile(verifier.node())
                .await
                .wrap_err("compiling fee payer")?;
            println!("address:  {}", payer.address());
            println!("bytecode: {}", hex::encode(payer.program()));
        }
        Command::Derive { height, seed_hex } => {
            let seed = hex::decode(seed_hex.trim_start_matches("0x"))
                .wrap_err_with(|| format!("seed {seed_hex:?} is not hex"))?;
            let reference = Challenge::reference_round_for(height);
            print_challenge(&Challenge::from_seed(reference, &seed));
        }
    }
    Ok(())
}
