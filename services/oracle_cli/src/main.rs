//! Oracle contract command line client

mod display;

use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand};
use oracle_sdk::{
    detect_contract_kind, subscriber, ContractAddress, ContractClient, ContractKind, OracleSdk,
    OracleStatus, PriceData, PriceFeedSdk, RpcContractClient, SdkOptions, UpdateParams,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON contract gateway endpoint (expects `function`/`args` calls, not ABI calldata)
    #[arg(long, env = "ORACLE_RPC_URL", default_value = "http://127.0.0.1:4000/api")]
    rpc_url: String,

    /// Node-managed account used for writes
    #[arg(long, env = "ORACLE_ACCOUNT")]
    account: Option<String>,

    /// Change polling interval in milliseconds
    #[arg(long, default_value_t = 5000)]
    poll_interval_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect the contract kind and print its current state
    Read {
        address: ContractAddress,

        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Trigger an update and wait for it to finalize
    Update {
        address: ContractAddress,

        #[command(flatten)]
        params: UpdateArgs,

        /// Return after submitting, without waiting for finalization
        #[arg(long)]
        no_wait: bool,
    },

    /// Print every change until Ctrl-C or the duration elapses
    Watch {
        address: ContractAddress,

        /// Stop after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,
    },
}

/// Overrides for the oracle consumer's `update_all`; ignored by price feeds
#[derive(ClapArgs, Debug, Default)]
struct UpdateArgs {
    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    lat: Option<String>,

    #[arg(long)]
    lon: Option<String>,

    #[arg(long)]
    news_limit: Option<u32>,
}

impl UpdateArgs {
    fn into_params(self) -> Option<UpdateParams> {
        let params = UpdateParams {
            city: self.city,
            lat: self.lat,
            lon: self.lon,
            news_limit: self.news_limit,
        };
        (params != UpdateParams::default()).then_some(params)
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

async fn detect(
    client: &Arc<RpcContractClient>,
    address: &ContractAddress,
) -> anyhow::Result<ContractKind> {
    match detect_contract_kind(client.as_ref(), address).await {
        Some(kind) => {
            println!("Detected: {}", display::kind_label(kind));
            Ok(kind)
        }
        None => bail!(
            "Could not detect contract type at {address}. Make sure the address is correct and the contract is deployed."
        ),
    }
}

async fn read(
    client: Arc<RpcContractClient>,
    address: ContractAddress,
    options: SdkOptions,
    json: bool,
) -> anyhow::Result<()> {
    match detect(&client, &address).await? {
        ContractKind::OracleConsumer => {
            let sdk = OracleSdk::with_options(client, address, options);
            let status = sdk.get_status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_lines(display::oracle_status(&status));
            }
        }
        ContractKind::SimplePriceFeed => {
            let sdk = PriceFeedSdk::with_options(client, address, options);
            let data = sdk.get_price().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print_lines(display::price_data(&data));
            }
        }
    }
    Ok(())
}

async fn update(
    client: Arc<RpcContractClient>,
    address: ContractAddress,
    options: SdkOptions,
    params: Option<UpdateParams>,
    wait: bool,
) -> anyhow::Result<()> {
    if client.account().is_none() {
        bail!("An account is required for updates; pass --account or set ORACLE_ACCOUNT");
    }

    match detect(&client, &address).await? {
        ContractKind::OracleConsumer => {
            let sdk = OracleSdk::with_options(client, address, options);
            let hash = sdk.update_oracle(params).await?;
            println!("{}", display::success(format!("Update submitted: {hash}")));
            if wait {
                println!("Waiting for finalization...");
                let receipt = sdk.wait_for_finalization(&hash).await?;
                println!("{}", display::receipt(&receipt));
                print_lines(display::oracle_status(&sdk.get_status().await?));
            }
        }
        ContractKind::SimplePriceFeed => {
            let sdk = PriceFeedSdk::with_options(client, address, options);
            if wait {
                println!("Updating price and waiting for finalization...");
                let data = sdk.update_price_and_wait().await?;
                println!("{}", display::success("Price updated"));
                print_lines(display::price_data(&data));
            } else {
                let hash = sdk.update_price().await?;
                println!("{}", display::success(format!("Update submitted: {hash}")));
            }
        }
    }
    Ok(())
}

async fn wait_for_stop(duration: Option<Duration>) {
    let timer = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                debug!("Ctrl-C handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
            println!("\nInterrupted by user");
        }
        _ = timer => {
            info!("watch duration elapsed");
        }
    }
}

async fn watch(
    client: Arc<RpcContractClient>,
    address: ContractAddress,
    options: SdkOptions,
    duration: Option<Duration>,
) -> anyhow::Result<()> {
    fn banner(address: &ContractAddress, interval: Duration) {
        println!("Watching {address} every {}ms (Ctrl-C to stop)", interval.as_millis());
    }

    match detect(&client, &address).await? {
        ContractKind::OracleConsumer => {
            let sdk = OracleSdk::with_options(client, address, options);
            banner(sdk.address(), sdk.poll_interval());
            sdk.on_update(subscriber(|status: &OracleStatus| {
                print_lines(display::oracle_status(status));
                Ok(())
            }))?;
            wait_for_stop(duration).await;
            sdk.destroy();
        }
        ContractKind::SimplePriceFeed => {
            let sdk = PriceFeedSdk::with_options(client, address, options);
            banner(sdk.address(), sdk.poll_interval());
            sdk.on_update(subscriber(|data: &PriceData| {
                print_lines(display::price_data(data));
                Ok(())
            }))?;
            wait_for_stop(duration).await;
            sdk.destroy();
        }
    }
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let client = Arc::new(
        RpcContractClient::new(&args.rpc_url, args.account.clone())
            .with_context(|| format!("invalid RPC endpoint {}", args.rpc_url))?,
    );
    let options = SdkOptions {
        poll_interval_ms: args.poll_interval_ms,
        ..SdkOptions::default()
    };

    println!("\n=== Oracle Client ===");
    println!("Endpoint: {}", client.endpoint());
    if let Some(account) = &args.account {
        println!("Account: {account}");
    }

    match args.command {
        Command::Read { address, json } => read(client, address, options, json).await,
        Command::Update {
            address,
            params,
            no_wait,
        } => update(client, address, options, params.into_params(), !no_wait).await,
        Command::Watch {
            address,
            duration_secs,
        } => watch(client, address, options, duration_secs.map(Duration::from_secs)).await,
    }
}

/// Print a failed run to stderr and map it to the process exit status
fn report(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", display::failure(format!("Error: {e:#}")));
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oracle_cli=info,oracle_sdk=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    report(run(args).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_args_without_overrides_yield_none() {
        assert_eq!(UpdateArgs::default().into_params(), None);

        let params = UpdateArgs {
            city: Some("Da Nang".to_string()),
            ..UpdateArgs::default()
        }
        .into_params()
        .unwrap();
        assert_eq!(params.city.as_deref(), Some("Da Nang"));
        assert_eq!(params.news_limit, None);
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let args = Args::try_parse_from([
            "oracle-cli",
            "--account",
            "0x1111111111111111111111111111111111111111",
            "update",
            "0xe0E45EC84BB780BB1cccAc1B0CB09E507eF37147",
            "--news-limit",
            "5",
            "--no-wait",
        ])
        .unwrap();

        match args.command {
            Command::Update {
                params, no_wait, ..
            } => {
                assert!(no_wait);
                assert_eq!(params.news_limit, Some(5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_failed_run_maps_to_failure_status() {
        let failed = report(Err(anyhow::anyhow!("node unreachable")));
        assert_eq!(format!("{failed:?}"), format!("{:?}", ExitCode::FAILURE));

        let ok = report(Ok(()));
        assert_eq!(format!("{ok:?}"), format!("{:?}", ExitCode::SUCCESS));
    }

    #[test]
    fn test_cli_rejects_bad_address() {
        assert!(Args::try_parse_from(["oracle-cli", "read", "0x1234"]).is_err());
    }
}
