use color_eyre::eyre::{
    Result,
    eyre,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;

mod client;
mod ui;

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: lottery-dashboard [--local | --devnet | --testnet] [--gateway-url <url>]\n\
         \n\
         Flags:\n\
           --local             Watch a local gateway (default {})\n\
           --devnet            Watch the devnet gateway (default {})\n\
           --testnet           Watch the testnet gateway (default {})\n\
           --gateway-url <url> Override the gateway URL for the selected network",
        client::DEFAULT_LOCAL_GATEWAY_URL,
        client::DEFAULT_DEVNET_GATEWAY_URL,
        client::DEFAULT_TESTNET_GATEWAY_URL,
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<client::AppConfig> {
    #[derive(Clone, Copy)]
    enum NetworkFlag {
        Local,
        Devnet,
        Testnet,
    }

    let mut args = std::env::args().skip(1);
    let mut network_flag: Option<NetworkFlag> = None;
    let mut custom_url: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--local" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --local/--devnet/--testnet"
                    ));
                }
                network_flag = Some(NetworkFlag::Local);
            }
            "--devnet" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --local/--devnet/--testnet"
                    ));
                }
                network_flag = Some(NetworkFlag::Devnet);
            }
            "--testnet" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --local/--devnet/--testnet"
                    ));
                }
                network_flag = Some(NetworkFlag::Testnet);
            }
            "--gateway-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--gateway-url requires a URL argument"))?;
                if custom_url.is_some() {
                    return Err(eyre!("--gateway-url may only be specified once"));
                }
                if network_flag.is_none() {
                    return Err(eyre!(
                        "--gateway-url must follow a network flag (--local/--devnet/--testnet)"
                    ));
                }
                custom_url = Some(url);
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let network = match network_flag {
        None => {
            return Err(eyre!(
                "Select a network with --local, --devnet, or --testnet"
            ));
        }
        Some(NetworkFlag::Local) => client::NetworkTarget::LocalNode {
            url: custom_url
                .unwrap_or_else(|| client::DEFAULT_LOCAL_GATEWAY_URL.to_string()),
        },
        Some(NetworkFlag::Devnet) => client::NetworkTarget::Devnet {
            url: custom_url
                .unwrap_or_else(|| client::DEFAULT_DEVNET_GATEWAY_URL.to_string()),
        },
        Some(NetworkFlag::Testnet) => client::NetworkTarget::Testnet {
            url: custom_url
                .unwrap_or_else(|| client::DEFAULT_TESTNET_GATEWAY_URL.to_string()),
        },
    };

    Ok(client::AppConfig { network })
}

// The terminal belongs to the TUI, so logs go to a daily-rolled file instead.
// The guard flushes buffered lines on drop and must outlive the app.
fn init_logging() -> WorkerGuard {
    let file_appender = rolling::daily("logs", "lottery-dashboard.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lottery_dashboard=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _log_guard = init_logging();
    let app_config = parse_cli_args()?;
    client::run_app(app_config).await
}
