use crate::ui;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use lottery_dashboard::{
    gateway_client::GatewayClient,
    history::{
        HistoryCommand,
        HistoryEvent,
        HistoryPoller,
        PageState,
    },
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{
    info,
    warn,
};

pub const DEFAULT_TESTNET_GATEWAY_URL: &str = "https://testnet-gateway.lottery.network";
pub const DEFAULT_DEVNET_GATEWAY_URL: &str = "https://devnet-gateway.lottery.network";
pub const DEFAULT_LOCAL_GATEWAY_URL: &str = "http://localhost:8080/";

/// games shown per page, three cards across
const PAGE_SIZE: u64 = 6;
const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub enum NetworkTarget {
    LocalNode { url: String },
    Devnet { url: String },
    Testnet { url: String },
}

impl NetworkTarget {
    fn gateway_url(&self) -> &str {
        match self {
            NetworkTarget::LocalNode { url } => url,
            NetworkTarget::Devnet { url } => url,
            NetworkTarget::Testnet { url } => url,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
}

/// Everything the UI renders. The page is replaced wholesale by the poller;
/// the status line carries the persistent gateway complaint, if any.
#[derive(Clone, Debug, Default)]
pub struct AppSnapshot {
    pub page: Option<PageState>,
    pub status: String,
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let gateway = GatewayClient::new(config.network.gateway_url())
        .wrap_err("building the gateway client failed")?;
    info!(gateway = %gateway, "starting dashboard");

    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(gateway, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop(
    gateway: GatewayClient,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let poller = HistoryPoller::new(
        Arc::new(gateway),
        PAGE_SIZE,
        POLL_INTERVAL,
        command_rx,
        event_tx,
    );
    let poller_handle = tokio::spawn(poller.run());

    let mut snapshot = AppSnapshot::default();
    let mut active_page: u64 = 1;
    ui::draw(ui_state, &snapshot)?;

    loop {
        tokio::select! {
            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else {
                    warn!("history poller channel closed");
                    break;
                };
                match event {
                    HistoryEvent::PageReplaced(page) => {
                        active_page = page.active_page;
                        snapshot.status.clear();
                        snapshot.page = Some(page);
                        ui::draw(ui_state, &snapshot)
                            .wrap_err("draw after page refresh failed")?;
                    }
                    HistoryEvent::DetailReady(detail) => {
                        ui::detail_ready(ui_state, detail);
                        ui::draw(ui_state, &snapshot)
                            .wrap_err("draw after detail fetch failed")?;
                    }
                    HistoryEvent::GatewayUnavailable(message) => {
                        snapshot.status = message;
                        ui::draw(ui_state, &snapshot)
                            .wrap_err("draw after gateway error failed")?;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::NextPage => {
                        let pages = snapshot.page.as_ref().map_or(1, |p| p.number_of_pages);
                        if active_page < pages {
                            active_page += 1;
                            let _ = command_tx.send(HistoryCommand::SetActivePage(active_page));
                        }
                    }
                    ui::UserEvent::PrevPage => {
                        if active_page > 1 {
                            active_page -= 1;
                            let _ = command_tx.send(HistoryCommand::SetActivePage(active_page));
                        }
                    }
                    ui::UserEvent::ShowDetail { index } => {
                        let _ = command_tx.send(HistoryCommand::FetchDetail(index));
                        ui::draw(ui_state, &snapshot)
                            .wrap_err("draw after opening game detail failed")?;
                    }
                    ui::UserEvent::Refresh => {
                        let _ = command_tx.send(HistoryCommand::RefreshNow);
                    }
                    ui::UserEvent::Redraw => {
                        ui::draw(ui_state, &snapshot)
                            .wrap_err("draw after input failed")?;
                    }
                }
            }
        }
    }

    let _ = command_tx.send(HistoryCommand::Shutdown);
    if let Err(err) = poller_handle.await {
        return Err(eyre!(err)).wrap_err("history poller panicked");
    }
    Ok(())
}
