use std::{
    sync::Arc,
    time::Duration,
};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time,
};
use tracing::{
    debug,
    warn,
};

use crate::history::ledger::{
    FinishedGame,
    GameDetail,
    LedgerClient,
    LedgerError,
};

pub mod ledger;
pub mod window;

mod fetch;

#[cfg(test)]
mod tests;

/// One game on the displayed page, tagged with its ledger index.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct PageEntry {
    pub index: u64,
    pub game: FinishedGame,
}

/// The displayed page. Rebuilt from a single ledger-size snapshot on every
/// successful refresh and only ever replaced wholesale.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct PageState {
    pub ledger_size: u64,
    pub active_page: u64,
    pub number_of_pages: u64,
    /// games on this page, newest first
    pub games: Vec<PageEntry>,
}

#[derive(Debug)]
pub enum HistoryCommand {
    SetActivePage(u64),
    RefreshNow,
    FetchDetail(u64),
    Shutdown,
}

#[derive(Debug)]
pub enum HistoryEvent {
    PageReplaced(PageState),
    DetailReady(GameDetail),
    GatewayUnavailable(String),
}

type RefreshOutcome = (u64, Result<PageState, LedgerError>);

/// Timer-driven refresher for the finished-game history.
///
/// At most one refresh is in flight at a time. Triggers arriving while one is in
/// flight coalesce into a single rerun issued on completion with the latest active
/// page. Every refresh carries a sequence number; a completion whose number is no
/// longer the latest is discarded, so a page change can never be overwritten by a
/// slow fetch of the page it left.
pub struct HistoryPoller<Ledger> {
    ledger: Arc<Ledger>,
    page_size: u64,
    poll_interval: Duration,
    commands: mpsc::UnboundedReceiver<HistoryCommand>,
    events: mpsc::UnboundedSender<HistoryEvent>,
    active_page: u64,
    latest_seq: u64,
    rerun_queued: bool,
    unavailable_reported: bool,
}

impl<Ledger> HistoryPoller<Ledger> {
    pub fn new(
        ledger: Arc<Ledger>,
        page_size: u64,
        poll_interval: Duration,
        commands: mpsc::UnboundedReceiver<HistoryCommand>,
        events: mpsc::UnboundedSender<HistoryEvent>,
    ) -> Self {
        Self {
            ledger,
            page_size,
            poll_interval,
            commands,
            events,
            active_page: 1,
            latest_seq: 0,
            rerun_queued: false,
            unavailable_reported: false,
        }
    }
}

impl<Ledger> HistoryPoller<Ledger>
where
    Ledger: LedgerClient + Send + Sync + 'static,
{
    pub async fn run(mut self) {
        let mut ticker = time::interval(self.poll_interval);
        let mut in_flight: Option<JoinHandle<RefreshOutcome>> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.trigger_refresh(&mut in_flight);
                }
                outcome = async { in_flight.as_mut().expect("in-flight refresh").await },
                    if in_flight.is_some() =>
                {
                    in_flight = None;
                    match outcome {
                        Ok((seq, result)) => self.complete_refresh(seq, result),
                        Err(err) => warn!(?err, "refresh task failed"),
                    }
                    if self.rerun_queued {
                        self.rerun_queued = false;
                        in_flight = Some(self.issue_refresh());
                    }
                }
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else {
                        break;
                    };
                    match cmd {
                        HistoryCommand::SetActivePage(page) => {
                            self.active_page = page.max(1);
                            // whatever is in flight now answers for a stale page
                            self.latest_seq += 1;
                            self.trigger_refresh(&mut in_flight);
                        }
                        HistoryCommand::RefreshNow => {
                            self.trigger_refresh(&mut in_flight);
                        }
                        HistoryCommand::FetchDetail(index) => {
                            self.spawn_detail_fetch(index);
                        }
                        HistoryCommand::Shutdown => break,
                    }
                }
            }
        }

        if let Some(task) = in_flight {
            task.abort();
        }
    }

    fn trigger_refresh(&mut self, in_flight: &mut Option<JoinHandle<RefreshOutcome>>) {
        if in_flight.is_none() {
            *in_flight = Some(self.issue_refresh());
        } else {
            self.rerun_queued = true;
        }
    }

    fn issue_refresh(&mut self) -> JoinHandle<RefreshOutcome> {
        self.latest_seq += 1;
        let seq = self.latest_seq;
        let ledger = Arc::clone(&self.ledger);
        let page_size = self.page_size;
        let page = self.active_page;
        tokio::spawn(async move {
            (
                seq,
                fetch::refresh_page(ledger.as_ref(), page_size, page).await,
            )
        })
    }

    fn complete_refresh(&mut self, seq: u64, result: Result<PageState, LedgerError>) {
        if seq != self.latest_seq {
            debug!(seq, latest = self.latest_seq, "discarding superseded refresh");
            return;
        }
        match result {
            Ok(page) => {
                self.unavailable_reported = false;
                let _ = self.events.send(HistoryEvent::PageReplaced(page));
            }
            Err(err @ LedgerError::Configuration(_)) => {
                warn!(?err, "history refresh failed");
                if !self.unavailable_reported {
                    self.unavailable_reported = true;
                    let _ = self
                        .events
                        .send(HistoryEvent::GatewayUnavailable(err.to_string()));
                }
            }
            Err(err) => {
                // connectivity or a count/fetch race: keep the previous page, the
                // next tick retries
                warn!(?err, "history refresh failed");
            }
        }
    }

    fn spawn_detail_fetch(&self, index: u64) {
        let ledger = Arc::clone(&self.ledger);
        let events = self.events.clone();
        tokio::spawn(async move {
            match fetch::fetch_detail(ledger.as_ref(), index).await {
                Ok(detail) => {
                    let _ = events.send(HistoryEvent::DetailReady(detail));
                }
                Err(err) => warn!(index, ?err, "game detail fetch failed"),
            }
        });
    }
}
