#![allow(non_snake_case)]

use super::*;
use crate::history::ledger::Address;

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::{
    sync::Semaphore,
    task,
};

const LONG_POLL: Duration = Duration::from_secs(3600);
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    None,
    Connectivity,
    NotFound,
    Configuration,
}

impl FailureMode {
    fn as_error(self, index: u64) -> Option<LedgerError> {
        match self {
            FailureMode::None => None,
            FailureMode::Connectivity => {
                Some(LedgerError::Connectivity("ledger offline".into()))
            }
            FailureMode::NotFound => Some(LedgerError::NotFound { index }),
            FailureMode::Configuration => {
                Some(LedgerError::Configuration("no gateway configured".into()))
            }
        }
    }
}

#[derive(Default, Clone, Copy)]
struct CallCounts {
    count_reads: u64,
    game_reads: u64,
    participant_reads: u64,
    winner_reads: u64,
}

struct FakeLedgerState {
    games: Vec<FinishedGame>,
    participants: HashMap<u64, Vec<Address>>,
    winners: HashMap<u64, Vec<Address>>,
    fail_count_reads: FailureMode,
    fail_game_reads: FailureMode,
    calls: CallCounts,
}

/// In-memory ledger the tests program directly. When built gated, every count
/// read waits for one permit, so a test decides when a refresh cycle may proceed.
struct FakeLedger {
    state: Arc<Mutex<FakeLedgerState>>,
    count_gate: Option<Arc<Semaphore>>,
}

impl FakeLedger {
    fn with_games(count: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeLedgerState {
                games: (0..count).map(game).collect(),
                participants: HashMap::new(),
                winners: HashMap::new(),
                fail_count_reads: FailureMode::None,
                fail_game_reads: FailureMode::None,
                calls: CallCounts::default(),
            })),
            count_gate: None,
        }
    }

    fn gated(count: u64) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mut ledger = Self::with_games(count);
        ledger.count_gate = Some(gate.clone());
        (ledger, gate)
    }

    fn with_detail(self, index: u64, participants: &[&str], winners: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state
                .participants
                .insert(index, participants.iter().map(|s| s.to_string()).collect());
            state
                .winners
                .insert(index, winners.iter().map(|s| s.to_string()).collect());
        }
        self
    }

    fn state(&self) -> Arc<Mutex<FakeLedgerState>> {
        self.state.clone()
    }
}

impl LedgerClient for FakeLedger {
    async fn finished_game_count(&self) -> Result<u64, LedgerError> {
        if let Some(gate) = &self.count_gate {
            gate.acquire().await.unwrap().forget();
        }
        let mut state = self.state.lock().unwrap();
        state.calls.count_reads += 1;
        if let Some(err) = state.fail_count_reads.as_error(0) {
            return Err(err);
        }
        Ok(state.games.len() as u64)
    }

    async fn finished_game(&self, index: u64) -> Result<FinishedGame, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.calls.game_reads += 1;
        if let Some(err) = state.fail_game_reads.as_error(index) {
            return Err(err);
        }
        state
            .games
            .get(index as usize)
            .copied()
            .ok_or(LedgerError::NotFound { index })
    }

    async fn participants(&self, index: u64) -> Result<Vec<Address>, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.calls.participant_reads += 1;
        Ok(state.participants.get(&index).cloned().unwrap_or_default())
    }

    async fn winners(&self, index: u64) -> Result<Vec<Address>, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.calls.winner_reads += 1;
        Ok(state.winners.get(&index).cloned().unwrap_or_default())
    }
}

fn game(index: u64) -> FinishedGame {
    FinishedGame {
        lucky_number: index % 10,
        jackpot: (index as u128 + 1) * 1_000_000_000_000_000_000,
        number_of_winners: 1,
        number_of_participants: 3 + index,
        end_block: 100 + index,
        draw_block: 105 + index,
    }
}

struct PollerHarness {
    commands: mpsc::UnboundedSender<HistoryCommand>,
    events: mpsc::UnboundedReceiver<HistoryEvent>,
    worker: task::JoinHandle<()>,
}

fn spawn_poller(ledger: FakeLedger, page_size: u64) -> PollerHarness {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let poller = HistoryPoller::new(Arc::new(ledger), page_size, LONG_POLL, cmd_rx, event_tx);
    PollerHarness {
        commands: cmd_tx,
        events: event_rx,
        worker: tokio::spawn(poller.run()),
    }
}

async fn expect_page(events: &mut mpsc::UnboundedReceiver<HistoryEvent>) -> PageState {
    match time::timeout(EVENT_TIMEOUT, events.recv()).await.unwrap() {
        Some(HistoryEvent::PageReplaced(page)) => page,
        other => panic!("expected a page event, got {other:?}"),
    }
}

async fn expect_unavailable(events: &mut mpsc::UnboundedReceiver<HistoryEvent>) -> String {
    match time::timeout(EVENT_TIMEOUT, events.recv()).await.unwrap() {
        Some(HistoryEvent::GatewayUnavailable(reason)) => reason,
        other => panic!("expected an unavailable event, got {other:?}"),
    }
}

async fn expect_detail(events: &mut mpsc::UnboundedReceiver<HistoryEvent>) -> GameDetail {
    match time::timeout(EVENT_TIMEOUT, events.recv()).await.unwrap() {
        Some(HistoryEvent::DetailReady(detail)) => detail,
        other => panic!("expected a detail event, got {other:?}"),
    }
}

async fn assert_no_events(events: &mut mpsc::UnboundedReceiver<HistoryEvent>) {
    time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err());
}

fn indices(page: &PageState) -> Vec<u64> {
    page.games.iter().map(|entry| entry.index).collect()
}

#[tokio::test]
async fn run__first_tick__publishes_newest_page() {
    // given
    let mut harness = spawn_poller(FakeLedger::with_games(10), 3);

    // when
    let page = expect_page(&mut harness.events).await;

    // then
    assert_eq!(page.active_page, 1);
    assert_eq!(page.number_of_pages, 4);
    assert_eq!(page.ledger_size, 10);
    assert_eq!(indices(&page), vec![9, 8, 7]);
    assert_eq!(page.games[0].game, game(9));
}

#[tokio::test]
async fn run__empty_ledger__publishes_empty_first_page() {
    // given
    let mut harness = spawn_poller(FakeLedger::with_games(0), 6);

    // when
    let page = expect_page(&mut harness.events).await;

    // then
    assert_eq!(page.active_page, 1);
    assert_eq!(page.number_of_pages, 1);
    assert!(page.games.is_empty());
}

#[tokio::test]
async fn run__set_active_page__publishes_requested_page() {
    // given
    let mut harness = spawn_poller(FakeLedger::with_games(10), 3);
    expect_page(&mut harness.events).await;

    // when
    harness
        .commands
        .send(HistoryCommand::SetActivePage(4))
        .unwrap();
    let page = expect_page(&mut harness.events).await;

    // then the ragged last page runs down to the first game
    assert_eq!(page.active_page, 4);
    assert_eq!(indices(&page), vec![0]);
    assert_eq!(page.number_of_pages, 4);
}

#[tokio::test]
async fn run__page_change_during_refresh__discards_the_stale_result() {
    // given a first refresh already parked at its count read
    let (ledger, gate) = FakeLedger::gated(10);
    let mut harness = spawn_poller(ledger, 3);
    time::sleep(Duration::from_millis(20)).await;

    // when the page changes while that refresh is still in flight
    harness
        .commands
        .send(HistoryCommand::SetActivePage(2))
        .unwrap();
    gate.add_permits(2);

    // then the only published page is the new one; the stale result never lands
    let page = expect_page(&mut harness.events).await;
    assert_eq!(page.active_page, 2);
    assert_eq!(indices(&page), vec![6, 5, 4]);
    assert_no_events(&mut harness.events).await;
}

#[tokio::test]
async fn run__triggers_during_refresh__coalesce_into_one_rerun() {
    // given a first refresh parked at its count read
    let (ledger, gate) = FakeLedger::gated(10);
    let mut harness = spawn_poller(ledger, 3);

    // when two more refreshes are requested while it is in flight
    harness.commands.send(HistoryCommand::RefreshNow).unwrap();
    harness.commands.send(HistoryCommand::RefreshNow).unwrap();
    time::sleep(Duration::from_millis(20)).await;
    gate.add_permits(2);

    // then the in-flight result lands, followed by exactly one rerun
    let first = expect_page(&mut harness.events).await;
    let second = expect_page(&mut harness.events).await;
    assert_eq!(indices(&first), vec![9, 8, 7]);
    assert_eq!(indices(&second), vec![9, 8, 7]);
    assert_no_events(&mut harness.events).await;
}

#[tokio::test]
async fn run__game_read_fails__keeps_the_previous_page() {
    // given
    let ledger = FakeLedger::with_games(10);
    let state = ledger.state();
    let mut harness = spawn_poller(ledger, 3);
    expect_page(&mut harness.events).await;

    // when one per-index read fails for a cycle
    state.lock().unwrap().fail_game_reads = FailureMode::Connectivity;
    harness.commands.send(HistoryCommand::RefreshNow).unwrap();

    // then no page is published for that cycle
    assert_no_events(&mut harness.events).await;

    // and a later cycle recovers
    state.lock().unwrap().fail_game_reads = FailureMode::None;
    harness.commands.send(HistoryCommand::RefreshNow).unwrap();
    let page = expect_page(&mut harness.events).await;
    assert_eq!(indices(&page), vec![9, 8, 7]);
}

#[tokio::test]
async fn run__game_vanishes_mid_cycle__keeps_the_previous_page() {
    // given
    let ledger = FakeLedger::with_games(10);
    let state = ledger.state();
    let mut harness = spawn_poller(ledger, 3);
    expect_page(&mut harness.events).await;

    // when an index read comes back missing
    state.lock().unwrap().fail_game_reads = FailureMode::NotFound;
    harness.commands.send(HistoryCommand::RefreshNow).unwrap();

    // then the cycle is dropped like any other failed read
    assert_no_events(&mut harness.events).await;
}

#[tokio::test]
async fn run__misconfigured_gateway__reports_unavailable_once_until_recovery() {
    // given a ledger that fails configuration from the start
    let ledger = FakeLedger::with_games(10);
    let state = ledger.state();
    state.lock().unwrap().fail_count_reads = FailureMode::Configuration;
    let mut harness = spawn_poller(ledger, 3);

    // then the first failed cycle reports it
    let reason = expect_unavailable(&mut harness.events).await;
    assert!(reason.contains("no gateway configured"));

    // and further failed cycles stay quiet
    harness.commands.send(HistoryCommand::RefreshNow).unwrap();
    assert_no_events(&mut harness.events).await;

    // when the gateway recovers, pages flow again
    state.lock().unwrap().fail_count_reads = FailureMode::None;
    harness.commands.send(HistoryCommand::RefreshNow).unwrap();
    let page = expect_page(&mut harness.events).await;
    assert_eq!(page.active_page, 1);

    // and a fresh configuration failure is reported again
    state.lock().unwrap().fail_count_reads = FailureMode::Configuration;
    harness.commands.send(HistoryCommand::RefreshNow).unwrap();
    expect_unavailable(&mut harness.events).await;
}

#[tokio::test]
async fn run__shutdown_during_refresh__publishes_nothing_afterwards() {
    // given a refresh parked at its count read
    let (ledger, gate) = FakeLedger::gated(10);
    let mut harness = spawn_poller(ledger, 3);

    // when the poller shuts down before the refresh completes
    harness.commands.send(HistoryCommand::Shutdown).unwrap();
    time::timeout(EVENT_TIMEOUT, harness.worker)
        .await
        .unwrap()
        .unwrap();
    gate.add_permits(2);

    // then the event stream ends without a page
    let event = time::timeout(EVENT_TIMEOUT, harness.events.recv())
        .await
        .unwrap();
    assert!(event.is_none());
}

#[tokio::test]
async fn run__refresh_cycle__reads_the_count_once() {
    // given
    let ledger = FakeLedger::with_games(10);
    let state = ledger.state();
    let mut harness = spawn_poller(ledger, 3);

    // when
    expect_page(&mut harness.events).await;

    // then one count snapshot served the whole cycle
    let calls = state.lock().unwrap().calls;
    assert_eq!(calls.count_reads, 1);
    assert_eq!(calls.game_reads, 3);
}

#[tokio::test]
async fn run__detail_request__fetches_participants_lazily() {
    // given
    let ledger = FakeLedger::with_games(10).with_detail(
        7,
        &["0xaaa", "0xbbb", "0xccc"],
        &["0xbbb"],
    );
    let state = ledger.state();
    let mut harness = spawn_poller(ledger, 3);
    expect_page(&mut harness.events).await;

    // then a window refresh alone reads no participant lists
    assert_eq!(state.lock().unwrap().calls.participant_reads, 0);

    // when detail is requested for one game
    harness
        .commands
        .send(HistoryCommand::FetchDetail(7))
        .unwrap();
    let detail = expect_detail(&mut harness.events).await;

    // then exactly that game was drilled into
    assert_eq!(detail.index, 7);
    assert_eq!(detail.participants, vec!["0xaaa", "0xbbb", "0xccc"]);
    assert_eq!(detail.winners, vec!["0xbbb"]);
    let calls = state.lock().unwrap().calls;
    assert_eq!(calls.participant_reads, 1);
    assert_eq!(calls.winner_reads, 1);
}

/// Per-index reads resolving out of order must not reorder the window.
struct StaggeredLedger;

impl LedgerClient for StaggeredLedger {
    async fn finished_game_count(&self) -> Result<u64, LedgerError> {
        todo!()
    }

    async fn finished_game(&self, index: u64) -> Result<FinishedGame, LedgerError> {
        // newer games answer slower, so completions arrive oldest-first
        time::sleep(Duration::from_millis(index.saturating_sub(7) * 20)).await;
        Ok(game(index))
    }

    async fn participants(&self, _index: u64) -> Result<Vec<Address>, LedgerError> {
        todo!()
    }

    async fn winners(&self, _index: u64) -> Result<Vec<Address>, LedgerError> {
        todo!()
    }
}

#[tokio::test]
async fn fetch_window__reversed_completion_order__preserves_request_order() {
    // when
    let entries = fetch::fetch_window(&StaggeredLedger, &[9, 8, 7]).await.unwrap();

    // then
    let fetched: Vec<u64> = entries.iter().map(|entry| entry.index).collect();
    assert_eq!(fetched, vec![9, 8, 7]);
}
