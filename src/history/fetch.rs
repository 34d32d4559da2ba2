use futures::future::try_join_all;

use super::{
    PageEntry,
    PageState,
    ledger::{
        GameDetail,
        LedgerClient,
        LedgerError,
    },
    window::compute_window,
};

/// Retrieves every game in the window concurrently, preserving the newest-first
/// input order. A single failed read fails the whole window.
pub(super) async fn fetch_window<Ledger: LedgerClient>(
    ledger: &Ledger,
    indices: &[u64],
) -> Result<Vec<PageEntry>, LedgerError> {
    let fetches = indices.iter().map(|&index| async move {
        let game = ledger.finished_game(index).await?;
        Ok(PageEntry { index, game })
    });
    try_join_all(fetches).await
}

/// One full refresh cycle: a single count snapshot, the window derived from it, and
/// the per-index fetches for that same snapshot.
pub(super) async fn refresh_page<Ledger: LedgerClient>(
    ledger: &Ledger,
    page_size: u64,
    active_page: u64,
) -> Result<PageState, LedgerError> {
    let ledger_size = ledger.finished_game_count().await?;
    let window = compute_window(ledger_size, page_size, active_page);
    let games = fetch_window(ledger, &window.indices).await?;
    Ok(PageState {
        ledger_size,
        active_page,
        number_of_pages: window.number_of_pages,
        games,
    })
}

pub(super) async fn fetch_detail<Ledger: LedgerClient>(
    ledger: &Ledger,
    index: u64,
) -> Result<GameDetail, LedgerError> {
    let (participants, winners) =
        tokio::try_join!(ledger.participants(index), ledger.winners(index))?;
    Ok(GameDetail {
        index,
        participants,
        winners,
    })
}
