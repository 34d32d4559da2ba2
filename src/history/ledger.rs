use thiserror::Error;

pub type Address = String;

/// One completed lottery round as recorded on the ledger. Immutable once written;
/// identified by its ledger index (0 = first game ever finished).
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct FinishedGame {
    pub lucky_number: u64,
    /// jackpot in the smallest currency unit (18 decimals)
    pub jackpot: u128,
    pub number_of_winners: u64,
    pub number_of_participants: u64,
    pub end_block: u64,
    pub draw_block: u64,
}

/// Drill-down data for a single game, fetched only on request.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct GameDetail {
    pub index: u64,
    pub participants: Vec<Address>,
    pub winners: Vec<Address>,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    /// a read failed or timed out; a later poll tick may succeed
    #[error("ledger read failed: {0}")]
    Connectivity(String),

    /// the requested index is outside `[0, count)`
    #[error("no finished game at index {index}")]
    NotFound { index: u64 },

    /// the gateway is unusable as configured
    #[error("ledger gateway unavailable: {0}")]
    Configuration(String),
}

/// Read-only capability over the contract's finished-game ledger.
pub trait LedgerClient {
    /// total number of finished games recorded so far
    fn finished_game_count(&self) -> impl Future<Output = Result<u64, LedgerError>> + Send;

    /// finished game at the given ledger index
    fn finished_game(
        &self,
        index: u64,
    ) -> impl Future<Output = Result<FinishedGame, LedgerError>> + Send;

    fn participants(
        &self,
        index: u64,
    ) -> impl Future<Output = Result<Vec<Address>, LedgerError>> + Send;

    fn winners(
        &self,
        index: u64,
    ) -> impl Future<Output = Result<Vec<Address>, LedgerError>> + Send;
}
