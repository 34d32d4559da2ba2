use std::{
    fmt,
    time::Duration,
};

use reqwest::StatusCode;
use serde::Deserialize;

use crate::history::ledger::{
    Address,
    FinishedGame,
    LedgerClient,
    LedgerError,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// `LedgerClient` backed by the HTTP JSON gateway in front of the lottery
/// contract. Every request is bounded by a client-level timeout; expiry surfaces
/// as a connectivity failure like any other transport error.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    http: reqwest::Client,
}

impl GatewayClient {
    /// Fails with `Configuration` when the base URL is empty or does not parse
    /// as an http(s) URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, LedgerError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(LedgerError::Configuration("empty gateway url".into()));
        }
        let url = reqwest::Url::parse(&base_url).map_err(|err| {
            LedgerError::Configuration(format!("invalid gateway url {base_url}: {err}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(LedgerError::Configuration(format!(
                "gateway url {base_url} is not an http(s) endpoint"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| {
                LedgerError::Configuration(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}/{path}`, decoding the JSON body. `Ok(None)` means the
    /// gateway answered 404; what that means is the endpoint's business.
    async fn get_json<Dto>(&self, path: &str) -> Result<Option<Dto>, LedgerError>
    where
        Dto: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let res = self.http.get(&url).send().await.map_err(|err| {
            LedgerError::Connectivity(format!("gateway request to {url} failed: {err}"))
        })?;
        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = res
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable body>".to_string());
            return Err(LedgerError::Connectivity(format!(
                "gateway responded with {status} for {url}: {body}"
            )));
        }
        let dto = res.json().await.map_err(|err| {
            LedgerError::Connectivity(format!("invalid gateway payload from {url}: {err}"))
        })?;
        Ok(Some(dto))
    }
}

impl fmt::Display for GatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}

impl LedgerClient for GatewayClient {
    async fn finished_game_count(&self) -> Result<u64, LedgerError> {
        let dto: Option<GameCountDto> = self.get_json("games/count").await?;
        match dto {
            Some(dto) => Ok(dto.count),
            None => Err(LedgerError::Configuration(format!(
                "gateway at {} does not serve the finished-game ledger",
                self.base_url
            ))),
        }
    }

    async fn finished_game(&self, index: u64) -> Result<FinishedGame, LedgerError> {
        let dto: Option<FinishedGameDto> = self.get_json(&format!("games/{index}")).await?;
        match dto {
            Some(dto) => Ok(dto.into()),
            None => Err(LedgerError::NotFound { index }),
        }
    }

    async fn participants(&self, index: u64) -> Result<Vec<Address>, LedgerError> {
        let list: Option<Vec<Address>> =
            self.get_json(&format!("games/{index}/participants")).await?;
        list.ok_or(LedgerError::NotFound { index })
    }

    async fn winners(&self, index: u64) -> Result<Vec<Address>, LedgerError> {
        let list: Option<Vec<Address>> =
            self.get_json(&format!("games/{index}/winners")).await?;
        list.ok_or(LedgerError::NotFound { index })
    }
}

#[derive(Deserialize)]
struct GameCountDto {
    count: u64,
}

#[derive(Deserialize)]
struct FinishedGameDto {
    lucky_number: u64,
    jackpot: u128,
    number_of_winners: u64,
    number_of_participants: u64,
    end_block: u64,
    draw_block: u64,
}

impl From<FinishedGameDto> for FinishedGame {
    fn from(dto: FinishedGameDto) -> Self {
        Self {
            lucky_number: dto.lucky_number,
            jackpot: dto.jackpot,
            number_of_winners: dto.number_of_winners,
            number_of_participants: dto.number_of_participants,
            end_block: dto.end_block,
            draw_block: dto.draw_block,
        }
    }
}
