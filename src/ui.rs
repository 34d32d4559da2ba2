use crate::client::AppSnapshot;
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEvent,
        KeyEventKind,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use lottery_dashboard::history::{
    PageEntry,
    ledger::GameDetail,
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;

pub enum UserEvent {
    Quit,
    NextPage,
    PrevPage,
    ShowDetail { index: u64 },
    Refresh,
    Redraw,
}

#[derive(Debug)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
    /// cursor into the displayed page, 0 = newest card
    selected: usize,
    page_games: Vec<PageEntry>,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            mode: Mode::Normal,
            terminal: None,
            selected: 0,
            page_games: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default)]
enum Mode {
    #[default]
    Normal,
    GameDetail(DetailState),
    QuitModal,
}

#[derive(Clone, Debug)]
struct DetailState {
    entry: PageEntry,
    /// None until the participant fetch answers
    detail: Option<GameDetail>,
}

pub type InputEventReceiver = EventStream;

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(input: &mut InputEventReceiver) -> Result<Event> {
    match input.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    // Create a single persistent Terminal to preserve buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    // keep cache of the displayed page for selection and detail interactions
    state.page_games = snap
        .page
        .as_ref()
        .map(|page| page.games.clone())
        .unwrap_or_default();
    // prune the cursor when the new page is shorter
    if state.page_games.is_empty() {
        state.selected = 0;
    } else {
        state.selected = state.selected.min(state.page_games.len() - 1);
    }
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

/// Fill the open detail modal. Answers for a game the modal no longer shows are
/// dropped here.
pub fn detail_ready(state: &mut UiState, detail: GameDetail) {
    if let Mode::GameDetail(ds) = &mut state.mode {
        if ds.entry.index == detail.index {
            ds.detail = Some(detail);
        }
    }
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    match event {
        Event::Key(key) => interpret_key(state, key),
        Event::Resize(_, _) => Some(UserEvent::Redraw),
        _ => None,
    }
}

fn interpret_key(state: &mut UiState, key: KeyEvent) -> Option<UserEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match &mut state.mode {
        Mode::GameDetail(_) => match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::QuitModal => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Right => Some(UserEvent::NextPage),
            KeyCode::Left => Some(UserEvent::PrevPage),
            KeyCode::Down => {
                if !state.page_games.is_empty() {
                    state.selected = (state.selected + 1).min(state.page_games.len() - 1);
                }
                Some(UserEvent::Redraw)
            }
            KeyCode::Up => {
                state.selected = state.selected.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let entry = state.page_games.get(state.selected).copied()?;
                let index = entry.index;
                state.mode = Mode::GameDetail(DetailState {
                    entry,
                    detail: None,
                });
                Some(UserEvent::ShowDetail { index })
            }
            KeyCode::Char('r') => Some(UserEvent::Refresh),
            _ => None,
        },
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    // Clear the whole frame to avoid leftover fragments
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // ledger overview
            Constraint::Min(10),   // game cards
            Constraint::Length(3), // pagination
            Constraint::Length(6), // status + help
        ])
        .split(f.area());

    draw_top(f, chunks[0], snap);
    draw_cards(f, chunks[1], state, snap);
    draw_pagination(f, chunks[2], snap);
    draw_bottom(f, chunks[3], snap);
    draw_modals(f, state);
}

fn draw_top(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let line = match &snap.page {
        Some(page) => format!(
            "Finished games: {} | Page {} of {}",
            page.ledger_size, page.active_page, page.number_of_pages
        ),
        None => String::from("Waiting for the first gateway snapshot..."),
    };
    let overview = Paragraph::new(line)
        .block(Block::default().borders(Borders::ALL).title("Lottery History"));
    f.render_widget(overview, area);
}

fn draw_cards(f: &mut Frame, area: Rect, state: &UiState, snap: &AppSnapshot) {
    let games = &state.page_games;
    if games.is_empty() {
        let text = match &snap.page {
            Some(_) => "No finished games on this page",
            None => "Connecting...",
        };
        let empty = Paragraph::new(text)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(empty, area);
        return;
    }

    // Three cards per row, newest game in the top-left corner
    let cols: u16 = 3;
    let rows = games.len().div_ceil(cols as usize) as u16;
    let col_w = area.width / cols;
    let row_h = area.height / rows;
    for (i, entry) in games.iter().enumerate() {
        let c = i as u16 % cols;
        let r = i as u16 / cols;
        let rect = Rect::new(area.x + c * col_w, area.y + r * row_h, col_w, row_h);
        let selected = i == state.selected;
        let lines = vec![
            Line::from(format!("Lucky number: {}", entry.game.lucky_number)),
            Line::from(format!("Jackpot: {} coins", format_coins(entry.game.jackpot))),
            Line::from(format!(
                "Winners: {}   Participants: {}",
                entry.game.number_of_winners, entry.game.number_of_participants
            )),
            Line::from(format!(
                "End block #{}   Draw block #{}",
                entry.game.end_block, entry.game.draw_block
            )),
        ];
        let block = Block::default().borders(Borders::ALL).title(Span::styled(
            format!("Game {}", entry.index),
            if selected {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            },
        ));
        f.render_widget(&block, rect);
        f.render_widget(Paragraph::new(lines), block.inner(rect));
    }
}

fn draw_pagination(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let text = match &snap.page {
        Some(page) => page_bar(page.active_page, page.number_of_pages),
        None => String::new(),
    };
    let bar = Paragraph::new(text)
        .centered()
        .block(Block::default().borders(Borders::ALL).title("Page"));
    f.render_widget(bar, area);
}

// at most nine numbered slots, kept centered on the active page
fn page_bar(active_page: u64, number_of_pages: u64) -> String {
    let slots = 9u64;
    let last = active_page
        .saturating_sub(slots / 2)
        .max(1)
        .saturating_add(slots - 1)
        .min(number_of_pages);
    let first = last.saturating_sub(slots - 1).max(1);
    let mut parts = Vec::new();
    if first > 1 {
        parts.push(String::from(".."));
    }
    for page in first..=last {
        if page == active_page {
            parts.push(format!("[{page}]"));
        } else {
            parts.push(page.to_string());
        }
    }
    if last < number_of_pages {
        parts.push(String::from(".."));
    }
    parts.join(" ")
}

fn draw_bottom(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(3)])
        .split(area);

    let mut lines: Vec<Line> = Vec::new();
    if snap.status.is_empty() {
        lines.push(Line::from("No errors"));
    } else {
        lines.push(Line::from(snap.status.clone()));
    }
    let color = if snap.page.is_none() {
        // nothing fetched yet, keep neutral
        Color::DarkGray
    } else if snap.status.is_empty() {
        Color::Green
    } else {
        Color::Red
    };
    let status = Paragraph::new(lines)
        .style(Style::default().fg(color))
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, chunks[0]);

    let help = Paragraph::new(
        "←/→ page | ↑/↓ select | Enter details | r refresh | q/Esc quit",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, chunks[1]);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    match &state.mode {
        Mode::GameDetail(ds) => {
            let area = centered_rect(60, 60, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .title(format!("Game {}", ds.entry.index));
            let game = &ds.entry.game;
            let mut lines = vec![
                Line::from(format!("Lucky number: {}", game.lucky_number)),
                Line::from(format!("Jackpot: {} coins", format_coins(game.jackpot))),
                Line::from(format!(
                    "End block #{}   Draw block #{}",
                    game.end_block, game.draw_block
                )),
                Line::from(""),
            ];
            match &ds.detail {
                None => lines.push(Line::styled(
                    "Loading participants...",
                    Style::default().fg(Color::DarkGray),
                )),
                Some(detail) => {
                    lines.push(Line::from(format!("Winners ({}):", detail.winners.len())));
                    for winner in &detail.winners {
                        lines.push(Line::styled(
                            format!("  {}", short_address(winner)),
                            Style::default().fg(Color::Yellow),
                        ));
                    }
                    if detail.winners.is_empty() {
                        lines.push(Line::from("  None"));
                    }
                    lines.push(Line::from(format!(
                        "Participants ({}):",
                        detail.participants.len()
                    )));
                    for participant in detail.participants.iter().take(12) {
                        lines.push(Line::from(format!("  {}", short_address(participant))));
                    }
                    let hidden = detail.participants.len().saturating_sub(12);
                    if hidden > 0 {
                        lines.push(Line::from(format!("  ... and {hidden} more")));
                    }
                    if detail.participants.is_empty() {
                        lines.push(Line::from("  None"));
                    }
                }
            }
            lines.push(Line::from(""));
            lines.push(Line::from("Esc=close"));
            f.render_widget(Clear, area);
            f.render_widget(&block, area);
            f.render_widget(Paragraph::new(lines), block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit the dashboard? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(&block, area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}

const COIN: u128 = 1_000_000_000_000_000_000;

// Jackpots are stored in the smallest unit; show whole coins with up to four
// decimal places, trailing zeros trimmed.
fn format_coins(amount: u128) -> String {
    let whole = amount / COIN;
    let frac = (amount % COIN) / 100_000_000_000_000;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{frac:04}");
    let digits = digits.trim_end_matches('0');
    format!("{whole}.{digits}")
}

fn short_address(address: &str) -> String {
    match (address.get(..6), address.get(address.len().saturating_sub(4)..)) {
        (Some(head), Some(tail)) if address.len() > 12 => format!("{head}..{tail}"),
        _ => address.to_string(),
    }
}
