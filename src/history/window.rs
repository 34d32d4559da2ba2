/// The slice of ledger indices shown on one page, plus the page count derived from
/// the same ledger size so the two can never disagree.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct PageWindow {
    /// ledger indices on this page, newest first
    pub indices: Vec<u64>,
    pub number_of_pages: u64,
}

/// Maps a ledger size onto the window of indices shown on one page.
///
/// Games sit oldest-first at indices `0..ledger_size`; pages present them
/// newest-first. The last page is ragged when `ledger_size` is not a multiple of
/// `page_size` and runs all the way down to index 0 instead of stopping short. A
/// page entirely beyond the ledger yields an empty window.
pub fn compute_window(ledger_size: u64, page_size: u64, active_page: u64) -> PageWindow {
    assert!(page_size > 0, "page_size must be positive");

    let number_of_pages = ledger_size.div_ceil(page_size).max(1);

    let skipped = active_page.saturating_sub(1).saturating_mul(page_size);
    if skipped >= ledger_size {
        return PageWindow {
            indices: Vec::new(),
            number_of_pages,
        };
    }

    let head = ledger_size - 1 - skipped;
    let mut tail = head.saturating_sub(page_size - 1);

    let on_ragged_last_page =
        ledger_size < active_page.saturating_mul(page_size) && ledger_size % page_size != 0;
    if on_ragged_last_page {
        tail = 0;
    }

    PageWindow {
        indices: (tail..=head).rev().collect(),
        number_of_pages,
    }
}
