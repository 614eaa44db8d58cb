//! Turns the backend's page metadata into navigation actions for a list view.

use shared::protocol::{MetaLink, PageLinks, PageMeta};
use tokio::sync::mpsc;
use tracing::debug;

const ELLIPSIS_GLYPH: char = '\u{2026}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationEvent {
    /// Navigate using a server-provided page URL.
    ChangePage(String),
    ChangePageNumber(u32),
    /// Two-way binding update of the page size.
    UpdatePerPage(u32),
    PerPageChanged(u32),
}

pub struct Pagination {
    meta: PageMeta,
    links: PageLinks,
    local_per_page: u32,
    events: mpsc::UnboundedSender<PaginationEvent>,
}

impl Pagination {
    pub fn new(
        meta: PageMeta,
        links: PageLinks,
        per_page: u32,
    ) -> (Self, mpsc::UnboundedReceiver<PaginationEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                meta,
                links,
                local_per_page: per_page,
                events,
            },
            rx,
        )
    }

    pub fn meta(&self) -> &PageMeta {
        &self.meta
    }

    pub fn links(&self) -> &PageLinks {
        &self.links
    }

    pub fn set_page(&mut self, meta: PageMeta, links: PageLinks) {
        self.meta = meta;
        self.links = links;
    }

    /// Page-number and ellipsis links; the previous/next arrows are dropped.
    pub fn filtered_links(&self) -> Vec<&MetaLink> {
        self.meta
            .links
            .iter()
            .filter(|link| {
                let label = link.label.to_lowercase();
                !label.contains("previous") && !label.contains("next")
            })
            .collect()
    }

    pub fn is_ellipsis(link: &MetaLink) -> bool {
        (link.url.is_none() && link.label == "...") || link.label.contains(ELLIPSIS_GLYPH)
    }

    pub fn go_to(&self, url: Option<&str>) {
        match url {
            Some(url) if !url.is_empty() => self.emit(PaginationEvent::ChangePage(url.to_string())),
            _ => {}
        }
    }

    /// Non-numeric labels such as ellipsis separators are ignored.
    pub fn go_to_page(&self, label: &str) {
        if let Some(page) = parse_page_label(label) {
            self.emit(PaginationEvent::ChangePageNumber(page));
        }
    }

    pub fn local_per_page(&self) -> u32 {
        self.local_per_page
    }

    /// Updates the selector value without announcing it, either from the
    /// selector itself or when the owner of the list changes the page size.
    pub fn set_local_per_page(&mut self, per_page: u32) {
        self.local_per_page = per_page;
    }

    pub fn on_per_page_change(&self) {
        self.emit(PaginationEvent::UpdatePerPage(self.local_per_page));
        self.emit(PaginationEvent::PerPageChanged(self.local_per_page));
    }

    fn emit(&self, event: PaginationEvent) {
        if self.events.send(event).is_err() {
            debug!("pagination event dropped; listener gone");
        }
    }
}

/// Leading-integer parse: surrounding text after the digits is ignored, so
/// "3" and "3 " give 3 while "abc" and "..." give nothing.
fn parse_page_label(label: &str) -> Option<u32> {
    let trimmed = label.trim_start();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits_end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    unsigned[..digits_end].parse().ok()
}

#[cfg(test)]
#[path = "tests/pagination_tests.rs"]
mod tests;
