//! UI inventory snapshots
//!
//! Ranked list of visible interactive elements, persisted as evidence and
//! used as the candidate pool for discovery clicks.

use crate::page::Page;
use journey_core::fail_open::{fail_open_sync, EvidenceGaps};
use journey_core::{redact_url, Result, UiInventoryItem};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum items kept per snapshot
pub const MAX_ITEMS: usize = 250;

/// Journey vocabulary that boosts an item's score (+3 each, text only)
pub const SCORE_KEYWORDS: [&str; 12] = [
    "leas",
    "leasing",
    "antrag",
    "weiter",
    "angebot",
    "bearbeiten",
    "checkout",
    "online",
    "konfigur",
    "partner",
    "abholung",
    "zusammenfassung",
];

/// One exported snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventorySnapshot {
    /// Page URL without query or fragment
    pub url: String,
    pub title: String,
    pub count: usize,
    pub items: Vec<UiInventoryItem>,
}

impl InventorySnapshot {
    /// Clickable items in rank order, at most `limit`
    pub fn top_candidates(&self, limit: usize) -> Vec<&UiInventoryItem> {
        self.items
            .iter()
            .filter(|item| item.is_clickable())
            .take(limit)
            .collect()
    }

    /// One-line summary of the best clickable candidates for failure messages
    pub fn summarize_candidates(&self, limit: usize) -> String {
        self.top_candidates(limit)
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                format!(
                    "{}) score={} css={} text={}",
                    idx + 1,
                    item.score,
                    item.css_path.trim(),
                    candidate_text(item)
                )
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Text, label, test id and href joined, original case
pub fn candidate_text(item: &UiInventoryItem) -> String {
    [
        Some(item.text.as_str()),
        item.aria_label.as_deref(),
        item.test_id.as_deref(),
        item.href.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Relevance score for one item
pub fn score(item: &UiInventoryItem) -> i32 {
    let mut score = 0;
    if item.tag.eq_ignore_ascii_case("button") {
        score += 6;
    }
    if item.test_id.as_deref().is_some_and(|t| !t.is_empty()) {
        score += 6;
    }
    if item.aria_label.as_deref().is_some_and(|a| !a.is_empty()) {
        score += 5;
    }
    if item.role.as_deref().is_some_and(|r| !r.is_empty()) {
        score += 2;
    }
    if item.id.as_deref().is_some_and(|i| !i.is_empty()) {
        score += 1;
    }
    let text = item.text.to_lowercase();
    score += 3 * SCORE_KEYWORDS.iter().filter(|k| text.contains(*k)).count() as i32;
    score
}

/// Score, rank and cap raw items; ties keep document order
pub fn rank(mut items: Vec<UiInventoryItem>) -> Vec<UiInventoryItem> {
    for item in items.iter_mut() {
        item.score = score(item);
    }
    items.sort_by(|a, b| b.score.cmp(&a.score));
    items.truncate(MAX_ITEMS);
    items
}

/// Take a ranked snapshot of the page
pub async fn snapshot(page: &dyn Page) -> Result<InventorySnapshot> {
    let items = rank(page.interactive_elements().await?);
    Ok(InventorySnapshot {
        url: redact_url(&page.url().await?),
        title: page.title().await?,
        count: items.len(),
        items,
    })
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn render_markdown(prefix: &str, snapshot: &InventorySnapshot) -> String {
    let mut lines = vec![
        format!("# UI Inventory ({})", prefix),
        String::new(),
        format!("- URL: {}", snapshot.url),
        format!("- Title: {}", snapshot.title),
        format!("- Visible items captured: {}", snapshot.count),
        String::new(),
        format!("## Items (first {})", MAX_ITEMS),
        String::new(),
    ];
    for (idx, item) in snapshot.items.iter().enumerate() {
        lines.push(format!(
            "{}. tag={} role={} aria-label={} data-testid={} id={} name={} text={} css={} href={}",
            idx + 1,
            item.tag,
            opt(&item.role),
            opt(&item.aria_label),
            opt(&item.test_id),
            opt(&item.id),
            opt(&item.name_attr),
            item.text,
            item.css_path,
            opt(&item.href),
        ));
    }
    lines.join("\n")
}

/// Write `<prefix>.json` and `<prefix>.md` into `dir`
pub fn write_snapshot(dir: &Path, prefix: &str, snapshot: &InventorySnapshot) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let json_path = dir.join(format!("{}.json", prefix));
    std::fs::write(&json_path, serde_json::to_string_pretty(snapshot)?)?;
    let md_path = dir.join(format!("{}.md", prefix));
    std::fs::write(&md_path, render_markdown(prefix, snapshot))?;
    info!("UI inventory exported: {}", json_path.display());
    Ok((json_path, md_path))
}

/// Snapshot the page and persist it
pub async fn export(page: &dyn Page, dir: &Path, prefix: &str) -> Result<InventorySnapshot> {
    let snapshot = snapshot(page).await?;
    write_snapshot(dir, prefix, &snapshot)?;
    Ok(snapshot)
}

/// Caps how many snapshots a run persists
///
/// Snapshots are always taken (callers need the candidates); only the
/// json/md export stops once the budget is spent.
pub struct InventoryBudget {
    dir: PathBuf,
    max: usize,
    used: usize,
    gaps: Arc<EvidenceGaps>,
}

impl InventoryBudget {
    pub fn new(dir: impl Into<PathBuf>, max: usize, gaps: Arc<EvidenceGaps>) -> Self {
        Self {
            dir: dir.into(),
            max,
            used: 0,
            gaps,
        }
    }

    pub fn remaining(&self) -> usize {
        self.max.saturating_sub(self.used)
    }

    /// Snapshot the page, persisting it as `<prefix>.json/.md` while budget remains
    ///
    /// `None` only when the page itself could not be read.
    pub async fn capture(&mut self, page: &dyn Page, prefix: &str) -> Option<InventorySnapshot> {
        let snapshot = match snapshot(page).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("UI inventory snapshot failed: {}", e);
                return None;
            }
        };
        if self.remaining() == 0 {
            debug!("UI inventory budget spent, not persisting {}", prefix);
            return Some(snapshot);
        }
        let written = write_snapshot(&self.dir, prefix, &snapshot);
        if fail_open_sync("inventory::write_snapshot", &self.gaps, written).is_some() {
            self.used += 1;
        }
        Some(snapshot)
    }
}
