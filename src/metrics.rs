use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageMetrics {
    pub page_number: usize,
    /// Item rows placed on the page; each half of a split item counts once.
    pub item_pieces: usize,
    pub command_count: usize,
    pub content_bytes: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationMetrics {
    pub pages: Vec<PageMetrics>,
    pub items_placed: usize,
    pub splits: usize,
    pub skipped_items: usize,
    pub pictographs_rasterized: usize,
    pub layout_ms: f64,
    pub total_ms: f64,
    pub total_bytes: usize,
}

impl GenerationMetrics {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// What a generation produced besides the PDF bytes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub metrics: GenerationMetrics,
    /// Degraded paths taken: skipped items, unrenderable pictographs, a failed
    /// attachment.
    pub warnings: Vec<String>,
    /// SHA-256 of the embedded canonical JSON, when attaching succeeded.
    pub attachment_sha256: Option<String>,
}
