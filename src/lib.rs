mod canvas;
mod chrome;
mod config;
mod debug;
mod emoji;
mod error;
mod font;
mod item_row;
mod labels;
mod metrics;
mod package;
mod paginate;
mod pdf;
mod primitives;
mod raster;
mod style;
mod tokenize;
mod types;
mod wrap;

pub use canvas::{Canvas, Command, Page, RasterImage, RenderedDocument};
pub use chrome::FOOTER_META_KEY;
pub use config::{DEFAULT_LINK_URL, LayoutConfig};
use debug::DebugLogger;
pub use emoji::PICTOGRAPH_META_KEY;
use emoji::GlyphCache;
pub use error::{ExtractError, ExtractErrorKind, MenuPdfError};
pub use font::FontFace;
pub use item_row::ITEM_META_KEY;
pub use labels::Labels;
pub use metrics::{GenerationMetrics, GenerationReport, PageMetrics};
pub use package::{Packaged, attach_document, extract_embedded_document};
use paginate::{LayoutOutcome, layout_document};
use pdf::{PdfMetadata, build_pdf, save_pdf};
pub use pdf::PRODUCER;
use primitives::LayoutEnv;
pub use raster::{FontGlyphRasterizer, GlyphRasterizer, PlaceholderRasterizer};
pub use relmenu_document::{
    ATTACHMENT_NAME, Document, DocumentParseError, Item, Note, Rgb, Run, SCHEMA_VERSION, Section,
    Status,
};
pub use style::{MarkerGlyph, StatusStyle, StyleRegistry};
pub use types::{Color, Margins, Pt, Rect, Size};

use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Renders relationship menus to paginated PDF. One engine can serve many
/// documents, also from several threads at once.
pub struct MenuPdf {
    layout: LayoutConfig,
    styles: StyleRegistry,
    rasterizer: Arc<dyn GlyphRasterizer>,
    debug: Option<Arc<DebugLogger>>,
    document_title: Option<String>,
}

#[derive(Clone)]
pub struct MenuPdfBuilder {
    layout: LayoutConfig,
    styles: StyleRegistry,
    rasterizer: Option<Arc<dyn GlyphRasterizer>>,
    emoji_font_file: Option<PathBuf>,
    debug_path: Option<PathBuf>,
    document_title: Option<String>,
}

/// Everything one generation produced before serialization.
struct Generation {
    outcome: LayoutOutcome,
    pictographs_rasterized: usize,
    pictograph_failures: Vec<String>,
    layout_ms: f64,
}

impl MenuPdf {
    pub fn builder() -> MenuPdfBuilder {
        MenuPdfBuilder::new()
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = self.debug.as_deref() {
            logger.emit_summary(context);
            logger.flush();
        }
    }

    fn lay_out(&self, document: &Document) -> Generation {
        let start = Instant::now();
        // Images are registered on the canvas the first time a cluster is drawn,
        // so the cache must not outlive the canvas it registered them on.
        let glyphs = GlyphCache::new(Arc::clone(&self.rasterizer), self.layout.emoji_raster_px);
        let env = LayoutEnv {
            config: &self.layout,
            styles: &self.styles,
            labels: Labels::for_language(&document.language),
            glyphs: &glyphs,
        };
        let outcome = layout_document(document, env, self.debug.as_deref());
        Generation {
            outcome,
            pictographs_rasterized: glyphs.rasterized_count(),
            pictograph_failures: glyphs.failures(),
            layout_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }

    /// Runs layout only and returns the recorded pages.
    pub fn render_to_pages(&self, document: &Document) -> RenderedDocument {
        let generation = self.lay_out(document);
        self.emit_debug_summary("render_to_pages");
        generation.outcome.document
    }

    pub fn render_to_buffer(&self, document: &Document) -> Result<Vec<u8>, MenuPdfError> {
        self.render_with_report(document).map(|(bytes, _)| bytes)
    }

    pub fn render_to_file(
        &self,
        document: &Document,
        path: impl AsRef<Path>,
    ) -> Result<GenerationReport, MenuPdfError> {
        let (bytes, report) = self.render_with_report(document)?;
        std::fs::write(path, bytes)?;
        Ok(report)
    }

    /// Renders, attaches the source document and serializes. A failed attachment
    /// still yields a PDF; the reason is listed in the report's warnings.
    pub fn render_with_report(
        &self,
        document: &Document,
    ) -> Result<(Vec<u8>, GenerationReport), MenuPdfError> {
        let result = self.generate_with_report(document);
        self.emit_debug_summary("render_with_report");
        result
    }

    fn generate_with_report(
        &self,
        document: &Document,
    ) -> Result<(Vec<u8>, GenerationReport), MenuPdfError> {
        let start = Instant::now();
        let generation = self.lay_out(document);
        let rendered = &generation.outcome.document;

        let labels = Labels::for_language(&document.language);
        let language = match document.language.trim() {
            "" => labels.language,
            tag => tag,
        };
        let meta = PdfMetadata {
            title: self.document_title.as_deref().unwrap_or(labels.title),
            language,
            created_ms: document.timestamp,
        };
        let mut output = build_pdf(rendered, &meta)?;

        let mut warnings = generation.outcome.skipped.clone();
        warnings.extend(
            generation
                .pictograph_failures
                .iter()
                .map(|cluster| format!("pictograph {cluster:?} could not be rendered; drawn as a box")),
        );

        let attachment_sha256 = match package::attach_to(&mut output.document, document) {
            Ok(sha256) => {
                self.debug_event("package.attach", json!({"ok": true, "sha256": sha256}));
                Some(sha256)
            }
            Err(err) => {
                let warning = format!("{ATTACHMENT_NAME} not attached: {err}");
                log::warn!("{warning}");
                self.debug_event("package.attach", json!({"ok": false, "error": err.to_string()}));
                warnings.push(warning);
                None
            }
        };
        let bytes = save_pdf(&mut output.document)?;

        let pages = rendered
            .pages
            .iter()
            .enumerate()
            .map(|(index, page)| PageMetrics {
                page_number: index + 1,
                item_pieces: page.meta_values(ITEM_META_KEY).count(),
                command_count: page.commands.len(),
                content_bytes: output.content_bytes.get(index).copied().unwrap_or(0),
            })
            .collect();
        let metrics = GenerationMetrics {
            pages,
            items_placed: generation.outcome.items_placed,
            splits: generation.outcome.splits,
            skipped_items: generation.outcome.skipped.len(),
            pictographs_rasterized: generation.pictographs_rasterized,
            layout_ms: generation.layout_ms,
            total_ms: start.elapsed().as_secs_f64() * 1000.0,
            total_bytes: bytes.len(),
        };
        log::debug!(
            "rendered {} page(s), {} of {} item(s), {} split(s) in {:.1}ms",
            metrics.page_count(),
            metrics.items_placed,
            document.item_count(),
            metrics.splits,
            metrics.total_ms
        );
        if let Some(logger) = self.debug.as_deref() {
            if let Ok(value) = serde_json::to_value(&metrics) {
                logger.event("generation.metrics", value);
            }
        }
        Ok((
            bytes,
            GenerationReport {
                metrics,
                warnings,
                attachment_sha256,
            },
        ))
    }

    /// Renders each document on the rayon pool. Results keep the input order.
    pub fn render_many_parallel(&self, documents: &[Document]) -> Vec<Result<Vec<u8>, MenuPdfError>> {
        use rayon::prelude::*;

        let mut results: Vec<(usize, Result<Vec<u8>, MenuPdfError>)> = documents
            .par_iter()
            .enumerate()
            .map(|(idx, document)| {
                let result = self.generate_with_report(document).map(|(bytes, _)| bytes);
                (idx, result)
            })
            .collect();
        results.sort_by_key(|(idx, _)| *idx);
        self.emit_debug_summary("render_many_parallel");
        results.into_iter().map(|(_, result)| result).collect()
    }

    fn debug_event(&self, event: &str, fields: serde_json::Value) {
        if let Some(logger) = self.debug.as_deref() {
            logger.event(event, fields);
        }
    }
}

impl Default for MenuPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MenuPdfBuilder {
    pub fn new() -> Self {
        Self {
            layout: LayoutConfig::default(),
            styles: StyleRegistry::standard(),
            rasterizer: None,
            emoji_font_file: None,
            debug_path: None,
            document_title: None,
        }
    }

    pub fn layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Applies a JSON layout override on top of the defaults.
    pub fn layout_json(mut self, raw: &str) -> Result<Self, MenuPdfError> {
        self.layout = LayoutConfig::from_json_str(raw)?;
        Ok(self)
    }

    pub fn styles(mut self, styles: StyleRegistry) -> Self {
        self.styles = styles;
        self
    }

    pub fn glyph_rasterizer(mut self, rasterizer: Arc<dyn GlyphRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    /// Rasterizes pictographs from this font file instead of placeholder discs.
    pub fn emoji_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.emoji_font_file = Some(path.into());
        self
    }

    /// Writes a JSONL trace of layout and packaging decisions to `path`.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    /// Overrides the localized title in the PDF Info dictionary.
    pub fn document_title(mut self, title: impl Into<String>) -> Self {
        self.document_title = Some(title.into());
        self
    }

    pub fn build(self) -> Result<MenuPdf, MenuPdfError> {
        self.layout.validate()?;
        let rasterizer: Arc<dyn GlyphRasterizer> = match (self.rasterizer, self.emoji_font_file) {
            (Some(_), Some(_)) => {
                return Err(MenuPdfError::InvalidConfiguration(
                    "glyph_rasterizer and emoji_font_file are mutually exclusive".to_string(),
                ));
            }
            (Some(rasterizer), None) => rasterizer,
            (None, Some(path)) => Arc::new(FontGlyphRasterizer::from_file(path)?),
            (None, None) => Arc::new(PlaceholderRasterizer),
        };
        let debug = match self.debug_path {
            Some(path) => Some(Arc::new(DebugLogger::new(path)?)),
            None => None,
        };
        Ok(MenuPdf {
            layout: self.layout,
            styles: self.styles,
            rasterizer,
            debug,
            document_title: self.document_title,
        })
    }
}

/// Renders `document` with the default layout and placeholder pictographs.
pub fn generate(document: &Document) -> Result<Vec<u8>, MenuPdfError> {
    MenuPdfBuilder::new().build()?.render_to_buffer(document)
}
