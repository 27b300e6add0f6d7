//! HTML rendering for stock buy-signal emails.
//!
//! The template is an ordinary HTML file containing a `{{STOCK_ROWS}}` token
//! inside a table body. One `<tr>` is generated per record and the rows are
//! spliced in place of the token. Rendering always produces a document: if
//! the template cannot be read, a minimal fallback is returned instead.

use crate::config::TemplateConfig;
use crate::core::StockRecord;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// The token replaced by the generated table rows.
pub const STOCK_ROWS_PLACEHOLDER: &str = "{{STOCK_ROWS}}";

/// Returned when no template file could be read.
pub const FALLBACK_DOCUMENT: &str =
    "<html><body><h1>Stock Alert</h1><p>Template not found.</p></body></html>";

const CELL_STYLE: &str = "padding:10px; border-bottom:1px solid #eaeaea;";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template not found at any of: {}", display_paths(.tried))]
    Unavailable { tried: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders stock records into the configured HTML template.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    path: PathBuf,
    escape_html: bool,
}

impl TemplateRenderer {
    pub fn new(config: &TemplateConfig) -> Self {
        Self {
            path: config.path.clone(),
            escape_html: config.escape_html,
        }
    }

    /// Produces the HTML body for `records`, preserving their order.
    pub async fn render(&self, records: &[StockRecord]) -> String {
        let template = match self.load().await {
            Ok(template) => template,
            Err(e) => {
                warn!(error = %e, "Falling back to the built-in stock alert document");
                metrics::counter!("template_fallbacks_total").increment(1);
                return FALLBACK_DOCUMENT.to_string();
            }
        };

        if !template.contains(STOCK_ROWS_PLACEHOLDER) {
            debug!(
                path = %self.path.display(),
                "Template has no {} placeholder; rows are dropped",
                STOCK_ROWS_PLACEHOLDER
            );
            return template;
        }

        let rows: String = records.iter().map(|record| self.render_row(record)).collect();
        template.replace(STOCK_ROWS_PLACEHOLDER, &rows)
    }

    /// Reads the template from the first candidate location that works.
    async fn load(&self) -> Result<String, TemplateError> {
        let tried = self.candidates();
        for candidate in &tried {
            match tokio::fs::read_to_string(candidate).await {
                Ok(contents) => {
                    debug!(path = %candidate.display(), "Loaded email template");
                    return Ok(contents);
                }
                Err(e) => debug!(path = %candidate.display(), error = %e, "Template candidate unreadable"),
            }
        }
        Err(TemplateError::Unavailable { tried })
    }

    /// The configured path, then the same path anchored at the working directory.
    fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = vec![self.path.clone()];
        if self.path.is_relative() {
            if let Ok(cwd) = std::env::current_dir() {
                let anchored = cwd.join(&self.path);
                if !candidates.contains(&anchored) {
                    candidates.push(anchored);
                }
            }
        }
        candidates
    }

    fn render_row(&self, record: &StockRecord) -> String {
        let cells = [
            record.symbol.clone(),
            record.buy_rating.to_string(),
            record.overall_sentiment.clone(),
            record.key_drivers_text(),
            record.confidence.clone(),
            record.summary.clone(),
        ];

        let mut row = String::from("\n            <tr>");
        for cell in cells {
            let cell = if self.escape_html {
                handlebars::html_escape(&cell)
            } else {
                cell
            };
            row.push_str(&format!(
                "\n                <td style=\"{}\">{}</td>",
                CELL_STYLE, cell
            ));
        }
        row.push_str("\n            </tr>");
        row
    }
}
