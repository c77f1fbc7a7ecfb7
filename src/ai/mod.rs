pub mod models;
pub mod prompt;

use crate::activity::ActivityBundle;
use chrono::{DateTime, Utc};

const START_MARKER: &str = "<START>";
const END_MARKER: &str = "<END>";

/// Markdown weekly report produced for one run
#[derive(Debug, Clone)]
pub struct SummaryReport {
    /// Report body in markdown format
    pub markdown: String,
    /// When this report was generated
    pub generated_at: DateTime<Utc>,
}

impl SummaryReport {
    /// Create a report from model output, keeping only the marked section if present
    pub fn new(markdown: &str) -> Self {
        Self {
            markdown: extract_report(markdown),
            generated_at: Utc::now(),
        }
    }

    /// Static report used when nothing was collected; no model call is made
    pub fn empty(bundle: &ActivityBundle) -> Self {
        let markdown = format!(
            "# Weekly Update: {}\n\n\
             **Period:** {}\n\n\
             No GitHub activity found for this period.\n",
            bundle.username,
            bundle.window.label()
        );

        Self {
            markdown,
            generated_at: Utc::now(),
        }
    }
}

/// Text between `<START>` and `<END>`, or the whole response trimmed.
///
/// A missing `<END>` keeps everything after `<START>`.
pub fn extract_report(response: &str) -> String {
    let body = match response.find(START_MARKER) {
        Some(start) => {
            let rest = &response[start + START_MARKER.len()..];
            match rest.find(END_MARKER) {
                Some(end) => &rest[..end],
                None => rest,
            }
        }
        None => response,
    };

    let mut markdown = body.trim().to_string();
    markdown.push('\n');
    markdown
}
