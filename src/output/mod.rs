mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::check::CheckReport;
use crate::cli::OutputFormat;

impl CheckReport {
    pub fn format(&self, format: &OutputFormat) -> String {
        match format {
            OutputFormat::Text => TextFormatter::format(self),
            OutputFormat::Json => JsonFormatter::format(self),
        }
    }
}
