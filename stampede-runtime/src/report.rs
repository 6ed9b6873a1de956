use crate::error::RuntimeError;
use clap::ValueEnum;
use stampede_core::RunStatistics;
use std::io::Write;
use std::path::Path;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human readable table
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

pub fn render(stats: &RunStatistics, format: ReportFormat) -> Result<String, RuntimeError> {
    Ok(match format {
        ReportFormat::Text => stats.to_string(),
        ReportFormat::Json => serde_json::to_string_pretty(stats)?,
    })
}

/// Write the report to `path`, or to stdout when no path is given.
pub fn write(
    stats: &RunStatistics,
    format: ReportFormat,
    path: Option<&Path>,
) -> Result<(), RuntimeError> {
    let mut rendered = render(stats, format)?;
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }

    match path {
        Some(path) => std::fs::write(path, rendered).map_err(|source| RuntimeError::Report {
            path: path.to_path_buf(),
            source,
        }),
        None => std::io::stdout()
            .lock()
            .write_all(rendered.as_bytes())
            .map_err(|source| RuntimeError::Report {
                path: "<stdout>".into(),
                source,
            }),
    }
}
