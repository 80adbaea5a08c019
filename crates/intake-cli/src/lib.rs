use anyhow::Context;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use intake_core::{FileEntry, FileStatus, StatusRow};
use intake_uploader::SelectedFile;
use std::collections::HashMap;
use std::path::Path;

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Read files from disk into a selection, guessing each content type from
/// the extension.
pub async fn read_selection(paths: &[impl AsRef<Path>]) -> anyhow::Result<Vec<SelectedFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("{} is not a file", path.display()))?;
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        files.push(SelectedFile::new(name, content_type, data));
    }
    Ok(files)
}

fn template_for(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Pending => "  {prefix:.dim} {msg}",
        FileStatus::Compressing => "{spinner:.yellow} {prefix:.yellow} {msg}",
        FileStatus::Uploading => {
            "{spinner:.cyan} {prefix:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}"
        }
        FileStatus::Done => "✓ {prefix:.green} {msg}",
        FileStatus::Error => "✗ {prefix:.red} {msg}",
    }
}

fn style_for(status: FileStatus) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template_for(status))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Text shown next to a row's badge.
pub fn row_message(row: &StatusRow) -> String {
    match &row.error {
        Some(error) => format!("{} ({}): {}", row.name, row.size, error),
        None => format!("{} ({})", row.name, row.size),
    }
}

/// One progress bar per tracked entry.
pub struct ProgressBoard {
    multi: MultiProgress,
    bars: HashMap<String, (ProgressBar, FileStatus)>,
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
        }
    }

    /// Bring the bars in line with a snapshot of the batch.
    pub fn render(&mut self, entries: &[FileEntry]) {
        for entry in entries {
            let row = StatusRow::from(entry);
            let status = row.status;
            let (bar, shown) = self.bars.entry(row.id.clone()).or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(100));
                bar.set_style(style_for(status));
                (bar, status)
            });

            if *shown != status {
                bar.set_style(style_for(status));
                *shown = status;
            }
            bar.set_prefix(row.badge);
            bar.set_message(row_message(&row));
            bar.set_position(entry.progress().round() as u64);

            if status.is_terminal() && !bar.is_finished() {
                bar.finish();
            } else if status.is_in_flight() {
                bar.tick();
            }
        }

        self.bars.retain(|id, (bar, _)| {
            let tracked = entries.iter().any(|e| e.id() == id.as_str());
            if !tracked {
                bar.finish_and_clear();
            }
            tracked
        });
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
