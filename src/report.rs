//! Markdown report rendering and output.

use crate::summarize::ChapterSummary;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Separator line printed before the report on stdout
pub const STDOUT_SEPARATOR: &str = "--------------------";

/// Heading printed before the report on stdout
pub const STDOUT_HEADING: &str = "# Summary";

/// The finished summary of a book, one section per chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub chapters: Vec<ChapterSummary>,
}

impl Report {
    pub fn new(chapters: Vec<ChapterSummary>) -> Self {
        Self { chapters }
    }

    /// Render every chapter as a `##` heading followed by its summary
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for chapter in &self.chapters {
            out.push_str(&format!("## {}\n\n{}\n\n", chapter.name, chapter.summary));
        }
        out
    }

    /// Write the report to `path` (replacing any existing file) or, without a
    /// path, print it to `stdout` under the summary heading.
    pub fn write_to(&self, path: Option<&Path>, stdout: &mut impl Write) -> io::Result<()> {
        let markdown = self.to_markdown();
        match path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                fs::write(path, markdown)
            }
            None => {
                writeln!(stdout, "{STDOUT_SEPARATOR}")?;
                writeln!(stdout, "{STDOUT_HEADING}")?;
                writeln!(stdout, "{markdown}")?;
                stdout.flush()
            }
        }
    }
}
