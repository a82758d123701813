/*!
 * SRT subtitle parsing and writing.
 *
 * The parser is lenient: line endings are normalized, malformed blocks are
 * skipped with a warning, and entries are renumbered contiguously from 1 so
 * the rest of the pipeline can rely on a gap-free index sequence. Timecodes
 * are carried through untouched; only this module ever pairs them back with
 * translated text.
 */

use log::warn;
use std::path::Path;

use crate::errors::AppError;
use crate::session::LineOutcome;
use crate::translation::chunker::Line;

/// One subtitle block: index, timecode, text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    /// 1-based contiguous index
    pub index: usize,
    /// Raw timecode line ("00:00:01,000 --> 00:00:04,000")
    pub timecode: String,
    /// Subtitle text, possibly multi-line
    pub text: String,
}

/// An ordered collection of subtitle entries from one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleCollection {
    /// Entries in index order
    pub entries: Vec<SubtitleEntry>,
}

impl SubtitleCollection {
    /// Parse SRT content.
    ///
    /// Blocks missing an index, timecode, or text are skipped; the indices
    /// found in the file are ignored in favor of sequential renumbering.
    pub fn parse(content: &str) -> Result<Self, AppError> {
        let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
        let mut entries = Vec::new();

        for block in normalized.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
            let lines: Vec<&str> = block.lines().collect();
            if lines.len() < 2 {
                warn!("Skipped malformed subtitle block: {:?}", block);
                continue;
            }
            if lines[0].trim().parse::<usize>().is_err() {
                warn!("Skipped block without numeric index: {:?}", lines[0]);
                continue;
            }
            let timecode = lines[1].trim();
            if !timecode.contains("-->") {
                warn!("Skipped block without timecode: {:?}", timecode);
                continue;
            }
            let text = lines[2..].join("\n").trim().to_string();
            entries.push(SubtitleEntry {
                index: entries.len() + 1,
                timecode: timecode.to_string(),
                text,
            });
        }

        if entries.is_empty() {
            return Err(AppError::Subtitle(
                "no valid subtitle blocks found".to_string(),
            ));
        }
        Ok(Self { entries })
    }

    /// Read and parse an SRT file (UTF-8)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Serialize back to SRT format
    pub fn format(&self) -> String {
        let mut blocks = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            blocks.push(format!("{}\n{}\n{}\n", entry.index, entry.timecode, entry.text));
        }
        blocks.join("\n")
    }

    /// Write the collection to a file in SRT format
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), AppError> {
        std::fs::write(path.as_ref(), self.format())?;
        Ok(())
    }

    /// The ordered, 1-based line sequence handed to the dispatcher.
    ///
    /// Multi-line entries are flattened to a single line; the SRT writer
    /// owns the inverse pairing.
    pub fn to_lines(&self) -> Vec<Line> {
        self.entries
            .iter()
            .map(|e| Line::new(e.index, e.text.replace('\n', " ")))
            .collect()
    }

    /// Pair per-line outcomes back with timecodes into a new collection.
    ///
    /// Outcomes must cover exactly this collection's entries in order.
    pub fn with_outcomes(&self, outcomes: &[LineOutcome]) -> Result<Self, AppError> {
        if outcomes.len() != self.entries.len() {
            return Err(AppError::Subtitle(format!(
                "outcome count {} does not match entry count {}",
                outcomes.len(),
                self.entries.len()
            )));
        }
        let entries = self
            .entries
            .iter()
            .zip(outcomes)
            .map(|(entry, outcome)| {
                if entry.index != outcome.index {
                    return Err(AppError::Subtitle(format!(
                        "outcome index {} does not match entry index {}",
                        outcome.index, entry.index
                    )));
                }
                Ok(SubtitleEntry {
                    index: entry.index,
                    timecode: entry.timecode.clone(),
                    text: outcome.translated_text.clone(),
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        Ok(Self { entries })
    }
}
