//! Corpus loading and acquisition
//!
//! The corpus snapshot is a directory of UTF-8 `.txt` files, one passage per
//! non-blank line. Loading strips every whitespace character from each line,
//! interior spaces included, because the governance documents use a dense
//! non-spaced script and scanned sources carry stray spacing.

pub mod fetcher;

pub use fetcher::CorpusFetcher;
pub use fetcher::HttpCorpusFetcher;

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;

use crate::errors::CharterQaError;
use crate::errors::Result;

/// An atomic unit of source text used as a retrieval candidate.
///
/// Identity is the position of creation: ids form a contiguous range starting
/// at 0 in file-then-line encounter order within one corpus snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub id: u32,
    pub content: String,
}

/// Load all passages from a corpus directory.
///
/// Files are visited in sorted filename order so passage ids are stable
/// across platforms. Blank lines are discarded.
///
/// # Errors
/// `CorpusUnavailable` if the directory is missing, unreadable, or yields no
/// passages.
pub fn load_corpus<P: AsRef<Path>>(dir: P) -> Result<Vec<Passage>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|e| {
        CharterQaError::CorpusUnavailable(format!("cannot read {}: {e}", dir.display()))
    })?;

    let mut files: Vec<_> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();

    let mut passages = Vec::new();
    for path in &files {
        let content = std::fs::read_to_string(path)?;
        let before = passages.len();
        for line in content.lines() {
            let normalized = normalize_line(line);
            if normalized.is_empty() {
                continue;
            }
            passages.push(Passage {
                id: passages.len() as u32,
                content: normalized,
            });
        }
        debug!(
            "Loaded {} passages from {}",
            passages.len() - before,
            path.display()
        );
    }

    if passages.is_empty() {
        return Err(CharterQaError::CorpusUnavailable(format!(
            "no eligible .txt files with content in {}",
            dir.display()
        )));
    }

    info!(
        "Corpus loaded: {} passages from {} files",
        passages.len(),
        files.len()
    );
    Ok(passages)
}

/// Strip all whitespace from a line, interior spaces included.
fn normalize_line(line: &str) -> String {
    line.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_passage_count_matches_non_blank_lines() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "a.txt", "第一條\n\n第二條\n第三條\n");
        write_file(tmp.path(), "b.txt", "\n第四條\n\n");

        let passages = load_corpus(tmp.path()).unwrap();
        assert_eq!(passages.len(), 4);
    }

    #[test]
    fn test_ids_are_contiguous_from_zero() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "a.txt", "one\ntwo\n");
        write_file(tmp.path(), "b.txt", "three\n");

        let passages = load_corpus(tmp.path()).unwrap();
        let ids: Vec<u32> = passages.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_file_order_is_sorted_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        // Created out of order; ids must still follow sorted filename order
        write_file(tmp.path(), "z.txt", "last\n");
        write_file(tmp.path(), "a.txt", "first\n");

        let passages = load_corpus(tmp.path()).unwrap();
        assert_eq!(passages[0].content, "first");
        assert_eq!(passages[1].content, "last");
    }

    #[test]
    fn test_interior_whitespace_is_stripped() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "a.txt", "理事會 每年 召開\t一次會議\n");

        let passages = load_corpus(tmp.path()).unwrap();
        assert_eq!(passages[0].content, "理事會每年召開一次會議");
    }

    #[test]
    fn test_non_txt_files_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "a.txt", "kept\n");
        write_file(tmp.path(), "notes.md", "ignored\n");

        let passages = load_corpus(tmp.path()).unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].content, "kept");
    }

    #[test]
    fn test_missing_directory_is_corpus_unavailable() {
        let err = load_corpus("/definitely/not/here").unwrap_err();
        assert!(matches!(err, CharterQaError::CorpusUnavailable(_)));
    }

    #[test]
    fn test_empty_directory_is_corpus_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_corpus(tmp.path()).unwrap_err();
        assert!(matches!(err, CharterQaError::CorpusUnavailable(_)));
    }

    #[test]
    fn test_whitespace_only_lines_are_blank() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "a.txt", "   \n\t\nreal\n");

        let passages = load_corpus(tmp.path()).unwrap();
        assert_eq!(passages.len(), 1);
    }
}
