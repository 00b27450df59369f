//! PDF loading and chunking.
//!
//! Chunks are fixed-size whitespace-word windows with overlap — wide enough
//! for a JD section or a résumé entry to stay in one piece, small enough to
//! embed well.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::AppError;

/// Words per chunk.
pub const CHUNK_SIZE: usize = 512;
/// Words shared between consecutive chunks.
pub const CHUNK_OVERLAP: usize = 64;

/// A loaded source document.
#[derive(Debug, Clone)]
pub struct Document {
    /// File stem, e.g. `742` for `cvs/742.pdf`.
    pub doc_id: String,
    pub source_path: PathBuf,
    pub text: String,
}

/// One embeddable slice of a document.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub doc_id: String,
    pub chunk_index: usize,
    pub text: String,
}

/// Loads every `*.pdf` in `dir`, in deterministic (sorted) order.
pub fn load_dir(dir: &Path) -> Result<Vec<Document>, AppError> {
    if !dir.is_dir() {
        return Err(AppError::Document(format!(
            "directory '{}' does not exist",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(AppError::Io)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")))
        .collect();
    paths.sort();

    paths.iter().map(|p| load_file(p)).collect()
}

/// Loads exactly one PDF document.
pub fn load_file(path: &Path) -> Result<Document, AppError> {
    if !path.is_file() {
        return Err(AppError::Document(format!(
            "file '{}' does not exist",
            path.display()
        )));
    }

    let doc_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::Document(format!("'{}' has no file stem", path.display())))?;

    let text = pdf_extract::extract_text(path)
        .map_err(|e| AppError::Document(format!("extracting '{}' failed: {e}", path.display())))?;

    debug!(%doc_id, chars = text.len(), "loaded document");
    Ok(Document {
        doc_id,
        source_path: path.to_path_buf(),
        text,
    })
}

/// Splits a document into overlapping word-window chunks.
/// Whitespace-only documents yield no chunks.
pub fn chunk(doc: &Document) -> Vec<Chunk> {
    chunk_words(&doc.text, CHUNK_SIZE, CHUNK_OVERLAP)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            doc_id: doc.doc_id.clone(),
            chunk_index,
            text,
        })
        .collect()
}

fn chunk_words(text: &str, size: usize, overlap: usize) -> Vec<String> {
    debug_assert!(overlap < size);
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let step = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document {
            doc_id: "d1".to_string(),
            source_path: PathBuf::from("d1.pdf"),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk(&doc("")).is_empty());
        assert!(chunk(&doc("   \n\t  ")).is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk(&doc("rust systems programming"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "rust systems programming");
    }

    #[test]
    fn test_long_text_overlaps() {
        let words: Vec<String> = (0..1000).map(|i| format!("w{i}")).collect();
        let text = words.join(" ");
        let chunks = chunk_words(&text, 512, 64);

        // 1000 words, step 448: windows at 0, 448, 896.
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].ends_with("w511"));
        assert!(chunks[1].starts_with("w448"));
        assert!(chunks[2].starts_with("w896"));
        assert!(chunks[2].ends_with("w999"));
    }

    #[test]
    fn test_chunk_indices_are_sequential() {
        let words: Vec<String> = (0..1000).map(|i| format!("w{i}")).collect();
        let chunks = chunk(&doc(&words.join(" ")));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.doc_id, "d1");
        }
    }

    #[test]
    fn test_load_dir_missing_directory_errors() {
        let err = load_dir(Path::new("definitely/not/here")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_load_file_missing_file_errors() {
        let err = load_file(Path::new("missing.pdf")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_load_dir_ignores_non_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let docs = load_dir(dir.path()).unwrap();
        assert!(docs.is_empty());
    }
}
