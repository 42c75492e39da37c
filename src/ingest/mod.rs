pub mod pdf;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{json, Map};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::config::ChunkingConfig;
use crate::huggingface::HuggingFaceClient;
use crate::models::{DocumentChunk, SourceUnit, TEXT_METADATA_KEY};
use crate::pinecone_store::{PineconeStore, PineconeVector};

const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];
const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// Loads source documents, splits them and writes their embeddings to the
/// Pinecone index the chat server reads from.
#[derive(Clone)]
pub struct Ingestor {
    chunking: ChunkingConfig,
    huggingface: HuggingFaceClient,
    pinecone: PineconeStore,
    embedding_model: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngestResult {
    pub file_count: usize,
    pub chunk_count: usize,
    pub upserted_count: usize,
}

impl Ingestor {
    pub fn new(
        chunking: ChunkingConfig,
        huggingface: HuggingFaceClient,
        pinecone: PineconeStore,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            chunking,
            huggingface,
            pinecone,
            embedding_model: embedding_model.into(),
        }
    }

    pub async fn ingest(&self, data_dir: &Path) -> Result<IngestResult> {
        let files = discover_sources(data_dir)?;
        let chunks = load_chunks(&files, &self.chunking).await?;
        if chunks.is_empty() {
            anyhow::bail!("no chunks generated from {}", data_dir.display());
        }

        tracing::info!(
            files = files.len(),
            chunks = chunks.len(),
            "embedding and upserting chunks"
        );

        let batch_size = self.chunking.upsert_batch_size.max(1);
        let mut upserted = 0;
        for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self
                .huggingface
                .embed_batch(&self.embedding_model, &texts)
                .await
                .with_context(|| format!("failed embedding batch {}", batch_index))?;

            let vectors: Vec<PineconeVector> = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, values)| to_vector(chunk, values))
                .collect();

            upserted += self
                .pinecone
                .upsert(&vectors)
                .await
                .with_context(|| format!("failed upserting batch {}", batch_index))?;

            tracing::info!(batch = batch_index, upserted, "batch stored");
        }

        Ok(IngestResult {
            file_count: files.len(),
            chunk_count: chunks.len(),
            upserted_count: upserted,
        })
    }
}

pub fn discover_sources(data_dir: &Path) -> Result<Vec<PathBuf>> {
    if !data_dir.is_dir() {
        anyhow::bail!("data directory not found: {}", data_dir.display());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(data_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

pub async fn load_chunks(
    files: &[PathBuf],
    chunking: &ChunkingConfig,
) -> Result<Vec<DocumentChunk>> {
    let mut units = Vec::new();
    for path in files {
        let mut file_units = load_units(path).await?;
        tracing::info!(file = %path.display(), units = file_units.len(), "loaded source");
        units.append(&mut file_units);
    }

    Ok(build_chunks(units, chunking.chunk_size, chunking.chunk_overlap))
}

async fn load_units(path: &Path) -> Result<Vec<SourceUnit>> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if is_pdf {
        return pdf::extract_pdf_units(path).await;
    }

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed reading {}", path.display()))?;
    let content = pdf::normalize_text(&raw);
    if content.is_empty() {
        return Ok(vec![]);
    }

    Ok(vec![SourceUnit {
        source: path.display().to_string(),
        page: None,
        content,
    }])
}

fn build_chunks(
    units: Vec<SourceUnit>,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();

    for unit in units {
        for (ordinal, content) in split_text(&unit.content, chunk_size, chunk_overlap)
            .into_iter()
            .enumerate()
        {
            chunks.push(DocumentChunk {
                id: chunk_id(&unit.source, unit.page, ordinal),
                source: unit.source.clone(),
                page: unit.page,
                content,
            });
        }
    }

    chunks
}

/// Stable across runs so re-ingesting overwrites instead of duplicating.
fn chunk_id(source: &str, page: Option<i64>, ordinal: usize) -> String {
    let page = page.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
    let mut hasher = Sha256::new();
    hasher.update(format!("{source}:{page}:{ordinal}"));
    let digest = format!("{:x}", hasher.finalize());
    digest[..32].to_string()
}

fn to_vector(chunk: &DocumentChunk, values: Vec<f32>) -> PineconeVector {
    let mut metadata = Map::new();
    metadata.insert(TEXT_METADATA_KEY.to_string(), json!(chunk.content));
    metadata.insert("source".to_string(), json!(chunk.source));
    if let Some(page) = chunk.page {
        metadata.insert("page".to_string(), json!(page));
    }

    PineconeVector {
        id: chunk.id.clone(),
        values,
        metadata,
    }
}

/// Splits on the coarsest separator present (paragraph, line, word, char),
/// recursing into pieces that are still too long, then packs pieces back into
/// chunks of at most `chunk_size` chars that overlap by up to `chunk_overlap`.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let chunk_overlap = chunk_overlap.min(chunk_size - 1);
    split_recursive(text, SEPARATORS, chunk_size, chunk_overlap)
}

fn split_recursive(text: &str, separators: &[&str], size: usize, overlap: usize) -> Vec<String> {
    let (index, separator) = separators
        .iter()
        .enumerate()
        .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
        .map(|(i, sep)| (i, *sep))
        .unwrap_or((separators.len(), ""));
    let remaining = separators.get(index + 1..).unwrap_or(&[]);

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator)
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect()
    };

    let mut chunks = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    for piece in pieces {
        if char_len(&piece) < size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, separator, size, overlap));
            pending.clear();
        }

        if remaining.is_empty() {
            chunks.push(piece);
        } else {
            chunks.extend(split_recursive(&piece, remaining, size, overlap));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, separator, size, overlap));
    }

    chunks
}

fn merge_pieces(pieces: &[String], separator: &str, size: usize, overlap: usize) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut merged = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);
        let joiner = if window.is_empty() { 0 } else { sep_len };

        if total + len + joiner > size && !window.is_empty() {
            push_joined(&mut merged, &window, separator);

            while total > overlap
                || (total > 0 && total + len + if window.is_empty() { 0 } else { sep_len } > size)
            {
                let Some(front) = window.pop_front() else {
                    break;
                };
                let dropped_joiner = if window.is_empty() { 0 } else { sep_len };
                total = total.saturating_sub(char_len(front) + dropped_joiner);
            }
        }

        total += len + if window.is_empty() { 0 } else { sep_len };
        window.push_back(piece);
    }

    push_joined(&mut merged, &window, separator);
    merged
}

fn push_joined(out: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
