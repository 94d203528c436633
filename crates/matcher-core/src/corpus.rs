use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::traits::CorpusSource;
use crate::types::WorkerDocument;

/// Bios shorter than this are reported as too short to be useful.
pub const MIN_USEFUL_BIO_CHARS: usize = 50;

/// Worker profiles read from disk.
///
/// `path` may be a `.json` file (one object or an array), a `.jsonl` file
/// (one object per line) or a directory walked recursively for `*.json`.
#[derive(Debug, Clone)]
pub struct JsonCorpus {
    path: PathBuf,
}

impl JsonCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &Path { &self.path }

    fn list_json_files(root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        files
    }

    fn read_json(path: &Path) -> Result<Vec<WorkerDocument>> {
        let content = fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        match value {
            serde_json::Value::Array(_) => Ok(serde_json::from_value(value)?),
            _ => Ok(vec![serde_json::from_value(value)?]),
        }
    }

    fn read_jsonl(path: &Path) -> Result<Vec<WorkerDocument>> {
        let content = fs::read_to_string(path)?;
        let mut workers = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let worker = serde_json::from_str(line).map_err(|e| {
                Error::Operation(format!("{}:{}: {e}", path.display(), line_no + 1))
            })?;
            workers.push(worker);
        }
        Ok(workers)
    }
}

impl CorpusSource for JsonCorpus {
    fn load_workers(&self) -> Result<Vec<WorkerDocument>> {
        if !self.path.exists() {
            return Err(Error::NotFound(format!("corpus path {}", self.path.display())));
        }
        let workers = if self.path.is_dir() {
            let files = Self::list_json_files(&self.path);
            if files.is_empty() {
                warn!(path = %self.path.display(), "no .json files found under corpus directory");
            }
            let mut all = Vec::new();
            for file in &files {
                debug!(file = %file.display(), "reading corpus file");
                all.extend(Self::read_json(file)?);
            }
            all
        } else if self.path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            Self::read_jsonl(&self.path)?
        } else {
            Self::read_json(&self.path)?
        };
        info!(path = %self.path.display(), workers = workers.len(), "loaded worker corpus");
        Ok(workers)
    }
}

/// Fixed in-process corpus, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticCorpus(pub Vec<WorkerDocument>);

impl CorpusSource for StaticCorpus {
    fn load_workers(&self) -> Result<Vec<WorkerDocument>> { Ok(self.0.clone()) }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RatingStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub unrated: usize,
}

/// Data-quality snapshot of a worker corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CorpusReport {
    pub total_workers: usize,
    pub with_bio: usize,
    pub empty_bios: usize,
    pub short_bios: usize,
    pub missing_location: usize,
    pub verified: usize,
    /// Profession code to worker count.
    pub professions: BTreeMap<String, usize>,
    pub ratings: RatingStats,
    /// Mean trimmed bio length in chars over workers with a bio.
    pub avg_bio_length: f64,
    /// Share of workers with a non-empty bio, 0-100.
    pub health_percentage: f64,
    /// Ids of workers with empty or short bios.
    pub needs_attention: Vec<u64>,
}

impl CorpusReport {
    pub fn build(workers: &[WorkerDocument]) -> Self {
        let mut report = Self { total_workers: workers.len(), ..Self::default() };
        let mut rating_sum = 0.0f32;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut bio_chars_sum = 0usize;

        for w in workers {
            let bio_chars = w.bio.trim().chars().count();
            if bio_chars == 0 {
                report.empty_bios += 1;
                report.needs_attention.push(w.id);
            } else {
                report.with_bio += 1;
                bio_chars_sum += bio_chars;
                if bio_chars < MIN_USEFUL_BIO_CHARS {
                    report.short_bios += 1;
                    report.needs_attention.push(w.id);
                }
            }
            if w.location().is_none() {
                report.missing_location += 1;
            }
            if w.is_verified {
                report.verified += 1;
            }
            *report.professions.entry(w.profession.clone()).or_insert(0) += 1;
            if w.rating <= 0.0 {
                report.ratings.unrated += 1;
            }
            rating_sum += w.rating;
            min = min.min(w.rating);
            max = max.max(w.rating);
        }

        if !workers.is_empty() {
            report.ratings.min = min;
            report.ratings.max = max;
            report.ratings.mean = rating_sum / workers.len() as f32;
            report.health_percentage = report.with_bio as f64 / workers.len() as f64 * 100.0;
        }
        if report.with_bio > 0 {
            report.avg_bio_length = bio_chars_sum as f64 / report.with_bio as f64;
        }
        report.needs_attention.sort_unstable();
        report
    }
}
