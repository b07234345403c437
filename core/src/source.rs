//! Reads documents from a file or directory tree.
//!
//! `.json` files hold one object or an array of objects, `.jsonl` files one
//! object per line, and `.txt`/`.md` files are indexed whole with the file
//! name as title. Anything that cannot be read becomes a [`SourceFailure`].

use crate::types::{RawDocument, SourceFailure};
use serde::Deserialize;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(alias = "id")]
    path: String,
    title: Option<String>,
    #[serde(alias = "body")]
    text: String,
}

impl InputDoc {
    fn into_raw(self) -> RawDocument {
        let title = self.title.unwrap_or_else(|| file_name(Path::new(&self.path)));
        RawDocument { path: self.path, title, text: self.text }
    }
}

type Item = Result<RawDocument, SourceFailure>;

pub struct DirectorySource {
    files: VecDeque<PathBuf>,
    pending: VecDeque<Item>,
}

impl DirectorySource {
    /// Collects the supported files under `input`, sorted for a stable ingestion order.
    pub fn open(input: &Path) -> Self {
        let mut files: Vec<PathBuf> = Vec::new();
        let mut pending = VecDeque::new();
        if input.is_dir() {
            for entry in WalkDir::new(input) {
                match entry {
                    Ok(e) if e.file_type().is_file() && is_supported(e.path()) => files.push(e.into_path()),
                    Ok(_) => {}
                    Err(err) => {
                        let path = err.path().map(|p| p.display().to_string()).unwrap_or_default();
                        pending.push_back(Err(SourceFailure::new(path, err)));
                    }
                }
            }
            files.sort();
        } else if input.is_file() {
            files.push(input.to_path_buf());
        } else {
            pending.push_back(Err(SourceFailure::new(input.display().to_string(), "no such file or directory")));
        }
        tracing::debug!(files = files.len(), input = %input.display(), "collected input files");
        Self { files: files.into(), pending }
    }

    fn load(&mut self, file: &Path) {
        let shown = file.display().to_string();
        match extension(file).as_deref() {
            Some("jsonl") => self.load_jsonl(file, &shown),
            Some("json") => self.load_json(file, &shown),
            _ => {
                let item = fs::read_to_string(file)
                    .map(|text| RawDocument { path: shown.clone(), title: file_name(file), text })
                    .map_err(|err| SourceFailure::new(shown.clone(), err));
                self.pending.push_back(item);
            }
        }
    }

    fn load_jsonl(&mut self, file: &Path, shown: &str) {
        let f = match File::open(file) {
            Ok(f) => f,
            Err(err) => return self.pending.push_back(Err(SourceFailure::new(shown, err))),
        };
        for (lineno, line) in BufReader::new(f).lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(err) => {
                    self.pending.push_back(Err(SourceFailure::new(format!("{shown}:{}", lineno + 1), err)));
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let item = serde_json::from_str::<InputDoc>(&line)
                .map(InputDoc::into_raw)
                .map_err(|err| SourceFailure::new(format!("{shown}:{}", lineno + 1), err));
            self.pending.push_back(item);
        }
    }

    fn load_json(&mut self, file: &Path, shown: &str) {
        let json: serde_json::Value = match File::open(file)
            .map_err(|e| e.to_string())
            .and_then(|f| serde_json::from_reader(BufReader::new(f)).map_err(|e| e.to_string()))
        {
            Ok(v) => v,
            Err(reason) => return self.pending.push_back(Err(SourceFailure::new(shown, reason))),
        };
        match json {
            serde_json::Value::Array(arr) => {
                for (i, v) in arr.into_iter().enumerate() {
                    let item = serde_json::from_value::<InputDoc>(v)
                        .map(InputDoc::into_raw)
                        .map_err(|err| SourceFailure::new(format!("{shown}[{i}]"), err));
                    self.pending.push_back(item);
                }
            }
            obj @ serde_json::Value::Object(_) => {
                let item = serde_json::from_value::<InputDoc>(obj)
                    .map(InputDoc::into_raw)
                    .map_err(|err| SourceFailure::new(shown, err));
                self.pending.push_back(item);
            }
            _ => self.pending.push_back(Err(SourceFailure::new(shown, "expected a JSON object or array"))),
        }
    }
}

impl Iterator for DirectorySource {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            let file = self.files.pop_front()?;
            self.load(&file);
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension().and_then(|s| s.to_str()).map(|s| s.to_ascii_lowercase())
}

fn is_supported(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some("json" | "jsonl" | "txt" | "md"))
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.display().to_string())
}
