use crate::error::{IndexError, Result};
use crate::index::InvertedIndex;
use crate::manager::{IndexSnapshot, SNAPSHOT_VERSION};
use crate::vector::VectorStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub dimension: Option<usize>,
    pub created_at: String,
    pub version: u32,
    /// Stamp shared by the three files of one commit.
    pub generation: u64,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn lexical(&self) -> PathBuf { self.root.join("lexical.bin") }
    fn vectors(&self) -> PathBuf { self.root.join("vectors.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }

    /// True when a snapshot has been written under this root.
    pub fn exists(&self) -> bool { self.meta().is_file() }
}

/// Index file payload tagged with the generation of the commit that wrote it.
#[derive(Serialize)]
struct StampedRef<'a, T> {
    generation: u64,
    body: &'a T,
}

#[derive(Deserialize)]
struct Stamped<T> {
    generation: u64,
    body: T,
}

fn tmp_path(path: &Path) -> PathBuf { path.with_extension("tmp") }

/// Writes `bytes` next to `path` and renames it into place, so a crash never leaves a torn file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Writes every file to its temporary name, then renames them in order.
/// Nothing is renamed unless all writes succeeded.
fn commit_files(files: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    let mut staged: Vec<PathBuf> = Vec::with_capacity(files.len());
    for (target, bytes) in files {
        let tmp = tmp_path(target);
        if let Err(err) = fs::write(&tmp, bytes) {
            for written in &staged {
                let _ = fs::remove_file(written);
            }
            return Err(err.into());
        }
        staged.push(tmp);
    }
    for (tmp, (target, _)) in staged.iter().zip(files) {
        fs::rename(tmp, target)?;
    }
    Ok(())
}

fn load_stamped<T: DeserializeOwned>(path: &Path) -> Result<(u64, T)> {
    let buf = fs::read(path)?;
    let stamped: Stamped<T> = bincode::deserialize(&buf)?;
    Ok((stamped.generation, stamped.body))
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let json = serde_json::to_string_pretty(meta)?;
    write_atomic(&paths.meta(), json.as_bytes())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let raw = fs::read_to_string(paths.meta())?;
    Ok(serde_json::from_str(&raw)?)
}

/// Persists both indexes and a meta file as one commit.
///
/// All three files are staged before any is renamed into place, so a failed
/// write leaves the previous snapshot untouched. `meta.json` is renamed last;
/// each index file carries the commit's generation and [`load_snapshot`]
/// refuses files from different commits.
pub fn save_snapshot(paths: &IndexPaths, snapshot: &IndexSnapshot) -> Result<MetaFile> {
    create_dir_all(&paths.root)?;
    let now = time::OffsetDateTime::now_utc();
    let previous = load_meta(paths).map(|m| m.generation).unwrap_or(0);
    let generation = (now.unix_timestamp_nanos().max(0) as u64).max(previous + 1);

    let meta = MetaFile {
        num_docs: snapshot.lexical.len() as u32,
        num_terms: snapshot.lexical.term_count() as u32,
        dimension: snapshot.vectors.dimension(),
        created_at: now.format(&time::format_description::well_known::Rfc3339).unwrap_or_default(),
        version: snapshot.version,
        generation,
    };
    let files = [
        (paths.lexical(), bincode::serialize(&StampedRef { generation, body: &snapshot.lexical })?),
        (paths.vectors(), bincode::serialize(&StampedRef { generation, body: &snapshot.vectors })?),
        (paths.meta(), serde_json::to_string_pretty(&meta)?.into_bytes()),
    ];
    commit_files(&files)?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, generation, "snapshot saved");
    Ok(meta)
}

/// Reads a snapshot back. The meta file must agree with the index files;
/// full structural validation happens in [`IndexManager::restore`](crate::manager::IndexManager::restore).
pub fn load_snapshot(paths: &IndexPaths) -> Result<IndexSnapshot> {
    let meta = load_meta(paths)?;
    if meta.version != SNAPSHOT_VERSION {
        return Err(IndexError::IndexCorruption(format!("unsupported snapshot version {}", meta.version)));
    }
    let (lexical_gen, lexical): (u64, InvertedIndex) = load_stamped(&paths.lexical())?;
    let (vectors_gen, vectors): (u64, VectorStore) = load_stamped(&paths.vectors())?;
    if lexical_gen != meta.generation || vectors_gen != meta.generation {
        return Err(IndexError::IndexCorruption(format!(
            "mixed commits: meta.json is generation {}, lexical.bin {lexical_gen}, vectors.bin {vectors_gen}",
            meta.generation
        )));
    }
    if meta.num_docs as usize != lexical.len() || meta.dimension != vectors.dimension() {
        return Err(IndexError::IndexCorruption(format!(
            "meta.json describes {} documents of dimension {:?}, files hold {} of dimension {:?}",
            meta.num_docs,
            meta.dimension,
            lexical.len(),
            vectors.dimension()
        )));
    }
    Ok(IndexSnapshot { version: meta.version, lexical, vectors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::IndexManager;
    use tempfile::tempdir;

    fn manager() -> IndexManager {
        let m = IndexManager::new();
        m.upsert("a.pdf", "a.pdf", &["contract", "breach"], vec![1.0, 0.0]).unwrap();
        m.upsert("b.pdf", "b.pdf", &["tort"], vec![0.0, 1.0]).unwrap();
        m
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("index"));
        assert!(!paths.exists());
        let snap = manager().snapshot();
        let meta = save_snapshot(&paths, &snap).unwrap();
        assert_eq!(meta.num_docs, 2);
        assert_eq!(meta.num_terms, 3);
        assert_eq!(meta.dimension, Some(2));
        assert!(paths.exists());

        let loaded = load_snapshot(&paths).unwrap();
        assert_eq!(loaded, snap);
    }

    #[test]
    fn meta_disagreement_is_corruption() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_snapshot(&paths, &manager().snapshot()).unwrap();
        let mut meta = load_meta(&paths).unwrap();
        meta.num_docs = 5;
        save_meta(&paths, &meta).unwrap();
        assert!(matches!(load_snapshot(&paths), Err(IndexError::IndexCorruption(_))));
    }

    #[test]
    fn truncated_file_is_a_serialization_error() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_snapshot(&paths, &manager().snapshot()).unwrap();
        let bytes = fs::read(dir.path().join("lexical.bin")).unwrap();
        fs::write(dir.path().join("lexical.bin"), &bytes[..bytes.len() / 2]).unwrap();
        assert!(matches!(load_snapshot(&paths), Err(IndexError::Serialization(_))));
    }

    #[test]
    fn failed_commit_keeps_previous_snapshot() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let m = manager();
        let before = m.snapshot();
        save_snapshot(&paths, &before).unwrap();

        m.upsert("a.pdf", "a.pdf", &["tort"], vec![0.0, 1.0]).unwrap();
        // a directory in the way makes the vectors write fail
        fs::create_dir(dir.path().join("vectors.tmp")).unwrap();
        assert!(matches!(save_snapshot(&paths, &m.snapshot()), Err(IndexError::Io(_))));
        assert!(!dir.path().join("lexical.tmp").exists());

        let loaded = load_snapshot(&paths).unwrap();
        assert_eq!(loaded, before);
        let restored = IndexManager::from_snapshot(loaded).unwrap();
        let hits = restored
            .search(&["tort"], &[1.0, 0.0], crate::types::SearchMode::Lexical, 5, Default::default())
            .unwrap();
        assert_eq!(hits.iter().map(|h| h.path.as_str()).collect::<Vec<_>>(), vec!["b.pdf"]);
    }

    #[test]
    fn files_from_different_commits_are_corruption() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let m = manager();
        let first = save_snapshot(&paths, &m.snapshot()).unwrap();
        let old_lexical = fs::read(dir.path().join("lexical.bin")).unwrap();

        m.upsert("a.pdf", "a.pdf", &["tort"], vec![0.0, 1.0]).unwrap();
        let second = save_snapshot(&paths, &m.snapshot()).unwrap();
        assert!(second.generation > first.generation);

        fs::write(dir.path().join("lexical.bin"), old_lexical).unwrap();
        assert!(matches!(load_snapshot(&paths), Err(IndexError::IndexCorruption(_))));
    }

    #[test]
    fn missing_snapshot_is_io() {
        let dir = tempdir().unwrap();
        assert!(matches!(load_snapshot(&IndexPaths::new(dir.path())), Err(IndexError::Io(_))));
    }
}
