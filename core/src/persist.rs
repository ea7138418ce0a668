use crate::analysis::Analysis;
use crate::config::IndexConfig;
use crate::store::StoreSnapshot;
use crate::Document;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub scopes: usize,
    pub documents: usize,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn for_snapshot(snap: &StoreSnapshot) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        let scopes: BTreeSet<&String> = snap.configs.keys().chain(snap.documents.keys()).collect();
        Self {
            scopes: scopes.len(),
            documents: snap.documents.values().map(Vec::len).sum(),
            created_at,
            version: FORMAT_VERSION,
        }
    }
}

/// Layout of a saved store directory.
pub struct SnapshotPaths {
    pub root: PathBuf,
}

impl SnapshotPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn configs(&self) -> PathBuf { self.root.join("configs.bin") }
    fn documents(&self) -> PathBuf { self.root.join("documents.json") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn analyses_dir(&self) -> PathBuf { self.root.join("analysis") }
    /// One file per scope. Hex keeps distinct scope names on distinct paths.
    pub fn analysis(&self, scope: &str) -> PathBuf {
        self.analyses_dir().join(format!("{}.json", hex::encode(scope)))
    }
}

pub fn save_configs(paths: &SnapshotPaths, configs: &BTreeMap<String, IndexConfig>) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.configs())?;
    let bytes = bincode::serialize(configs)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_configs(paths: &SnapshotPaths) -> Result<BTreeMap<String, IndexConfig>> {
    let mut f = File::open(paths.configs())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let configs = bincode::deserialize(&buf)?;
    Ok(configs)
}

// Field values are arbitrary JSON, which bincode cannot decode, so documents stay JSON.
pub fn save_documents(paths: &SnapshotPaths, docs: &BTreeMap<String, Vec<Document>>) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = BufWriter::new(File::create(paths.documents())?);
    serde_json::to_writer(&mut f, docs)?;
    f.flush()?;
    Ok(())
}

pub fn load_documents(paths: &SnapshotPaths) -> Result<BTreeMap<String, Vec<Document>>> {
    let f = BufReader::new(File::open(paths.documents())?);
    let docs = serde_json::from_reader(f)?;
    Ok(docs)
}

pub fn save_meta(paths: &SnapshotPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &SnapshotPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Write the whole store: configs, documents and meta.
pub fn save_store(paths: &SnapshotPaths, snap: &StoreSnapshot) -> Result<MetaFile> {
    save_configs(paths, &snap.configs)?;
    save_documents(paths, &snap.documents)?;
    let meta = MetaFile::for_snapshot(snap);
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), scopes = meta.scopes, documents = meta.documents, "store saved");
    Ok(meta)
}

pub fn load_store(paths: &SnapshotPaths) -> Result<StoreSnapshot> {
    let meta = load_meta(paths).with_context(|| format!("reading meta in {}", paths.root.display()))?;
    if meta.version != FORMAT_VERSION {
        anyhow::bail!("unsupported snapshot version {} (expected {})", meta.version, FORMAT_VERSION);
    }
    let configs = load_configs(paths)?;
    let documents = load_documents(paths)?;
    tracing::info!(root = %paths.root.display(), scopes = meta.scopes, documents = meta.documents, "store loaded");
    Ok(StoreSnapshot { configs, documents })
}

pub fn save_analysis(paths: &SnapshotPaths, scope: &str, analysis: &Analysis) -> Result<PathBuf> {
    create_dir_all(paths.analyses_dir())?;
    let path = paths.analysis(scope);
    let mut f = File::create(&path)?;
    let json = serde_json::to_string_pretty(analysis)?;
    f.write_all(json.as_bytes())?;
    tracing::info!(scope, terms = analysis.len(), path = %path.display(), "analysis saved");
    Ok(path)
}

pub fn load_analysis(paths: &SnapshotPaths, scope: &str) -> Result<Analysis> {
    let path = paths.analysis(scope);
    let f = BufReader::new(File::open(&path).with_context(|| format!("opening {}", path.display()))?);
    let analysis = serde_json::from_reader(f)?;
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.text_index("notes/2024", &serde_json::from_value(json!({ "title": { "weight": 2 } })).unwrap());
        for (id, title) in [("item1", "c d d"), ("item2", "m m z")] {
            let serde_json::Value::Object(fields) = json!({ "title": title, "order": 1 }) else { unreachable!() };
            store.insert("notes/2024", id, fields);
        }
        store
    }

    #[test]
    fn store_round_trip() {
        let dir = tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path());
        let snap = sample_store().snapshot();
        let meta = save_store(&paths, &snap).unwrap();
        assert_eq!(meta.documents, 2);
        assert_eq!(load_store(&paths).unwrap(), snap);
    }

    #[test]
    fn analysis_round_trip() {
        let dir = tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path());
        let analysis = sample_store().text_analysis("notes/2024").unwrap();
        let path = save_analysis(&paths, "notes/2024", &analysis).unwrap();
        assert!(path.ends_with("analysis/6e6f7465732f32303234.json"));
        assert_eq!(load_analysis(&paths, "notes/2024").unwrap(), analysis);
    }

    #[test]
    fn similar_scope_names_get_separate_analysis_files() {
        let dir = tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path());
        let store = MemoryStore::new();
        for (scope, word) in [("a_b", "underscore"), ("a/b", "slash"), ("a b", "space")] {
            store.text_index(scope, &serde_json::from_value(json!({ "t": true })).unwrap());
            let serde_json::Value::Object(fields) = json!({ "t": word }) else { unreachable!() };
            store.insert(scope, "d", fields);
            save_analysis(&paths, scope, &store.text_analysis(scope).unwrap()).unwrap();
        }
        assert_eq!(load_analysis(&paths, "a_b").unwrap().terms(), vec!["underscore"]);
        assert_eq!(load_analysis(&paths, "a/b").unwrap().terms(), vec!["slash"]);
        assert_eq!(load_analysis(&paths, "a b").unwrap().terms(), vec!["space"]);
        assert!(load_analysis(&paths, "a.b").is_err());
    }

    #[test]
    fn meta_counts_every_scope_once() {
        let store = MemoryStore::new();
        store.text_index("configured", &serde_json::from_value(json!({ "t": true })).unwrap());
        let serde_json::Value::Object(fields) = json!({ "t": "x" }) else { unreachable!() };
        store.insert("loose", "a", fields.clone());
        store.insert("loose", "b", fields);
        let meta = MetaFile::for_snapshot(&store.snapshot());
        assert_eq!(meta.scopes, 2);
        assert_eq!(meta.documents, 2);

        let merged = sample_store();
        merged.text_index("other", &serde_json::from_value(json!({ "t": true })).unwrap());
        assert_eq!(MetaFile::for_snapshot(&merged.snapshot()).scopes, 2);
    }

    #[test]
    fn rejects_unknown_version() {
        let dir = tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path());
        let snap = sample_store().snapshot();
        save_store(&paths, &snap).unwrap();
        let mut meta = load_meta(&paths).unwrap();
        meta.version = 99;
        save_meta(&paths, &meta).unwrap();
        assert!(load_store(&paths).is_err());
    }
}
