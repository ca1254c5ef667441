use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::index::{BuildMode, DocId, DocMeta, FieldIndex, InvertedIndex};
use crate::tokenizer::Analyzer;

pub const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
    /// Bumped on every save; `fields.bin` and `docs.bin` carry the same value.
    pub generation: u64,
    pub analyzer: Analyzer,
}

#[derive(Serialize, Deserialize)]
struct DocTable {
    docs: HashMap<DocId, DocMeta>,
    next_doc_id: DocId,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn fields(&self) -> PathBuf { self.root.join("fields.bin") }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }

    /// An index is present once its metadata file has been committed.
    pub fn exists(&self) -> bool {
        self.meta().is_file()
    }
}

fn staged(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_staged(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let tmp = staged(path);
    let mut f = BufWriter::new(File::create(&tmp)?);
    f.write_all(bytes)?;
    f.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(tmp)
}

fn read_all(path: &Path) -> Result<Vec<u8>> {
    let mut f = BufReader::new(File::open(path)?);
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Persist the whole index. Every file is staged first and renamed into
/// place afterwards, metadata last. The data files are stamped with a
/// generation shared with `meta.json`, so a save interrupted between renames
/// is detected on load instead of mixing two versions.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    let generation = load_meta(paths).map(|m| m.generation + 1).unwrap_or(1);
    let fields = bincode::serialize(&(generation, &index.fields))?;
    let docs = bincode::serialize(&(generation, DocTable { docs: index.docs.clone(), next_doc_id: index.next_doc_id }))?;
    let meta = MetaFile {
        num_docs: index.document_count(),
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        version: FORMAT_VERSION,
        generation,
        analyzer: index.analyzer,
    };
    let meta = serde_json::to_string_pretty(&meta)?;

    let staged = [
        (write_staged(&paths.fields(), &fields)?, paths.fields()),
        (write_staged(&paths.docs(), &docs)?, paths.docs()),
        (write_staged(&paths.meta(), meta.as_bytes())?, paths.meta()),
    ];
    for (tmp, dest) in staged {
        fs::rename(tmp, dest)?;
    }
    tracing::info!(root = %paths.root.display(), num_docs = index.document_count(), "index saved");
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let buf = read_all(&paths.meta())?;
    let meta: MetaFile = serde_json::from_slice(&buf)?;
    if meta.version != FORMAT_VERSION {
        return Err(Error::Serialization(format!("unsupported index version {}", meta.version)));
    }
    Ok(meta)
}

pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let meta = load_meta(paths)?;
    let (fields_gen, fields): (u64, [FieldIndex; 4]) = bincode::deserialize(&read_all(&paths.fields())?)?;
    let (docs_gen, table): (u64, DocTable) = bincode::deserialize(&read_all(&paths.docs())?)?;
    if fields_gen != meta.generation || docs_gen != meta.generation {
        return Err(Error::Serialization(format!(
            "index files are from different saves (meta {}, fields {fields_gen}, docs {docs_gen})",
            meta.generation
        )));
    }
    let ids = table.docs.iter().map(|(id, m)| (m.external_id.clone(), *id)).collect();
    let index = InvertedIndex { fields, docs: table.docs, ids, next_doc_id: table.next_doc_id, analyzer: meta.analyzer };
    if index.document_count() != meta.num_docs {
        return Err(Error::Serialization(format!(
            "metadata lists {} documents but {} were loaded",
            meta.num_docs,
            index.document_count()
        )));
    }
    Ok(index)
}

/// Starting point for a build: empty for `Create`; for `Update` the stored
/// index when one exists, empty otherwise.
pub fn open_for_build(paths: &IndexPaths, mode: BuildMode, analyzer: Analyzer) -> Result<InvertedIndex> {
    if mode == BuildMode::Create || !paths.exists() {
        return Ok(InvertedIndex::new(analyzer));
    }
    let index = load_index(paths)?;
    if *index.analyzer() != analyzer {
        return Err(Error::config(format!(
            "index at {} was built with analyzer {:?}, not {:?}",
            paths.root.display(),
            index.analyzer(),
            analyzer
        )));
    }
    Ok(index)
}
