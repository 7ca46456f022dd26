//! Dump loading.
//!
//! A dump document may hold its record array in several places. Each
//! location is a probe tried in priority order; the first probe that finds
//! an array wins and its elements are normalized into `Record`s.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::record::Record;

/// Key the scoring pipeline writes its dump under.
pub const DUMP_KEY: &str = "debug_scoring_dump";

/// Dump loading errors
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No debug_scoring_dump array found in {}", path.display())]
    NoDumpArray { path: PathBuf },
}

/// Where the dump array was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpShape {
    /// `{ "debug_scoring_dump": [...] }`
    TopLevel,
    /// `{ "data": { "debug_scoring_dump": [...] } }`
    NestedUnderData,
    /// `[...]`
    BareArray,
    /// First top-level array of timestamped objects.
    Scanned,
}

impl core::fmt::Display for DumpShape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DumpShape::TopLevel => write!(f, "top-level"),
            DumpShape::NestedUnderData => write!(f, "nested-under-data"),
            DumpShape::BareArray => write!(f, "bare-array"),
            DumpShape::Scanned => write!(f, "scanned"),
        }
    }
}

type Probe = fn(&Value) -> Option<&Vec<Value>>;

/// Probes in priority order.
const PROBES: [(DumpShape, Probe); 4] = [
    (DumpShape::TopLevel, probe_top_level),
    (DumpShape::NestedUnderData, probe_nested),
    (DumpShape::BareArray, probe_bare_array),
    (DumpShape::Scanned, probe_scan),
];

fn probe_top_level(doc: &Value) -> Option<&Vec<Value>> {
    doc.get(DUMP_KEY)?.as_array()
}

fn probe_nested(doc: &Value) -> Option<&Vec<Value>> {
    doc.get("data")?.get(DUMP_KEY)?.as_array()
}

fn probe_bare_array(doc: &Value) -> Option<&Vec<Value>> {
    doc.as_array()
}

fn probe_scan(doc: &Value) -> Option<&Vec<Value>> {
    doc.as_object()?
        .values()
        .filter_map(Value::as_array)
        .find(|arr| !arr.is_empty() && arr.iter().all(is_timestamped))
}

fn is_timestamped(element: &Value) -> bool {
    element.as_object().is_some_and(|o| o.contains_key("time"))
}

/// Find the dump array in a parsed document.
pub fn locate_dump(doc: &Value) -> Option<(DumpShape, &[Value])> {
    PROBES
        .iter()
        .find_map(|(shape, probe)| probe(doc).map(|arr| (*shape, arr.as_slice())))
}

/// Normalize a parsed document into records.
///
/// `origin` only names the document in the error.
pub fn records_from_document(doc: &Value, origin: &Path) -> Result<Vec<Record>, DumpError> {
    let (shape, elements) = locate_dump(doc).ok_or_else(|| DumpError::NoDumpArray {
        path: origin.to_path_buf(),
    })?;
    tracing::debug!(
        origin = %origin.display(),
        %shape,
        elements = elements.len(),
        "located dump array"
    );

    let records = elements
        .iter()
        .enumerate()
        .map(|(i, element)| {
            if !element.is_object() {
                tracing::warn!(origin = %origin.display(), index = i, "dump element is not an object");
            }
            Record::from_element(element)
        })
        .collect();
    Ok(records)
}

/// Read a JSON dump file and normalize it.
pub fn load_dump(path: impl AsRef<Path>) -> Result<Vec<Record>, DumpError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| DumpError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: Value = serde_json::from_reader(BufReader::new(file)).map_err(|source| DumpError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    records_from_document(&doc, path)
}
