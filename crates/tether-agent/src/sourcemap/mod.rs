//! Source Map v3 index.
//!
//! Maps an authored (input) source position to the position in the generated
//! file the interpreter actually loads. Only the reverse direction is needed:
//! breakpoints are requested against authored sources.

mod vlq;

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::SourceMapError;
use crate::messages;
use crate::paths::{is_suffix_match, normalize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Mapping {
    source_line: u32,
    source_column: u32,
    generated_line: u32,
    generated_column: u32,
}

#[derive(Debug)]
struct MapEntry {
    output_file: String,
    /// Mappings per source, sorted by source position.
    by_source: Vec<Vec<Mapping>>,
}

/// Where an input file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapInfo {
    pub input_file: String,
    pub output_file: String,
    entry: usize,
    source: usize,
}

/// A 1-based position in a generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPosition {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Default)]
pub struct SourceMapIndex {
    entries: Vec<MapEntry>,
    inputs: IndexMap<String, Vec<(usize, usize)>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
    version: u32,
    file: Option<String>,
    source_root: Option<String>,
    #[serde(default)]
    sources: Vec<Option<String>>,
    #[serde(default)]
    mappings: String,
}

impl SourceMapIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every map file; the first failure aborts.
    pub fn build(map_files: &[PathBuf]) -> Result<Self, SourceMapError> {
        let mut index = Self::new();
        for path in map_files {
            let text = std::fs::read_to_string(path).map_err(|source| SourceMapError::Read {
                path: path.clone(),
                source,
            })?;
            index.add(path, &text)?;
        }
        Ok(index)
    }

    /// Load what can be loaded and return the failures alongside.
    #[must_use]
    pub fn build_lenient(map_files: &[PathBuf]) -> (Self, Vec<SourceMapError>) {
        let mut index = Self::new();
        let mut failures = Vec::new();
        for path in map_files {
            let result = std::fs::read_to_string(path)
                .map_err(|source| SourceMapError::Read {
                    path: path.clone(),
                    source,
                })
                .and_then(|text| index.add(path, &text));
            if let Err(err) = result {
                warn!(%err, "{}", messages::SOURCE_MAP_READ_ERROR);
                failures.push(err);
            }
        }
        (index, failures)
    }

    /// Add one map given its path and JSON text.
    pub fn add(&mut self, map_path: &Path, json: &str) -> Result<(), SourceMapError> {
        let malformed = |message: String| SourceMapError::Malformed {
            path: map_path.to_path_buf(),
            message: message.into(),
        };
        let raw: RawSourceMap =
            serde_json::from_str(json).map_err(|err| malformed(err.to_string()))?;
        if raw.version != 3 {
            return Err(malformed(format!("unsupported version {}", raw.version)));
        }
        let map_dir = map_path.parent().unwrap_or_else(|| Path::new(""));
        let output_file = match &raw.file {
            Some(file) => normalize(&map_dir.join(file).to_string_lossy()),
            None => {
                let text = map_path.to_string_lossy();
                normalize(text.strip_suffix(".map").unwrap_or(&text))
            }
        };
        let source_dir = match &raw.source_root {
            Some(root) => map_dir.join(root),
            None => map_dir.to_path_buf(),
        };
        let by_source = decode_mappings(&raw.mappings, raw.sources.len()).map_err(malformed)?;

        let entry = self.entries.len();
        for (source, name) in raw.sources.iter().enumerate() {
            let Some(name) = name else { continue };
            let input = normalize(&source_dir.join(name).to_string_lossy());
            self.inputs.entry(input).or_default().push((entry, source));
        }
        debug!(map = %map_path.display(), output = %output_file, sources = raw.sources.len(), "loaded source map");
        self.entries.push(MapEntry {
            output_file,
            by_source,
        });
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the map that covers `path`.
    ///
    /// Tries the exact normalized path first, then separator-aligned suffix
    /// matches. `Ok(None)` means `path` is not a mapped input.
    pub fn map_input(&self, path: &str) -> Result<Option<MapInfo>, SourceMapError> {
        let path = normalize(path);
        let hits: Vec<(&String, (usize, usize))> = match self.inputs.get_key_value(&path) {
            Some((input, targets)) => targets.iter().map(|target| (input, *target)).collect(),
            None => {
                let suffix = path.trim_start_matches('/');
                self.inputs
                    .iter()
                    .filter(|(input, _)| is_suffix_match(input, suffix))
                    .flat_map(|(input, targets)| targets.iter().map(move |target| (input, *target)))
                    .collect()
            }
        };
        match hits.as_slice() {
            [] => Ok(None),
            [(input, (entry, source))] => Ok(Some(MapInfo {
                input_file: (*input).clone(),
                output_file: self.entries[*entry].output_file.clone(),
                entry: *entry,
                source: *source,
            })),
            _ => {
                let mut outputs: Vec<String> = hits
                    .iter()
                    .map(|(_, (entry, _))| self.entries[*entry].output_file.clone())
                    .collect();
                outputs.dedup();
                Err(SourceMapError::MultiFileMatch(outputs))
            }
        }
    }

    /// Translate a 1-based input position into the generated file.
    ///
    /// Picks the first mapping at or after the position: later on the same
    /// line, otherwise the start of the nearest following mapped line.
    #[must_use]
    pub fn map_output(&self, line: u32, column: u32, info: &MapInfo) -> MappedPosition {
        let target = (line.saturating_sub(1), column.saturating_sub(1));
        let mappings = self
            .entries
            .get(info.entry)
            .and_then(|entry| entry.by_source.get(info.source))
            .map_or(&[][..], Vec::as_slice);
        let idx = mappings.partition_point(|m| (m.source_line, m.source_column) < target);
        match mappings.get(idx) {
            Some(mapping) => MappedPosition {
                file: info.output_file.clone(),
                line: mapping.generated_line.saturating_add(1),
                column: mapping.generated_column.saturating_add(1),
            },
            None => MappedPosition {
                file: info.output_file.clone(),
                line,
                column,
            },
        }
    }
}

fn decode_mappings(mappings: &str, source_count: usize) -> Result<Vec<Vec<Mapping>>, String> {
    let mut by_source: Vec<Vec<Mapping>> = vec![Vec::new(); source_count];
    let mut source = 0i64;
    let mut source_line = 0i64;
    let mut source_column = 0i64;
    for (generated_line, line) in mappings.split(';').enumerate() {
        let mut generated_column = 0i64;
        for segment in line.split(',').filter(|segment| !segment.is_empty()) {
            let fields = vlq::decode_segment(segment)?;
            let advance = |total: &mut i64, delta: i64| {
                *total = total
                    .checked_add(delta)
                    .ok_or_else(|| format!("VLQ delta overflows in segment '{segment}'"))?;
                Ok::<(), String>(())
            };
            advance(&mut generated_column, fields[0])?;
            if fields.len() < 4 {
                continue;
            }
            advance(&mut source, fields[1])?;
            advance(&mut source_line, fields[2])?;
            advance(&mut source_column, fields[3])?;
            let slot = usize::try_from(source)
                .ok()
                .and_then(|idx| by_source.get_mut(idx))
                .ok_or_else(|| format!("source index {source} out of range"))?;
            let to_u32 = |value: i64| {
                u32::try_from(value).map_err(|_| format!("negative position in segment '{segment}'"))
            };
            slot.push(Mapping {
                source_line: to_u32(source_line)?,
                source_column: to_u32(source_column)?,
                generated_line: to_u32(i64::try_from(generated_line).unwrap_or(i64::MAX))?,
                generated_column: to_u32(generated_column)?,
            });
        }
    }
    for mappings in &mut by_source {
        mappings.sort_unstable();
    }
    Ok(by_source)
}
