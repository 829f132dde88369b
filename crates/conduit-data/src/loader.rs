//! Resolution pipeline: reads data files, resolves kind names, builds
//! node prototypes.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus [`load_node_data`] which ties them together.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use conduit_core::config::GraphConfig;
use conduit_core::graph::{GraphError, NodeGraph};
use conduit_core::grid::{Direction, PipeDirection};
use conduit_core::group::NetResource;
use conduit_core::id::{EntityId, GroupKind, NodeId};
use conduit_core::lookup::NodeLookup;
use conduit_core::node::{DockingKind, NodeDef, NodeShape};

use crate::schema::*;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A definition is well-formed but cannot be used.
    #[error("invalid definition '{name}' in {file}: {detail}")]
    Invalid {
        file: PathBuf,
        name: String,
        detail: String,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list from a file. For TOML files, extracts the array at the
/// given `toml_key` from a top-level table. For RON and JSON, deserializes
/// directly as `Vec<T>`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }

    let content = std::fs::read_to_string(path)?;
    let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
    let array = table
        .get(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
        .clone();
    array
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(path, e))
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Resolved data
// ===========================================================================

/// A resolved node-container prototype.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    /// Slot definitions, in file order.
    pub nodes: Vec<NodeDef>,
    /// Always-reachable links between slots, as index pairs into `nodes`.
    pub links: Vec<(usize, usize)>,
}

impl Prototype {
    /// Give `entity` a container built from this prototype, links included.
    pub fn spawn<R: NetResource, L: NodeLookup + ?Sized>(
        &self,
        graph: &mut NodeGraph<R>,
        entity: EntityId,
        lookup: &L,
    ) -> Result<Vec<NodeId>, GraphError> {
        let ids = graph.spawn_container(entity, &self.nodes, lookup)?;
        for &(a, b) in &self.links {
            if let (Some(&a), Some(&b)) = (ids.get(a), ids.get(b)) {
                graph.add_always_reachable(a, b);
            }
        }
        Ok(ids)
    }
}

/// Everything loaded from a data directory.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub kinds: HashMap<String, GroupKind>,
    pub prototypes: HashMap<String, Prototype>,
    pub config: GraphConfig,
}

impl NodeData {
    pub fn kind(&self, name: &str) -> Option<GroupKind> {
        self.kinds.get(name).copied()
    }

    pub fn prototype(&self, name: &str) -> Option<&Prototype> {
        self.prototypes.get(name)
    }
}

// ===========================================================================
// Pipeline
// ===========================================================================

/// Load a data directory.
///
/// Expects `kinds.*` and `nodes.*`; `graph.*` is optional and falls back to
/// [`GraphConfig::default`].
pub fn load_node_data(dir: &Path) -> Result<NodeData, DataLoadError> {
    let kinds_path = require_data_file(dir, "kinds")?;
    let kinds = load_kinds(&kinds_path)?;

    let nodes_path = require_data_file(dir, "nodes")?;
    let raw: Vec<PrototypeData> = deserialize_list(&nodes_path, "prototypes")?;
    let mut prototypes = HashMap::new();
    for data in raw {
        check_duplicate(&prototypes, &data.name, &nodes_path)?;
        let prototype = resolve_prototype(data, &kinds, &nodes_path)?;
        prototypes.insert(prototype.name.clone(), prototype);
    }

    let config = match find_data_file(dir, "graph")? {
        Some(path) => deserialize_file(&path)?,
        None => GraphConfig::default(),
    };

    Ok(NodeData {
        kinds,
        prototypes,
        config,
    })
}

fn load_kinds(path: &Path) -> Result<HashMap<String, GroupKind>, DataLoadError> {
    let raw: Vec<KindData> = deserialize_list(path, "kinds")?;
    let mut kinds = HashMap::new();
    for (index, kind) in raw.into_iter().enumerate() {
        check_duplicate(&kinds, &kind.name, path)?;
        kinds.insert(kind.name, GroupKind(index as u32));
    }
    Ok(kinds)
}

fn resolve_prototype(
    data: PrototypeData,
    kinds: &HashMap<String, GroupKind>,
    file: &Path,
) -> Result<Prototype, DataLoadError> {
    let mut slot_index: HashMap<String, usize> = HashMap::new();
    let mut nodes = Vec::with_capacity(data.nodes.len());
    for (index, slot) in data.nodes.iter().enumerate() {
        check_duplicate(&slot_index, &slot.name, file)?;
        slot_index.insert(slot.name.clone(), index);

        let kind = *resolve_name(kinds, &slot.kind, file, "kind")?;
        let shape = resolve_shape(&slot.shape);
        if matches!(&shape, NodeShape::Directional { directions, .. } if directions.is_empty()) {
            return Err(DataLoadError::Invalid {
                file: file.to_path_buf(),
                name: format!("{}.{}", data.name, slot.name),
                detail: "pipe slot without directions".to_string(),
            });
        }
        let mut def = NodeDef::new(slot.name.clone(), kind, shape);
        def.needs_anchored = slot.needs_anchored;
        nodes.push(def);
    }

    let mut links = Vec::new();
    for (index, slot) in data.nodes.iter().enumerate() {
        for target in &slot.links {
            let other = *resolve_name(&slot_index, target, file, "node slot")?;
            if other == index || nodes[other].kind != nodes[index].kind {
                return Err(DataLoadError::Invalid {
                    file: file.to_path_buf(),
                    name: format!("{}.{}", data.name, slot.name),
                    detail: format!("cannot link to slot '{target}'"),
                });
            }
            let pair = (index.min(other), index.max(other));
            if !links.contains(&pair) {
                links.push(pair);
            }
        }
    }

    Ok(Prototype {
        name: data.name,
        nodes,
        links,
    })
}

fn resolve_shape(shape: &ShapeData) -> NodeShape {
    match shape {
        ShapeData::Adjacent => NodeShape::Adjacent,
        ShapeData::Pipe {
            directions,
            rotation_aware,
        } => NodeShape::Directional {
            directions: directions
                .iter()
                .map(|d| match d {
                    DirectionData::North => Direction::North,
                    DirectionData::East => Direction::East,
                    DirectionData::South => Direction::South,
                    DirectionData::West => Direction::West,
                })
                .collect::<PipeDirection>(),
            rotation_aware: *rotation_aware,
        },
        ShapeData::Docking(DockingData::Port) => NodeShape::Docking(DockingKind::Port),
        ShapeData::Docking(DockingData::Portable) => NodeShape::Docking(DockingKind::Portable),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "conduit_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clean up a test directory.
    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const KINDS_RON: &str = r#"[(name: "power"), (name: "gas")]"#;

    // -----------------------------------------------------------------------
    // detect_format / find_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("nodes.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("nodes.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("nodes.json")).unwrap(), Format::Json);
        assert!(matches!(
            detect_format(Path::new("nodes.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("nodes")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("nodes.ron"), "[]").unwrap();
        fs::write(dir.join("nodes.json"), "[]").unwrap();

        assert!(matches!(
            find_data_file(&dir, "nodes"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn require_data_file_missing() {
        let dir = make_test_dir("require_missing");
        let result = require_data_file(&dir, "kinds");
        assert!(matches!(result, Err(DataLoadError::MissingRequired { ref file, .. }) if file == "kinds"));
        cleanup(&dir);
    }

    #[test]
    fn deserialize_list_toml_missing_key() {
        let dir = make_test_dir("list_toml_missing");
        let path = dir.join("kinds.toml");
        fs::write(&path, r#"foo = "bar""#).unwrap();

        let result: Result<Vec<KindData>, _> = deserialize_list(&path, "kinds");
        assert!(matches!(result, Err(DataLoadError::Parse { .. })));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // load_node_data
    // -----------------------------------------------------------------------

    #[test]
    fn load_ron_directory() {
        let dir = make_test_dir("load_ron");
        fs::write(dir.join("kinds.ron"), KINDS_RON).unwrap();
        fs::write(
            dir.join("nodes.ron"),
            r#"[
                (name: "cable", nodes: [(name: "power", kind: "power", shape: Adjacent)]),
                (name: "connector", nodes: [
                    (name: "pipe", kind: "gas", shape: Pipe(directions: [South]), links: ["port"]),
                    (name: "port", kind: "gas", shape: Docking(Port)),
                ]),
            ]"#,
        )
        .unwrap();
        fs::write(dir.join("graph.ron"), "(self_heal: false)").unwrap();

        let data = load_node_data(&dir).unwrap();
        assert_eq!(data.kind("power"), Some(GroupKind(0)));
        assert_eq!(data.kind("gas"), Some(GroupKind(1)));
        assert!(!data.config.self_heal);
        assert!(data.config.emit_events);

        let connector = data.prototype("connector").unwrap();
        assert_eq!(connector.nodes.len(), 2);
        assert_eq!(connector.links, vec![(0, 1)]);
        assert_eq!(
            connector.nodes[0].shape,
            NodeShape::Directional {
                directions: PipeDirection::SOUTH,
                rotation_aware: true,
            }
        );

        cleanup(&dir);
    }

    #[test]
    fn load_toml_and_json_directory() {
        let dir = make_test_dir("load_toml_json");
        fs::write(
            dir.join("kinds.toml"),
            "[[kinds]]\nname = \"power\"\n",
        )
        .unwrap();
        fs::write(
            dir.join("nodes.json"),
            r#"[{"name": "cable", "nodes": [{"name": "n", "kind": "power", "shape": "Adjacent", "needs_anchored": false}]}]"#,
        )
        .unwrap();

        let data = load_node_data(&dir).unwrap();
        let cable = data.prototype("cable").unwrap();
        assert!(!cable.nodes[0].needs_anchored);
        assert_eq!(data.config, GraphConfig::default());

        cleanup(&dir);
    }

    #[test]
    fn unknown_kind_is_unresolved() {
        let dir = make_test_dir("unknown_kind");
        fs::write(dir.join("kinds.ron"), KINDS_RON).unwrap();
        fs::write(
            dir.join("nodes.ron"),
            r#"[(name: "wire", nodes: [(name: "n", kind: "data", shape: Adjacent)])]"#,
        )
        .unwrap();

        let result = load_node_data(&dir);
        assert!(matches!(
            result,
            Err(DataLoadError::UnresolvedRef { ref name, expected_kind: "kind", .. }) if name == "data"
        ));

        cleanup(&dir);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = make_test_dir("duplicates");
        fs::write(dir.join("kinds.ron"), KINDS_RON).unwrap();
        fs::write(
            dir.join("nodes.ron"),
            r#"[
                (name: "cable", nodes: [(name: "n", kind: "power", shape: Adjacent)]),
                (name: "cable", nodes: [(name: "n", kind: "power", shape: Adjacent)]),
            ]"#,
        )
        .unwrap();
        assert!(matches!(
            load_node_data(&dir),
            Err(DataLoadError::DuplicateName { ref name, .. }) if name == "cable"
        ));

        fs::write(
            dir.join("nodes.ron"),
            r#"[(name: "cable", nodes: [
                (name: "n", kind: "power", shape: Adjacent),
                (name: "n", kind: "power", shape: Adjacent),
            ])]"#,
        )
        .unwrap();
        assert!(matches!(
            load_node_data(&dir),
            Err(DataLoadError::DuplicateName { ref name, .. }) if name == "n"
        ));

        cleanup(&dir);
    }

    #[test]
    fn bad_links_are_invalid() {
        let dir = make_test_dir("bad_links");
        fs::write(dir.join("kinds.ron"), KINDS_RON).unwrap();
        fs::write(
            dir.join("nodes.ron"),
            r#"[(name: "mixed", nodes: [
                (name: "a", kind: "power", shape: Adjacent, links: ["b"]),
                (name: "b", kind: "gas", shape: Adjacent),
            ])]"#,
        )
        .unwrap();
        assert!(matches!(load_node_data(&dir), Err(DataLoadError::Invalid { .. })));

        fs::write(
            dir.join("nodes.ron"),
            r#"[(name: "lonely", nodes: [(name: "a", kind: "power", shape: Adjacent, links: ["ghost"])])]"#,
        )
        .unwrap();
        assert!(matches!(
            load_node_data(&dir),
            Err(DataLoadError::UnresolvedRef { expected_kind: "node slot", .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn pipe_without_directions_is_invalid() {
        let dir = make_test_dir("empty_pipe");
        fs::write(dir.join("kinds.ron"), KINDS_RON).unwrap();
        fs::write(
            dir.join("nodes.ron"),
            r#"[(name: "stub", nodes: [(name: "p", kind: "gas", shape: Pipe(directions: []))])]"#,
        )
        .unwrap();
        assert!(matches!(load_node_data(&dir), Err(DataLoadError::Invalid { .. })));
        cleanup(&dir);
    }

    #[test]
    fn missing_nodes_file() {
        let dir = make_test_dir("missing_nodes");
        fs::write(dir.join("kinds.ron"), KINDS_RON).unwrap();
        assert!(matches!(
            load_node_data(&dir),
            Err(DataLoadError::MissingRequired { .. })
        ));
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Io error conversion
    // -----------------------------------------------------------------------

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let data_err: DataLoadError = io_err.into();
        assert!(matches!(data_err, DataLoadError::Io(_)));
        assert!(format!("{data_err}").contains("file not found"));
    }
}
