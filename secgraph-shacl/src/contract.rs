//! Shape contract loading and compilation.
//!
//! A contract is a declarative JSON document of per-kind constraints:
//!
//! ```json
//! {
//!   "shapes": [
//!     {
//!       "kind": "http://secgraph.org/vuln/cve#Vulnerability",
//!       "closed": false,
//!       "properties": [
//!         { "path": "http://secgraph.org/vuln/cve#id",
//!           "min_count": 1, "max_count": 1,
//!           "pattern": "^CVE-\\d{4}-\\d{4,}$" },
//!         { "path": "http://secgraph.org/vuln/cve#severity",
//!           "in": ["LOW", "MEDIUM", "HIGH", "CRITICAL"] }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Contracts are loaded once per job and compiled into [`CompiledShape`]s
//! (regexes compiled eagerly so a bad pattern fails the job up front, not
//! mid-validation). The compiled form is immutable and shared across worker
//! threads.

use crate::constraints::{Constraint, NodeKind};
use crate::error::{Result, ShaclError};
use regex::Regex;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ContractDoc {
    shapes: Vec<ShapeDoc>,
}

#[derive(Debug, Deserialize)]
struct ShapeDoc {
    kind: String,
    #[serde(default)]
    closed: bool,
    #[serde(default)]
    ignored_properties: Vec<String>,
    #[serde(default)]
    properties: Vec<PropertyDoc>,
}

#[derive(Debug, Deserialize)]
struct PropertyDoc {
    path: String,
    min_count: Option<usize>,
    max_count: Option<usize>,
    datatype: Option<String>,
    node_kind: Option<String>,
    pattern: Option<String>,
    flags: Option<String>,
    #[serde(rename = "in")]
    in_values: Option<Vec<String>>,
}

/// Constraints for one property path of a shape.
#[derive(Debug, Clone)]
pub struct PropertyShape {
    /// Predicate IRI this shape constrains
    pub path: String,
    /// Constraints in contract order
    pub constraints: Vec<Constraint>,
}

/// A compiled shape for one entity kind.
#[derive(Debug, Clone)]
pub struct CompiledShape {
    /// Entity kind (class IRI matched against rdf:type)
    pub kind: String,
    /// Whether the subject may only carry declared properties
    pub closed: bool,
    /// Properties exempt from the closed check
    pub ignored: FxHashSet<String>,
    /// Property shapes in contract order
    pub properties: Vec<PropertyShape>,
}

/// A loaded, compiled shape contract.
#[derive(Debug, Clone)]
pub struct ShapeContract {
    /// Contract identity (file stem, used in reports)
    pub name: String,
    shapes: Vec<CompiledShape>,
}

impl ShapeContract {
    /// Load and compile a contract file.
    ///
    /// Fails fast: a missing file, invalid JSON, or invalid regex is a
    /// configuration error for the whole job.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ShaclError::ContractRead {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "contract".to_string());
        let contract = Self::from_json(&name, &text).map_err(|e| match e {
            ShaclError::ContractJson { source, .. } => ShaclError::ContractJson {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })?;
        tracing::debug!(
            path = %path.display(),
            shapes = contract.shapes.len(),
            "shape contract compiled"
        );
        Ok(contract)
    }

    /// Compile a contract from JSON text.
    pub fn from_json(name: &str, text: &str) -> Result<Self> {
        let doc: ContractDoc =
            serde_json::from_str(text).map_err(|source| ShaclError::ContractJson {
                path: name.to_string(),
                source,
            })?;

        let mut shapes = Vec::with_capacity(doc.shapes.len());
        for shape in doc.shapes {
            shapes.push(compile_shape(shape)?);
        }
        Ok(ShapeContract {
            name: name.to_string(),
            shapes,
        })
    }

    /// Compiled shapes in contract order.
    pub fn shapes(&self) -> &[CompiledShape] {
        &self.shapes
    }

    /// Number of shapes.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// True when the contract declares no shapes (validation is a no-op).
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

fn compile_shape(doc: ShapeDoc) -> Result<CompiledShape> {
    let mut properties = Vec::with_capacity(doc.properties.len());
    for prop in doc.properties {
        let mut constraints = Vec::new();
        if let Some(min) = prop.min_count {
            constraints.push(Constraint::MinCount(min));
        }
        if let Some(max) = prop.max_count {
            constraints.push(Constraint::MaxCount(max));
        }
        if let Some(dt) = prop.datatype {
            constraints.push(Constraint::Datatype(dt));
        }
        if let Some(kind) = prop.node_kind {
            constraints.push(Constraint::NodeKind(parse_node_kind(&kind, &doc.kind)?));
        }
        if let Some(pattern) = prop.pattern {
            let full = match prop.flags.as_deref() {
                Some(flags) if !flags.is_empty() => format!("(?{flags}){pattern}"),
                _ => pattern.clone(),
            };
            let re = Regex::new(&full).map_err(|e| ShaclError::InvalidPattern {
                kind: doc.kind.clone(),
                pattern,
                message: e.to_string(),
            })?;
            constraints.push(Constraint::Pattern(re));
        }
        if let Some(values) = prop.in_values {
            constraints.push(Constraint::In(values));
        }
        if constraints.is_empty() {
            return Err(ShaclError::InvalidShape {
                kind: doc.kind.clone(),
                message: format!("property {} declares no constraints", prop.path),
            });
        }
        properties.push(PropertyShape {
            path: prop.path,
            constraints,
        });
    }

    Ok(CompiledShape {
        kind: doc.kind,
        closed: doc.closed,
        ignored: doc.ignored_properties.into_iter().collect(),
        properties,
    })
}

fn parse_node_kind(text: &str, kind: &str) -> Result<NodeKind> {
    match text {
        "iri" => Ok(NodeKind::Iri),
        "blank" => Ok(NodeKind::Blank),
        "literal" => Ok(NodeKind::Literal),
        other => Err(ShaclError::InvalidShape {
            kind: kind.to_string(),
            message: format!("unknown node_kind '{other}' (expected iri | blank | literal)"),
        }),
    }
}
