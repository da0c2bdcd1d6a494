//! RDF literal datatypes.
//!
//! Datatypes are always explicit - there is no "untyped" literal. Plain
//! strings default to `xsd:string`, language-tagged strings to
//! `rdf:langString`.

use crate::vocab::{rdf, xsd};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An RDF literal datatype (an expanded IRI).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Datatype(Arc<str>);

impl Datatype {
    /// Create a datatype from an expanded IRI.
    pub fn from_iri(iri: impl AsRef<str>) -> Self {
        Datatype(Arc::from(iri.as_ref()))
    }

    /// xsd:string - default for plain string literals
    pub fn xsd_string() -> Self {
        Datatype(Arc::from(xsd::STRING))
    }

    /// xsd:boolean
    pub fn xsd_boolean() -> Self {
        Datatype(Arc::from(xsd::BOOLEAN))
    }

    /// xsd:integer
    pub fn xsd_integer() -> Self {
        Datatype(Arc::from(xsd::INTEGER))
    }

    /// xsd:double
    pub fn xsd_double() -> Self {
        Datatype(Arc::from(xsd::DOUBLE))
    }

    /// xsd:dateTime
    pub fn xsd_date_time() -> Self {
        Datatype(Arc::from(xsd::DATE_TIME))
    }

    /// rdf:langString - for language-tagged literals
    pub fn rdf_lang_string() -> Self {
        Datatype(Arc::from(rdf::LANG_STRING))
    }

    /// Get the IRI representation of this datatype.
    pub fn as_iri(&self) -> &str {
        &self.0
    }

    /// Check if this is the xsd:string datatype.
    pub fn is_xsd_string(&self) -> bool {
        self.0.as_ref() == xsd::STRING
    }

    /// Check if this is the rdf:langString datatype.
    pub fn is_lang_string(&self) -> bool {
        self.0.as_ref() == rdf::LANG_STRING
    }

    /// Check if this is a numeric type (integer, long, double, decimal).
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.0.as_ref(),
            xsd::INTEGER | xsd::LONG | xsd::DOUBLE | xsd::DECIMAL
        )
    }
}

impl PartialEq for Datatype {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Datatype {}

impl Hash for Datatype {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl PartialOrd for Datatype {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Datatype {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl std::fmt::Display for Datatype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
