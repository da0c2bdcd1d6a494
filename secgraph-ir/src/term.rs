//! RDF term types: IRI, blank node, and literal.
//!
//! Terms are the building blocks of triples. A term is:
//! - an IRI (always expanded, never prefixed)
//! - a blank node (stable label within one source file)
//! - a literal (value + explicit datatype + optional language tag)

use crate::Datatype;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// The value stored inside a literal term.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum LiteralValue {
    /// String value (UTF-8)
    String(Arc<str>),
    /// Boolean value
    Boolean(bool),
    /// Integer value (i64 range)
    Integer(i64),
    /// Floating point value (f64)
    Double(f64),
}

impl LiteralValue {
    /// Create a string literal value.
    pub fn string(s: impl AsRef<str>) -> Self {
        LiteralValue::String(Arc::from(s.as_ref()))
    }

    /// Get the lexical representation of this value.
    pub fn lexical(&self) -> String {
        match self {
            LiteralValue::String(s) => s.to_string(),
            LiteralValue::Boolean(b) => b.to_string(),
            LiteralValue::Integer(i) => i.to_string(),
            LiteralValue::Double(d) => {
                if d.is_nan() {
                    "NaN".to_string()
                } else if d.is_infinite() {
                    if d.is_sign_positive() {
                        "INF".to_string()
                    } else {
                        "-INF".to_string()
                    }
                } else {
                    d.to_string()
                }
            }
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LiteralValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            LiteralValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl PartialEq for LiteralValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LiteralValue::String(a), LiteralValue::String(b)) => a == b,
            (LiteralValue::Boolean(a), LiteralValue::Boolean(b)) => a == b,
            (LiteralValue::Integer(a), LiteralValue::Integer(b)) => a == b,
            // Bit comparison so NaN == NaN and terms stay hashable.
            (LiteralValue::Double(a), LiteralValue::Double(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for LiteralValue {}

impl Hash for LiteralValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            LiteralValue::String(s) => s.hash(state),
            LiteralValue::Boolean(b) => b.hash(state),
            LiteralValue::Integer(i) => i.hash(state),
            LiteralValue::Double(d) => d.to_bits().hash(state),
        }
    }
}

impl PartialOrd for LiteralValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LiteralValue {
    fn cmp(&self, other: &Self) -> Ordering {
        let type_ord = |v: &LiteralValue| -> u8 {
            match v {
                LiteralValue::String(_) => 0,
                LiteralValue::Boolean(_) => 1,
                LiteralValue::Integer(_) => 2,
                LiteralValue::Double(_) => 3,
            }
        };

        match type_ord(self).cmp(&type_ord(other)) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match (self, other) {
            (LiteralValue::String(a), LiteralValue::String(b)) => a.cmp(b),
            (LiteralValue::Boolean(a), LiteralValue::Boolean(b)) => a.cmp(b),
            (LiteralValue::Integer(a), LiteralValue::Integer(b)) => a.cmp(b),
            (LiteralValue::Double(a), LiteralValue::Double(b)) => a
                .partial_cmp(b)
                .unwrap_or_else(|| a.to_bits().cmp(&b.to_bits())),
            _ => Ordering::Equal,
        }
    }
}

/// An RDF term (subject, predicate, or object position).
///
/// # Invariants
///
/// - `Term::Iri` always contains an **expanded** IRI, never a prefixed form.
/// - For `Term::Literal` with a language tag, the datatype is `rdf:langString`.
/// - The predicate position of a triple can only be `Term::Iri`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Term {
    /// Full expanded IRI
    Iri(Arc<str>),

    /// Blank node label (without the `_:` prefix)
    Blank(Arc<str>),

    /// Literal value with explicit datatype
    Literal {
        /// The actual value
        value: LiteralValue,
        /// Datatype (always present)
        datatype: Datatype,
        /// Language tag (only when datatype is rdf:langString)
        language: Option<Arc<str>>,
    },
}

impl Term {
    /// Create an IRI term from an expanded IRI string.
    pub fn iri(iri: impl AsRef<str>) -> Self {
        Term::Iri(Arc::from(iri.as_ref()))
    }

    /// Create a blank node term from a label (without `_:`).
    pub fn blank(label: impl AsRef<str>) -> Self {
        Term::Blank(Arc::from(label.as_ref()))
    }

    /// Create a plain string literal (xsd:string).
    pub fn string(value: impl AsRef<str>) -> Self {
        Term::Literal {
            value: LiteralValue::string(value),
            datatype: Datatype::xsd_string(),
            language: None,
        }
    }

    /// Create a boolean literal (xsd:boolean).
    pub fn boolean(value: bool) -> Self {
        Term::Literal {
            value: LiteralValue::Boolean(value),
            datatype: Datatype::xsd_boolean(),
            language: None,
        }
    }

    /// Create an integer literal (xsd:integer).
    pub fn integer(value: i64) -> Self {
        Term::Literal {
            value: LiteralValue::Integer(value),
            datatype: Datatype::xsd_integer(),
            language: None,
        }
    }

    /// Create a double literal (xsd:double).
    pub fn double(value: f64) -> Self {
        Term::Literal {
            value: LiteralValue::Double(value),
            datatype: Datatype::xsd_double(),
            language: None,
        }
    }

    /// Create a language-tagged string literal (rdf:langString).
    pub fn lang_string(value: impl AsRef<str>, lang: impl AsRef<str>) -> Self {
        Term::Literal {
            value: LiteralValue::string(value),
            datatype: Datatype::rdf_lang_string(),
            language: Some(Arc::from(lang.as_ref())),
        }
    }

    /// Create a typed literal with a custom datatype.
    pub fn typed(value: impl AsRef<str>, datatype: Datatype) -> Self {
        Term::Literal {
            value: LiteralValue::string(value),
            datatype,
            language: None,
        }
    }

    /// Check if this is an IRI term.
    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    /// Check if this is a blank node.
    pub fn is_blank(&self) -> bool {
        matches!(self, Term::Blank(_))
    }

    /// Check if this is a literal.
    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal { .. })
    }

    /// Check if this is an entity reference (IRI or blank node).
    pub fn is_reference(&self) -> bool {
        !self.is_literal()
    }

    /// Try to get as IRI string.
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// Try to get literal components.
    pub fn as_literal(&self) -> Option<(&LiteralValue, &Datatype, Option<&str>)> {
        match self {
            Term::Literal {
                value,
                datatype,
                language,
            } => Some((value, datatype, language.as_deref())),
            _ => None,
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Term::Iri(a), Term::Iri(b)) => a == b,
            (Term::Blank(a), Term::Blank(b)) => a == b,
            (
                Term::Literal {
                    value: v1,
                    datatype: d1,
                    language: l1,
                },
                Term::Literal {
                    value: v2,
                    datatype: d2,
                    language: l2,
                },
            ) => v1 == v2 && d1 == d2 && l1 == l2,
            _ => false,
        }
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Term::Iri(iri) => iri.hash(state),
            Term::Blank(label) => label.hash(state),
            Term::Literal {
                value,
                datatype,
                language,
            } => {
                value.hash(state);
                datatype.hash(state);
                language.hash(state);
            }
        }
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        // Type ordering: Blank < Iri < Literal
        let type_ord = |t: &Term| -> u8 {
            match t {
                Term::Blank(_) => 0,
                Term::Iri(_) => 1,
                Term::Literal { .. } => 2,
            }
        };

        match type_ord(self).cmp(&type_ord(other)) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match (self, other) {
            (Term::Iri(a), Term::Iri(b)) => a.cmp(b),
            (Term::Blank(a), Term::Blank(b)) => a.cmp(b),
            (
                Term::Literal {
                    value: v1,
                    datatype: d1,
                    language: l1,
                },
                Term::Literal {
                    value: v2,
                    datatype: d2,
                    language: l2,
                },
            ) => (d1, l1, v1).cmp(&(d2, l2, v2)),
            _ => Ordering::Equal,
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::Blank(label) => write!(f, "_:{}", label),
            Term::Literal {
                value,
                datatype,
                language,
            } => {
                write!(f, "\"{}\"", value.lexical())?;
                if let Some(lang) = language {
                    write!(f, "@{}", lang)
                } else if !datatype.is_xsd_string() {
                    write!(f, "^^<{}>", datatype.as_iri())
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_constructors() {
        let iri = Term::iri("http://secgraph.org/vuln/cve#CVE-2024-0001");
        assert!(iri.is_iri());
        assert!(iri.is_reference());
        assert_eq!(
            iri.as_iri(),
            Some("http://secgraph.org/vuln/cve#CVE-2024-0001")
        );

        let blank = Term::blank("b0");
        assert!(blank.is_blank());
        assert!(blank.is_reference());

        let lit = Term::string("remote code execution");
        assert!(lit.is_literal());
        assert!(!lit.is_reference());

        let lang = Term::lang_string("depassement de tampon", "fr");
        let (_, dt, l) = lang.as_literal().unwrap();
        assert!(dt.is_lang_string());
        assert_eq!(l, Some("fr"));
    }

    #[test]
    fn test_lexical_values() {
        assert_eq!(LiteralValue::string("x").lexical(), "x");
        assert_eq!(LiteralValue::Boolean(true).lexical(), "true");
        assert_eq!(LiteralValue::Integer(42).lexical(), "42");
        assert_eq!(LiteralValue::Double(f64::NAN).lexical(), "NaN");
        assert_eq!(LiteralValue::Double(f64::INFINITY).lexical(), "INF");
    }

    #[test]
    fn test_term_ordering() {
        let blank = Term::blank("b0");
        let iri = Term::iri("http://example.org");
        let lit = Term::string("x");
        assert!(blank < iri);
        assert!(iri < lit);
    }

    #[test]
    fn test_term_display() {
        assert_eq!(
            format!("{}", Term::iri("http://example.org")),
            "<http://example.org>"
        );
        assert_eq!(format!("{}", Term::blank("b0")), "_:b0");
        assert_eq!(format!("{}", Term::string("hi")), "\"hi\"");
        assert_eq!(
            format!("{}", Term::integer(9)),
            "\"9\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
        assert_eq!(format!("{}", Term::lang_string("hola", "es")), "\"hola\"@es");
    }

    #[test]
    fn test_nan_equality() {
        assert_eq!(Term::double(f64::NAN), Term::double(f64::NAN));
    }
}
