//! Single-statement parsing.
//!
//! The input format is a line-oriented Turtle subset: one statement per
//! logical line, terminated by `.`, with `#` comments, prefixed names, full
//! IRIs, blank nodes, and literals carrying escapes, `@lang` tags and `^^`
//! datatypes.
//!
//! Two fidelity modes:
//! - [`parse_statement`] (*strict*): full grammar walk into typed terms;
//!   malformed statements are line-numbered errors.
//! - [`parse_statement_fast`] (*fast*): lightweight lexical splitting without
//!   escape validation, trading correctness on edge-case escaping for
//!   throughput. Intended only for trusted, previously-validated inputs.

use crate::error::{Result, TurtleError};
use rustc_hash::FxHashMap;
use secgraph_ir::vocab::rdf;
use secgraph_ir::{Datatype, Term, Triple};

/// Declared prefixes and base IRI for one source file.
#[derive(Debug, Clone, Default)]
pub struct Prefixes {
    map: FxHashMap<String, String>,
    base: Option<String>,
}

impl Prefixes {
    /// Declare a prefix. Later declarations shadow earlier ones.
    pub fn declare(&mut self, prefix: &str, namespace_iri: &str) {
        self.map.insert(prefix.to_string(), namespace_iri.to_string());
    }

    /// Set the base IRI used to expand relative IRI references.
    pub fn set_base(&mut self, base_iri: &str) {
        self.base = Some(base_iri.to_string());
    }

    /// Number of declared prefixes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no prefixes have been declared.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Expand a `prefix:local` name to a full IRI.
    pub fn resolve(&self, name: &str, line: u64) -> Result<String> {
        let (prefix, local) = name.split_once(':').ok_or_else(|| {
            TurtleError::syntax(line, format!("expected prefixed name, got '{name}'"))
        })?;
        match self.map.get(prefix) {
            Some(ns) => Ok(format!("{ns}{local}")),
            None => Err(TurtleError::UndeclaredPrefix {
                line,
                prefix: prefix.to_string(),
            }),
        }
    }

    /// Expand an IRI reference against the base when it is relative.
    fn expand(&self, iri: &str) -> String {
        // Absolute IRIs carry a scheme before any path character.
        let has_scheme = iri
            .split_once(':')
            .is_some_and(|(scheme, _)| !scheme.is_empty() && !scheme.contains('/'));
        if has_scheme {
            return iri.to_string();
        }
        match &self.base {
            Some(base) => format!("{base}{iri}"),
            None => iri.to_string(),
        }
    }
}

/// A header directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `@prefix p: <iri> .` or `PREFIX p: <iri>`
    Prefix(String, String),
    /// `@base <iri> .` or `BASE <iri>`
    Base(String),
}

/// Try to parse a directive line. Returns `Ok(None)` when the line is not a
/// directive at all; `Err` when it starts like one but is malformed.
pub fn parse_directive(line_text: &str, line: u64) -> Result<Option<Directive>> {
    let trimmed = line_text.trim_start();
    let (keyword, turtle_style) = if trimmed.starts_with("@prefix") {
        ("@prefix", true)
    } else if trimmed.starts_with("@base") {
        ("@base", true)
    } else if trimmed.starts_with("PREFIX") {
        ("PREFIX", false)
    } else if trimmed.starts_with("BASE") {
        ("BASE", false)
    } else {
        return Ok(None);
    };

    // The keyword must be followed by whitespace — `PREFIXED:x` is data,
    // not a directive.
    let after = &trimmed[keyword.len()..];
    if !after.starts_with(char::is_whitespace) {
        return Ok(None);
    }

    let rest = after.trim();
    let is_prefix = keyword.ends_with("PREFIX") || keyword.ends_with("prefix");

    let (name, rest) = if is_prefix {
        let (name, rest) = rest.split_once(':').ok_or_else(|| {
            TurtleError::syntax(line, format!("{keyword} directive missing ':'"))
        })?;
        (Some(name.trim().to_string()), rest.trim())
    } else {
        (None, rest)
    };

    let iri_start = rest.find('<').ok_or_else(|| {
        TurtleError::syntax(line, format!("{keyword} directive missing '<iri>'"))
    })?;
    let iri_end = rest[iri_start..].find('>').ok_or_else(|| {
        TurtleError::syntax(line, format!("{keyword} directive has unterminated IRI"))
    })? + iri_start;
    let iri = &rest[iri_start + 1..iri_end];

    // Turtle-style directives require the terminating dot.
    if turtle_style && !rest[iri_end + 1..].trim().starts_with('.') {
        return Err(TurtleError::syntax(
            line,
            format!("{keyword} directive missing terminating '.'"),
        ));
    }

    Ok(Some(match name {
        Some(p) => Directive::Prefix(p, iri.to_string()),
        None => Directive::Base(iri.to_string()),
    }))
}

/// Strip a trailing `#` comment, ignoring `#` inside `<...>` or quoted
/// strings.
pub fn strip_comment(line_text: &str) -> &str {
    let bytes = line_text.as_bytes();
    let mut in_iri = false;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' if !in_iri => in_string = !in_string,
            b'<' if !in_string && !in_iri => in_iri = true,
            b'>' if in_iri => in_iri = false,
            b'#' if !in_string && !in_iri => return &line_text[..i],
            _ => {}
        }
    }
    line_text
}

// ----------------------------------------------------------------------------
// Strict parsing
// ----------------------------------------------------------------------------

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    line: u64,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, line: u64) -> Self {
        Cursor { text, pos: 0, line }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self, ch: char) {
        self.pos += ch.len_utf8();
    }

    fn err(&self, message: impl Into<String>) -> TurtleError {
        TurtleError::syntax(self.line, message)
    }

    /// Read `<...>` starting at the current `<`.
    fn read_iri_ref(&mut self) -> Result<&'a str> {
        debug_assert_eq!(self.peek(), Some('<'));
        self.bump('<');
        let start = self.pos;
        match self.rest().find('>') {
            Some(rel) => {
                let iri = &self.text[start..start + rel];
                self.pos = start + rel + 1;
                if iri.contains(char::is_whitespace) {
                    return Err(self.err("whitespace inside IRI reference"));
                }
                Ok(iri)
            }
            None => Err(self.err("unterminated IRI reference")),
        }
    }

    /// Read a bare token up to the next whitespace.
    fn read_token(&mut self) -> &'a str {
        let start = self.pos;
        let rest = self.rest();
        let end = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len());
        self.pos = start + end;
        &self.text[start..start + end]
    }

    /// Read a quoted string body with escape decoding.
    fn read_string(&mut self) -> Result<String> {
        debug_assert_eq!(self.peek(), Some('"'));
        self.bump('"');
        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((i, ch)) = chars.next() {
            match ch {
                '"' => {
                    self.pos += i + 1;
                    return Ok(out);
                }
                '\\' => {
                    let (_, esc) = chars
                        .next()
                        .ok_or_else(|| self.err("dangling escape at end of string"))?;
                    match esc {
                        't' => out.push('\t'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        '"' => out.push('"'),
                        '\'' => out.push('\''),
                        '\\' => out.push('\\'),
                        'u' | 'U' => {
                            let len = if esc == 'u' { 4 } else { 8 };
                            let mut hex = String::with_capacity(len);
                            for _ in 0..len {
                                let (_, h) = chars.next().ok_or_else(|| {
                                    self.err("truncated \\u escape in string")
                                })?;
                                hex.push(h);
                            }
                            let code = u32::from_str_radix(&hex, 16)
                                .map_err(|_| self.err(format!("invalid \\u escape '{hex}'")))?;
                            let decoded = char::from_u32(code).ok_or_else(|| {
                                self.err(format!("\\u escape U+{hex} is not a character"))
                            })?;
                            out.push(decoded);
                        }
                        other => {
                            return Err(self.err(format!("unknown string escape '\\{other}'")))
                        }
                    }
                }
                _ => out.push(ch),
            }
        }
        Err(self.err("unterminated string literal"))
    }
}

/// Parse one statement in strict mode.
///
/// The line must contain exactly `subject predicate object .` with nothing
/// but whitespace after the terminating dot (comments are stripped by the
/// caller).
pub fn parse_statement(line_text: &str, line: u64, prefixes: &Prefixes) -> Result<Triple> {
    let mut cur = Cursor::new(line_text, line);

    cur.skip_ws();
    let subject = parse_subject(&mut cur, prefixes)?;

    cur.skip_ws();
    let predicate = parse_predicate(&mut cur, prefixes)?;

    cur.skip_ws();
    let object = parse_object(&mut cur, prefixes)?;

    cur.skip_ws();
    match cur.peek() {
        Some('.') => {
            cur.bump('.');
            cur.skip_ws();
            if cur.peek().is_some() {
                return Err(cur.err("trailing content after statement terminator"));
            }
        }
        _ => return Err(cur.err("statement missing terminating '.'")),
    }

    Ok(Triple::new(subject, predicate, object))
}

fn parse_subject(cur: &mut Cursor<'_>, prefixes: &Prefixes) -> Result<Term> {
    match cur.peek() {
        Some('<') => {
            let iri = cur.read_iri_ref()?;
            Ok(Term::iri(prefixes.expand(iri)))
        }
        Some('_') if cur.rest().starts_with("_:") => {
            let token = cur.read_token();
            Ok(Term::blank(&token[2..]))
        }
        Some('"') => Err(cur.err("literal in subject position")),
        Some(_) => {
            let token = cur.read_token();
            Ok(Term::iri(prefixes.resolve(token, cur.line)?))
        }
        None => Err(cur.err("empty statement")),
    }
}

fn parse_predicate(cur: &mut Cursor<'_>, prefixes: &Prefixes) -> Result<Term> {
    match cur.peek() {
        Some('<') => {
            let iri = cur.read_iri_ref()?;
            Ok(Term::iri(prefixes.expand(iri)))
        }
        Some('"') => Err(cur.err("literal in predicate position")),
        Some('_') if cur.rest().starts_with("_:") => {
            Err(cur.err("blank node in predicate position"))
        }
        Some(_) => {
            let token = cur.read_token();
            if token == "a" {
                // Turtle shorthand for rdf:type.
                return Ok(Term::iri(rdf::TYPE));
            }
            Ok(Term::iri(prefixes.resolve(token, cur.line)?))
        }
        None => Err(cur.err("statement missing predicate")),
    }
}

fn parse_object(cur: &mut Cursor<'_>, prefixes: &Prefixes) -> Result<Term> {
    match cur.peek() {
        Some('<') => {
            let iri = cur.read_iri_ref()?;
            Ok(Term::iri(prefixes.expand(iri)))
        }
        Some('_') if cur.rest().starts_with("_:") => {
            let token = cur.read_token();
            Ok(Term::blank(&token[2..]))
        }
        Some('"') => {
            let value = cur.read_string()?;
            parse_literal_suffix(cur, prefixes, value)
        }
        Some(c) if c.is_ascii_digit() || c == '+' || c == '-' => {
            let token = cur.read_token();
            let token = token.strip_suffix('.').map(|t| {
                // Statement dot glued to a bare numeric token: give it back.
                cur.pos -= 1;
                t
            }).unwrap_or(token);
            parse_numeric(cur, token)
        }
        Some(_) => {
            let mut token = cur.read_token();
            if let Some(stripped) = token.strip_suffix('.') {
                // Statement dot glued to the token: give it back.
                if !stripped.is_empty() {
                    cur.pos -= 1;
                    token = stripped;
                }
            }
            match token {
                "true" => Ok(Term::boolean(true)),
                "false" => Ok(Term::boolean(false)),
                _ => Ok(Term::iri(prefixes.resolve(token, cur.line)?)),
            }
        }
        None => Err(cur.err("statement missing object")),
    }
}

fn parse_literal_suffix(cur: &mut Cursor<'_>, prefixes: &Prefixes, value: String) -> Result<Term> {
    match cur.peek() {
        Some('@') => {
            cur.bump('@');
            let lang = cur.read_token();
            if lang.is_empty() {
                return Err(cur.err("empty language tag"));
            }
            Ok(Term::lang_string(value, lang))
        }
        Some('^') if cur.rest().starts_with("^^") => {
            cur.bump('^');
            cur.bump('^');
            let dt_iri = match cur.peek() {
                Some('<') => cur.read_iri_ref()?.to_string(),
                Some(_) => prefixes.resolve(cur.read_token(), cur.line)?,
                None => return Err(cur.err("dangling '^^' without datatype")),
            };
            Ok(typed_literal(value, &dt_iri, cur)?)
        }
        _ => Ok(Term::string(value)),
    }
}

/// Coerce a `^^`-typed literal to its native value representation when the
/// datatype is one the IR stores natively.
fn typed_literal(value: String, dt_iri: &str, cur: &Cursor<'_>) -> Result<Term> {
    use secgraph_ir::vocab::xsd;
    match dt_iri {
        xsd::BOOLEAN => match value.as_str() {
            "true" | "1" => Ok(Term::boolean(true)),
            "false" | "0" => Ok(Term::boolean(false)),
            _ => Err(cur.err(format!("invalid xsd:boolean lexical value '{value}'"))),
        },
        xsd::INTEGER | xsd::LONG => value
            .parse::<i64>()
            .map(Term::integer)
            .map_err(|_| cur.err(format!("invalid integer lexical value '{value}'"))),
        xsd::DOUBLE | xsd::DECIMAL => value
            .parse::<f64>()
            .map(Term::double)
            .map_err(|_| cur.err(format!("invalid double lexical value '{value}'"))),
        _ => Ok(Term::typed(value, Datatype::from_iri(dt_iri))),
    }
}

fn parse_numeric(cur: &Cursor<'_>, token: &str) -> Result<Term> {
    if let Ok(i) = token.parse::<i64>() {
        return Ok(Term::integer(i));
    }
    token
        .parse::<f64>()
        .map(Term::double)
        .map_err(|_| cur.err(format!("invalid numeric token '{token}'")))
}

// ----------------------------------------------------------------------------
// Fast parsing
// ----------------------------------------------------------------------------

/// Parse one statement in fast mode.
///
/// Lexical splitting only: no escape decoding, no datatype coercion beyond
/// tag recognition. Returns `None` for any line that does not lexically split
/// into three terms and a terminator — the caller skips and counts it.
pub fn parse_statement_fast(line_text: &str, prefixes: &Prefixes) -> Option<Triple> {
    let mut rest = line_text.trim();
    rest = rest.strip_suffix('.')?.trim_end();

    let (s_tok, rest) = split_term_token(rest)?;
    let rest = rest.trim_start();
    let (p_tok, rest) = split_term_token(rest)?;
    let o_tok = rest.trim();
    if o_tok.is_empty() {
        return None;
    }

    let s = fast_reference(s_tok, prefixes)?;
    if s.is_literal() {
        return None;
    }
    let p = if p_tok == "a" {
        Term::iri(rdf::TYPE)
    } else {
        let p = fast_reference(p_tok, prefixes)?;
        if !p.is_iri() {
            return None;
        }
        p
    };
    let o = fast_object(o_tok, prefixes)?;

    Some(Triple::new(s, p, o))
}

/// Split one term token off the front of `rest`, honoring `<...>` grouping.
fn split_term_token(rest: &str) -> Option<(&str, &str)> {
    if rest.is_empty() {
        return None;
    }
    if rest.starts_with('<') {
        let end = rest.find('>')?;
        return Some((&rest[..=end], &rest[end + 1..]));
    }
    match rest.find(char::is_whitespace) {
        Some(end) => Some((&rest[..end], &rest[end..])),
        None => Some((rest, "")),
    }
}

fn fast_reference(token: &str, prefixes: &Prefixes) -> Option<Term> {
    if let Some(body) = token.strip_prefix('<') {
        return Some(Term::iri(prefixes.expand(body.strip_suffix('>')?)));
    }
    if let Some(label) = token.strip_prefix("_:") {
        return Some(Term::blank(label));
    }
    if token.starts_with('"') {
        return None;
    }
    prefixes.resolve(token, 0).ok().map(Term::iri)
}

fn fast_object(token: &str, prefixes: &Prefixes) -> Option<Term> {
    if let Some(body) = token.strip_prefix('"') {
        // Find the closing quote lexically (last unescaped quote heuristic:
        // fast mode does not validate escapes, so split at the final quote).
        let close = body.rfind('"')?;
        let value = &body[..close];
        let suffix = &body[close + 1..];
        if let Some(lang) = suffix.strip_prefix('@') {
            return Some(Term::lang_string(value, lang.trim()));
        }
        if let Some(dt) = suffix.strip_prefix("^^") {
            let dt = dt.trim();
            let dt_iri = if let Some(body) = dt.strip_prefix('<') {
                body.strip_suffix('>')?.to_string()
            } else {
                prefixes.resolve(dt, 0).ok()?
            };
            return Some(Term::typed(value, Datatype::from_iri(dt_iri)));
        }
        return Some(Term::string(value));
    }
    if let Ok(i) = token.parse::<i64>() {
        return Some(Term::integer(i));
    }
    if let Ok(d) = token.parse::<f64>() {
        return Some(Term::double(d));
    }
    match token {
        "true" => Some(Term::boolean(true)),
        "false" => Some(Term::boolean(false)),
        _ => fast_reference(token, prefixes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secgraph_ir::LiteralValue;

    fn prefixes() -> Prefixes {
        let mut p = Prefixes::default();
        p.declare("ex", "http://example.org/");
        p.declare("cve", "http://secgraph.org/vuln/cve#");
        p
    }

    #[test]
    fn test_strict_full_iris() {
        let t = parse_statement(
            "<http://e/a> <http://e/p> <http://e/b> .",
            1,
            &Prefixes::default(),
        )
        .unwrap();
        assert_eq!(t.s.as_iri(), Some("http://e/a"));
        assert_eq!(t.o.as_iri(), Some("http://e/b"));
    }

    #[test]
    fn test_strict_prefixed_names() {
        let t = parse_statement("ex:a ex:p cve:CVE-2024-0001 .", 1, &prefixes()).unwrap();
        assert_eq!(t.s.as_iri(), Some("http://example.org/a"));
        assert_eq!(
            t.o.as_iri(),
            Some("http://secgraph.org/vuln/cve#CVE-2024-0001")
        );
    }

    #[test]
    fn test_strict_a_shorthand() {
        let t = parse_statement("ex:a a ex:Vulnerability .", 1, &prefixes()).unwrap();
        assert_eq!(t.predicate_iri(), rdf::TYPE);
    }

    #[test]
    fn test_strict_string_escapes() {
        let t = parse_statement(
            r#"ex:a ex:p "line\nbreak \"quoted\" tab\t" ."#,
            1,
            &prefixes(),
        )
        .unwrap();
        let (v, _, _) = t.o.as_literal().unwrap();
        assert_eq!(v.as_str(), Some("line\nbreak \"quoted\" tab\t"));
    }

    #[test]
    fn test_strict_unicode_escape() {
        let t = parse_statement(r#"ex:a ex:p "été" ."#, 1, &prefixes()).unwrap();
        let (v, _, _) = t.o.as_literal().unwrap();
        assert_eq!(v.as_str(), Some("été"));
    }

    #[test]
    fn test_strict_lang_and_datatype() {
        let t = parse_statement(r#"ex:a ex:p "salut"@fr ."#, 1, &prefixes()).unwrap();
        let (_, dt, lang) = t.o.as_literal().unwrap();
        assert!(dt.is_lang_string());
        assert_eq!(lang, Some("fr"));

        let t = parse_statement(
            r#"ex:a ex:p "9.8"^^<http://www.w3.org/2001/XMLSchema#double> ."#,
            1,
            &prefixes(),
        )
        .unwrap();
        let (v, _, _) = t.o.as_literal().unwrap();
        assert!(matches!(v, LiteralValue::Double(d) if (*d - 9.8).abs() < 1e-9));
    }

    #[test]
    fn test_strict_bare_numerics_and_booleans() {
        let t = parse_statement("ex:a ex:p 42 .", 1, &prefixes()).unwrap();
        let (v, _, _) = t.o.as_literal().unwrap();
        assert_eq!(v.as_integer(), Some(42));

        let t = parse_statement("ex:a ex:p true .", 1, &prefixes()).unwrap();
        assert_eq!(t.o, Term::boolean(true));
    }

    #[test]
    fn test_strict_rejections() {
        let p = prefixes();
        assert!(parse_statement(r#""lit" ex:p ex:b ."#, 1, &p).is_err());
        assert!(parse_statement("ex:a _:b ex:b .", 1, &p).is_err());
        assert!(parse_statement("ex:a ex:p ex:b", 1, &p).is_err()); // no dot
        assert!(parse_statement("ex:a ex:p ex:b . ex:extra", 1, &p).is_err());
        assert!(parse_statement(r#"ex:a ex:p "unterminated ."#, 1, &p).is_err());
        assert!(matches!(
            parse_statement("nope:a ex:p ex:b .", 7, &p),
            Err(TurtleError::UndeclaredPrefix { line: 7, .. })
        ));
    }

    #[test]
    fn test_strict_relative_iri_expansion() {
        let mut p = prefixes();
        p.set_base("http://base.org/");
        let t = parse_statement("<a> <p> <b> .", 1, &p).unwrap();
        assert_eq!(t.s.as_iri(), Some("http://base.org/a"));
    }

    #[test]
    fn test_fast_matches_strict_on_clean_input() {
        let p = prefixes();
        for line in [
            "ex:a ex:p ex:b .",
            "<http://e/a> <http://e/p> \"v\" .",
            "ex:a a ex:Weakness .",
            "ex:a ex:score 42 .",
        ] {
            let strict = parse_statement(line, 1, &p).unwrap();
            let fast = parse_statement_fast(line, &p).unwrap();
            assert_eq!(strict.s, fast.s, "line: {line}");
            assert_eq!(strict.p, fast.p, "line: {line}");
            // Object kind (literal vs reference) always agrees; exact value
            // representation may differ for typed literals.
            assert_eq!(strict.o.is_literal(), fast.o.is_literal(), "line: {line}");
        }
    }

    #[test]
    fn test_fast_skips_malformed() {
        let p = prefixes();
        assert!(parse_statement_fast("not a statement", &p).is_none());
        assert!(parse_statement_fast("ex:a ex:p .", &p).is_none());
        assert!(parse_statement_fast("unknown:a ex:p ex:b .", &p).is_none());
    }

    #[test]
    fn test_directive_parsing() {
        assert_eq!(
            parse_directive("@prefix ex: <http://example.org/> .", 1).unwrap(),
            Some(Directive::Prefix(
                "ex".to_string(),
                "http://example.org/".to_string()
            ))
        );
        assert_eq!(
            parse_directive("PREFIX ex: <http://example.org/>", 1).unwrap(),
            Some(Directive::Prefix(
                "ex".to_string(),
                "http://example.org/".to_string()
            ))
        );
        assert_eq!(
            parse_directive("@base <http://base.org/> .", 1).unwrap(),
            Some(Directive::Base("http://base.org/".to_string()))
        );
        assert_eq!(parse_directive("ex:a ex:p ex:b .", 1).unwrap(), None);
        // Turtle-style directive without the dot is malformed.
        assert!(parse_directive("@prefix ex: <http://example.org/>", 1).is_err());
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("ex:a ex:p ex:b . # trailing"), "ex:a ex:p ex:b . ");
        assert_eq!(
            strip_comment(r#"ex:a ex:p "has # inside" ."#),
            r#"ex:a ex:p "has # inside" ."#
        );
        assert_eq!(
            strip_comment("ex:a ex:p <http://e/page#frag> ."),
            "ex:a ex:p <http://e/page#frag> ."
        );
    }
}
