//! Statement model, SPARQL term serialization and Turtle parsing.
//!
//! Fetched primary content is parsed once into [`Statement`]s. The same
//! statements are serialized for the target store's `INSERT DATA` requests
//! and written as the durable local copy, so the copy read back during
//! supersede yields exactly the statements that were inserted.
//!
//! # Term serialization
//!
//! ```text
//! reference            <iri>               (\ " < > escaped)
//! literal              """value"""         (\ " escaped)
//! literal + language   """value"""@lang
//! literal + datatype   """value"""^^<dt>   (omitted for xsd:string)
//! ```

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use rio_api::model::{Literal, Subject, Term as RioTerm, Triple};
use rio_api::parser::TriplesParser;
use rio_turtle::{TurtleError, TurtleParser};

use crate::error::AppError;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const DCT_TYPE: &str = "http://purl.org/dc/terms/type";
pub const NEWS_ITEM_CLASS: &str = "http://mu.semte.ch/vocabularies/ext/Nieuwsbericht";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_DATETIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";

// =============================================================================
// Terms
// =============================================================================

/// A node in a statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// Reference to an entity by IRI.
    Reference(String),
    /// Literal value with optional datatype or language tag.
    Literal {
        value: String,
        datatype: Option<String>,
        language: Option<String>,
    },
}

impl Term {
    pub fn reference(iri: impl Into<String>) -> Self {
        Term::Reference(iri.into())
    }

    /// Plain literal without datatype or language.
    pub fn plain(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    pub fn tagged(value: impl Into<String>, language: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }

    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Term::Reference(iri) => Some(iri),
            Term::Literal { .. } => None,
        }
    }

    /// Serializes the term in SPARQL/Turtle syntax.
    ///
    /// An explicit `xsd:string` datatype is dropped so the literal matches
    /// plain-string lookups in the target store.
    pub fn to_sparql(&self) -> String {
        match self {
            Term::Reference(iri) => escape_uri(iri),
            Term::Literal {
                value,
                datatype,
                language,
            } => match (datatype.as_deref(), language.as_deref()) {
                (Some(dt), _) if dt != XSD_STRING => {
                    format!("{}^^{}", escape_string(value), escape_uri(dt))
                }
                (_, Some(lang)) => format!("{}@{}", escape_string(value), lang),
                _ => escape_string(value),
            },
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sparql())
    }
}

/// Escapes an IRI for use in a query.
pub fn escape_uri(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('<');
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '<' | '>') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('>');
    out
}

/// Escapes a string as a triple-quoted literal.
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 6);
    out.push_str("\"\"\"");
    for c in value.chars() {
        if matches!(c, '\\' | '"') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push_str("\"\"\"");
    out
}

pub fn escape_datetime(value: DateTime<Utc>) -> String {
    format!(
        "\"{}\"^^{}",
        value.to_rfc3339_opts(SecondsFormat::Millis, true),
        escape_uri(XSD_DATETIME)
    )
}

pub fn escape_int(value: u64) -> String {
    format!("\"{}\"^^{}", value, escape_uri(XSD_INTEGER))
}

// =============================================================================
// Statements
// =============================================================================

/// A single subject-predicate-object triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Statement {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    pub fn to_sparql(&self) -> String {
        format!(
            "{} {} {} .",
            self.subject.to_sparql(),
            self.predicate.to_sparql(),
            self.object.to_sparql()
        )
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sparql())
    }
}

/// Serializes statements one per line.
pub fn serialize(statements: &[Statement]) -> String {
    statements
        .iter()
        .map(Statement::to_sparql)
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Parsing
// =============================================================================

#[derive(Debug)]
enum ParseFailure {
    Syntax(TurtleError),
    Unsupported(&'static str),
}

impl From<TurtleError> for ParseFailure {
    fn from(err: TurtleError) -> Self {
        ParseFailure::Syntax(err)
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFailure::Syntax(e) => write!(f, "{}", e),
            ParseFailure::Unsupported(what) => write!(f, "unsupported construct: {}", what),
        }
    }
}

/// Parses Turtle content into statements.
///
/// Blank nodes are skolemized by appending their label to `skolem_base`, so
/// every statement can later be retracted with `DELETE DATA`.
pub fn parse_turtle(input: &str, skolem_base: &str) -> Result<Vec<Statement>, AppError> {
    let mut statements = Vec::new();
    let mut parser = TurtleParser::new(input.as_bytes(), None);
    parser
        .parse_all(&mut |triple: Triple<'_>| -> Result<(), ParseFailure> {
            statements.push(convert_triple(triple, skolem_base)?);
            Ok(())
        })
        .map_err(|e| AppError::ParseError(e.to_string()))?;
    Ok(statements)
}

fn convert_triple(triple: Triple<'_>, skolem_base: &str) -> Result<Statement, ParseFailure> {
    let subject = match triple.subject {
        Subject::NamedNode(node) => Term::reference(node.iri),
        Subject::BlankNode(node) => Term::Reference(format!("{}{}", skolem_base, node.id)),
        _ => return Err(ParseFailure::Unsupported("quoted triple as subject")),
    };
    let object = match triple.object {
        RioTerm::NamedNode(node) => Term::reference(node.iri),
        RioTerm::BlankNode(node) => Term::Reference(format!("{}{}", skolem_base, node.id)),
        RioTerm::Literal(literal) => convert_literal(literal),
        _ => return Err(ParseFailure::Unsupported("quoted triple as object")),
    };
    Ok(Statement::new(
        subject,
        Term::reference(triple.predicate.iri),
        object,
    ))
}

fn convert_literal(literal: Literal<'_>) -> Term {
    match literal {
        Literal::Simple { value } => Term::plain(value),
        Literal::LanguageTaggedString { value, language } => Term::tagged(value, language),
        Literal::Typed { value, datatype } => Term::typed(value, datatype.iri),
    }
}

// =============================================================================
// Augmentation
// =============================================================================

/// Adds the local news item type to every entity classified as `classification`.
///
/// One type statement is added per distinct matching subject, after the
/// original statements. Returns the number of statements added.
pub fn augment_documents(statements: &mut Vec<Statement>, classification: &str) -> usize {
    let mut seen = HashSet::new();
    let subjects: Vec<Term> = statements
        .iter()
        .filter(|s| {
            s.predicate.as_reference() == Some(DCT_TYPE)
                && s.object.as_reference() == Some(classification)
        })
        .filter(|s| seen.insert(s.subject.clone()))
        .map(|s| s.subject.clone())
        .collect();

    let added = subjects.len();
    statements.extend(subjects.into_iter().map(|subject| {
        Statement::new(
            subject,
            Term::reference(RDF_TYPE),
            Term::reference(NEWS_ITEM_CLASS),
        )
    }));
    added
}
