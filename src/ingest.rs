//! Loading catalog and member listings from whitespace-separated text
//!
//! Catalog lines read `id title author pageCount topic type copies [extra...]`
//! and member lines read `id name email category`. Underscores in free-text
//! columns stand for spaces. Blank lines are ignored; a malformed line is
//! reported and skipped without stopping the load.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use tracing::{info, warn};

use crate::{
    engine::LendingEngine,
    error::IngestError,
    member::MemberKind,
    resource::{Resource, ResourceKind},
};

/// Columns a catalog line must have
const CATALOG_FIELDS: usize = 7;

/// Columns a member line must have
const MEMBER_FIELDS: usize = 4;

/// Outcome of loading one listing
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Entries added to the engine
    pub loaded: usize,
    /// Lines that were skipped, with the reason
    pub skipped: Vec<IngestError>,
}

impl IngestReport {
    /// Whether every non-blank line was loaded
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Record a skipped line
    fn skip(&mut self, error: IngestError) {
        warn!(%error, "line skipped");
        self.skipped.push(error);
    }
}

/// Turn `Some_Text` into `Some Text`
fn text(field: &str) -> String {
    field.replace('_', " ")
}

/// Parse a numeric column
fn number(line: usize, field: &'static str, value: &str) -> Result<u32, IngestError> {
    value
        .parse()
        .map_err(|_| IngestError::InvalidNumber { line, field, value: value.to_string() })
}

/// Build the kind payload from the type column and any trailing columns
fn resource_kind(line: usize, kind: &str, extra: &[&str]) -> Result<ResourceKind, IngestError> {
    let extra_text = |i: usize| extra.get(i).map(|f| text(f)).unwrap_or_default();
    match kind.to_ascii_lowercase().as_str() {
        "book" => Ok(match extra.first() {
            Some(isbn) => ResourceKind::Book { isbn: (*isbn).to_string() },
            None => ResourceKind::book(),
        }),
        "thesis" => Ok(ResourceKind::Thesis { degree: extra_text(0), university: extra_text(1) }),
        "paper" => Ok(ResourceKind::ResearchPaper {
            doi: extra.first().map(|d| (*d).to_string()).unwrap_or_default(),
            conference: extra_text(1),
        }),
        _ => Err(IngestError::UnknownResourceType { line, kind: kind.to_string() }),
    }
}

/// Parse one catalog line
fn parse_resource(line: usize, fields: &[&str]) -> Result<Resource, IngestError> {
    let [id, title, author, pages, topic, kind, copies, extra @ ..] = fields else {
        return Err(IngestError::FieldCount {
            line,
            expected: CATALOG_FIELDS,
            found: fields.len(),
        });
    };
    let page_count = number(line, "page count", pages)?;
    let copies = number(line, "copy count", copies)?;
    let kind = resource_kind(line, kind, extra)?;

    Ok(Resource::new(*id, text(title), kind)
        .with_author(text(author))
        .with_topic(text(topic))
        .with_pages(page_count)
        .with_copies(copies))
}

/// Parse the category column
fn member_kind(line: usize, category: &str) -> Result<MemberKind, IngestError> {
    match category.to_ascii_lowercase().as_str() {
        "student" => Ok(MemberKind::student()),
        "faculty" => Ok(MemberKind::faculty()),
        "alumni" => Ok(MemberKind::Alumni),
        _ => Err(IngestError::UnknownMemberCategory { line, category: category.to_string() }),
    }
}

/// Walk the non-blank lines of `reader`, handing each one's fields to `load`
fn ingest<R, F>(reader: R, mut load: F) -> Result<IngestReport, std::io::Error>
where
    R: BufRead,
    F: FnMut(usize, &[&str]) -> Result<(), IngestError>,
{
    let mut report = IngestReport::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        match load(index.saturating_add(1), &fields) {
            Ok(()) => report.loaded = report.loaded.saturating_add(1),
            Err(error) => report.skip(error),
        }
    }
    Ok(report)
}

/// Load a catalog listing into `engine`
///
/// # Errors
///
/// Returns the underlying I/O error if `reader` fails; bad lines are
/// collected in the report instead.
pub fn load_catalog<R: BufRead>(
    reader: R,
    engine: &LendingEngine,
) -> Result<IngestReport, std::io::Error> {
    let report = ingest(reader, |line, fields| {
        let resource = parse_resource(line, fields)?;
        engine.add_resource(resource).map_err(|source| IngestError::Rejected { line, source })
    })?;
    info!(loaded = report.loaded, skipped = report.skipped.len(), "catalog loaded");
    Ok(report)
}

/// Load a member listing into `engine` with the configured entitlement
///
/// # Errors
///
/// Returns the underlying I/O error if `reader` fails; bad lines are
/// collected in the report instead.
pub fn load_members<R: BufRead>(
    reader: R,
    engine: &LendingEngine,
) -> Result<IngestReport, std::io::Error> {
    let report = ingest(reader, |line, fields| {
        let [id, name, email, category, ..] = fields else {
            return Err(IngestError::FieldCount {
                line,
                expected: MEMBER_FIELDS,
                found: fields.len(),
            });
        };
        let kind = member_kind(line, category)?;
        engine
            .enroll(*id, text(name), *email, kind)
            .map_err(|source| IngestError::Rejected { line, source })
    })?;
    info!(loaded = report.loaded, skipped = report.skipped.len(), "members loaded");
    Ok(report)
}

/// Open `path` for buffered reading
fn open(path: &Path) -> Result<BufReader<File>, IngestError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| IngestError::Io { path: path.to_path_buf(), source })
}

/// Load a catalog file into `engine`
///
/// # Errors
///
/// Returns `IngestError::Io` if the file cannot be opened or read.
pub fn load_catalog_file(path: &Path, engine: &LendingEngine) -> Result<IngestReport, IngestError> {
    load_catalog(open(path)?, engine)
        .map_err(|source| IngestError::Io { path: path.to_path_buf(), source })
}

/// Load a member file into `engine`
///
/// # Errors
///
/// Returns `IngestError::Io` if the file cannot be opened or read.
pub fn load_members_file(path: &Path, engine: &LendingEngine) -> Result<IngestReport, IngestError> {
    load_members(open(path)?, engine)
        .map_err(|source| IngestError::Io { path: path.to_path_buf(), source })
}
