//! cppcheck XML report (version 2) parsing.
//!
//! cppcheck writes its report to stderr when run with `--xml-version=2`:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <results version="2">
//!   <cppcheck version="1.54"/>
//!   <errors>
//!     <error id="returnReference" severity="error" msg="..." verbose="...">
//!       <location file="test.cpp" line="13"/>
//!     </error>
//!   </errors>
//! </results>
//! ```
//!
//! Every `error` element anywhere in the document is one [`Issue`], in the
//! order its start tag appears.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::MalformedReport;

const ERROR_TAG: &[u8] = b"error";
const LOCATION_TAG: &[u8] = b"location";

/// Source position of an issue. `line` is kept as reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: String,
}

/// A single diagnostic reported by cppcheck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// cppcheck check id (e.g. "returnReference", "unusedFunction").
    pub id: String,

    /// "error", "warning", "style", "performance", "portability", "information".
    pub severity: String,

    /// Short (`msg`) or verbose (`verbose`) text, depending on the parser.
    pub message: String,

    /// First `location` inside the `error` element, if any.
    pub location: Option<Location>,
}

/// Parser for cppcheck XML reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportParser {
    verbose: bool,
}

type Attributes = BTreeMap<String, String>;

struct OpenIssue {
    depth: usize,
    index: usize,
}

impl ReportParser {
    /// Create a parser. `verbose` selects the `verbose` attribute over `msg`.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Parse report text into issues in document order.
    ///
    /// A well-formed document without `error` elements yields an empty list.
    pub fn parse(&self, text: &str) -> Result<Vec<Issue>, MalformedReport> {
        let mut reader = Reader::from_str(text);

        let mut issues: Vec<Issue> = Vec::new();
        let mut open: Vec<OpenIssue> = Vec::new();
        let mut depth = 0usize;
        let mut root_seen = false;
        let mut first_event = true;

        loop {
            let event = reader.read_event().map_err(|e| {
                MalformedReport::new(format!("{} at byte {}", e, reader.buffer_position()))
            })?;
            let leading = std::mem::replace(&mut first_event, false);

            match event {
                Event::Decl(_) if !leading => {
                    return Err(MalformedReport::new(format!(
                        "XML declaration not at start of report (byte {})",
                        reader.buffer_position()
                    )));
                }
                Event::DocType(_) if root_seen || depth > 0 => {
                    return Err(MalformedReport::new("DOCTYPE after document element"));
                }
                Event::Start(start) | Event::Empty(start) if depth == 0 && root_seen => {
                    return Err(MalformedReport::new(format!(
                        "junk after document element: <{}>",
                        String::from_utf8_lossy(start.name().as_ref())
                    )));
                }
                Event::Start(start) => {
                    root_seen = true;
                    depth += 1;
                    if let Some(index) = self.visit(&start, &mut issues, &open)? {
                        open.push(OpenIssue { depth, index });
                    }
                }
                Event::Empty(start) => {
                    root_seen = true;
                    self.visit(&start, &mut issues, &open)?;
                }
                Event::End(end) => {
                    if depth == 0 {
                        return Err(MalformedReport::new(format!(
                            "unexpected closing tag </{}>",
                            String::from_utf8_lossy(end.name().as_ref())
                        )));
                    }
                    if open.last().is_some_and(|o| o.depth == depth) {
                        open.pop();
                    }
                    depth -= 1;
                }
                Event::Text(outside) if depth == 0 => {
                    if !outside.iter().all(u8::is_ascii_whitespace) {
                        return Err(MalformedReport::new("text outside of document element"));
                    }
                }
                Event::CData(_) if depth == 0 => {
                    return Err(MalformedReport::new("CDATA outside of document element"));
                }
                Event::Eof => {
                    if !root_seen {
                        return Err(MalformedReport::new("no element found"));
                    }
                    if depth > 0 {
                        return Err(MalformedReport::new(format!(
                            "{} unclosed element(s) at end of report",
                            depth
                        )));
                    }
                    break;
                }
                _ => {}
            }
        }

        Ok(issues)
    }

    /// Handle one element start. Returns the index of a newly opened issue.
    fn visit(
        &self,
        start: &BytesStart<'_>,
        issues: &mut Vec<Issue>,
        open: &[OpenIssue],
    ) -> Result<Option<usize>, MalformedReport> {
        let attrs = read_attributes(start)?;

        match start.name().as_ref() {
            ERROR_TAG => {
                issues.push(self.issue_from(&attrs));
                Ok(Some(issues.len() - 1))
            }
            LOCATION_TAG => {
                // A location belongs to every enclosing error still lacking one.
                for o in open {
                    let issue = &mut issues[o.index];
                    if issue.location.is_none() {
                        issue.location = Some(Location {
                            file: attr(&attrs, "file"),
                            line: attr(&attrs, "line"),
                        });
                    }
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn issue_from(&self, attrs: &Attributes) -> Issue {
        let message = if self.verbose {
            attr(attrs, "verbose")
        } else {
            attr(attrs, "msg")
        };
        Issue {
            id: attr(attrs, "id"),
            severity: attr(attrs, "severity"),
            message,
            location: None,
        }
    }
}

/// Missing attributes read as the empty string.
fn attr(attrs: &Attributes, name: &str) -> String {
    attrs.get(name).cloned().unwrap_or_default()
}

fn read_attributes(start: &BytesStart<'_>) -> Result<Attributes, MalformedReport> {
    let mut attrs = Attributes::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| MalformedReport::new(e.to_string()))?;
        if attribute.value.contains(&b'<') {
            return Err(MalformedReport::new(format!(
                "'<' in value of attribute {}",
                String::from_utf8_lossy(attribute.key.as_ref())
            )));
        }
        let value = attribute
            .unescape_value()
            .map_err(|e| MalformedReport::new(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        attrs.insert(key, value.into_owned());
    }
    Ok(attrs)
}
