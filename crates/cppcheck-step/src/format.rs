//! Display lines for issues.
//!
//! Log viewers and dashboards match on these lines textually, so the shapes
//! below are fixed:
//!
//! - with location: `[<file>:<line>]: (<severity>) <message>`
//! - without:       `(<severity>) <message>`

use std::fmt;

use crate::report::Issue;

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.location {
            write!(f, "[{}:{}]: ", loc.file, loc.line)?;
        }
        write!(f, "({}) {}", self.severity, self.message)
    }
}

/// Format one issue as a display line.
pub fn format_issue(issue: &Issue) -> String {
    issue.to_string()
}

/// Render issues as log text: one line per issue, each newline-terminated.
pub fn render_issue_log(issues: &[Issue]) -> String {
    let mut out = String::new();
    for issue in issues {
        out.push_str(&format_issue(issue));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Location;

    fn issue(severity: &str, message: &str, location: Option<(&str, &str)>) -> Issue {
        Issue {
            id: "someId".to_string(),
            severity: severity.to_string(),
            message: message.to_string(),
            location: location.map(|(file, line)| Location {
                file: file.to_string(),
                line: line.to_string(),
            }),
        }
    }

    #[test]
    fn test_format_with_location() {
        let i = issue(
            "error",
            "Returning reference to auto variable",
            Some(("test.cpp", "13")),
        );
        assert_eq!(
            format_issue(&i),
            "[test.cpp:13]: (error) Returning reference to auto variable"
        );
    }

    #[test]
    fn test_format_without_location() {
        let i = issue("information", "Cppcheck cannot find all the include files", None);
        assert_eq!(
            format_issue(&i),
            "(information) Cppcheck cannot find all the include files"
        );
    }

    #[test]
    fn test_format_is_stable() {
        let i = issue("style", "The function 'foo' is never used", Some(("a.cpp", "11")));
        assert_eq!(format_issue(&i), format_issue(&i));
    }

    #[test]
    fn test_render_issue_log_terminates_every_line() {
        let issues = vec![
            issue("error", "one", Some(("a.cpp", "1"))),
            issue("style", "two", None),
        ];
        assert_eq!(render_issue_log(&issues), "[a.cpp:1]: (error) one\n(style) two\n");
    }

    #[test]
    fn test_render_issue_log_empty() {
        assert_eq!(render_issue_log(&[]), "");
    }
}
