//! Requirement lines: `name==version` or a bare `name`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors produced while reading a requirements listing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RequirementError {
    /// The package name contains characters outside `[A-Za-z0-9._-]`.
    #[error("line {line}: invalid package name '{name}'")]
    InvalidName {
        /// 1-based line number in the listing.
        line: usize,
        /// The offending name.
        name: String,
    },

    /// The line uses a specifier other than an exact `==` pin.
    #[error("line {line}: unsupported requirement '{spec}' (only 'name' or 'name==version')")]
    UnsupportedSpecifier {
        /// 1-based line number in the listing.
        line: usize,
        /// The offending requirement text.
        spec: String,
    },

    /// `name==` with nothing after the operator.
    #[error("line {line}: empty version for '{name}'")]
    EmptyVersion {
        /// 1-based line number in the listing.
        line: usize,
        /// Package name of the requirement.
        name: String,
    },
}

/// One package request. Identity is the name; the version is an exact pin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    name: String,
    version: Option<String>,
}

impl Requirement {
    /// Create a requirement without validation.
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parse a single listing line.
    ///
    /// Returns `Ok(None)` for blank lines and comments. `line` is only used
    /// to annotate errors.
    ///
    /// # Errors
    ///
    /// Returns a [`RequirementError`] if the line is not `name` or
    /// `name==version`.
    pub fn parse_line(text: &str, line: usize) -> Result<Option<Self>, RequirementError> {
        let text = strip_comment(text).trim();
        if text.is_empty() {
            return Ok(None);
        }

        let (name, version) = match text.split_once("==") {
            Some((name, version)) => {
                let version = version.trim();
                if version.is_empty() {
                    return Err(RequirementError::EmptyVersion {
                        line,
                        name: name.trim().to_string(),
                    });
                }
                if version.contains(|c: char| SPECIFIER_CHARS.contains(&c) || c.is_whitespace())
                {
                    return Err(RequirementError::UnsupportedSpecifier {
                        line,
                        spec: text.to_string(),
                    });
                }
                (name.trim(), Some(version.to_string()))
            }
            None => (text, None),
        };

        if name.contains(|c: char| SPECIFIER_CHARS.contains(&c)) {
            return Err(RequirementError::UnsupportedSpecifier {
                line,
                spec: text.to_string(),
            });
        }
        if !is_valid_name(name) {
            return Err(RequirementError::InvalidName {
                line,
                name: name.to_string(),
            });
        }

        Ok(Some(Self::new(name, version)))
    }

    /// Parse a whole listing, one requirement per line.
    ///
    /// # Errors
    ///
    /// Fails on the first malformed line; the listing is all-or-nothing.
    pub fn parse_listing(text: &str) -> Result<Vec<Self>, RequirementError> {
        let mut requirements = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if let Some(req) = Self::parse_line(line, idx + 1)? {
                requirements.push(req);
            }
        }
        Ok(requirements)
    }

    /// The package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pinned version, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// `name==version`, with an empty version when unconstrained.
    ///
    /// This is the line printed for requirements that were not installed.
    pub fn retry_line(&self) -> String {
        format!("{}=={}", self.name, self.version.as_deref().unwrap_or(""))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}=={v}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for Requirement {
    type Err = RequirementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_line(s, 1)?.ok_or_else(|| RequirementError::InvalidName {
            line: 1,
            name: s.to_string(),
        })
    }
}

const SPECIFIER_CHARS: &[char] = &['<', '>', '!', '~', '=', ',', ';', '@', '[', ']', ' '];

fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    match line.find(" #").or_else(|| line.find("\t#")) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn is_valid_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pinned_and_bare() {
        let pinned: Requirement = "requests==2.31.0".parse().unwrap();
        assert_eq!(pinned.name(), "requests");
        assert_eq!(pinned.version(), Some("2.31.0"));

        let bare: Requirement = "six".parse().unwrap();
        assert_eq!(bare.name(), "six");
        assert_eq!(bare.version(), None);
    }

    #[test]
    fn tolerates_whitespace_around_operator() {
        let req = Requirement::parse_line("  numpy == 1.26.4  ", 3).unwrap().unwrap();
        assert_eq!(req, Requirement::new("numpy", Some("1.26.4".into())));
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let listing = "# pinned deps\n\nattrs==23.1.0  # used by tests\n\tsix\n";
        let reqs = Requirement::parse_listing(listing).unwrap();
        assert_eq!(
            reqs,
            vec![
                Requirement::new("attrs", Some("23.1.0".into())),
                Requirement::new("six", None),
            ]
        );
    }

    #[test]
    fn rejects_range_specifiers() {
        let err = Requirement::parse_listing("ok\nrequests>=2.0\n").unwrap_err();
        assert_eq!(
            err,
            RequirementError::UnsupportedSpecifier {
                line: 2,
                spec: "requests>=2.0".into()
            }
        );
        assert!(matches!(
            Requirement::parse_line("pkg==1.0,<2", 1),
            Err(RequirementError::UnsupportedSpecifier { .. })
        ));
    }

    #[test]
    fn rejects_empty_version_and_bad_names() {
        assert!(matches!(
            Requirement::parse_line("pkg==", 4),
            Err(RequirementError::EmptyVersion { line: 4, .. })
        ));
        assert!(matches!(
            Requirement::parse_line("-pkg", 1),
            Err(RequirementError::InvalidName { .. })
        ));
    }

    #[test]
    fn retry_line_has_empty_version_when_unconstrained() {
        assert_eq!(Requirement::new("pkg", None).retry_line(), "pkg==");
        assert_eq!(
            Requirement::new("pkg", Some("3.0".into())).retry_line(),
            "pkg==3.0"
        );
    }
}
