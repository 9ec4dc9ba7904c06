//! Wheel filename parsing.
//!
//! A wheel is named `{distribution}-{version}[-{build}]-{python}-{abi}-{platform}.whl`.
//! Each of the three tag fields may be a compressed set joined by `.`
//! (e.g. `py2.py3`), which expands to every combination.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tags::Tag;

static WHEEL_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<name>[^\s-]+?)-(?P<ver>[^\s-]*?)(?:-(?P<build>\d[^-]*?))?-(?P<pyver>[^\s-]+?)-(?P<abi>[^\s-]+?)-(?P<plat>[^\s-]+?)\.whl$",
    )
    .expect("wheel filename pattern is valid")
});

/// The structured fields of a wheel filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Distribution name as written in the filename.
    pub distribution: String,
    /// Version string as written in the filename (`_` restored to `-`).
    pub version: String,
    /// Optional build tag; always starts with a digit.
    pub build_tag: Option<String>,
    /// Python tag set, e.g. `cp311` or `py2.py3`.
    pub python_tag: String,
    /// ABI tag set, e.g. `cp311`, `abi3` or `none`.
    pub abi_tag: String,
    /// Platform tag set, e.g. `manylinux_2_17_x86_64.manylinux2014_x86_64` or `any`.
    pub platform_tag: String,
}

impl ArtifactDescriptor {
    /// Parse a filename, returning `None` for anything that is not a wheel
    /// (source archives, `.metadata` siblings, stray links).
    pub fn parse(filename: &str) -> Option<Self> {
        let caps = WHEEL_FILENAME.captures(filename)?;
        Some(Self {
            distribution: caps["name"].to_string(),
            version: caps["ver"].replace('_', "-"),
            build_tag: caps.name("build").map(|m| m.as_str().to_string()),
            python_tag: caps["pyver"].to_string(),
            abi_tag: caps["abi"].to_string(),
            platform_tag: caps["plat"].to_string(),
        })
    }

    /// Exact string comparison of the version field.
    pub fn matches_version(&self, version: &str) -> bool {
        self.version == version
    }

    /// Every concrete `(python, abi, platform)` triple this wheel claims.
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.python_tag.split('.').flat_map(move |py| {
            self.abi_tag.split('.').flat_map(move |abi| {
                self.platform_tag
                    .split('.')
                    .map(move |plat| Tag::new(py, abi, plat))
            })
        })
    }
}

impl fmt::Display for ArtifactDescriptor {
    /// Reassemble the canonical filename from the parsed fields.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.distribution, self.version.replace('-', "_"))?;
        if let Some(build) = &self.build_tag {
            write!(f, "-{build}")?;
        }
        write!(
            f,
            "-{}-{}-{}.whl",
            self.python_tag, self.abi_tag, self.platform_tag
        )
    }
}

/// `true` iff `filename` is a wheel whose version field equals `version`.
///
/// Plain string equality: no normalisation, no ranges.
pub fn matches_version(filename: &str, version: &str) -> bool {
    ArtifactDescriptor::parse(filename).is_some_and(|d| d.matches_version(version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pure_python_wheel() {
        let d = ArtifactDescriptor::parse("pkg-1.0-py3-none-any.whl").unwrap();
        assert_eq!(d.distribution, "pkg");
        assert_eq!(d.version, "1.0");
        assert_eq!(d.build_tag, None);
        assert_eq!(
            (d.python_tag.as_str(), d.abi_tag.as_str(), d.platform_tag.as_str()),
            ("py3", "none", "any")
        );
    }

    #[test]
    fn parses_build_tag_and_compressed_platforms() {
        let d = ArtifactDescriptor::parse(
            "numpy-1.26.4-1-cp311-cp311-manylinux_2_17_x86_64.manylinux2014_x86_64.whl",
        )
        .unwrap();
        assert_eq!(d.distribution, "numpy");
        assert_eq!(d.version, "1.26.4");
        assert_eq!(d.build_tag.as_deref(), Some("1"));
        assert_eq!(d.tags().count(), 2);
        assert!(d.tags().any(|t| t.platform == "manylinux2014_x86_64"));
    }

    #[test]
    fn expands_compressed_tag_sets() {
        let d = ArtifactDescriptor::parse("six-1.16.0-py2.py3-none-any.whl").unwrap();
        let tags: Vec<Tag> = d.tags().collect();
        assert_eq!(
            tags,
            vec![Tag::new("py2", "none", "any"), Tag::new("py3", "none", "any")]
        );
    }

    #[test]
    fn rejects_non_wheels() {
        assert!(ArtifactDescriptor::parse("pkg-1.0.tar.gz").is_none());
        assert!(ArtifactDescriptor::parse("pkg-1.0-py3-none-any.whl.metadata").is_none());
        assert!(ArtifactDescriptor::parse("pkg-1.0-py3-none.whl").is_none());
        assert!(ArtifactDescriptor::parse("").is_none());
    }

    #[test]
    fn display_reconstructs_filename() {
        for name in [
            "pkg-1.0-py3-none-any.whl",
            "cryptography-42.0.5-cp39-abi3-win_amd64.whl",
            "torch-2.2.0-1-cp310-cp310-macosx_11_0_arm64.whl",
        ] {
            let d = ArtifactDescriptor::parse(name).unwrap();
            assert_eq!(d.to_string(), name);
            assert_eq!(ArtifactDescriptor::parse(&d.to_string()), Some(d));
        }
    }

    #[test]
    fn version_match_is_exact_string_equality() {
        assert!(matches_version("pkg-2.0-py3-none-any.whl", "2.0"));
        assert!(!matches_version("pkg-2.0-py3-none-any.whl", "2.0.0"));
        assert!(!matches_version("pkg-2.0-py3-none-any.whl", "2"));
        assert!(!matches_version("pkg-2.0.tar.gz", "2.0"));

        let d = ArtifactDescriptor::parse("pkg-1.0_rc1-py3-none-any.whl").unwrap();
        assert!(d.matches_version("1.0-rc1"));
        assert!(!d.matches_version("1.0rc1"));
    }
}
