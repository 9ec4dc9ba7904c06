//! Compatibility tags and ranking.
//!
//! The target environment is described as an ordered list of supported
//! `(python, abi, platform)` tags, most specific first. A wheel's rank is the
//! position of the best tag it claims in that list; a wheel claiming no
//! supported tag is [`CompatibilityRank::Incompatible`].
//!
//! The ordering follows the interpreter-first priority used by Python's own
//! installers:
//!
//! 1. `cpXY-cpXY-<platform>` for each platform
//! 2. `cpXY-abi3-<platform>`
//! 3. `cpXY-none-<platform>`
//! 4. `cpXW-abi3-<platform>` for every older minor `W` (down to 3.2)
//! 5. `pyXY-none-<platform>`, `pyX-none-<platform>`, older `pyXW-none-<platform>`
//! 6. `cpXY-none-any`
//! 7. `pyXY-none-any`, `pyX-none-any`, older `pyXW-none-any`
//!
//! Within each group platforms keep their own order (e.g. newest manylinux
//! first, bare `linux_<arch>` last).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::wheel::ArtifactDescriptor;

/// Oldest glibc minor assumed on Linux hosts when no explicit platform list is given.
pub const DEFAULT_GLIBC_MINOR: u32 = 17;

/// Newest macOS major release assumed on macOS hosts.
pub const DEFAULT_MACOS_MAJOR: u32 = 14;

/// One concrete `(python, abi, platform)` triple, lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    /// Python/interpreter tag, e.g. `cp312` or `py3`.
    pub interpreter: String,
    /// ABI tag, e.g. `cp312`, `abi3` or `none`.
    pub abi: String,
    /// Platform tag, e.g. `manylinux_2_17_x86_64` or `any`.
    pub platform: String,
}

impl Tag {
    /// Build a tag, normalising every field to lowercase.
    pub fn new(interpreter: &str, abi: &str, platform: &str) -> Self {
        Self {
            interpreter: interpreter.to_ascii_lowercase(),
            abi: abi.to_ascii_lowercase(),
            platform: platform.to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.interpreter, self.abi, self.platform)
    }
}

/// How well a wheel fits the target environment. Lower is better.
///
/// `Supported(n)` orders before `Incompatible`, so a plain ascending sort
/// pushes unusable wheels to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompatibilityRank {
    /// Position of the best matching tag in the supported list.
    Supported(usize),
    /// No tag of the wheel is supported.
    Incompatible,
}

impl CompatibilityRank {
    /// `false` only for [`CompatibilityRank::Incompatible`].
    pub fn is_compatible(self) -> bool {
        matches!(self, Self::Supported(_))
    }
}

/// The interpreter and platform wheels are being selected for.
#[derive(Debug, Clone)]
pub struct TargetEnvironment {
    implementation: String,
    python: (u32, u32),
    supported: Vec<Tag>,
    priority: HashMap<Tag, usize>,
}

impl TargetEnvironment {
    /// Describe an environment explicitly.
    ///
    /// `implementation` is the short interpreter name (`cp`, `pp`, ...).
    /// `abi` defaults to `{implementation}{major}{minor}` for CPython and
    /// `none` otherwise. `platforms` must be ordered most specific first.
    pub fn new(
        implementation: &str,
        python: (u32, u32),
        abi: Option<&str>,
        platforms: &[String],
    ) -> Self {
        let implementation = implementation.to_ascii_lowercase();
        let supported = if implementation == "cp" {
            cpython_tags(python, abi, platforms)
        } else {
            generic_tags(&implementation, python, abi, platforms)
        };

        let mut priority = HashMap::with_capacity(supported.len());
        for (idx, tag) in supported.iter().enumerate() {
            priority.entry(tag.clone()).or_insert(idx);
        }

        Self {
            implementation,
            python,
            supported,
            priority,
        }
    }

    /// Describe a CPython interpreter of the given version on this host.
    pub fn host(python: (u32, u32)) -> Self {
        Self::new("cp", python, None, &host_platforms())
    }

    /// Interpreter short name.
    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    /// Interpreter `(major, minor)` version.
    pub fn python_version(&self) -> (u32, u32) {
        self.python
    }

    /// Supported tags, most preferred first.
    pub fn supported_tags(&self) -> &[Tag] {
        &self.supported
    }

    /// Rank of a single tag.
    pub fn rank_tag(&self, tag: &Tag) -> CompatibilityRank {
        self.priority
            .get(tag)
            .map_or(CompatibilityRank::Incompatible, |&idx| {
                CompatibilityRank::Supported(idx)
            })
    }

    /// Rank of a wheel: the best rank among all tags it expands to.
    pub fn rank(&self, descriptor: &ArtifactDescriptor) -> CompatibilityRank {
        descriptor
            .tags()
            .map(|tag| self.rank_tag(&tag))
            .min()
            .unwrap_or(CompatibilityRank::Incompatible)
    }
}

/// Parse `X.Y` into `(X, Y)`.
pub fn parse_python_version(s: &str) -> Option<(u32, u32)> {
    let (major, minor) = s.trim().split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Platform tags for the running host, most specific first.
pub fn host_platforms() -> Vec<String> {
    platforms_for(std::env::consts::OS, std::env::consts::ARCH)
}

/// Platform tags for an `(os, arch)` pair as reported by `std::env::consts`.
pub fn platforms_for(os: &str, arch: &str) -> Vec<String> {
    match os {
        "linux" => linux_platforms(arch, DEFAULT_GLIBC_MINOR),
        "macos" => macos_platforms(arch, DEFAULT_MACOS_MAJOR),
        "windows" => vec![
            match arch {
                "x86_64" => "win_amd64",
                "aarch64" => "win_arm64",
                _ => "win32",
            }
            .to_string(),
        ],
        other => vec![format!("{other}_{arch}")],
    }
}

/// `manylinux_2_N_<arch>` from the current glibc minor downwards, each
/// followed by its legacy alias, then the bare `linux_<arch>`.
pub fn linux_platforms(arch: &str, glibc_minor: u32) -> Vec<String> {
    let floor = match arch {
        "x86_64" | "i686" => 5,
        _ => 17,
    };
    let mut platforms = Vec::new();
    for minor in (floor..=glibc_minor.max(floor)).rev() {
        platforms.push(format!("manylinux_2_{minor}_{arch}"));
        let legacy = match minor {
            17 => Some("manylinux2014"),
            12 => Some("manylinux2010"),
            5 => Some("manylinux1"),
            _ => None,
        };
        if let Some(legacy) = legacy {
            platforms.push(format!("{legacy}_{arch}"));
        }
    }
    platforms.push(format!("linux_{arch}"));
    platforms
}

/// macOS platform tags for releases from `newest_major` down to the
/// oldest release supporting `arch`.
pub fn macos_platforms(arch: &str, newest_major: u32) -> Vec<String> {
    let mut platforms = Vec::new();
    if arch == "aarch64" {
        for major in (11..=newest_major.max(11)).rev() {
            platforms.push(format!("macosx_{major}_0_arm64"));
            platforms.push(format!("macosx_{major}_0_universal2"));
        }
        return platforms;
    }

    for major in (11..=newest_major.max(11)).rev() {
        for format in ["x86_64", "intel", "universal2"] {
            platforms.push(format!("macosx_{major}_0_{format}"));
        }
    }
    for minor in (4..=16).rev() {
        for format in ["x86_64", "intel", "fat64", "fat32", "universal2", "universal"] {
            platforms.push(format!("macosx_10_{minor}_{format}"));
        }
    }
    platforms
}

fn cpython_tags(python: (u32, u32), abi: Option<&str>, platforms: &[String]) -> Vec<Tag> {
    let (major, minor) = python;
    let interpreter = format!("cp{major}{minor}");
    let native_abi = abi.map_or_else(|| interpreter.clone(), str::to_ascii_lowercase);
    let abi3 = major == 3 && minor >= 2;
    let mut tags = Vec::new();

    if native_abi != "abi3" && native_abi != "none" {
        push_all(&mut tags, &interpreter, &native_abi, platforms);
    }
    if abi3 {
        push_all(&mut tags, &interpreter, "abi3", platforms);
    }
    push_all(&mut tags, &interpreter, "none", platforms);
    if abi3 {
        for older in (2..minor).rev() {
            push_all(&mut tags, &format!("cp{major}{older}"), "abi3", platforms);
        }
    }

    tags.extend(compatible_tags(python, &interpreter, platforms));
    tags
}

fn generic_tags(
    implementation: &str,
    python: (u32, u32),
    abi: Option<&str>,
    platforms: &[String],
) -> Vec<Tag> {
    let (major, minor) = python;
    let interpreter = format!("{implementation}{major}{minor}");
    let mut tags = Vec::new();

    if let Some(abi) = abi.filter(|a| !a.eq_ignore_ascii_case("none")) {
        push_all(&mut tags, &interpreter, abi, platforms);
    }
    push_all(&mut tags, &interpreter, "none", platforms);

    tags.extend(compatible_tags(python, &interpreter, platforms));
    tags
}

fn compatible_tags(python: (u32, u32), interpreter: &str, platforms: &[String]) -> Vec<Tag> {
    let versions = py_interpreter_range(python);
    let mut tags = Vec::new();
    for version in &versions {
        push_all(&mut tags, version, "none", platforms);
    }
    tags.push(Tag::new(interpreter, "none", "any"));
    for version in &versions {
        tags.push(Tag::new(version, "none", "any"));
    }
    tags
}

/// `pyXY`, `pyX`, then every older `pyXW`.
fn py_interpreter_range((major, minor): (u32, u32)) -> Vec<String> {
    let mut versions = vec![format!("py{major}{minor}"), format!("py{major}")];
    versions.extend((0..minor).rev().map(|m| format!("py{major}{m}")));
    versions
}

fn push_all(tags: &mut Vec<Tag>, interpreter: &str, abi: &str, platforms: &[String]) {
    tags.extend(platforms.iter().map(|p| Tag::new(interpreter, abi, p)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_env() -> TargetEnvironment {
        TargetEnvironment::new("cp", (3, 11), None, &linux_platforms("x86_64", 17))
    }

    fn rank_of(env: &TargetEnvironment, filename: &str) -> CompatibilityRank {
        env.rank(&ArtifactDescriptor::parse(filename).unwrap())
    }

    #[test]
    fn native_wheel_beats_abi3_beats_pure_python() {
        let env = linux_env();
        let native = rank_of(&env, "pkg-1.0-cp311-cp311-manylinux_2_17_x86_64.whl");
        let abi3 = rank_of(&env, "pkg-1.0-cp38-abi3-manylinux_2_17_x86_64.whl");
        let pure = rank_of(&env, "pkg-1.0-py3-none-any.whl");

        assert!(native.is_compatible());
        assert!(native < abi3);
        assert!(abi3 < pure);
        assert!(pure < CompatibilityRank::Incompatible);
    }

    #[test]
    fn newer_manylinux_is_more_specific() {
        let env = TargetEnvironment::new("cp", (3, 11), None, &linux_platforms("x86_64", 28));
        let newer = rank_of(&env, "pkg-1.0-cp311-cp311-manylinux_2_28_x86_64.whl");
        let older = rank_of(&env, "pkg-1.0-cp311-cp311-manylinux2014_x86_64.whl");
        assert!(newer < older);
    }

    #[test]
    fn foreign_platform_is_incompatible() {
        let env = linux_env();
        assert_eq!(
            rank_of(&env, "pkg-2.0-cp39-cp39-win_amd64.whl"),
            CompatibilityRank::Incompatible
        );
        assert_eq!(
            rank_of(&env, "pkg-1.0-cp312-cp312-manylinux_2_17_x86_64.whl"),
            CompatibilityRank::Incompatible
        );
    }

    #[test]
    fn glibc_too_new_is_incompatible() {
        let env = linux_env();
        assert_eq!(
            rank_of(&env, "pkg-1.0-cp311-cp311-manylinux_2_28_x86_64.whl"),
            CompatibilityRank::Incompatible
        );
    }

    #[test]
    fn compressed_tags_take_the_best_member() {
        let env = linux_env();
        let multi = rank_of(
            &env,
            "pkg-1.0-cp311-cp311-manylinux_2_17_x86_64.manylinux2014_x86_64.whl",
        );
        let single = rank_of(&env, "pkg-1.0-cp311-cp311-manylinux_2_17_x86_64.whl");
        assert_eq!(multi, single);
    }

    #[test]
    fn pure_python_is_always_supported() {
        let env = TargetEnvironment::new("cp", (3, 12), None, &["win_amd64".to_string()]);
        assert!(rank_of(&env, "pkg-1.0-py3-none-any.whl").is_compatible());
        assert!(rank_of(&env, "pkg-1.0-py2.py3-none-any.whl").is_compatible());
        assert!(!rank_of(&env, "pkg-1.0-py2-none-any.whl").is_compatible());
    }

    #[test]
    fn supported_tags_are_unique_and_ordered() {
        let env = linux_env();
        let tags = env.supported_tags();
        assert_eq!(tags[0], Tag::new("cp311", "cp311", "manylinux_2_17_x86_64"));
        assert_eq!(tags.last(), Some(&Tag::new("py30", "none", "any")));
        let unique: std::collections::HashSet<_> = tags.iter().collect();
        assert_eq!(unique.len(), tags.len());
    }

    #[test]
    fn linux_platforms_end_with_bare_linux() {
        let platforms = linux_platforms("x86_64", 17);
        assert_eq!(platforms.first().map(String::as_str), Some("manylinux_2_17_x86_64"));
        assert_eq!(platforms.get(1).map(String::as_str), Some("manylinux2014_x86_64"));
        assert!(platforms.contains(&"manylinux1_x86_64".to_string()));
        assert_eq!(platforms.last().map(String::as_str), Some("linux_x86_64"));
    }

    #[test]
    fn parses_python_version() {
        assert_eq!(parse_python_version("3.12"), Some((3, 12)));
        assert_eq!(parse_python_version("3"), None);
        assert_eq!(parse_python_version("three.x"), None);
    }
}
