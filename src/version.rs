//! Version and build information
//!
//! Build-time details embedded by `build.rs`, plus the compiled-unit format
//! version each bundled backend accepts.

use std::fmt;

use crate::backend::{CPU_REF_FORMAT_VERSION, CPU_REF_NAME};

/// Compiled-unit format accepted by each backend in this binary
pub const UNIT_FORMATS: &[(&str, u32)] = &[(CPU_REF_NAME, CPU_REF_FORMAT_VERSION)];

/// Build information embedded at compile time
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    /// Short commit hash, "unknown" outside a checkout
    pub git_hash: &'static str,
    pub git_branch: &'static str,
    /// Uncommitted changes at build time
    pub git_dirty: bool,
    pub build_timestamp: &'static str,
    /// Target triple (e.g., aarch64-linux-android)
    pub target: &'static str,
    pub host: &'static str,
    /// Cargo profile (debug/release)
    pub profile: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("DELEGATE_GIT_HASH"),
            git_branch: env!("DELEGATE_GIT_BRANCH"),
            git_dirty: env!("DELEGATE_GIT_DIRTY") == "true",
            build_timestamp: env!("DELEGATE_BUILD_TIMESTAMP"),
            target: env!("DELEGATE_TARGET"),
            host: env!("DELEGATE_HOST"),
            profile: env!("DELEGATE_PROFILE"),
            rustc_version: env!("DELEGATE_RUSTC_VERSION"),
        }
    }

    /// "0.1.0-abc1234", with "-dirty" appended for modified trees
    pub fn full_version(&self) -> String {
        let dirty = if self.git_dirty { "-dirty" } else { "" };
        format!("{}-{}{}", self.version, self.git_hash, dirty)
    }

    fn rows(&self) -> [(&'static str, Vec<(&'static str, String)>); 3] {
        let hash = if self.git_dirty {
            format!("{} (dirty)", self.git_hash)
        } else {
            self.git_hash.to_string()
        };
        [
            (
                "Build Information",
                vec![
                    ("Version", self.version.to_string()),
                    ("Git Hash", hash),
                    ("Git Branch", self.git_branch.to_string()),
                    ("Built", self.build_timestamp.to_string()),
                    ("Profile", self.profile.to_string()),
                    ("Compiler", self.rustc_version.to_string()),
                ],
            ),
            (
                "Target",
                vec![
                    ("Triple", self.target.to_string()),
                    ("Host", self.host.to_string()),
                ],
            ),
            (
                "Compiled-unit formats",
                UNIT_FORMATS
                    .iter()
                    .map(|(backend, version)| (*backend, format!("v{}", version)))
                    .collect(),
            ),
        ]
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.full_version())?;
        for (title, rows) in self.rows() {
            writeln!(f)?;
            writeln!(f, "{}:", title)?;
            for (label, value) in rows {
                writeln!(f, "  {:<12} {}", format!("{}:", label), value)?;
            }
        }
        Ok(())
    }
}

pub fn build_info() -> BuildInfo {
    BuildInfo::current()
}

/// Print version information to stdout
pub fn print_version() {
    print!("{}", build_info());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_info_exists() {
        let info = build_info();
        assert!(!info.version.is_empty());
        assert_eq!(info.name, "delegate-runtime");
    }

    #[test]
    fn test_full_version_format() {
        let mut info = build_info();
        info.git_dirty = false;
        assert_eq!(info.full_version(), format!("{}-{}", info.version, info.git_hash));
        info.git_dirty = true;
        assert!(info.full_version().ends_with("-dirty"));
    }

    #[test]
    fn test_display_lists_formats() {
        let display = build_info().to_string();
        assert!(display.contains("Build Information:"));
        assert!(display.contains("Git Hash:"));
        assert!(display.contains("Compiled-unit formats:"));
        assert!(display.contains("cpu_ref:"));
        assert!(display.contains(&format!("v{}", CPU_REF_FORMAT_VERSION)));
    }
}
