//! Platform capability provider.
//!
//! The store core consumes exactly three host capabilities: the three
//! replica base directories, the current user name, and a stable machine
//! identifier.  This module abstracts them behind a [`Platform`] trait so
//! the core never touches process-wide discovery directly and tests can
//! substitute deterministic values:
//!
//! - [`HostPlatform`] — real host discovery (home-relative base directories,
//!   environment user name, machine id from the OS).
//! - [`StaticPlatform`] — fixed paths and identity, for tests and for
//!   applications that manage their own directories.
//!
//! Failure of any capability is fatal at store construction; nothing in the
//! core retries discovery afterwards.

use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Abstraction over host-specific discovery.
///
/// Implementations must be `Send + Sync` so one provider can serve stores on
/// multiple threads.
pub trait Platform: Send + Sync {
    /// Three absolute, user-writable base directories, created if absent.
    ///
    /// The paths must be stable across runs for a given user; records are
    /// addressed relative to them.
    fn base_paths(&self) -> Result<[PathBuf; 3]>;

    /// The current user's name.  Participates in key derivation.
    fn user_name(&self) -> Result<String>;

    /// A stable identifier for this machine.  Participates in key
    /// derivation, which is what binds ciphertext to the host.
    fn machine_id(&self) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Host discovery
// ---------------------------------------------------------------------------

/// Real host discovery.
///
/// The three bases live under independent user-writable locations so a
/// single misdirected cleanup (a wiped config directory, a purged Documents
/// folder) cannot take out every replica at once.
pub struct HostPlatform {
    /// Directory name created under each base location.  Dot-prefixed by
    /// default so the trees are hidden on Unix-like systems.
    dir_name: String,
}

impl HostPlatform {
    /// Default directory name used under each base location.
    pub const DEFAULT_DIR_NAME: &'static str = ".trivault";

    /// Create a provider using [`Self::DEFAULT_DIR_NAME`].
    pub fn new() -> Self {
        Self {
            dir_name: Self::DEFAULT_DIR_NAME.to_string(),
        }
    }

    /// Create a provider with a custom directory name.
    ///
    /// Applications embedding several independent stores give each its own
    /// name; changing the name orphans previously written records.
    pub fn with_dir_name(dir_name: impl Into<String>) -> Self {
        Self {
            dir_name: dir_name.into(),
        }
    }

    /// The current user's home (profile) directory.
    fn home_dir() -> Result<PathBuf> {
        #[cfg(windows)]
        let var = "USERPROFILE";
        #[cfg(not(windows))]
        let var = "HOME";

        std::env::var(var)
            .map(PathBuf::from)
            .map_err(|_| StoreError::CapabilityFailure {
                reason: format!("environment variable {var} is not set"),
            })
    }

    /// Read a machine-id file, treating empty content as absence.
    fn read_id_file(path: &str) -> Option<String> {
        std::fs::read_to_string(path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for HostPlatform {
    fn base_paths(&self) -> Result<[PathBuf; 3]> {
        let home = Self::home_dir()?;

        #[cfg(target_os = "macos")]
        let bases = [
            home.join(".config").join(&self.dir_name),
            home.join("Documents").join(&self.dir_name),
            home.join("Library").join(&self.dir_name),
        ];

        #[cfg(all(unix, not(target_os = "macos")))]
        let bases = [
            home.join(".config").join(&self.dir_name),
            home.join("Documents").join(&self.dir_name),
            home.join(".local").join("share").join(&self.dir_name),
        ];

        #[cfg(windows)]
        let bases = [
            std::env::var("APPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| home.join("AppData").join("Roaming"))
                .join(&self.dir_name),
            std::env::var("LOCALAPPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| home.join("AppData").join("Local"))
                .join(&self.dir_name),
            home.join("Documents").join(&self.dir_name),
        ];

        for base in &bases {
            std::fs::create_dir_all(base).map_err(|e| StoreError::CapabilityFailure {
                reason: format!("cannot create base directory {}: {e}", base.display()),
            })?;
        }

        tracing::debug!(
            base0 = %bases[0].display(),
            base1 = %bases[1].display(),
            base2 = %bases[2].display(),
            "resolved replica base directories"
        );
        Ok(bases)
    }

    fn user_name(&self) -> Result<String> {
        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .map_err(|_| StoreError::CapabilityFailure {
                reason: "neither USER nor USERNAME is set in the environment".into(),
            })
    }

    fn machine_id(&self) -> Result<String> {
        // Prefer the OS-managed machine id; fall back to hostname sources.
        // The id only needs to be stable on this host, not globally unique.
        Self::read_id_file("/etc/machine-id")
            .or_else(|| Self::read_id_file("/var/lib/dbus/machine-id"))
            .or_else(|| Self::read_id_file("/etc/hostname"))
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty()))
            .or_else(|| std::env::var("COMPUTERNAME").ok().filter(|s| !s.is_empty()))
            .ok_or_else(|| StoreError::CapabilityFailure {
                reason: "no machine id or hostname source available".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// Fixed provider
// ---------------------------------------------------------------------------

/// A provider with fixed base paths and identity.
///
/// Used by the test suites for deterministic stores, and by applications
/// that already know where their replicas should live.
pub struct StaticPlatform {
    bases: [PathBuf; 3],
    user_name: String,
    machine_id: String,
}

impl StaticPlatform {
    /// Create a fixed provider.  The directories are created on first use.
    pub fn new(
        bases: [PathBuf; 3],
        user_name: impl Into<String>,
        machine_id: impl Into<String>,
    ) -> Self {
        Self {
            bases,
            user_name: user_name.into(),
            machine_id: machine_id.into(),
        }
    }

    /// Three sibling bases (`r0`, `r1`, `r2`) under one root directory.
    pub fn under(root: &Path, user_name: impl Into<String>, machine_id: impl Into<String>) -> Self {
        Self::new(
            [root.join("r0"), root.join("r1"), root.join("r2")],
            user_name,
            machine_id,
        )
    }
}

impl Platform for StaticPlatform {
    fn base_paths(&self) -> Result<[PathBuf; 3]> {
        for base in &self.bases {
            std::fs::create_dir_all(base).map_err(|e| StoreError::CapabilityFailure {
                reason: format!("cannot create base directory {}: {e}", base.display()),
            })?;
        }
        Ok(self.bases.clone())
    }

    fn user_name(&self) -> Result<String> {
        Ok(self.user_name.clone())
    }

    fn machine_id(&self) -> Result<String> {
        Ok(self.machine_id.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
