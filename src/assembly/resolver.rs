//! Dependency assembly location and identity.
//!
//! Marker annotation types can live in assemblies the target module does not
//! reference yet. Minting the missing `AssemblyRef` row needs the dependency's
//! identity (version and public key token), which is read from the dependency
//! file itself. The resolver locates that file by probing a configurable list
//! of search directories, normally the target assembly's own directory plus
//! whatever the caller adds.

use std::path::{Path, PathBuf};

use dotscope::metadata::tables::TableId;
use dotscope::metadata::tables::AssemblyRaw;
use dotscope::CilAssemblyView;
use sha1::{Digest, Sha1};

use crate::{Error, Result};

/// Identity of a dependency assembly, as written into an `AssemblyRef` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyIdentity {
    /// Simple name, without extension
    pub name: String,
    /// Major version
    pub major_version: u32,
    /// Minor version
    pub minor_version: u32,
    /// Build number
    pub build_number: u32,
    /// Revision number
    pub revision_number: u32,
    /// Public key token (8 bytes), when the assembly is strong-named
    pub public_key_token: Option<[u8; 8]>,
}

/// Locates dependency assemblies on disk.
#[derive(Debug, Clone, Default)]
pub struct AssemblyResolver {
    search_directories: Vec<PathBuf>,
}

impl AssemblyResolver {
    /// Creates a resolver with no search directories.
    pub fn new() -> Self {
        AssemblyResolver::default()
    }

    /// Creates a resolver probing the given directories, in order.
    pub fn with_directories<I, P>(directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        AssemblyResolver {
            search_directories: directories.into_iter().map(Into::into).collect(),
        }
    }

    /// Appends a directory to the probe order.
    pub fn add_search_directory<P: Into<PathBuf>>(&mut self, directory: P) {
        self.search_directories.push(directory.into());
    }

    /// The configured probe order.
    pub fn search_directories(&self) -> &[PathBuf] {
        &self.search_directories
    }

    /// Finds the file for an assembly simple name.
    ///
    /// Each directory is probed for `<name>.dll` then `<name>.exe`; the first
    /// existing file wins.
    pub fn probe(&self, simple_name: &str) -> Result<PathBuf> {
        for directory in &self.search_directories {
            for extension in ["dll", "exe"] {
                let candidate = directory.join(format!("{simple_name}.{extension}"));
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
        Err(Error::AssemblyNotFound(simple_name.to_string()))
    }

    /// Reads the identity of the assembly at `path` from its manifest.
    pub fn identity_of(&self, path: &Path) -> Result<AssemblyIdentity> {
        let view = CilAssemblyView::from_file(path)?;
        let tables = view
            .tables()
            .ok_or_else(|| Error::NotSupported("module has no metadata tables".to_string()))?;
        let strings = view
            .strings()
            .ok_or_else(|| Error::NotSupported("module has no string heap".to_string()))?;
        let manifest = tables
            .table::<AssemblyRaw>(TableId::Assembly)
            .and_then(|t| t.get(1))
            .ok_or_else(|| {
                Error::NotSupported(format!("'{}' has no assembly manifest", path.display()))
            })?;

        let name = strings.get(manifest.name as usize)?.to_string();
        let public_key_token = if manifest.public_key != 0 {
            let blobs = view
                .blobs()
                .ok_or_else(|| Error::NotSupported("module has no blob heap".to_string()))?;
            let key = blobs.get(manifest.public_key as usize)?;
            if key.is_empty() {
                None
            } else {
                Some(public_key_token(key))
            }
        } else {
            None
        };

        Ok(AssemblyIdentity {
            name,
            major_version: manifest.major_version,
            minor_version: manifest.minor_version,
            build_number: manifest.build_number,
            revision_number: manifest.revision_number,
            public_key_token,
        })
    }
}

/// Computes the 8-byte public key token: the low 8 bytes of the SHA-1 digest
/// of the full public key, in reverse order.
fn public_key_token(public_key: &[u8]) -> [u8; 8] {
    let digest = Sha1::digest(public_key);
    let mut token = [0u8; 8];
    for (i, byte) in digest[digest.len() - 8..].iter().rev().enumerate() {
        token[i] = *byte;
    }
    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn probe_prefers_dll_and_earlier_directories() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(second.path().join("Dep.dll"), b"x").unwrap();
        fs::write(second.path().join("Dep.exe"), b"x").unwrap();

        let resolver =
            AssemblyResolver::with_directories([first.path(), second.path()]);
        let found = resolver.probe("Dep").unwrap();
        assert_eq!(found, second.path().join("Dep.dll"));
    }

    #[test]
    fn probe_falls_back_to_exe() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Tool.exe"), b"x").unwrap();

        let resolver = AssemblyResolver::with_directories([dir.path()]);
        assert_eq!(resolver.probe("Tool").unwrap(), dir.path().join("Tool.exe"));
    }

    #[test]
    fn missing_assembly_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = AssemblyResolver::with_directories([dir.path()]);
        let err = resolver.probe("Nowhere").unwrap_err();
        assert!(matches!(err, Error::AssemblyNotFound(name) if name == "Nowhere"));
    }

    #[test]
    fn public_key_token_is_reversed_digest_tail() {
        // SHA-1 of an empty key is da39a3ee...afd80709; the token is the
        // last 8 bytes reversed.
        let token = public_key_token(&[]);
        assert_eq!(
            token,
            [0x09, 0x07, 0xd8, 0xaf, 0x90, 0x18, 0x60, 0x95]
        );
    }
}
