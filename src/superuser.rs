// src/superuser.rs
//
// The superuser token is a random secret kept in a local file. It gates
// privileged endpoints (`X-Super-Token`) and doubles as the password pepper,
// so losing the file invalidates every stored password.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

pub const HEADER: &str = "X-Super-Token";

#[derive(Clone)]
pub struct SuperuserToken(Arc<str>);

impl std::fmt::Debug for SuperuserToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SuperuserToken(..)")
    }
}

impl SuperuserToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Arc::from(value.into()))
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self::new(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn matches(&self, candidate: &str) -> bool {
        candidate.as_bytes().ct_eq(self.as_bytes()).into()
    }
}

/// Reads the token file, creating it (mode 0400 on unix) when missing.
/// The boolean is `true` when a new token was written.
pub fn load_or_create(path: &Path) -> io::Result<(SuperuserToken, bool)> {
    match fs::read_to_string(path) {
        Ok(raw) => {
            let token = raw.trim();
            if token.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("superuser token file {} is empty", path.display()),
                ));
            }
            Ok((SuperuserToken::new(token), false))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let token = SuperuserToken::generate();
            write_read_only(path, token.as_str())?;
            Ok((token, true))
        }
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn write_read_only(path: &Path, contents: &str) -> io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o400)
        .open(path)?;
    file.write_all(contents.as_bytes())
}

#[cfg(not(unix))]
fn write_read_only(path: &Path, contents: &str) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(contents.as_bytes())?;

    let mut permissions = file.metadata()?.permissions();
    permissions.set_readonly(true);
    fs::set_permissions(path, permissions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_then_reuses_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".superusertoken");

        let (first, created) = load_or_create(&path).unwrap();
        assert!(created);
        assert_eq!(first.as_str().len(), 64);

        let (second, created) = load_or_create(&path).unwrap();
        assert!(!created);
        assert_eq!(first.as_str(), second.as_str());
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_owner_read_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".superusertoken");
        load_or_create(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o400);
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".superusertoken");
        fs::write(&path, "  \n").unwrap();

        assert!(load_or_create(&path).is_err());
    }

    #[test]
    fn matches_is_exact() {
        let token = SuperuserToken::new("abc123");
        assert!(token.matches("abc123"));
        assert!(!token.matches("abc12"));
        assert!(!token.matches("abc1234"));
        assert!(!token.matches(""));
    }
}
