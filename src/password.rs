use bcrypt::BcryptError;
use sha2::{Digest, Sha256};

/// Peppered bcrypt hashing.
///
/// The password is first reduced to `hex(sha256(password || pepper))`, which
/// keeps the bcrypt input at 64 bytes regardless of password length.
#[derive(Clone)]
pub struct Passwords {
    pepper: Vec<u8>,
    cost: u32,
    dummy_hash: String,
}

impl Passwords {
    pub fn new(pepper: impl Into<Vec<u8>>, cost: u32) -> Result<Self, BcryptError> {
        let pepper = pepper.into();
        // same cost as real hashes so a miss costs as much as a hit
        let dummy_hash = bcrypt::hash(pre_hash("dummy-password", &pepper), cost)?;
        Ok(Self {
            pepper,
            cost,
            dummy_hash,
        })
    }

    pub fn hash(&self, password: &str) -> Result<String, BcryptError> {
        bcrypt::hash(pre_hash(password, &self.pepper), self.cost)
    }

    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match bcrypt::verify(pre_hash(password, &self.pepper), hash) {
            Ok(matched) => matched,
            Err(e) => {
                log::warn!("bcrypt verify error: {e}");
                false
            }
        }
    }

    /// Burns one comparison for a user that does not exist.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }

    /// Hashes `value` unless it already is a bcrypt hash.
    pub fn prepare(&self, value: &str) -> Result<String, BcryptError> {
        if is_hash(value) {
            return Ok(value.to_string());
        }
        self.hash(value)
    }
}

pub fn is_hash(value: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"]
        .iter()
        .any(|prefix| value.starts_with(prefix))
}

fn pre_hash(password: &str, pepper: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(pepper);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passwords() -> Passwords {
        Passwords::new("pepper", 4).unwrap()
    }

    #[test]
    fn hash_then_verify_round_trip() {
        let passwords = passwords();
        let hash = passwords.hash("correct horse").unwrap();

        assert!(passwords.verify("correct horse", &hash));
        assert!(!passwords.verify("correct horse ", &hash));
        assert!(!passwords.verify("wrong", &hash));
    }

    #[test]
    fn pepper_takes_part_in_hash() {
        let hash = passwords().hash("password123").unwrap();
        let other = Passwords::new("another pepper", 4).unwrap();
        assert!(!other.verify("password123", &hash));
    }

    #[test]
    fn long_passwords_are_not_truncated() {
        let passwords = passwords();
        let base = "a".repeat(80);
        let hash = passwords.hash(&format!("{base}1")).unwrap();
        assert!(!passwords.verify(&format!("{base}2"), &hash));
    }

    #[test]
    fn prepare_keeps_existing_hashes() {
        let passwords = passwords();
        let hash = passwords.hash("password123").unwrap();

        assert!(is_hash(&hash));
        assert_eq!(passwords.prepare(&hash).unwrap(), hash);

        let fresh = passwords.prepare("plaintext1").unwrap();
        assert_ne!(fresh, "plaintext1");
        assert!(passwords.verify("plaintext1", &fresh));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!passwords().verify("anything", "not-a-hash"));
    }
}
