use anyhow::Context;
use rand::RngCore;
use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";
const DEFAULT_ROUNDS: u32 = 100_000;
const SALT_LEN: usize = 16;

/// Salted, stretched digest encoded as `sha256$<rounds>$<salt hex>$<hash hex>`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    encode(password, &salt, DEFAULT_ROUNDS)
}

pub fn verify_password(password: &str, stored: &str) -> anyhow::Result<bool> {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(rounds), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        anyhow::bail!("malformed password hash");
    };
    anyhow::ensure!(scheme == SCHEME, "unsupported password scheme: {scheme}");

    let rounds: u32 = rounds.parse().context("invalid password hash rounds")?;
    let salt = hex::decode(salt).context("invalid password hash salt")?;
    let expected = hex::decode(expected).context("invalid password hash digest")?;
    let actual = stretch(password, &salt, rounds);

    Ok(constant_time_eq(&actual, &expected))
}

fn encode(password: &str, salt: &[u8], rounds: u32) -> String {
    let digest = stretch(password, salt, rounds);
    format!("{SCHEME}${rounds}${}${}", hex::encode(salt), hex::encode(digest))
}

fn stretch(password: &str, salt: &[u8], rounds: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());

    for _ in 1..rounds {
        let mut hasher = Sha256::new();
        hasher.update(digest);
        hasher.update(salt);
        digest.copy_from_slice(&hasher.finalize());
    }
    digest
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_own_hash() {
        let stored = hash_password("hunter2");
        assert!(stored.starts_with("sha256$100000$"));
        assert!(verify_password("hunter2", &stored).unwrap());
        assert!(!verify_password("hunter3", &stored).unwrap());
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn fixed_salt_is_reproducible() {
        let a = encode("pw", &[1, 2, 3, 4], 3);
        let b = encode("pw", &[1, 2, 3, 4], 3);
        assert_eq!(a, b);
        assert!(a.starts_with("sha256$3$01020304$"));
        assert!(verify_password("pw", &a).unwrap());
    }

    #[test]
    fn digest_is_lowercase_hex_of_stretched_hash() {
        let stored = encode("pw", &[0xab, 0xcd], 2);
        let digest = stored.rsplit('$').next().unwrap();
        assert_eq!(digest, hex::encode(stretch("pw", &[0xab, 0xcd], 2)));
        assert!(stored.starts_with("sha256$2$abcd$"));
    }

    #[test]
    fn rejects_malformed_hashes() {
        assert!(verify_password("pw", "plaintext").is_err());
        assert!(verify_password("pw", "md5$1$00$00").is_err());
        assert!(verify_password("pw", "sha256$x$00$00").is_err());
        assert!(verify_password("pw", "sha256$1$0g$00").is_err());
        assert!(verify_password("pw", "sha256$1$00$zz").is_err());
    }
}
