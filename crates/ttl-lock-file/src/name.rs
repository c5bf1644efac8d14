//! Lock name to file name conversion.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha512};

use ttl_lock_core::error::{LockError, LockResult};

/// Minimum file name length to avoid collisions.
const MIN_FILE_NAME_LENGTH: usize = 12;

/// Portable file name length (includes hash and extension).
const PORTABLE_FILE_NAME_LENGTH: usize = 64;

/// Hash length in Base32 characters (160 bits / 5 bits per char).
const HASH_LENGTH_IN_CHARS: usize = 32;

/// Base32 alphabet (RFC 4648).
const BASE32_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

const EXTENSION: &str = ".lock";

#[cfg(windows)]
const MAX_PATH_LENGTH: usize = 260;
#[cfg(not(windows))]
const MAX_PATH_LENGTH: usize = 4096;

/// Builds the record file path for `name` inside `directory`.
///
/// # Rules
///
/// - Alphanumeric characters and `_` are kept, everything else becomes `_`
/// - A Base32 hash of the full name is appended, so names differing only in
///   replaced characters or case never share a file
/// - The file name is capped at 64 characters; if the directory is so deep
///   that even that is too long, the hash alone (or a prefix of it) is used
///
/// This is pure path arithmetic; nothing is created on disk.
pub fn lock_file_path(directory: &Path, name: &str) -> LockResult<PathBuf> {
    if name.is_empty() {
        return Err(LockError::InvalidName("lock name cannot be empty".to_string()));
    }

    let base_name = convert_to_valid_base_name(name);
    let name_hash = compute_hash(name.as_bytes());

    let prefix_len = PORTABLE_FILE_NAME_LENGTH
        .saturating_sub(name_hash.len())
        .saturating_sub(EXTENSION.len());
    let prefix: String = base_name.chars().take(prefix_len).collect();

    let candidates = [
        format!("{prefix}{name_hash}{EXTENSION}"),
        name_hash.clone(),
        name_hash[..MIN_FILE_NAME_LENGTH].to_string(),
    ];

    candidates
        .into_iter()
        .map(|file_name| directory.join(file_name))
        .find(|path| path.as_os_str().len() <= MAX_PATH_LENGTH)
        .ok_or_else(|| {
            LockError::InvalidName(format!(
                "unable to construct lock file name: directory path too long (length = {})",
                directory.as_os_str().len()
            ))
        })
}

fn convert_to_valid_base_name(name: &str) -> String {
    const REPLACEMENT_CHAR: char = '_';

    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == REPLACEMENT_CHAR {
                ch
            } else {
                REPLACEMENT_CHAR
            }
        })
        .collect()
}

fn compute_hash(bytes: &[u8]) -> String {
    let hash_bytes = Sha512::digest(bytes);

    // 160 bits is plenty to keep distinct names apart
    let mut chars = String::with_capacity(HASH_LENGTH_IN_CHARS);
    let mut bit_buffer = 0u32;
    let mut bits_remaining = 0u32;

    for &byte in &hash_bytes[..20] {
        bit_buffer |= (byte as u32) << bits_remaining;
        bits_remaining += 8;

        while bits_remaining >= 5 {
            chars.push(BASE32_ALPHABET[(bit_buffer & 0x1f) as usize] as char);
            bit_buffer >>= 5;
            bits_remaining -= 5;
        }
    }

    chars
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_valid_name() {
        let dir = env::temp_dir();
        let path = lock_file_path(&dir, "my-lock").unwrap();
        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("my_lock"));
        assert!(file_name.ends_with(".lock"));
        assert_eq!(path.parent(), Some(dir.as_path()));
    }

    #[test]
    fn test_invalid_chars() {
        let dir = env::temp_dir();
        let path = lock_file_path(&dir, "foo/bar").unwrap();
        assert!(path.to_string_lossy().contains("foo_bar"));
        assert_eq!(path.parent(), Some(dir.as_path()));
    }

    #[test]
    fn test_similar_names_do_not_collide() {
        let dir = env::temp_dir();
        let a = lock_file_path(&dir, "foo/bar").unwrap();
        let b = lock_file_path(&dir, "foo_bar").unwrap();
        let c = lock_file_path(&dir, "FOO_BAR").unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn test_long_names_are_capped() {
        let dir = env::temp_dir();
        let path = lock_file_path(&dir, &"a".repeat(1000)).unwrap();
        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(file_name.len(), PORTABLE_FILE_NAME_LENGTH);
    }

    #[test]
    fn test_empty_name() {
        assert!(matches!(
            lock_file_path(&env::temp_dir(), ""),
            Err(LockError::InvalidName(_))
        ));
    }

    #[test]
    fn test_hash_length() {
        assert_eq!(compute_hash(b"anything").len(), HASH_LENGTH_IN_CHARS);
    }
}
