// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Naming helpers: flattened job names and run API keys.

use rand::Rng;

/// Flatten a job group path into the single directory component used
/// under the builds root (spec §3, §6: `/` → `#`).
pub fn flat_job_name(group_path: &str, job_name: &str) -> String {
    if group_path.is_empty() {
        job_name.to_string()
    } else {
        format!("{}#{}", group_path.replace('/', "#"), job_name)
    }
}

/// Generate a 16-character random ASCII-digit API key from a
/// cryptographically strong source (spec §4.2).
pub fn generate_api_key() -> String {
    let mut rng = rand::thread_rng();
    (0..16).map(|_| rng.gen_range(b'0'..=b'9') as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_nested_group_paths() {
        assert_eq!(flat_job_name("a/b", "job1"), "a#b#job1");
        assert_eq!(flat_job_name("", "job1"), "job1");
    }

    #[test]
    fn api_key_is_sixteen_ascii_digits() {
        let key = generate_api_key();
        assert_eq!(key.len(), 16);
        assert!(key.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn api_keys_are_not_trivially_repeated() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_ne!(a, b, "two successive keys collided; RNG looks broken");
    }
}
