//! Small helpers shared across the pipeline

use serde::{Deserialize, Serialize};

/// Build metadata reported by `--version` and `GET /version`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// New deployment id
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Lowercase hex SHA-256 digest, used to fingerprint uploaded build output
pub fn sha256_hash(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(data))
}

/// Shorten a commit hash for display
pub fn short_commit(commit: &str) -> &str {
    commit.get(..7).unwrap_or(commit)
}
