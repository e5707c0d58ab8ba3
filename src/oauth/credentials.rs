use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AuthflowError;
use crate::oauth::token::TokenSet;

/// The sole persisted unit: a token set plus the epoch second it was saved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    pub token_set: TokenSet,
    pub timestamp: i64,
}

pub fn default_credentials_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".authflow-credentials.json")
}

/// Persist a token set, overwriting any prior content. Parent directories
/// are created as needed and the file is restricted to owner read/write
/// immediately after the write.
pub fn save_credentials(path: &Path, token_set: &TokenSet) -> Result<(), AuthflowError> {
    let creds = Credentials {
        token_set: token_set.clone(),
        timestamp: chrono::Utc::now().timestamp(),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let data = serde_json::to_string_pretty(&creds)
        .map_err(|e| AuthflowError::CredentialStore(format!("failed to serialize: {e}")))?;
    std::fs::write(path, data)?;
    restrict_permissions(path)?;

    tracing::debug!(path = %path.display(), "credentials saved");
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Load stored credentials. A missing, unreadable, or structurally invalid
/// file all read as "no credentials"; corruption is equivalent to first run.
pub fn load_credentials(path: &Path) -> Option<Credentials> {
    let data = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Credentials>(&data) {
        Ok(creds) => Some(creds),
        Err(e) => {
            tracing::warn!(path = %path.display(), "ignoring unreadable credential file: {e}");
            None
        }
    }
}

/// Delete stored credentials. Returns whether a file was removed.
pub fn clear_credentials(path: &Path) -> Result<bool, AuthflowError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_token() -> TokenSet {
        let mut extra = serde_json::Map::new();
        extra.insert("scope".into(), serde_json::Value::String("openid".into()));
        TokenSet {
            access_token: "test-access".into(),
            token_type: "Bearer".into(),
            refresh_token: Some("test-refresh".into()),
            expires_in: Some(3600),
            id_token: Some("test-id".into()),
            state: None,
            expires_at: Some(1_900_000_000),
            extra,
        }
    }

    #[test]
    fn load_nonexistent_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_credentials(&dir.path().join("missing.json")).is_none());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let token = sample_token();

        save_credentials(&path, &token).unwrap();
        let loaded = load_credentials(&path).unwrap();

        assert_eq!(loaded.token_set, token);
        assert!(loaded.timestamp > 0);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("creds.json");
        save_credentials(&path, &sample_token()).unwrap();
        assert!(load_credentials(&path).is_some());
    }

    #[test]
    fn save_overwrites_prior_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        save_credentials(&path, &sample_token()).unwrap();
        let mut replacement = sample_token();
        replacement.access_token = "newer".into();
        replacement.refresh_token = None;
        save_credentials(&path, &replacement).unwrap();

        let loaded = load_credentials(&path).unwrap();
        assert_eq!(loaded.token_set.access_token, "newer");
        assert!(loaded.token_set.refresh_token.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        save_credentials(&path, &sample_token()).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn invalid_json_reads_as_no_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_credentials(&path).is_none());
    }

    #[test]
    fn missing_access_token_reads_as_no_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{"token_set": {"token_type": "Bearer"}, "timestamp": 1}"#,
        )
        .unwrap();
        assert!(load_credentials(&path).is_none());
    }

    #[test]
    fn clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        save_credentials(&path, &sample_token()).unwrap();

        assert!(clear_credentials(&path).unwrap());
        assert!(load_credentials(&path).is_none());
        assert!(!clear_credentials(&path).unwrap());
    }
}
