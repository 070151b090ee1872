//! Per-scenario evidence files
//!
//! Every scenario gets its own directory under the evidence root, named
//! after the scenario title. Capturing evidence is best effort: callers log
//! the returned error and carry on.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::browser::Page;
use crate::common::paths::{ensure_dir, slug};
use crate::common::{Error, Result};

/// Root directory for evidence of one run
#[derive(Debug, Clone)]
pub struct EvidenceStore {
    root: PathBuf,
}

impl EvidenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory for one attempt of a scenario; retries get their own
    pub fn scenario_dir(&self, title: &str, retry: u32) -> PathBuf {
        let mut name = slug(title);
        if retry > 0 {
            name.push_str(&format!("-retry{}", retry));
        }
        self.root.join(name)
    }
}

/// Write `bytes` as `name` inside `dir`
pub fn save(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    ensure_dir(dir).map_err(|e| Error::evidence(name, e))?;
    let path = dir.join(name);
    std::fs::write(&path, bytes).map_err(|e| Error::evidence(name, e))?;
    tracing::debug!(path = %path.display(), "Saved evidence");
    Ok(path)
}

/// Serialize `value` as pretty JSON into `dir/name`
pub fn save_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| Error::evidence(name, e))?;
    save(dir, name, &json)
}

/// Take a full-page screenshot into `dir/name`
pub async fn save_screenshot(page: &dyn Page, dir: &Path, name: &str) -> Result<PathBuf> {
    let png = page
        .screenshot()
        .await
        .map_err(|e| Error::evidence(name, e))?;
    save(dir, name, &png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::{MockPage, FAKE_PNG};

    #[test]
    fn test_scenario_dir_per_retry() {
        let store = EvidenceStore::new("/tmp/evidence");
        let title = "Login Tests > Login • TC01 • a@b.c • expect=Success";
        assert_eq!(
            store.scenario_dir(title, 0),
            PathBuf::from("/tmp/evidence/login-tests-login-tc01-a-b-c-expect-success")
        );
        assert!(store
            .scenario_dir(title, 2)
            .to_string_lossy()
            .ends_with("-retry2"));
    }

    #[tokio::test]
    async fn test_screenshot_and_json() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tc01");
        let page = MockPage::new();

        let png = save_screenshot(&page, &dir, "page.png").await.unwrap();
        assert_eq!(std::fs::read(&png).unwrap(), FAKE_PNG);

        let json = save_json(&dir, "inputs.json", &serde_json::json!({"Email": "a@b.c"})).unwrap();
        let content = std::fs::read_to_string(json).unwrap();
        assert!(content.contains("\"Email\": \"a@b.c\""));
    }

    #[tokio::test]
    async fn test_screenshot_failure_is_evidence_error() {
        let tmp = tempfile::tempdir().unwrap();
        let page = MockPage::new();
        page.fail_screenshots();

        let err = save_screenshot(&page, tmp.path(), "page.png").await.unwrap_err();
        assert!(matches!(err, Error::EvidenceCapture { ref name, .. } if name == "page.png"));
    }
}
