use std::io;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::bank_dir::{BankDirectory, BankFileError, MANIFEST_FILE};

/// One line of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub file: String,
    pub id: String,
    pub name: String,
    pub question_count: usize,
}

/// Write `manifest.json` listing every valid bank in the directory.
///
/// # Errors
///
/// Returns `io::Error` if the directory cannot be read or the manifest cannot be written.
pub async fn write_manifest(banks: &BankDirectory) -> io::Result<Vec<ManifestEntry>> {
    let entries: Vec<ManifestEntry> = banks
        .load_all()
        .await?
        .into_iter()
        .map(|f| ManifestEntry {
            id: f.bank.id().as_str().to_owned(),
            name: f.bank.name().to_owned(),
            question_count: f.bank.len(),
            file: f.file,
        })
        .collect();

    let json = serde_json::to_string_pretty(&entries).map_err(io::Error::other)?;
    let path = banks.root().join(MANIFEST_FILE);
    tokio::fs::write(&path, json).await?;
    info!(path = %path.display(), banks = entries.len(), "wrote manifest");
    Ok(entries)
}

#[derive(Debug)]
pub enum NormalizeStatus {
    Rewritten,
    Unchanged,
    Failed(BankFileError),
}

#[derive(Debug)]
pub struct NormalizeOutcome {
    pub path: PathBuf,
    pub status: NormalizeStatus,
}

/// Rewrite every bank file in canonical form: keyed options become lists,
/// letter answers become option texts, whitespace runs collapse. A file that
/// fails is reported and the rest are still processed.
///
/// # Errors
///
/// Returns `io::Error` if the directory cannot be read.
pub async fn normalize_dir(banks: &BankDirectory, dry_run: bool) -> io::Result<Vec<NormalizeOutcome>> {
    let mut outcomes = Vec::new();
    for path in banks.files().await? {
        let status = match normalize_file(banks, &path, dry_run).await {
            Ok(true) => NormalizeStatus::Rewritten,
            Ok(false) => NormalizeStatus::Unchanged,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "could not normalize bank file");
                NormalizeStatus::Failed(e)
            }
        };
        outcomes.push(NormalizeOutcome { path, status });
    }
    Ok(outcomes)
}

async fn normalize_file(
    banks: &BankDirectory,
    path: &std::path::Path,
    dry_run: bool,
) -> Result<bool, BankFileError> {
    let original: Value = serde_json::from_str(&tokio::fs::read_to_string(path).await?)?;
    let loaded = banks.load(path).await?;
    let canonical = serde_json::to_value(&loaded.bank)?;
    if canonical == original {
        return Ok(false);
    }
    if !dry_run {
        tokio::fs::write(path, serde_json::to_string_pretty(&canonical)?).await?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manifest_lists_valid_banks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("net.json"),
            r#"{"name":"Networking","questions":[
                {"question":"Q1","options":["a","b"],"correct_answer":"a"},
                {"question":"Q2","options":["a","b"],"correct_answer":"b"}
            ]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("bad.json"), r#"{"questions": 3}"#).unwrap();

        let banks = BankDirectory::new(dir.path());
        let entries = write_manifest(&banks).await.unwrap();
        assert_eq!(
            entries,
            [ManifestEntry {
                file: "net.json".into(),
                id: "net".into(),
                name: "Networking".into(),
                question_count: 2,
            }]
        );

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(written[0]["questionCount"], 2);
        // The manifest itself is not picked up as a bank.
        assert_eq!(write_manifest(&banks).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn normalize_converts_keyed_options_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyed.json");
        std::fs::write(
            &path,
            r#"{"id":"keyed","name":"Keyed","dateAdded":"2024-01-01T00:00:00Z","questions":[
                {"question":"Pick  two","options":{"B":"beta","A":"alpha","C":"gamma"},"correct_answer":"A, C"}
            ]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "[").unwrap();

        let banks = BankDirectory::new(dir.path());
        let dry = normalize_dir(&banks, true).await.unwrap();
        assert!(matches!(dry[1].status, NormalizeStatus::Rewritten));
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"B\""));

        let outcomes = normalize_dir(&banks, false).await.unwrap();
        assert!(matches!(outcomes[0].status, NormalizeStatus::Failed(_)));
        assert!(matches!(outcomes[1].status, NormalizeStatus::Rewritten));

        let rewritten: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let question = &rewritten["questions"][0];
        assert_eq!(question["question"], "Pick two");
        assert_eq!(question["options"], serde_json::json!(["alpha", "beta", "gamma"]));
        assert_eq!(question["correct_answer"], serde_json::json!(["alpha", "gamma"]));

        let again = normalize_dir(&banks, false).await.unwrap();
        assert!(matches!(again[1].status, NormalizeStatus::Unchanged));
    }
}
