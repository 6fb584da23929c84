use chrono::Local;
use model::core::identifiers::ObjectKind;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writer for the per-run artifact directory `migration_YYYYMMDD_HHMMSS`.
/// Everything an operator needs to audit the run lands here: the discovery
/// document, the echoed selection, the FK script, the sequence plan,
/// side-by-side source/target text per object, and the final results.
pub struct RunArtifacts {
    dir: PathBuf,
}

impl RunArtifacts {
    pub async fn create(root: &Path) -> Result<Self, std::io::Error> {
        let name = format!("migration_{}", Local::now().format("%Y%m%d_%H%M%S"));
        let dir = root.join(name);
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "run artifact directory created");
        Ok(RunArtifacts { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn write_json<T: Serialize>(
        &self,
        file_name: &str,
        value: &T,
    ) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|err| std::io::Error::other(err.to_string()))?;
        tokio::fs::write(self.dir.join(file_name), json).await
    }

    pub async fn write_text(&self, file_name: &str, text: &str) -> Result<(), std::io::Error> {
        tokio::fs::write(self.dir.join(file_name), text).await
    }

    /// Side-by-side audit pair: `oracle/{kind}/{name}.md` holds the source
    /// text, `sql/{kind}/{name}.md` the translated text.
    pub async fn write_object_pair(
        &self,
        kind: ObjectKind,
        name: &str,
        source_text: &str,
        target_text: Option<&str>,
    ) -> Result<(), std::io::Error> {
        let kind_dir = kind.as_str().to_lowercase();
        let file = format!("{}.md", sanitize_file_name(name));

        let oracle_dir = self.dir.join("oracle").join(&kind_dir);
        tokio::fs::create_dir_all(&oracle_dir).await?;
        let source_doc = format!("# {name} ({kind})\n\n```sql\n{source_text}\n```\n");
        tokio::fs::write(oracle_dir.join(&file), source_doc).await?;

        if let Some(target) = target_text {
            let sql_dir = self.dir.join("sql").join(&kind_dir);
            tokio::fs::create_dir_all(&sql_dir).await?;
            let target_doc = format!("# {name} ({kind})\n\n```sql\n{target}\n```\n");
            tokio::fs::write(sql_dir.join(&file), target_doc).await?;
        }
        Ok(())
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn run_directory_uses_the_expected_prefix() {
        let root = tempdir().unwrap();
        let artifacts = RunArtifacts::create(root.path()).await.unwrap();
        let dir_name = artifacts.dir().file_name().unwrap().to_string_lossy().to_string();
        assert!(dir_name.starts_with("migration_"));
        assert_eq!(dir_name.len(), "migration_YYYYMMDD_HHMMSS".len());
    }

    #[tokio::test]
    async fn object_pair_lands_in_kind_directories() {
        let root = tempdir().unwrap();
        let artifacts = RunArtifacts::create(root.path()).await.unwrap();
        artifacts
            .write_object_pair(
                ObjectKind::Table,
                "EMP",
                "CREATE TABLE emp (id NUMBER)",
                Some("CREATE TABLE [dbo].[EMP] (id INT)"),
            )
            .await
            .unwrap();

        let oracle = artifacts.dir().join("oracle/table/EMP.md");
        let sql = artifacts.dir().join("sql/table/EMP.md");
        assert!(oracle.exists());
        assert!(sql.exists());
        let body = std::fs::read_to_string(sql).unwrap();
        assert!(body.contains("CREATE TABLE [dbo].[EMP]"));
    }
}
