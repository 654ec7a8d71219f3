//! Game build numbers: the installed one and the latest published one.

use std::path::Path;

use crate::ShardkeepError;

/// Build number on the first line of the game's `version.txt`.
pub async fn local_version(version_file: &Path) -> Result<u64, ShardkeepError> {
    let text = tokio::fs::read_to_string(version_file)
        .await
        .map_err(ShardkeepError::io(version_file))?;
    parse_version(&text)
}

/// Latest build number published at `url`.
pub async fn server_version(http: &reqwest::Client, url: &str) -> Result<u64, ShardkeepError> {
    let text = http.get(url).send().await?.error_for_status()?.text().await?;
    parse_version(&text)
}

fn parse_version(text: &str) -> Result<u64, ShardkeepError> {
    let first = text.lines().next().unwrap_or_default().trim();
    first
        .parse()
        .map_err(|_| ShardkeepError::Config(format!("not a build number: {first:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("612345\n").unwrap(), 612345);
        assert_eq!(parse_version(" 600001 \nextra").unwrap(), 600001);
        assert!(parse_version("").is_err());
        assert!(parse_version("v1").is_err());
    }

    #[tokio::test]
    async fn test_local_version_reads_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("version.txt");
        std::fs::write(&file, "612345\n").unwrap();
        assert_eq!(local_version(&file).await.unwrap(), 612345);

        let err = local_version(&dir.path().join("missing.txt")).await.unwrap_err();
        assert!(matches!(err, ShardkeepError::Io { .. }));
    }
}
