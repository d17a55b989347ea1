//! File system adapter backed by `tokio::fs`.

use std::io;
use std::path::Path;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::app::runner::ArtifactFs;

/// Reads modification times and contents straight from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFs;

#[async_trait]
impl ArtifactFs for DiskFs {
    async fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        tokio::fs::metadata(path).await?.modified()
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;

    #[tokio::test]
    async fn reports_modification_time_and_contents() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("Plot.py");
        fs::write(&path, "x = 1\n")?;
        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        File::options().write(true).open(&path)?.set_modified(stamp)?;

        assert_eq!(DiskFs.modified(&path).await?, stamp);
        assert_eq!(DiskFs.read_to_string(&path).await?, "x = 1\n");
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = DiskFs
            .modified(Path::new("/no/such/dir/Plot.py"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
