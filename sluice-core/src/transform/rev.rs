//! Content fingerprinting of file names.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{Asset, TransformStep};
use crate::error::Result;

const HASH_LEN: usize = 10;

/// Renames `name.ext` to `name-<hash>.ext`, the hash being the first ten hex
/// digits of the SHA-256 of the contents.
#[derive(Debug, Clone, Default)]
pub struct Rev;

impl Rev {
    pub fn new() -> Self {
        Self
    }
}

pub fn content_hash(contents: &str) -> String {
    let digest = Sha256::digest(contents.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(HASH_LEN);
    hex
}

pub fn revved_path(path: &Path, hash: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, hash, ext.to_string_lossy()),
        None => format!("{}-{}", stem, hash),
    };
    path.with_file_name(name)
}

#[async_trait]
impl TransformStep for Rev {
    fn name(&self) -> &str {
        "rev"
    }

    async fn apply(&self, asset: Asset) -> Result<Asset> {
        let hash = content_hash(&asset.contents);
        Ok(Asset {
            path: revved_path(&asset.path, &hash),
            contents: asset.contents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revved_path_keeps_directory_and_extension() {
        assert_eq!(
            revved_path(Path::new("js/app.min.js"), "0123456789"),
            PathBuf::from("js/app.min-0123456789.js")
        );
        assert_eq!(
            revved_path(Path::new("LICENSE"), "abc"),
            PathBuf::from("LICENSE-abc")
        );
    }

    #[tokio::test]
    async fn test_hash_depends_on_contents() {
        let a = Rev::new().apply(Asset::new("app.js", "a")).await.unwrap();
        let b = Rev::new().apply(Asset::new("app.js", "b")).await.unwrap();
        let a2 = Rev::new().apply(Asset::new("app.js", "a")).await.unwrap();

        assert_ne!(a.path, b.path);
        assert_eq!(a.path, a2.path);
        assert_eq!(a.contents, "a");
        let name = a.path.to_string_lossy().into_owned();
        assert_eq!(name.len(), "app-.js".len() + HASH_LEN);
    }
}
