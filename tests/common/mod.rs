#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, contents).expect("write temp file bytes");
        path
    }
}

/// A small order ledger: `id,sku,qty,price,shipped_on`.
pub fn orders_csv(rows: usize) -> String {
    let mut csv = String::from("id,sku,qty,price,shipped_on\n");
    for i in 0..rows {
        let day = (i % 28) + 1;
        csv.push_str(&format!(
            "{},SKU-{:04},{},{}.{:02},2024-03-{day:02}\n",
            i + 1,
            i * 7,
            i % 5,
            10 + i,
            i % 100
        ));
    }
    csv
}

/// `count` distinct column names that arrive already sorted.
pub fn sorted_names(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i:05}")).collect()
}
