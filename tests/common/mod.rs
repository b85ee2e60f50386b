#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::{TempDir, tempdir};

pub const MAPPING_CSV: &str = "\
AMT SENF,Cat No,Description,Avg Value
amt_x,5,five,10.2
amt_x,6,six,11
amt_y,A,alpha,3.5
";

pub const MAIN_CSV: &str = "\
name,id,amt_x,amt_y
a,1,5,A
b,2,9,A
c,3,,A
d,7,nope,zzz
e,8,6,
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Workspace pre-populated with `mapping.csv` and `main.csv`.
    pub fn with_fixtures() -> Self {
        let workspace = Self::new();
        workspace.write("mapping.csv", MAPPING_CSV);
        workspace.write("main.csv", MAIN_CSV);
        workspace
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.file(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.file(name)).expect("read workspace file")
    }

    /// `remap` invocation over `input` with `mapping.csv`, writing `out.csv`
    /// and `report.csv`.
    pub fn remap(&self, input: &str) -> Command {
        let mut cmd = Command::cargo_bin("csv-remap").expect("binary exists");
        cmd.arg("remap")
            .arg("-i")
            .arg(self.file(input))
            .arg("--mapping")
            .arg(self.file("mapping.csv"))
            .arg("-o")
            .arg(self.file("out.csv"))
            .arg("-r")
            .arg(self.file("report.csv"));
        cmd
    }
}

/// Splits CSV text into lines without the trailing newline.
pub fn lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}
