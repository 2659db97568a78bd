//! On-disk evaluator scripts for tests that spawn real processes.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory holding POSIX `sh` evaluator scripts.
///
/// Scripts are run as `sh <script> <args...>`, so no exec bit is needed.
/// The directory is removed when this value is dropped.
pub struct ScriptDir {
    dir: TempDir,
}

impl ScriptDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create script directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a script named `name` with the given body.
    pub fn write_script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write evaluator script");
        path
    }

    /// Script that echoes its arguments back as the results payload.
    pub fn echo_args_script(&self) -> PathBuf {
        self.write_script(
            "echo_args.sh",
            r#"args=""
for a in "$@"; do
  if [ -z "$args" ]; then args="\"$a\""; else args="$args,\"$a\""; fi
done
printf '{"success": true, "results": {"args": [%s]}}\n' "$args""#,
        )
    }
}

impl Default for ScriptDir {
    fn default() -> Self {
        Self::new()
    }
}
