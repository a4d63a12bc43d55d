use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

// Not every integration test file uses every helper.
#[allow(dead_code)]
pub struct TestContext {
    pub _temp_dir: TempDir,
    pub data_root: PathBuf,
    pub install_dir: PathBuf,
    pub bin_path: PathBuf,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_root = temp_dir.path().join("data");
        let install_dir = temp_dir.path().join("local");

        let bin_path = PathBuf::from(env!("CARGO_BIN_EXE_vendorhub"));

        Self {
            _temp_dir: temp_dir,
            data_root,
            install_dir,
            bin_path,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self._temp_dir.path().join(name)
    }

    /// Command with a configuration isolated from the calling environment.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        for (key, _) in std::env::vars() {
            if key.starts_with("VENDORHUB_") {
                cmd.env_remove(key);
            }
        }
        cmd.env("VENDORHUB_LOCAL_INSTALL_PATH", &self.install_dir);
        cmd.env("VENDORHUB_DATA_ROOT", &self.data_root);
        cmd.env("HOME", self._temp_dir.path());
        cmd.env("XDG_DATA_HOME", self._temp_dir.path().join("xdg"));
        cmd.env("RUST_LOG", "debug");
        cmd.arg("--no-coloring");
        cmd
    }

    /// Command pretending to run from the local install after a restart.
    pub fn local_cmd(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.env("VENDORHUB_FORCE_LOCAL", "1");
        cmd.env("VENDORHUB_SKIP_LOCAL_CHECK", "1");
        cmd
    }

    pub fn write_manifest(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).expect("Failed to write manifest");
        path
    }

    /// A hub distribution whose executable is a shell script recording how it
    /// was started into `out_dir`.
    #[cfg(unix)]
    pub fn fake_distribution(&self, version: &str, out_dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let dist = self.path(&format!("dist-{}", version));
        fs::create_dir_all(&dist).expect("Failed to create distribution");
        fs::create_dir_all(out_dir).expect("Failed to create output dir");

        let exe = dist.join(format!("vendorhub-v{}", version));
        let script = format!(
            "#!/bin/sh\necho \"$@\" > '{out}/argv.txt'\necho \"$VENDORHUB_RESTARTED\" > '{out}/restarted.txt'\n",
            out = out_dir.display()
        );
        fs::write(&exe, script).expect("Failed to write fake executable");
        let mut perms = fs::metadata(&exe).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&exe, perms).unwrap();
        dist
    }
}

#[allow(dead_code)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        }
    }
}

#[allow(dead_code)]
impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.status.success() {
            panic!(
                "Command failed with status {:?}\nstdout: {}\nstderr: {}",
                self.status.code(),
                self.stdout,
                self.stderr
            );
        }
        self
    }

    pub fn assert_failure(&self) -> &Self {
        if self.status.success() {
            panic!(
                "Command unexpectedly succeeded\nstdout: {}\nstderr: {}",
                self.stdout, self.stderr
            );
        }
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Stdout did not contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Stderr did not contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}
