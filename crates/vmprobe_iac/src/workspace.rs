//! Per-invocation provisioning workspaces.
//!
//! Each invocation runs Terraform against a private copy of the
//! configuration bundle so concurrent invocations never share a state
//! file or `.terraform` directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{IacError, IacResult};

/// Name of the variables file written into every workspace.
pub const VAR_FILE_NAME: &str = "vmprobe.auto.tfvars.json";

/// Check that a directory looks like a Terraform configuration.
pub fn validate_bundle(bundle: &Path) -> IacResult<()> {
    if !bundle.is_dir() {
        return Err(IacError::InvalidBundle(format!(
            "{} is not a directory",
            bundle.display()
        )));
    }

    let has_tf = WalkDir::new(bundle)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .any(|e| e.file_type().is_file() && e.path().extension().is_some_and(|x| x == "tf"));

    if !has_tf {
        return Err(IacError::InvalidBundle(format!(
            "no .tf files in {}",
            bundle.display()
        )));
    }
    Ok(())
}

fn is_local_state(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    (entry.depth() > 0 && name == ".terraform") || name.contains(".tfstate")
}

/// An isolated copy of a configuration bundle.
///
/// The directory is deleted on drop unless [`Workspace::keep`] was called.
#[derive(Debug)]
pub struct Workspace {
    source: PathBuf,
    dir: Option<TempDir>,
    kept: Option<PathBuf>,
}

impl Workspace {
    /// Copy `bundle` into a fresh temporary directory.
    ///
    /// Local state (`.terraform/`, `*.tfstate*`) is left behind so the copy
    /// always starts from an empty state.
    pub fn isolate(bundle: &Path) -> IacResult<Self> {
        validate_bundle(bundle)?;

        let dir = tempfile::Builder::new().prefix("vmprobe-").tempdir()?;
        info!("Isolating {:?} into {:?}", bundle, dir.path());

        let walker = WalkDir::new(bundle)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !is_local_state(e));

        for entry in walker {
            let entry = entry.map_err(|e| IacError::InvalidBundle(e.to_string()))?;
            let relative = entry
                .path()
                .strip_prefix(bundle)
                .map_err(|e| IacError::InvalidBundle(e.to_string()))?;
            let target = dir.path().join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                let options = fs_extra::file::CopyOptions::new().overwrite(true);
                fs_extra::file::copy(entry.path(), &target, &options)?;
                debug!("Copied {:?}", relative);
            }
        }

        Ok(Self {
            source: bundle.to_path_buf(),
            dir: Some(dir),
            kept: None,
        })
    }

    /// Directory Terraform runs in.
    pub fn path(&self) -> &Path {
        match (&self.dir, &self.kept) {
            (Some(dir), _) => dir.path(),
            (None, Some(kept)) => kept,
            (None, None) => &self.source,
        }
    }

    /// Write the variables file and return its name relative to the workspace.
    pub fn write_var_file(&self, vars: &Map<String, Value>) -> IacResult<&'static str> {
        let path = self.path().join(VAR_FILE_NAME);
        let body = serde_json::to_string_pretty(&Value::Object(vars.clone()))?;
        fs::write(&path, body)?;
        debug!("Wrote {} variables to {:?}", vars.len(), path);
        Ok(VAR_FILE_NAME)
    }

    /// Keep the directory on disk after drop, for post-mortem debugging.
    pub fn keep(&mut self) -> PathBuf {
        if let Some(dir) = self.dir.take() {
            let path = dir.keep();
            warn!("Keeping workspace at {:?}", path);
            self.kept = Some(path);
        }
        self.path().to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.tf"), "resource \"null_resource\" \"x\" {}").unwrap();
        fs::write(dir.path().join("terraform.tfstate"), "{}").unwrap();
        fs::create_dir_all(dir.path().join(".terraform/providers")).unwrap();
        fs::write(dir.path().join(".terraform/providers/bin"), "x").unwrap();
        fs::create_dir_all(dir.path().join("modules/vm")).unwrap();
        fs::write(dir.path().join("modules/vm/main.tf"), "").unwrap();
        dir
    }

    #[test]
    fn test_isolate_copies_config_but_not_state() {
        let src = bundle();
        let ws = Workspace::isolate(src.path()).unwrap();

        assert_ne!(ws.path(), src.path());
        assert!(ws.path().join("main.tf").exists());
        assert!(ws.path().join("modules/vm/main.tf").exists());
        assert!(!ws.path().join("terraform.tfstate").exists());
        assert!(!ws.path().join(".terraform").exists());
    }

    #[test]
    fn test_workspaces_are_distinct() {
        let src = bundle();
        let a = Workspace::isolate(src.path()).unwrap();
        let b = Workspace::isolate(src.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let src = bundle();
        let ws = Workspace::isolate(src.path()).unwrap();
        let path = ws.path().to_path_buf();
        drop(ws);
        assert!(!path.exists());
    }

    #[test]
    fn test_keep_survives_drop() {
        let src = bundle();
        let mut ws = Workspace::isolate(src.path()).unwrap();
        let path = ws.keep();
        drop(ws);
        assert!(path.join("main.tf").exists());
        fs::remove_dir_all(path).unwrap();
    }

    #[test]
    fn test_write_var_file() {
        let src = bundle();
        let ws = Workspace::isolate(src.path()).unwrap();
        let vars = json!({"name_vm": "test", "cores": 1});

        let name = ws.write_var_file(vars.as_object().unwrap()).unwrap();
        let written: Value =
            serde_json::from_str(&fs::read_to_string(ws.path().join(name)).unwrap()).unwrap();

        assert_eq!(written, vars);
    }

    #[test]
    fn test_rejects_bundle_without_tf_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "nothing here").unwrap();

        assert!(matches!(
            Workspace::isolate(dir.path()),
            Err(IacError::InvalidBundle(_))
        ));
        assert!(matches!(
            validate_bundle(&dir.path().join("missing")),
            Err(IacError::InvalidBundle(_))
        ));
    }
}
