use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod content;
mod sprite_keys;
pub mod world;

pub use app::{
    run_app, AppError, DrawCommand, DrawList, DrawSpace, DrawVisual, InputAction, InputSnapshot,
    LoopConfig, LoopMetricsSnapshot, Outline, Renderer, Rgba, Scene, SceneCommand, SceneKey,
    TickDiagnostics, DEBUG_OUTLINES_ENV_VAR, LOGICAL_HEIGHT, LOGICAL_WIDTH,
};
pub use content::{
    compile_def_database, sha256_hex, ContentCompileError, ContentErrorCode, DefDatabase,
    LevelDef, SourceLocation,
};

pub const ROOT_ENV_VAR: &str = "SKULL_COVE_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    /// `assets/base`: sprites and XML defs.
    pub base_content_dir: PathBuf,
    pub levels_dir: PathBuf,
    pub saves_dir: PathBuf,
}

impl AppPaths {
    pub fn from_root(root: PathBuf) -> Self {
        let assets = root.join("assets");
        Self {
            base_content_dir: assets.join("base"),
            levels_dir: assets.join("levels"),
            saves_dir: root.join("saves"),
            root,
        }
    }

    pub fn defs_dir(&self) -> PathBuf {
        self.base_content_dir.join("defs")
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create saves directory at {path}: {source}")]
    CreateSavesDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "SKULL_COVE_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/skull-cove\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let paths = AppPaths::from_root(resolve_root()?);

    fs::create_dir_all(&paths.saves_dir).map_err(|source| StartupError::CreateSavesDir {
        path: paths.saves_dir.clone(),
        source,
    })?;

    Ok(paths)
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("assets").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml_and_assets() {
        let temp = TempDir::new().expect("temp");
        assert!(!is_repo_marker(temp.path()));

        fs::write(temp.path().join("Cargo.toml"), "").expect("cargo toml");
        assert!(!is_repo_marker(temp.path()));

        fs::create_dir_all(temp.path().join("assets")).expect("assets");
        assert!(is_repo_marker(temp.path()));
    }

    #[test]
    fn workspace_root_is_a_marker() {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("..");
        assert!(is_repo_marker(&normalize_path(&root)));
    }

    #[test]
    fn paths_hang_off_root() {
        let paths = AppPaths::from_root(PathBuf::from("/games/cove"));
        assert_eq!(paths.levels_dir, Path::new("/games/cove/assets/levels"));
        assert_eq!(paths.defs_dir(), Path::new("/games/cove/assets/base/defs"));
        assert_eq!(paths.saves_dir, Path::new("/games/cove/saves"));
    }
}
