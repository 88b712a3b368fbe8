//! Virtual environment paths and the interactive activation snippet.

use super::types::AppSpec;
use std::path::PathBuf;

/// Absolute path of the virtual environment directory.
pub fn venv_dir(app: &AppSpec) -> PathBuf {
    PathBuf::from(&app.dir).join(&app.venv)
}

/// Interpreter inside the virtual environment.
pub fn python_bin(app: &AppSpec) -> PathBuf {
    venv_dir(app).join("bin").join("python")
}

/// Package installer inside the virtual environment.
pub fn pip_bin(app: &AppSpec) -> PathBuf {
    venv_dir(app).join("bin").join("pip")
}

/// Shell snippet for `eval "$(lanzar activate)"`.
pub fn activation_script(app: &AppSpec) -> String {
    let venv = venv_dir(app);
    format!(
        "export VIRTUAL_ENV='{venv}'\n\
         export PATH=\"{venv}/bin:$PATH\"\n\
         unset PYTHONHOME\n",
        venv = venv.display()
    )
}
