//! Paths command handler.

use anyhow::Result;
use reviewlens_core::paths::worker_script_path;

use crate::CliContext;

/// Print every resolved path in `key = value` form.
pub fn execute(ctx: &CliContext) -> Result<()> {
    let layout = &ctx.layout;
    let rows = [
        ("data_root", layout.data_root().to_path_buf()),
        ("python_env", layout.env_root()),
        ("venv", layout.venv_dir()),
        ("venv_python", layout.venv_python()),
        ("managed_runtime", layout.managed_runtime_dir()),
        ("worker_data", layout.worker_data_dir()),
        ("models_cache", layout.models_cache_dir()),
        ("worker_script", worker_script_path()?),
        ("service_install", ctx.service_layout.install_dir().to_path_buf()),
        ("service_home", ctx.service_layout.home_dir().to_path_buf()),
    ];

    for (key, path) in rows {
        println!("{key} = {}", path.display());
    }
    Ok(())
}
