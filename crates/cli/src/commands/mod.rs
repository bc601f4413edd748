//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_session;
pub use validate::run_validate;

use std::path::Path;

use contracts::ContextBlueprint;

use crate::error::{CliError, Result};

/// Load and validate a configuration file
pub(crate) fn load_blueprint(path: &Path) -> Result<ContextBlueprint> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    Ok(config_loader::ConfigLoader::load_from_path(path)?)
}
