//! Layered configuration.
//!
//! Tiers, lowest priority first:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `$CWD/kanbe/config.yaml`
//! 3. **User** - `~/.kanbe/config.yaml`
//! 4. **Explicit** - `--config` or `KANBE_CONFIG_PATH`
//! 5. **Environment** - individual overrides below
//!
//! YAML tiers are deep-merged field by field; lists are replaced whole.
//!
//! ## Environment Variables
//! - `KANBE_CONFIG_PATH` - Explicit config file
//! - `KANBE_DB_PATH` - Database path
//! - `KANBE_PORT` - HTTP port
//! - `KANBE_BACKUP_DIR` - Backup directory
//! - `KANBE_USER_DIR` - User config dir (default: `~/.kanbe`)
//! - `KANBE_PROJECT_DIR` - Project config dir (default: `./kanbe`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
