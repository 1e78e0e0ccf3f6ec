mod loader;
mod types;

pub use loader::{CONFIG_FILE, CREDENTIAL_VARS, apply_env, load};
pub use types::{Config, RegistryAuth};
