pub mod error;
pub use error::Result;
pub use error::Error;

pub mod config;
pub use config::Config;
pub use config::GameLayout;

pub mod catalog;
pub use catalog::Catalog;
pub use catalog::Mod;
pub use catalog::ModDescriptor;

pub mod hash;
pub mod archive;
pub mod acquire;
pub mod relationship_resolver;
pub mod installed;
pub use installed::InstalledSet;
pub mod patcher;
pub mod progress;
pub mod installer;
pub use installer::ModInstaller;
pub mod manager;
pub use manager::ModManager;
