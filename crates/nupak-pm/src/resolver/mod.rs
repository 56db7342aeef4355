//! Planning strategies built on the dependency walker.

mod install;
mod reinstall;
mod uninstall;
mod update;

pub use install::InstallWalker;
pub use reinstall::{plan_reinstall, ReinstallPlan};
pub use uninstall::UninstallWalker;
pub use update::{plan_update, resolve_update_target, UpdateOptions};
