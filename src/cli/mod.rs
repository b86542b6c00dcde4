//! CLI command implementations

mod reconcile;
mod serve;
pub mod style;
mod sweep;

pub use reconcile::run_reconcile;
pub use serve::run_serve;
pub use sweep::run_sweep_command;
