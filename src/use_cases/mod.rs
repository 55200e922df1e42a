//! Use cases (orchestration)
//!
//! Each use case drives the HSM through the ports for one key operation
//! and holds every session and transient object in a scoped guard.

mod context;
mod generate;
mod key_file;
mod loader;
mod wire;

pub use context::{ContextUsage, SigningContext};
pub use generate::generate;
pub use key_file::{parse_private_file, read_private_file, to_private_file, write_private_file};
pub use loader::{fetch, from_label};
pub use wire::{from_dns, to_dns};
