//! Profile domain - rider profile records
//!
//! Responsibilities:
//! - Profile storage (Postgres or in-memory)
//! - Idempotent profile creation after verification
//! - Recovery for identities that ended up without a profile

pub mod actions;
pub mod memory;
pub mod models;

pub use actions::{complete_profile, ensure_profile};
pub use memory::InMemoryProfileRepository;
pub use models::{PgProfileRepository, ProfileRecord, ProfileRole};
