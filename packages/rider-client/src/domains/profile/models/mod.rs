pub mod profile;

pub use profile::{PgProfileRepository, ProfileRecord, ProfileRole};
