//! Profile domain actions

mod complete_profile;
mod ensure_profile;

pub use complete_profile::complete_profile;
pub use ensure_profile::ensure_profile;
