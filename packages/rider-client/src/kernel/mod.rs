//! Kernel module - client infrastructure and dependencies.

pub mod deps;
pub mod test_dependencies;
pub mod token_store;
pub mod traits;

pub use deps::{is_test_identifier, FlowSettings, ProfileWrites, RiderDeps, TwilioIdentityGateway};
pub use test_dependencies::TestDependencies;
pub use token_store::FileTokenStore;
pub use traits::*;
