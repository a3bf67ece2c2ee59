pub mod identity;

pub use identity::{hash_phone_number, Identity, IdentityId, PendingVerification};
