// Common types and utilities shared across the application

pub mod validation;

pub use validation::{parse_code, PhoneNumber, Username, ValidationError};
