pub mod error;
pub mod file;
pub mod id;
pub mod time;

pub use error::{Result, TypesError};
pub use file::{FileDescriptor, FIELD_MODULUS};
pub use id::{AccountId, OrderId};
pub use time::TimeConfig;
