//! CLI command implementations

pub mod find;
pub mod push;
pub mod secrets;

pub use find::FindArgs;
pub use push::PushArgs;
pub use secrets::SecretsArgs;
