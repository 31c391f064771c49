pub mod retention;
pub mod throttle;
pub mod validator;
pub mod vault;

pub use retention::RetentionSweeper;
pub use throttle::WriteThrottle;
pub use validator::{CredentialValidator, Validation};
pub use vault::VaultService;
