pub mod requests;

pub use requests::{AccountRequest, SaveRequest};
