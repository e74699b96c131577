pub mod types;
pub mod aead;
pub mod nonce;

pub use types::*;
pub use aead::*;
pub use nonce::*;
