mod nonce;

pub use nonce::{CONSOLIDATE_ACTION, NonceSigner};
