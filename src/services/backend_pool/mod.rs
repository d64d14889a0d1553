//! Backend Pool Module
//!
//! Upstream credentials and the per-request pool they are drawn from.
//!
//! # Example
//! ```ignore
//! use backend_pool::{Credential, CredentialPool};
//!
//! let keys = vec![Credential::new("key1")?, Credential::new("key2")?];
//!
//! // One pool per inbound request; each key comes out at most once
//! let mut pool = CredentialPool::new(&keys);
//! while let Some(cred) = pool.draw() {
//!     println!("Trying key {}", cred.masked());
//! }
//! ```

mod credential;
mod pool;

pub use credential::Credential;
pub use pool::CredentialPool;
