//! Persistence seams.
//!
//! - [`kv`]: a small typed local key-value store. Writes are synchronous and
//!   cheap; a missing key means "no prior state".
//! - [`remote`]: fire-and-forget object storage behind a bounded
//!   [`UploadQueue`](remote::UploadQueue) drained by one worker thread.

pub mod kv;
pub mod remote;

pub use kv::*;
pub use remote::*;
