//! Page store: in-memory page cache with dirty tracking.
//!
//! Every page read or allocated stays cached until the store shuts down;
//! the engine is single-session and the file bounds the page count.

mod pager;

pub use pager::{PageHandle, Pager};
