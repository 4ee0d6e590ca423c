//! Handler implementations.

mod blog;

pub use self::blog::BlogHandler;
