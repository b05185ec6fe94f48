//! Domain object identity.

mod id;

pub use id::ObjectId;
