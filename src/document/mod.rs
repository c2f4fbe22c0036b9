mod core;
mod snapshot;

pub use self::core::{Document, Metadata};
pub use self::snapshot::DocumentSnapshot;
