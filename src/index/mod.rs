//! Lookup index for merge-candidate discovery

mod lookup;

pub use lookup::{LookupEntry, LookupTable};
