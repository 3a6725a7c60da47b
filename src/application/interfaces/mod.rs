mod diff_source;
mod embedding_provider;

pub use diff_source::*;
pub use embedding_provider::*;
