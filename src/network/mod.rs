mod endpoint;
mod stream;

pub use endpoint::*;
pub(crate) use stream::*;
