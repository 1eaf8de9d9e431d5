mod store;
mod table;

pub use store::*;
