mod find_optimizer;
mod index_manager;
mod read_operations;
mod row_format;
mod write_operations;

pub(crate) use find_optimizer::*;
pub(crate) use index_manager::*;
pub(crate) use read_operations::*;
pub(crate) use write_operations::*;
