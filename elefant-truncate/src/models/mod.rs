mod table;
mod table_name;

pub use table::*;
pub use table_name::*;
