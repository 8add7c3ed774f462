//! Statement validation, script execution and table query building

pub mod parameterized;
pub mod script;
pub mod split;
pub mod table;
pub mod validation;

pub use parameterized::{normalize_rows, run_parameterized};
pub use script::run_script;
pub use split::split_statements;
pub use table::{build_table_query, fetch_table_page, resolve_sort_column, TableQuery};
pub use validation::validate_statement;
