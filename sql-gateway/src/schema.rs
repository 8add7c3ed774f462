//! Wire and domain types for the gateway
//!
//! These types describe statements, results, catalog metadata and the
//! request bodies accepted by the HTTP surface.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum number of characters accepted in a query or script
pub const MAX_QUERY_LENGTH: usize = 25_000;

/// Maximum length of the JSON-serialized parameter array
pub const MAX_PARAMS_LENGTH: usize = 1_000;

/// Maximum page size for table browsing
pub const MAX_PAGE_SIZE: u64 = 500;

/// Request to execute a script or a parameterized statement
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// SQL text to execute
    pub query: String,

    /// Positional parameters, switching to single-statement mode when present
    #[serde(default)]
    pub params: Option<Vec<Value>>,
}

/// A single SQL statement with its bound positional values
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: Vec<Value>,
}

impl Statement {
    /// A statement without parameters
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// A statement with positional parameters
    pub fn with_params(text: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }

    /// First keyword of the statement, upper-cased, ignoring leading comments
    pub fn leading_keyword(&self) -> String {
        let mut rest = self.text.trim_start();
        loop {
            if let Some(after) = rest.strip_prefix("--") {
                rest = after.split_once('\n').map_or("", |(_, tail)| tail).trim_start();
            } else if let Some(after) = rest.strip_prefix("/*") {
                rest = after.split_once("*/").map_or("", |(_, tail)| tail).trim_start();
            } else {
                break;
            }
        }

        rest.split(|c: char| c.is_whitespace() || c == '(' || c == ';')
            .next()
            .map(|token| token.to_uppercase())
            .unwrap_or_default()
    }
}

/// How the executor wraps a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run directly on a pooled connection
    Autocommit,
    /// Run inside BEGIN ... COMMIT, rolling back on failure
    Transactional,
}

/// Result from executing a single statement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Rows returned (empty for statements without a row set)
    pub rows: Vec<Value>,

    /// Rows returned, or rows affected for INSERT/UPDATE/DELETE
    pub row_count: u64,

    /// Execution time in milliseconds
    pub execution_time_ms: f64,
}

/// SQL flavour of the connected backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Positional placeholder for the 1-based parameter `index`
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Schema name used when the caller does not supply one
    pub fn default_schema(self) -> &'static str {
        match self {
            Dialect::Postgres => "public",
            Dialect::Sqlite => "main",
        }
    }
}

/// Schema-qualified table reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub schema: String,
    pub table: String,
}

impl TableDescriptor {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

/// Raw column row from the catalog, before key information is joined in
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogColumn {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default_expr: Option<String>,
    pub is_identity: bool,
    pub is_updatable: bool,
}

/// Information about a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    /// Column name
    pub name: String,

    /// SQL data type as reported by the catalog
    pub data_type: String,

    /// Whether the column allows NULL values
    pub nullable: bool,

    /// Default value expression (if any)
    pub default_expr: Option<String>,

    /// Whether values are generated by the database
    pub is_identity: bool,

    /// Whether the column accepts writes
    pub is_updatable: bool,

    /// Whether this column is part of the primary key
    pub is_primary_key: bool,

    /// Whether this column references another table
    pub is_foreign_key: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_schema: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_table: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_column: Option<String>,
}

/// Foreign key mapping for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyInfo {
    pub constraint_name: String,
    pub column: String,
    pub foreign_schema: String,
    pub foreign_table: String,
    pub foreign_column: String,
}

/// Complete metadata for a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    pub schema: String,
    pub table: String,

    /// Columns in ordinal order
    pub columns: Vec<ColumnMetadata>,

    /// Primary key column names in key order
    pub primary_keys: Vec<String>,

    pub foreign_keys: Vec<ForeignKeyInfo>,
}

impl TableMetadata {
    /// Whether the table has a column with this exact name
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }

    /// An empty column list means the table does not exist
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Entry in a table listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub schema: String,
    pub name: String,
}

/// Response from listing tables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablesResponse {
    pub tables: Vec<TableSummary>,
}

/// Comparison operators understood by filter clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "ILIKE")]
    ILike,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
}

impl FilterOperator {
    /// SQL spelling of the operator
    pub fn as_sql(self) -> &'static str {
        match self {
            FilterOperator::Equal => "=",
            FilterOperator::NotEqual => "!=",
            FilterOperator::GreaterThan => ">",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::LessThan => "<",
            FilterOperator::LessThanOrEqual => "<=",
            FilterOperator::Like => "LIKE",
            FilterOperator::ILike => "ILIKE",
            FilterOperator::IsNull => "IS NULL",
            FilterOperator::IsNotNull => "IS NOT NULL",
        }
    }

    /// Whether the operator takes a bound value
    pub fn takes_value(self) -> bool {
        !matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

/// A single filter condition on a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterClause {
    pub column: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
}

impl FilterClause {
    /// Implicit equality filter, as used by table browsing
    pub fn equals(column: impl Into<String>, value: Value) -> Self {
        let operator = if value.is_null() {
            FilterOperator::IsNull
        } else {
            FilterOperator::Equal
        };
        Self {
            column: column.into(),
            operator,
            value,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "ASC", alias = "ascending")]
    Asc,
    #[serde(alias = "DESC", alias = "descending")]
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Sort clause on a single column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortClause {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Page selection for table browsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PaginationRequest {
    /// Row offset of the first row on this page
    ///
    /// `None` when the offset does not fit a signed 64-bit OFFSET.
    pub fn offset(&self) -> Option<u64> {
        self.page
            .saturating_sub(1)
            .checked_mul(self.page_size)
            .filter(|offset| *offset <= i64::MAX as u64)
    }
}

/// Body for fetching a page of table rows
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRowsRequest {
    #[serde(default = "default_page")]
    pub page: u64,

    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Column name to sort by
    pub sort_by: Option<String>,

    #[serde(default)]
    pub sort_direction: SortDirection,

    /// Equality filters (column_name -> value), combined with AND
    #[serde(default)]
    pub filters: Map<String, Value>,

    /// Primary key columns already known to the caller
    #[serde(default)]
    pub primary_keys: Vec<String>,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    100
}

/// A page of table rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDataResult {
    pub rows: Vec<Value>,

    /// Total number of rows matching the filters
    pub total: u64,

    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

/// Static description of this deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    pub name: String,
    pub version: String,
    pub database: Dialect,
    pub rest_enabled: bool,
}

/// Error body returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
