//! Paginated, sorted and filtered table browsing
//!
//! Builds a `SELECT COUNT(*)` and a `SELECT *` statement that share one WHERE
//! clause. Filter values are always bound as parameters. Schema, table and
//! column names are checked against the introspected column list before they
//! are quoted into the statement text.

use crate::database::{quote_identifier, DatabaseProvider};
use crate::metadata::require_table_metadata;
use crate::schema::{
    Dialect, ExecutionMode, FilterClause, PaginationRequest, SortClause, Statement,
    TableDataResult, TableDescriptor, TableMetadata, TableRowsRequest, MAX_PAGE_SIZE,
};
use crate::{Error, Result};
use serde_json::{Map, Value};

/// The statement pair for one page of a table
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    pub count: Statement,
    pub select: Statement,
}

/// Pick the ORDER BY column
///
/// First match wins: explicit sort column, first primary key, first filter
/// column, first column of the table. `None` means the result order is left
/// to the engine and is not stable across pages.
pub fn resolve_sort_column(
    sort_by: Option<&str>,
    primary_keys: &[String],
    filters: &Map<String, Value>,
    metadata: Option<&TableMetadata>,
) -> Option<String> {
    sort_by
        .map(str::to_string)
        .or_else(|| primary_keys.first().cloned())
        .or_else(|| filters.keys().next().cloned())
        .or_else(|| {
            metadata
                .and_then(|metadata| metadata.columns.first())
                .map(|column| column.name.clone())
        })
}

/// Render the shared WHERE clause and its bound values
fn build_where_clause(dialect: Dialect, filters: &[FilterClause]) -> (String, Vec<Value>) {
    if filters.is_empty() {
        return (String::new(), Vec::new());
    }

    let mut conditions = Vec::with_capacity(filters.len());
    let mut values = Vec::new();

    for filter in filters {
        let quoted_column = quote_identifier(&filter.column);

        if filter.operator.takes_value() {
            values.push(filter.value.clone());
            conditions.push(format!(
                "{} {} {}",
                quoted_column,
                filter.operator.as_sql(),
                dialect.placeholder(values.len())
            ));
        } else {
            conditions.push(format!("{} {}", quoted_column, filter.operator.as_sql()));
        }
    }

    (format!(" WHERE {}", conditions.join(" AND ")), values)
}

/// Build the COUNT and page SELECT statements
///
/// Fails with [`Error::Validation`] when the page offset overflows.
pub fn build_table_query(
    dialect: Dialect,
    table: &TableDescriptor,
    pagination: PaginationRequest,
    sort: Option<&SortClause>,
    filters: &[FilterClause],
) -> Result<TableQuery> {
    let offset = pagination
        .offset()
        .ok_or_else(|| page_out_of_range(pagination))?;
    let source = format!(
        "{}.{}",
        quote_identifier(&table.schema),
        quote_identifier(&table.table)
    );
    let (where_clause, values) = build_where_clause(dialect, filters);

    let count = Statement::with_params(
        format!("SELECT COUNT(*) FROM {}{}", source, where_clause),
        values.clone(),
    );

    let mut select = format!("SELECT * FROM {}{}", source, where_clause);
    if let Some(sort) = sort {
        select.push_str(&format!(
            " ORDER BY {} {}",
            quote_identifier(&sort.column),
            sort.direction.as_sql()
        ));
    }
    select.push_str(&format!(" LIMIT {} OFFSET {}", pagination.page_size, offset));

    Ok(TableQuery {
        count,
        select: Statement::with_params(select, values),
    })
}

fn page_out_of_range(pagination: PaginationRequest) -> Error {
    Error::Validation(format!(
        "page {} with pageSize {} is out of range",
        pagination.page, pagination.page_size
    ))
}

/// Fetch one page of rows plus the filtered total
pub async fn fetch_table_page<DB: DatabaseProvider>(
    database: &DB,
    table: &TableDescriptor,
    request: TableRowsRequest,
) -> Result<TableDataResult> {
    if request.page < 1 {
        return Err(Error::Validation("page must be at least 1".to_string()));
    }
    if request.page_size == 0 {
        return Err(Error::Validation("pageSize must be greater than 0".to_string()));
    }
    let pagination = PaginationRequest {
        page: request.page,
        page_size: request.page_size.min(MAX_PAGE_SIZE),
    };
    if pagination.offset().is_none() {
        return Err(page_out_of_range(pagination));
    }

    let metadata = require_table_metadata(database, table).await?;

    let requested_identifiers = request
        .sort_by
        .iter()
        .chain(request.filters.keys())
        .chain(request.primary_keys.iter());
    for identifier in requested_identifiers {
        if !metadata.has_column(identifier) {
            return Err(Error::InvalidIdentifier(format!(
                "{} is not a column of {}.{}",
                identifier, table.schema, table.table
            )));
        }
    }

    let mut filters = Vec::with_capacity(request.filters.len());
    for (column, value) in &request.filters {
        if value.is_array() || value.is_object() {
            return Err(Error::Validation(format!(
                "Filter value for {} must be a scalar",
                column
            )));
        }
        filters.push(FilterClause::equals(column.clone(), value.clone()));
    }

    let sort = resolve_sort_column(
        request.sort_by.as_deref(),
        &request.primary_keys,
        &request.filters,
        Some(&metadata),
    )
    .map(|column| SortClause {
        column,
        direction: request.sort_direction,
    });

    let query = build_table_query(
        database.dialect(),
        table,
        pagination,
        sort.as_ref(),
        &filters,
    )?;

    tracing::debug!(
        schema = %table.schema,
        table = %table.table,
        page = pagination.page,
        page_size = pagination.page_size,
        sort_column = sort.as_ref().map(|sort| sort.column.as_str()),
        "Fetching table page"
    );

    let count_result = database
        .execute(&query.count, ExecutionMode::Autocommit)
        .await?;
    let total = count_result
        .rows
        .first()
        .and_then(first_value_as_count)
        .ok_or_else(|| Error::Execution("COUNT(*) returned no value".to_string()))?;

    let page_result = database
        .execute(&query.select, ExecutionMode::Autocommit)
        .await?;

    Ok(TableDataResult {
        rows: page_result.rows,
        total,
        page: pagination.page,
        page_size: pagination.page_size,
        total_pages: total.div_ceil(pagination.page_size),
    })
}

/// Read the single value of a COUNT(*) row, whatever the column is named
fn first_value_as_count(row: &Value) -> Option<u64> {
    let value = row.as_object()?.values().next()?;
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FilterOperator, SortDirection};
    use crate::testing::{catalog_column, RecordingProvider};
    use serde_json::json;

    fn items() -> TableDescriptor {
        TableDescriptor::new("public", "items")
    }

    fn items_catalog() -> RecordingProvider {
        RecordingProvider::new().with_columns(vec![
            catalog_column("sku", "text"),
            catalog_column("name", "text"),
            catalog_column("price", "numeric"),
        ])
    }

    fn request(page: u64, page_size: u64) -> TableRowsRequest {
        TableRowsRequest {
            page,
            page_size,
            sort_by: None,
            sort_direction: SortDirection::Asc,
            filters: Map::new(),
            primary_keys: Vec::new(),
        }
    }

    #[test]
    fn builds_count_and_page_statements() {
        let query = build_table_query(
            Dialect::Postgres,
            &items(),
            PaginationRequest { page: 2, page_size: 10 },
            Some(&SortClause {
                column: "name".to_string(),
                direction: SortDirection::Desc,
            }),
            &[FilterClause::equals("name", json!("bolt"))],
        )
        .unwrap();

        assert_eq!(
            query.count.text,
            r#"SELECT COUNT(*) FROM "public"."items" WHERE "name" = $1"#
        );
        assert_eq!(
            query.select.text,
            r#"SELECT * FROM "public"."items" WHERE "name" = $1 ORDER BY "name" DESC LIMIT 10 OFFSET 10"#
        );
        assert_eq!(query.count.params, vec![json!("bolt")]);
        assert_eq!(query.select.params, vec![json!("bolt")]);
    }

    #[test]
    fn omits_order_by_without_sort_column() {
        let query = build_table_query(
            Dialect::Sqlite,
            &TableDescriptor::new("main", "items"),
            PaginationRequest { page: 1, page_size: 5 },
            None,
            &[],
        )
        .unwrap();

        assert_eq!(query.select.text, r#"SELECT * FROM "main"."items" LIMIT 5 OFFSET 0"#);
        assert!(query.select.params.is_empty());
    }

    #[test]
    fn renders_operator_vocabulary() {
        let filters = vec![
            FilterClause {
                column: "price".to_string(),
                operator: FilterOperator::GreaterThanOrEqual,
                value: json!(10),
            },
            FilterClause {
                column: "name".to_string(),
                operator: FilterOperator::IsNotNull,
                value: Value::Null,
            },
            FilterClause {
                column: "sku".to_string(),
                operator: FilterOperator::ILike,
                value: json!("ab%"),
            },
        ];

        let query = build_table_query(
            Dialect::Postgres,
            &items(),
            PaginationRequest { page: 1, page_size: 5 },
            None,
            &filters,
        )
        .unwrap();

        assert_eq!(
            query.count.text,
            r#"SELECT COUNT(*) FROM "public"."items" WHERE "price" >= $1 AND "name" IS NOT NULL AND "sku" ILIKE $2"#
        );
        assert_eq!(query.count.params, vec![json!(10), json!("ab%")]);
    }

    #[test]
    fn null_equality_filter_renders_is_null() {
        let query = build_table_query(
            Dialect::Sqlite,
            &items(),
            PaginationRequest { page: 1, page_size: 5 },
            None,
            &[FilterClause::equals("name", Value::Null), FilterClause::equals("sku", json!("a"))],
        )
        .unwrap();

        assert_eq!(
            query.count.text,
            r#"SELECT COUNT(*) FROM "public"."items" WHERE "name" IS NULL AND "sku" = ?"#
        );
        assert_eq!(query.count.params, vec![json!("a")]);
    }

    #[test]
    fn quotes_hostile_identifiers() {
        let query = build_table_query(
            Dialect::Postgres,
            &TableDescriptor::new("public", "x\"; DROP TABLE y; --"),
            PaginationRequest { page: 1, page_size: 1 },
            None,
            &[],
        )
        .unwrap();

        assert_eq!(
            query.count.text,
            r#"SELECT COUNT(*) FROM "public"."x""; DROP TABLE y; --""#
        );
    }

    #[test]
    fn sort_resolution_order() {
        let mut filters = Map::new();
        filters.insert("name".to_string(), json!("bolt"));
        filters.insert("price".to_string(), json!(3));
        let primary_keys = vec!["sku".to_string()];

        assert_eq!(
            resolve_sort_column(Some("price"), &primary_keys, &filters, None).as_deref(),
            Some("price")
        );
        assert_eq!(
            resolve_sort_column(None, &primary_keys, &filters, None).as_deref(),
            Some("sku")
        );
        assert_eq!(
            resolve_sort_column(None, &[], &filters, None).as_deref(),
            Some("name")
        );
        assert_eq!(resolve_sort_column(None, &[], &Map::new(), None), None);
    }

    #[tokio::test]
    async fn default_sort_is_first_introspected_column() {
        let database = items_catalog();
        database.push_rows(vec![json!({"count": 25})]);
        database.push_rows(vec![]);

        fetch_table_page(&database, &items(), request(1, 10))
            .await
            .unwrap();

        let texts = database.executed_texts();
        assert_eq!(texts[0], r#"SELECT COUNT(*) FROM "public"."items""#);
        assert_eq!(
            texts[1],
            r#"SELECT * FROM "public"."items" ORDER BY "sku" ASC LIMIT 10 OFFSET 0"#
        );
    }

    #[tokio::test]
    async fn computes_page_totals() {
        let database = items_catalog();
        database.push_rows(vec![json!({"count": 25})]);
        database.push_rows((11..=20).map(|n| json!({"sku": n})).collect());

        let result = fetch_table_page(&database, &items(), request(2, 10))
            .await
            .unwrap();

        assert_eq!(result.rows.len(), 10);
        assert_eq!(result.rows[0], json!({"sku": 11}));
        assert_eq!(result.total, 25);
        assert_eq!(result.page, 2);
        assert_eq!(result.page_size, 10);
        assert_eq!(result.total_pages, 3);
        assert!(database.executed_texts()[1].ends_with("LIMIT 10 OFFSET 10"));
    }

    #[tokio::test]
    async fn empty_table_has_zero_pages() {
        let database = items_catalog();
        database.push_rows(vec![json!({"COUNT(*)": 0})]);
        database.push_rows(vec![]);

        let result = fetch_table_page(&database, &items(), request(1, 10))
            .await
            .unwrap();

        assert_eq!(result.total, 0);
        assert_eq!(result.total_pages, 0);
    }

    #[tokio::test]
    async fn clamps_page_size() {
        let database = items_catalog();
        database.push_rows(vec![json!({"count": "1000"})]);
        database.push_rows(vec![]);

        let result = fetch_table_page(&database, &items(), request(1, 10_000))
            .await
            .unwrap();

        assert_eq!(result.page_size, MAX_PAGE_SIZE);
        assert_eq!(result.total_pages, 2);
    }

    #[tokio::test]
    async fn huge_page_number_is_rejected_before_any_query() {
        let database = items_catalog();

        let error = fetch_table_page(&database, &items(), request(u64::MAX, 10))
            .await
            .unwrap_err();

        assert!(matches!(error, Error::Validation(_)));
        assert!(database.executed().is_empty());
        assert_eq!(database.catalog_calls(), 0);
    }

    #[test]
    fn offset_must_fit_a_signed_bigint() {
        let last_page = PaginationRequest {
            page: i64::MAX as u64 / 500 + 1,
            page_size: 500,
        };
        assert_eq!(last_page.offset(), Some(i64::MAX as u64 / 500 * 500));

        let past_bigint = PaginationRequest {
            page: last_page.page + 1,
            page_size: 500,
        };
        assert_eq!(past_bigint.offset(), None);

        let error = build_table_query(Dialect::Postgres, &items(), past_bigint, None, &[])
            .unwrap_err();
        assert!(matches!(error, Error::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_unknown_sort_column() {
        let database = items_catalog();
        let mut rows_request = request(1, 10);
        rows_request.sort_by = Some("price; DROP TABLE items".to_string());

        let error = fetch_table_page(&database, &items(), rows_request)
            .await
            .unwrap_err();

        assert!(matches!(error, Error::InvalidIdentifier(_)));
        assert!(database.executed().is_empty());
    }

    #[tokio::test]
    async fn rejects_unknown_filter_column() {
        let database = items_catalog();
        let mut rows_request = request(1, 10);
        rows_request
            .filters
            .insert("colour".to_string(), json!("red"));

        let error = fetch_table_page(&database, &items(), rows_request)
            .await
            .unwrap_err();

        assert!(matches!(error, Error::InvalidIdentifier(_)));
        assert!(database.executed().is_empty());
    }

    #[tokio::test]
    async fn unknown_table_is_not_found() {
        let database = RecordingProvider::new();

        let error = fetch_table_page(&database, &items(), request(1, 10))
            .await
            .unwrap_err();

        assert!(matches!(error, Error::TableNotFound { .. }));
    }

    #[tokio::test]
    async fn rejects_page_zero() {
        let database = items_catalog();

        let error = fetch_table_page(&database, &items(), request(0, 10))
            .await
            .unwrap_err();

        assert!(matches!(error, Error::Validation(_)));
        assert_eq!(database.catalog_calls(), 0);
    }

    #[tokio::test]
    async fn filters_bind_values_with_sqlite_placeholders() {
        let database = items_catalog().with_dialect(Dialect::Sqlite);
        database.push_rows(vec![json!({"COUNT(*)": 1})]);
        database.push_rows(vec![json!({"sku": "a1", "name": "bolt", "price": 2})]);

        let mut rows_request = request(1, 10);
        rows_request
            .filters
            .insert("name".to_string(), json!("bolt"));

        fetch_table_page(&database, &items(), rows_request)
            .await
            .unwrap();

        let executed = database.executed();
        assert_eq!(
            executed[1].0.text,
            r#"SELECT * FROM "public"."items" WHERE "name" = ? ORDER BY "name" ASC LIMIT 10 OFFSET 0"#
        );
        assert_eq!(executed[1].0.params, vec![json!("bolt")]);
    }
}
