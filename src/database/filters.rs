//! Generic list filtering, sorting and pagination
//!
//! Every listing endpoint accepts `filter_params` and `sorting_params` as JSON.
//! Column names are checked against a per-table whitelist and every value is
//! sent as a bound parameter.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::utils::errors::{SchoolEventsError, Result};
use crate::utils::helpers::{calculate_offset, total_pages};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Bool,
    Date,
    DateTime,
    Enum(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, nullable: false }
    }

    pub const fn nullable(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, nullable: true }
    }
}

/// Whitelist of filterable and sortable columns of one table
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub table: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static [Column],
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn qualified(&self, column: &Column) -> String {
        format!("{}.{}", self.table, column.name)
    }
}

/// A typed value parsed from request JSON
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    fn sql(&self) -> &'static str {
        match self {
            Connective::And => " AND ",
            Connective::Or => " OR ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchClause {
    pub term: String,
    pub columns: Vec<&'static str>,
    pub connective: Connective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFilter {
    pub column: &'static str,
    pub values: Vec<FilterValue>,
}

/// Parsed and validated `filter_params` plus `sorting_params`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    pub search: Vec<SearchClause>,
    /// OR across groups, AND inside a group
    pub multi_columns: Vec<Vec<ColumnFilter>>,
    pub direct: Vec<ColumnFilter>,
    pub sort: Vec<(&'static str, SortDirection)>,
}

fn bad_request(msg: impl Into<String>) -> SchoolEventsError {
    SchoolEventsError::BadRequest(msg.into())
}

impl FilterSet {
    /// Parse raw query strings. Invalid JSON is reported as a bad request.
    pub fn from_query(
        spec: &TableSpec,
        filter_params: Option<&str>,
        sorting_params: Option<&str>,
    ) -> Result<Self> {
        let filters = parse_json_param(filter_params)?;
        let sorting = parse_json_param(sorting_params)?;
        Self::parse(spec, filters.as_ref(), sorting.as_ref())
    }

    pub fn parse(spec: &TableSpec, filters: Option<&Value>, sorting: Option<&Value>) -> Result<Self> {
        let mut set = FilterSet::default();

        if let Some(filters) = filters {
            let obj = match filters {
                Value::Object(obj) => obj,
                Value::Null => return set.with_sort(spec, sorting),
                _ => return Err(bad_request("Invalid parameters: filter_params must be an object")),
            };

            for (key, value) in obj {
                match key.as_str() {
                    "search" => set.search = parse_search(spec, value)?,
                    "multi_columns" => set.multi_columns = parse_multi_columns(spec, value)?,
                    _ => {
                        let column = spec
                            .column(key)
                            .ok_or_else(|| bad_request(format!("Invalid filter column: {}", key)))?;
                        let values = match value {
                            Value::Array(items) => items
                                .iter()
                                .map(|v| parse_value(column, v))
                                .collect::<Result<Vec<_>>>()?,
                            single => vec![parse_value(column, single)?],
                        };
                        set.direct.push(ColumnFilter { column: column.name, values });
                    }
                }
            }
        }

        set.with_sort(spec, sorting)
    }

    fn with_sort(mut self, spec: &TableSpec, sorting: Option<&Value>) -> Result<Self> {
        self.sort = parse_sorting(spec, sorting)?;
        Ok(self)
    }

    /// Append ` AND ...` conditions for every filter
    pub fn push_conditions(&self, spec: &TableSpec, qb: &mut QueryBuilder<'_, Postgres>) {
        for filter in &self.direct {
            qb.push(" AND ");
            push_column_filter(spec, qb, filter);
        }

        let mut groups: Vec<(Connective, Condition<'_>)> = Vec::new();
        if !self.multi_columns.is_empty() {
            groups.push((Connective::And, Condition::Multi(&self.multi_columns)));
        }
        for clause in &self.search {
            groups.push((clause.connective, Condition::Search(clause)));
        }
        if groups.is_empty() {
            return;
        }

        // left fold: ((c0 op1 c1) op2 c2) ...
        qb.push(" AND ");
        for _ in 1..groups.len() {
            qb.push("(");
        }
        for (idx, (connective, condition)) in groups.iter().enumerate() {
            if idx > 0 {
                qb.push(connective.sql());
            }
            condition.push(spec, qb);
            if idx > 0 {
                qb.push(")");
            }
        }
    }

    /// Append `ORDER BY`, defaulting to the primary key
    pub fn push_order_by(&self, spec: &TableSpec, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" ORDER BY ");
        if self.sort.is_empty() {
            qb.push(format!("{}.{} ASC", spec.table, spec.primary_key));
            return;
        }
        let parts: Vec<String> = self
            .sort
            .iter()
            .map(|(col, dir)| {
                let dir = match dir {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                format!("{}.{} {}", spec.table, col, dir)
            })
            .collect();
        qb.push(parts.join(", "));
    }
}

enum Condition<'a> {
    Multi(&'a [Vec<ColumnFilter>]),
    Search(&'a SearchClause),
}

impl Condition<'_> {
    fn push(&self, spec: &TableSpec, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Condition::Multi(groups) => {
                qb.push("(");
                for (gi, group) in groups.iter().enumerate() {
                    if gi > 0 {
                        qb.push(" OR ");
                    }
                    qb.push("(");
                    for (fi, filter) in group.iter().enumerate() {
                        if fi > 0 {
                            qb.push(" AND ");
                        }
                        push_column_filter(spec, qb, filter);
                    }
                    qb.push(")");
                }
                qb.push(")");
            }
            Condition::Search(clause) => {
                qb.push("(");
                for (ci, column) in clause.columns.iter().enumerate() {
                    if ci > 0 {
                        qb.push(" OR ");
                    }
                    qb.push(format!("CAST({}.{} AS TEXT) ILIKE ", spec.table, column));
                    qb.push_bind(format!("%{}%", clause.term));
                }
                qb.push(")");
            }
        }
    }
}

fn push_column_filter(spec: &TableSpec, qb: &mut QueryBuilder<'_, Postgres>, filter: &ColumnFilter) {
    let column = match spec.column(filter.column) {
        Some(c) => c,
        None => {
            qb.push("FALSE");
            return;
        }
    };
    let name = spec.qualified(column);
    let non_null: Vec<&FilterValue> = filter.values.iter().filter(|v| **v != FilterValue::Null).collect();
    let has_null = non_null.len() != filter.values.len();

    qb.push("(");
    match non_null.len() {
        0 => {}
        1 => {
            qb.push(format!("{} = ", name));
            push_value(qb, non_null[0]);
        }
        _ => {
            qb.push(format!("{} IN (", name));
            for (i, value) in non_null.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(qb, value);
            }
            qb.push(")");
        }
    }
    if has_null {
        if !non_null.is_empty() {
            qb.push(" OR ");
        }
        qb.push(format!("{} IS NULL", name));
    }
    if filter.values.is_empty() {
        qb.push("FALSE");
    }
    qb.push(")");
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &FilterValue) {
    match value {
        FilterValue::Int(v) => qb.push_bind(*v),
        FilterValue::Float(v) => qb.push_bind(*v),
        FilterValue::Text(v) => qb.push_bind(v.clone()),
        FilterValue::Bool(v) => qb.push_bind(*v),
        FilterValue::Date(v) => qb.push_bind(*v),
        FilterValue::DateTime(v) => qb.push_bind(*v),
        FilterValue::Null => qb.push("NULL"),
    };
}

fn parse_json_param(raw: Option<&str>) -> Result<Option<Value>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| bad_request(format!("Invalid parameters: {}", e))),
    }
}

fn parse_search(spec: &TableSpec, value: &Value) -> Result<Vec<SearchClause>> {
    let items = value.as_array().ok_or_else(|| bad_request("Invalid search parameter."))?;
    let mut clauses = Vec::with_capacity(items.len());

    for item in items {
        let obj = item.as_object().ok_or_else(|| bad_request("Invalid search parameter."))?;
        let term = match obj.get("term") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(bad_request("Invalid search parameter.")),
        };
        let columns = obj
            .get("columns")
            .and_then(Value::as_array)
            .filter(|cols| !cols.is_empty())
            .ok_or_else(|| bad_request("Invalid search parameter."))?;
        let connective = match obj.get("type").and_then(Value::as_str).map(str::to_ascii_uppercase) {
            None => Connective::And,
            Some(t) if t == "AND" => Connective::And,
            Some(t) if t == "OR" => Connective::Or,
            Some(_) => return Err(bad_request("Invalid search parameter.")),
        };

        let mut names = Vec::with_capacity(columns.len());
        for col in columns {
            let name = col.as_str().ok_or_else(|| bad_request("Invalid search parameter."))?;
            let column = spec
                .column(name)
                .ok_or_else(|| bad_request(format!("Invalid search column '{}'.", name)))?;
            names.push(column.name);
        }

        clauses.push(SearchClause { term, columns: names, connective });
    }

    Ok(clauses)
}

fn parse_multi_columns(spec: &TableSpec, value: &Value) -> Result<Vec<Vec<ColumnFilter>>> {
    let entries = value.as_array().ok_or_else(|| bad_request("Invalid multi-column filter format."))?;
    let mut groups = Vec::with_capacity(entries.len());

    for entry in entries {
        let obj = entry
            .as_object()
            .ok_or_else(|| bad_request("Each entry in 'multi_columns' must be a dictionary."))?;
        let mut group = Vec::with_capacity(obj.len());
        for (name, values) in obj {
            let column = spec
                .column(name)
                .ok_or_else(|| bad_request(format!("Invalid column '{}' for table.", name)))?;
            let values = values
                .as_array()
                .ok_or_else(|| bad_request(format!("Invalid values for column '{}'.", name)))?
                .iter()
                .map(|v| parse_value(column, v))
                .collect::<Result<Vec<_>>>()?;
            group.push(ColumnFilter { column: column.name, values });
        }
        if !group.is_empty() {
            groups.push(group);
        }
    }

    Ok(groups)
}

fn parse_sorting(spec: &TableSpec, value: Option<&Value>) -> Result<Vec<(&'static str, SortDirection)>> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(bad_request("Invalid sorting parameter.")),
    };

    let mut sort = Vec::with_capacity(items.len());
    for item in items {
        let obj = item
            .as_object()
            .filter(|o| o.len() == 1)
            .ok_or_else(|| bad_request("Each sorting parameter must be a single key-value pair."))?;
        let (name, dir) = obj
            .iter()
            .next()
            .ok_or_else(|| bad_request("Each sorting parameter must be a single key-value pair."))?;
        let column = spec.column(name).ok_or_else(|| bad_request("Invalid sorting parameter."))?;
        let direction = match dir.as_str().map(str::to_ascii_lowercase).as_deref() {
            Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            _ => return Err(bad_request("Invalid sorting parameter.")),
        };
        sort.push((column.name, direction));
    }
    Ok(sort)
}

fn invalid_value(column: &Column, value: &Value) -> SchoolEventsError {
    let shown = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    bad_request(format!("Invalid value for column {}: {}.", column.name, shown))
}

/// Parse a JSON value according to the column kind
pub fn parse_value(column: &Column, value: &Value) -> Result<FilterValue> {
    if value.is_null() {
        return if column.nullable {
            Ok(FilterValue::Null)
        } else {
            Err(bad_request(format!("Column {} cannot be null.", column.name)))
        };
    }

    let parsed = match column.kind {
        ColumnKind::Integer => match value {
            Value::Number(n) => n.as_i64().map(FilterValue::Int),
            Value::String(s) => s.trim().parse().ok().map(FilterValue::Int),
            _ => None,
        },
        ColumnKind::Float => match value {
            Value::Number(n) => n.as_f64().map(FilterValue::Float),
            Value::String(s) => s.trim().parse().ok().map(FilterValue::Float),
            _ => None,
        },
        ColumnKind::Bool => match value {
            Value::Bool(b) => Some(FilterValue::Bool(*b)),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(FilterValue::Bool(true)),
                "false" | "0" => Some(FilterValue::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        ColumnKind::Text => match value {
            Value::String(s) => Some(FilterValue::Text(s.clone())),
            Value::Number(n) => Some(FilterValue::Text(n.to_string())),
            _ => None,
        },
        ColumnKind::Enum(allowed) => value
            .as_str()
            .map(str::to_ascii_lowercase)
            .filter(|s| allowed.contains(&s.as_str()))
            .map(FilterValue::Text),
        ColumnKind::Date => value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .map(FilterValue::Date),
        ColumnKind::DateTime => value.as_str().and_then(parse_datetime).map(FilterValue::DateTime),
    };

    parsed.ok_or_else(|| invalid_value(column, value))
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Requested page; `current_page` is 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub current_page: i64,
    pub items_per_page: i64,
}

impl PageRequest {
    pub const MAX_ITEMS_PER_PAGE: i64 = 1000;

    pub fn new(current_page: i64, items_per_page: i64) -> Result<Self> {
        if current_page < 1 {
            return Err(SchoolEventsError::Validation(
                "current_page must be greater than or equal to 1".to_string(),
            ));
        }
        if !(1..=Self::MAX_ITEMS_PER_PAGE).contains(&items_per_page) {
            return Err(SchoolEventsError::Validation(format!(
                "items_per_page must be between 1 and {}",
                Self::MAX_ITEMS_PER_PAGE
            )));
        }
        Ok(Self { current_page, items_per_page })
    }

    pub fn offset(&self) -> i64 {
        calculate_offset(self.current_page, self.items_per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { current_page: 1, items_per_page: 10 }
    }
}

/// Paginated list payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination<T> {
    pub current_page: i64,
    pub items_per_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub items: Vec<T>,
}

impl<T> Pagination<T> {
    pub fn new(page: PageRequest, total_items: i64, items: Vec<T>) -> Self {
        Self {
            current_page: page.current_page,
            items_per_page: page.items_per_page,
            total_pages: total_pages(total_items, page.items_per_page),
            total_items,
            items,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Pagination<U> {
        Pagination {
            current_page: self.current_page,
            items_per_page: self.items_per_page,
            total_pages: self.total_pages,
            total_items: self.total_items,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

/// Count and fetch one page of `spec.table`.
///
/// `scope` appends fixed ` AND ...` conditions (ownership, parent ids) to both queries.
pub async fn fetch_page<T, F>(
    pool: &PgPool,
    spec: &TableSpec,
    filters: &FilterSet,
    page: PageRequest,
    scope: F,
) -> Result<Pagination<T>>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    F: Fn(&mut QueryBuilder<'_, Postgres>),
{
    let started = std::time::Instant::now();

    let mut count_qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE TRUE", spec.table));
    scope(&mut count_qb);
    filters.push_conditions(spec, &mut count_qb);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new(format!("SELECT {}.* FROM {} WHERE TRUE", spec.table, spec.table));
    scope(&mut qb);
    filters.push_conditions(spec, &mut qb);
    filters.push_order_by(spec, &mut qb);
    qb.push(" LIMIT ");
    qb.push_bind(page.items_per_page);
    qb.push(" OFFSET ");
    qb.push_bind(page.offset());
    let items = qb.build_query_as::<T>().fetch_all(pool).await?;

    crate::utils::logging::log_database_operation(
        "paginate",
        spec.table,
        started.elapsed().as_millis() as u64,
        true,
    );

    Ok(Pagination::new(page, total, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    const SPEC: TableSpec = TableSpec {
        table: "events",
        primary_key: "id",
        columns: &[
            Column::new("id", ColumnKind::Integer),
            Column::new("title", ColumnKind::Text),
            Column::nullable("city", ColumnKind::Text),
            Column::new("capacity", ColumnKind::Integer),
            Column::new("status", ColumnKind::Enum(&["scheduled", "cancelled"])),
            Column::new("created_at", ColumnKind::DateTime),
        ],
    };

    fn message(err: SchoolEventsError) -> String {
        match err {
            SchoolEventsError::BadRequest(msg) => msg,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    fn sql(set: &FilterSet) -> String {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT * FROM events WHERE TRUE");
        set.push_conditions(&SPEC, &mut qb);
        set.push_order_by(&SPEC, &mut qb);
        qb.sql().to_string()
    }

    #[test]
    fn test_direct_filters_and_default_order() {
        let set = FilterSet::parse(&SPEC, Some(&json!({"capacity": 100, "status": ["scheduled", "cancelled"]})), None)
            .unwrap();
        let sql = sql(&set);
        assert!(sql.contains("(events.capacity = $1)"));
        assert!(sql.contains("(events.status IN ($2, $3))"));
        assert!(sql.ends_with("ORDER BY events.id ASC"));
    }

    #[test]
    fn test_search_folds_left_with_connectives() {
        let filters = json!({
            "multi_columns": [{"city": ["Nitra"], "status": ["scheduled"]}, {"city": ["Trnava"]}],
            "search": [
                {"term": "ham", "columns": ["title", "city"], "type": "OR"},
                {"term": "let", "columns": ["title"], "type": "AND"}
            ]
        });
        let set = FilterSet::parse(&SPEC, Some(&filters), None).unwrap();
        let sql = sql(&set);
        assert!(sql.contains(
            " AND (((((events.city = $1) AND (events.status = $2)) OR ((events.city = $3))) OR \
             (CAST(events.title AS TEXT) ILIKE $4 OR CAST(events.city AS TEXT) ILIKE $5)) AND \
             (CAST(events.title AS TEXT) ILIKE $6))"
        ), "{sql}");
    }

    #[test]
    fn test_sorting() {
        let set = FilterSet::parse(&SPEC, None, Some(&json!([{"title": "desc"}, {"id": "ASC"}]))).unwrap();
        assert!(sql(&set).ends_with("ORDER BY events.title DESC, events.id ASC"));

        let err = FilterSet::parse(&SPEC, None, Some(&json!([{"title": "desc", "id": "asc"}]))).unwrap_err();
        assert_eq!(message(err), "Each sorting parameter must be a single key-value pair.");

        let err = FilterSet::parse(&SPEC, None, Some(&json!([{"title": "sideways"}]))).unwrap_err();
        assert_eq!(message(err), "Invalid sorting parameter.");

        let err = FilterSet::parse(&SPEC, None, Some(&json!([{"password": "asc"}]))).unwrap_err();
        assert_eq!(message(err), "Invalid sorting parameter.");
    }

    #[test]
    fn test_validation_messages() {
        let err = FilterSet::parse(&SPEC, Some(&json!({"password": "x"})), None).unwrap_err();
        assert_eq!(message(err), "Invalid filter column: password");

        let err = FilterSet::parse(&SPEC, Some(&json!({"search": "x"})), None).unwrap_err();
        assert_eq!(message(err), "Invalid search parameter.");

        let err = FilterSet::parse(&SPEC, Some(&json!({"search": [{"term": "x", "columns": ["secret"]}]})), None)
            .unwrap_err();
        assert_eq!(message(err), "Invalid search column 'secret'.");

        let err = FilterSet::parse(&SPEC, Some(&json!({"multi_columns": {"city": []}})), None).unwrap_err();
        assert_eq!(message(err), "Invalid multi-column filter format.");

        let err = FilterSet::parse(&SPEC, Some(&json!({"multi_columns": ["city"]})), None).unwrap_err();
        assert_eq!(message(err), "Each entry in 'multi_columns' must be a dictionary.");

        let err = FilterSet::parse(&SPEC, Some(&json!({"multi_columns": [{"secret": ["x"]}]})), None).unwrap_err();
        assert_eq!(message(err), "Invalid column 'secret' for table.");

        let err = FilterSet::parse(&SPEC, Some(&json!({"multi_columns": [{"city": "Nitra"}]})), None).unwrap_err();
        assert_eq!(message(err), "Invalid values for column 'city'.");
    }

    #[test]
    fn test_typed_values() {
        let err = FilterSet::parse(&SPEC, Some(&json!({"capacity": "lots"})), None).unwrap_err();
        assert_eq!(message(err), "Invalid value for column capacity: lots.");

        let err = FilterSet::parse(&SPEC, Some(&json!({"status": "teleported"})), None).unwrap_err();
        assert_eq!(message(err), "Invalid value for column status: teleported.");

        let err = FilterSet::parse(&SPEC, Some(&json!({"title": null})), None).unwrap_err();
        assert_eq!(message(err), "Column title cannot be null.");

        let set = FilterSet::parse(&SPEC, Some(&json!({"city": null, "created_at": "2024-08-20T10:00:00"})), None)
            .unwrap();
        let sql = sql(&set);
        assert!(sql.contains("(events.city IS NULL)"));
        assert_matches!(set.direct.iter().find(|f| f.column == "created_at").unwrap().values[0], FilterValue::DateTime(_));
    }

    #[test]
    fn test_from_query_reports_bad_json() {
        let err = FilterSet::from_query(&SPEC, Some("{not json"), None).unwrap_err();
        assert!(message(err).starts_with("Invalid parameters:"));
        assert_eq!(FilterSet::from_query(&SPEC, Some("  "), None).unwrap(), FilterSet::default());
    }

    #[test]
    fn test_page_request_bounds() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        let page = PageRequest::new(3, 25).unwrap();
        assert_eq!(page.offset(), 50);

        let paged = Pagination::new(page, 51, vec![1, 2, 3]);
        assert_eq!(paged.total_pages, 3);
        assert_eq!(paged.map(|x| x * 2).items, vec![2, 4, 6]);
    }

    #[test]
    fn test_huge_page_number_saturates_offset() {
        let page = PageRequest::new(i64::MAX, 2).unwrap();
        assert_eq!(page.offset(), i64::MAX);

        let page = PageRequest::new(i64::MAX / 2, PageRequest::MAX_ITEMS_PER_PAGE).unwrap();
        assert!(page.offset() > 0);
    }
}
