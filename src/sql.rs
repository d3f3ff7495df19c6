use chrono::NaiveDate;
use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertRoom {
        id: RoomId,
        description: String,
    },
    DeleteRoom {
        id: RoomId,
    },
    /// `None` when the row carried no dates at all.
    InsertBooking {
        booking: Option<Booking>,
    },
    CancelBooking {
        id: BookingId,
    },
    SelectRooms,
    SelectBookings,
    SelectAvailableRoom {
        start: NaiveDate,
        end: NaiveDate,
    },
    SelectOccupiedDates {
        start: NaiveDate,
        end: NaiveDate,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;

    match table.as_str() {
        "rooms" => {
            if values.is_empty() {
                return Err(SqlError::WrongArity("rooms", 1, 0));
            }
            let id = parse_i64(&values[0])?;
            let description = if values.len() >= 2 {
                parse_string_or_null(&values[1])?.unwrap_or_default()
            } else {
                String::new()
            };
            Ok(Command::InsertRoom { id, description })
        }
        "bookings" => {
            if values.len() < 2 {
                return Err(SqlError::WrongArity("bookings", 2, values.len()));
            }
            let start = parse_date_or_null(&values[0])?;
            let end = parse_date_or_null(&values[1])?;
            let booking = match (start, end) {
                (Some(start), Some(end)) => Some(Booking::request(start, end)),
                (None, None) => None,
                _ => return Err(SqlError::Parse("start_date and end_date must both be set or both be NULL".into())),
            };
            Ok(Command::InsertBooking { booking })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "rooms" => Ok(Command::DeleteRoom { id }),
        "bookings" => Ok(Command::CancelBooking { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    match table.as_str() {
        "rooms" => Ok(Command::SelectRooms),
        "bookings" => Ok(Command::SelectBookings),
        "available_room" | "occupied_dates" => {
            let (mut start, mut end) = (None, None);
            if let Some(selection) = &select.selection {
                extract_date_filters(selection, &mut start, &mut end)?;
            }
            let start = start.ok_or(SqlError::MissingFilter("start_date"))?;
            let end = end.ok_or(SqlError::MissingFilter("end_date"))?;
            if table == "available_room" {
                Ok(Command::SelectAvailableRoom { start, end })
            } else {
                Ok(Command::SelectOccupiedDates { start, end })
            }
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Walk an `AND` chain of `start_date >= '..'` and `end_date <= '..'` filters.
/// Anything else in the chain is rejected.
fn extract_date_filters(
    expr: &Expr,
    start: &mut Option<NaiveDate>,
    end: &mut Option<NaiveDate>,
) -> Result<(), SqlError> {
    let (left, op, right) = match expr {
        Expr::Nested(inner) => return extract_date_filters(inner, start, end),
        Expr::BinaryOp { left, op, right } => (left, op, right),
        other => return Err(SqlError::Unsupported(format!("filter {other}"))),
    };

    let slot = match (op, expr_column_name(left).as_deref()) {
        (ast::BinaryOperator::And, _) => {
            extract_date_filters(left, start, end)?;
            return extract_date_filters(right, start, end);
        }
        (ast::BinaryOperator::GtEq | ast::BinaryOperator::Eq, Some("start_date")) => start,
        (ast::BinaryOperator::LtEq | ast::BinaryOperator::Eq, Some("end_date")) => end,
        _ => return Err(SqlError::Unsupported(format!("filter {expr}"))),
    };
    if slot.is_some() {
        return Err(SqlError::Parse(format!("duplicate filter {expr}")));
    }
    *slot = Some(parse_date(right)?);
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.len() != 1 {
                return Err(SqlError::Parse(format!("expected one VALUES row, got {}", values.rows.len())));
            }
            Ok(values.rows[0].clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<i64, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some("id") => parse_i64(right),
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::SingleQuotedString(s)) => Ok(Some(s.clone())),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

/// ISO `YYYY-MM-DD` in single quotes.
fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    parse_date_or_null(expr)?.ok_or_else(|| SqlError::Parse("expected date, got NULL".into()))
}

fn parse_date_or_null(expr: &Expr) -> Result<Option<NaiveDate>, SqlError> {
    match parse_string_or_null(expr)? {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}"))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_insert_room() {
        let cmd = parse_sql("INSERT INTO rooms (id, description) VALUES (1, 'A')").unwrap();
        assert_eq!(
            cmd,
            Command::InsertRoom {
                id: 1,
                description: "A".into()
            }
        );
    }

    #[test]
    fn parse_insert_room_without_description() {
        let cmd = parse_sql("INSERT INTO rooms (id) VALUES (7)").unwrap();
        assert_eq!(
            cmd,
            Command::InsertRoom {
                id: 7,
                description: String::new()
            }
        );
    }

    #[test]
    fn parse_insert_room_null_description() {
        let cmd = parse_sql("INSERT INTO rooms (id, description) VALUES (7, NULL)").unwrap();
        assert!(matches!(cmd, Command::InsertRoom { id: 7, ref description } if description.is_empty()));
    }

    #[test]
    fn parse_delete_room() {
        let cmd = parse_sql("DELETE FROM rooms WHERE id = 3").unwrap();
        assert_eq!(cmd, Command::DeleteRoom { id: 3 });
    }

    #[test]
    fn parse_insert_booking() {
        let sql = "INSERT INTO bookings (start_date, end_date) VALUES ('2026-10-20', '2026-10-22')";
        let cmd = parse_sql(sql).unwrap();
        match cmd {
            Command::InsertBooking { booking: Some(b) } => {
                assert_eq!(b.start_date, ymd(2026, 10, 20));
                assert_eq!(b.end_date, ymd(2026, 10, 22));
                assert_eq!(b.room_id, UNASSIGNED);
                assert!(!b.is_active);
            }
            _ => panic!("expected InsertBooking, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_booking_null_dates() {
        let cmd = parse_sql("INSERT INTO bookings (start_date, end_date) VALUES (NULL, NULL)").unwrap();
        assert_eq!(cmd, Command::InsertBooking { booking: None });
    }

    #[test]
    fn parse_insert_booking_half_null_errors() {
        let sql = "INSERT INTO bookings (start_date, end_date) VALUES ('2026-10-20', NULL)";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_insert_booking_bad_date_errors() {
        let sql = "INSERT INTO bookings (start_date, end_date) VALUES ('2026-13-01', '2026-13-02')";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_insert_booking_wrong_arity() {
        let sql = "INSERT INTO bookings (start_date) VALUES ('2026-10-20')";
        assert!(matches!(parse_sql(sql), Err(SqlError::WrongArity("bookings", 2, 1))));
    }

    #[test]
    fn parse_multi_row_insert_rejected() {
        let sql = "INSERT INTO rooms (id) VALUES (1), (2)";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_cancel_booking() {
        let cmd = parse_sql("DELETE FROM bookings WHERE id = 12").unwrap();
        assert_eq!(cmd, Command::CancelBooking { id: 12 });
    }

    #[test]
    fn parse_delete_without_id_errors() {
        assert!(matches!(
            parse_sql("DELETE FROM bookings WHERE room_id = 1"),
            Err(SqlError::MissingFilter("id"))
        ));
    }

    #[test]
    fn parse_select_listings() {
        assert_eq!(parse_sql("SELECT * FROM rooms").unwrap(), Command::SelectRooms);
        assert_eq!(parse_sql("SELECT * FROM bookings").unwrap(), Command::SelectBookings);
    }

    #[test]
    fn parse_select_available_room() {
        let sql = "SELECT * FROM available_room WHERE start_date >= '2026-10-20' AND end_date <= '2026-10-25'";
        let cmd = parse_sql(sql).unwrap();
        assert_eq!(
            cmd,
            Command::SelectAvailableRoom {
                start: ymd(2026, 10, 20),
                end: ymd(2026, 10, 25)
            }
        );
    }

    #[test]
    fn parse_select_occupied_dates() {
        let sql = "SELECT * FROM occupied_dates WHERE end_date <= '2025-05-05' AND start_date >= '2025-05-01'";
        let cmd = parse_sql(sql).unwrap();
        assert_eq!(
            cmd,
            Command::SelectOccupiedDates {
                start: ymd(2025, 5, 1),
                end: ymd(2025, 5, 5)
            }
        );
    }

    #[test]
    fn parse_select_occupied_dates_missing_end() {
        let sql = "SELECT * FROM occupied_dates WHERE start_date >= '2025-05-01'";
        assert!(matches!(parse_sql(sql), Err(SqlError::MissingFilter("end_date"))));
    }

    #[test]
    fn parse_select_parenthesized_filters() {
        let sql = "SELECT * FROM available_room WHERE (start_date = '2026-10-20') AND (end_date = '2026-10-21')";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::SelectAvailableRoom {
                start: ymd(2026, 10, 20),
                end: ymd(2026, 10, 21)
            }
        );
    }

    #[test]
    fn parse_select_extra_filter_rejected() {
        let sql = "SELECT * FROM available_room WHERE start_date >= '2026-10-20' \
                   AND end_date <= '2026-10-25' AND room_id = 3";
        assert!(matches!(parse_sql(sql), Err(SqlError::Unsupported(_))));

        let sql = "SELECT * FROM occupied_dates WHERE start_date >= '2026-10-20' \
                   OR end_date <= '2026-10-25'";
        assert!(matches!(parse_sql(sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_select_repeated_filter_rejected() {
        let sql = "SELECT * FROM occupied_dates WHERE start_date >= '2026-10-20' \
                   AND start_date >= '2026-10-22' AND end_date <= '2026-10-25'";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_unknown_table_errors() {
        assert!(matches!(
            parse_sql("INSERT INTO guests (id) VALUES (1)"),
            Err(SqlError::UnknownTable(_))
        ));
        assert!(matches!(parse_sql("SELECT * FROM guests"), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
