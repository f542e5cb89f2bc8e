//! Typed, column-oriented tables.
//!
//! Every stage of the pipeline passes a [`Table`] around: the record parser
//! builds one per match, the enricher appends derived columns to it, the
//! persisted CSV artifacts are loaded back into it, and the merger
//! concatenates many of them into one dataset.
//!
//! Column types are not stored alongside persisted tables. [`Column::from_raw`]
//! infers a [`ColumnType`] from the text values, so the same column can come
//! back with different types from different matches. [`Column::coerce`] is the
//! all-or-nothing conversion used to reconcile them.

use std::{collections::HashSet, fmt, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    /// Values of more than one type. Never inferred; only produced when
    /// concatenated tables still disagree about a column.
    Mixed,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Mixed => "mixed",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["string", "integer", "float", "boolean", "mixed"]
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" | "str" | "object" => Ok(ColumnType::String),
            "integer" | "int" | "int64" => Ok(ColumnType::Integer),
            "float" | "double" | "float64" => Ok(ColumnType::Float),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "mixed" => Ok(ColumnType::Mixed),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::String(_) => ColumnType::String,
            Value::Integer(_) => ColumnType::Integer,
            Value::Float(_) => ColumnType::Float,
            Value::Boolean(_) => ColumnType::Boolean,
        }
    }

    /// Integral view of the value; floats qualify only when they have no
    /// fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            Value::Boolean(b) => Some(i64::from(*b)),
            Value::String(s) => s.trim().parse().ok(),
            Value::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("cannot convert '{value}' to {target}")]
pub struct CoercionError {
    pub value: String,
    pub target: ColumnType,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("column '{column}' has {found} value(s) but the table has {expected} row(s)")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
}

fn parse_boolean_token(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Parses one text field as `ty`. Empty text is a null.
pub fn parse_typed_value(value: &str, ty: ColumnType) -> Result<Option<Value>, CoercionError> {
    if value.is_empty() {
        return Ok(None);
    }
    convert_value(&Value::String(value.to_string()), ty).map(Some)
}

fn convert_value(value: &Value, target: ColumnType) -> Result<Value, CoercionError> {
    let failure = || CoercionError {
        value: value.as_display(),
        target,
    };
    match target {
        ColumnType::String => Ok(Value::String(value.as_display())),
        ColumnType::Integer => value.as_i64().map(Value::Integer).ok_or_else(failure),
        ColumnType::Float => value.as_f64().map(Value::Float).ok_or_else(failure),
        ColumnType::Boolean => match value {
            Value::Boolean(b) => Ok(Value::Boolean(*b)),
            Value::Integer(0) => Ok(Value::Boolean(false)),
            Value::Integer(1) => Ok(Value::Boolean(true)),
            Value::String(s) => parse_boolean_token(s)
                .map(Value::Boolean)
                .ok_or_else(failure),
            _ => Err(failure()),
        },
        ColumnType::Mixed => Ok(value.clone()),
    }
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    non_empty: usize,
    possible_integer: bool,
    possible_float: bool,
    possible_boolean: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            non_empty: 0,
            possible_integer: true,
            possible_float: true,
            possible_boolean: true,
        }
    }

    fn update(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        self.non_empty += 1;
        if self.possible_boolean
            && !matches!(
                value.to_ascii_lowercase().as_str(),
                "true" | "false" | "t" | "f" | "yes" | "no" | "y" | "n"
            )
        {
            self.possible_boolean = false;
        }
        if self.possible_integer && value.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_float && value.parse::<f64>().is_err() {
            self.possible_float = false;
        }
    }

    fn decide(&self) -> ColumnType {
        if self.non_empty == 0 {
            ColumnType::String
        } else if self.possible_boolean {
            ColumnType::Boolean
        } else if self.possible_integer {
            ColumnType::Integer
        } else if self.possible_float {
            ColumnType::Float
        } else {
            ColumnType::String
        }
    }
}

pub fn infer_column_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut candidate = TypeCandidate::new();
    for value in values {
        candidate.update(value);
    }
    candidate.decide()
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub datatype: ColumnType,
    pub values: Vec<Option<Value>>,
    /// Field text the column was loaded from, one entry per value. Converting
    /// back to `String` reproduces it instead of re-rendering parsed numbers.
    source: Option<Vec<String>>,
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.datatype == other.datatype && self.values == other.values
    }
}

impl Column {
    pub fn new(name: impl Into<String>, datatype: ColumnType, values: Vec<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            datatype,
            values,
            source: None,
        }
    }

    pub fn strings<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|value| Some(Value::String(value.into())))
            .collect();
        Self::new(name, ColumnType::String, values)
    }

    pub fn integers<I>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let values = values.into_iter().map(|v| Some(Value::Integer(v))).collect();
        Self::new(name, ColumnType::Integer, values)
    }

    /// Builds a column from persisted text, inferring its type.
    pub fn from_raw(name: impl Into<String>, raw: &[String]) -> Self {
        let datatype = infer_column_type(raw.iter().map(String::as_str));
        let values = raw
            .iter()
            .map(|field| {
                parse_typed_value(field, datatype)
                    .unwrap_or_else(|_| Some(Value::String(field.clone())))
            })
            .collect();
        Self {
            source: Some(raw.to_vec()),
            ..Self::new(name, datatype, values)
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&Value> {
        self.values.get(row).and_then(Option::as_ref)
    }

    /// Converts every value to `target`, or leaves the column untouched when
    /// any value cannot be converted.
    pub fn coerce(&mut self, target: ColumnType) -> Result<(), CoercionError> {
        if self.datatype == target || target == ColumnType::Mixed {
            return Ok(());
        }
        if target == ColumnType::String
            && let Some(source) = self.source.as_ref().filter(|s| s.len() == self.values.len())
        {
            self.values = source
                .iter()
                .map(|text| (!text.is_empty()).then(|| Value::String(text.clone())))
                .collect();
            self.datatype = target;
            return Ok(());
        }
        let converted = self
            .values
            .iter()
            .map(|cell| match cell {
                Some(value) => convert_value(value, target).map(Some),
                None => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.values = converted;
        self.datatype = target;
        Ok(())
    }

    fn extend(&mut self, other: Column) {
        self.source = match (self.source.take(), other.source) {
            (Some(mut ours), Some(theirs)) => {
                ours.extend(theirs);
                Some(ours)
            }
            _ => None,
        };
        if self.values.is_empty() {
            self.datatype = other.datatype;
        } else if !other.values.is_empty() && other.datatype != self.datatype {
            self.datatype = ColumnType::Mixed;
        }
        self.values.extend(other.values);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self, FrameError> {
        let mut table = Table::new();
        for column in columns {
            table.set_column(column)?;
        }
        Ok(table)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Appends `column`, replacing any existing column of the same name.
    pub fn set_column(&mut self, column: Column) -> Result<(), FrameError> {
        let existing = self
            .columns
            .iter()
            .find(|c| c.name != column.name)
            .map(Column::len);
        if let Some(existing) = existing
            && existing != column.len()
        {
            let found = column.len();
            return Err(FrameError::LengthMismatch {
                column: column.name,
                expected: existing,
                found,
            });
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(slot) => *slot = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Text rendering of one row, nulls as empty fields.
    pub fn render_row(&self, row: usize) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| column.get(row).map(Value::as_display).unwrap_or_default())
            .collect()
    }

    /// Concatenates `other` below this table. Columns only one side has are
    /// padded with nulls so every column keeps the combined row count.
    pub fn append(&mut self, other: Table) {
        let existing_rows = self.row_count();
        let incoming_rows = other.row_count();
        let mut seen = HashSet::new();
        for incoming in other.columns {
            seen.insert(incoming.name.clone());
            match self.columns.iter_mut().find(|c| c.name == incoming.name) {
                Some(column) => column.extend(incoming),
                None => {
                    let mut values = vec![None; existing_rows];
                    values.extend(incoming.values);
                    self.columns
                        .push(Column::new(incoming.name, incoming.datatype, values));
                }
            }
        }
        for column in self.columns.iter_mut().filter(|c| !seen.contains(&c.name)) {
            column.source = None;
            column
                .values
                .extend(std::iter::repeat_n(None, incoming_rows));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn infer_column_type_prefers_narrowest_type() {
        assert_eq!(infer_column_type(["1", "2", ""]), ColumnType::Integer);
        assert_eq!(infer_column_type(["1", "2.5"]), ColumnType::Float);
        assert_eq!(infer_column_type(["yes", "No"]), ColumnType::Boolean);
        assert_eq!(infer_column_type(["2019/20", "2019"]), ColumnType::String);
        assert_eq!(infer_column_type(["", ""]), ColumnType::String);
    }

    #[test]
    fn zero_and_one_infer_as_integers() {
        assert_eq!(infer_column_type(["0", "1", "0"]), ColumnType::Integer);
    }

    #[test]
    fn from_raw_parses_values_and_keeps_nulls() {
        let column = Column::from_raw("runs", &raw(&["4", "", "6"]));
        assert_eq!(column.datatype, ColumnType::Integer);
        assert_eq!(
            column.values,
            vec![Some(Value::Integer(4)), None, Some(Value::Integer(6))]
        );
    }

    #[test]
    fn coerce_converts_whole_column() {
        let mut column = Column::from_raw("season", &raw(&["2019", "2019"]));
        column.coerce(ColumnType::String).expect("to string");
        assert_eq!(column.datatype, ColumnType::String);
        assert_eq!(column.get(0), Some(&Value::String("2019".into())));
    }

    #[test]
    fn loaded_text_survives_a_round_trip_to_string() {
        let mut ids = Column::from_raw("player_out_id", &raw(&["00123456", "", "1e500000"]));
        assert_eq!(ids.datatype, ColumnType::Float);
        ids.coerce(ColumnType::String).expect("to string");
        assert_eq!(
            ids.values,
            vec![
                Some(Value::String("00123456".into())),
                None,
                Some(Value::String("1e500000".into()))
            ]
        );
    }

    #[test]
    fn built_columns_render_values_when_coerced_to_string() {
        let mut column = Column::integers("over", [7]);
        column.coerce(ColumnType::String).expect("to string");
        assert_eq!(column.get(0), Some(&Value::String("7".into())));
    }

    #[test]
    fn failed_coercion_leaves_column_untouched() {
        let mut column = Column::from_raw("season", &raw(&["2019", "2020/21"]));
        let before = column.clone();
        let err = column.coerce(ColumnType::Integer).unwrap_err();
        assert_eq!(err.value, "2020/21");
        assert_eq!(err.target, ColumnType::Integer);
        assert_eq!(column, before);
    }

    #[test]
    fn integral_floats_and_booleans_coerce_to_integer() {
        let mut column = Column::new(
            "x",
            ColumnType::Float,
            vec![Some(Value::Float(3.0)), Some(Value::Float(-1.0)), None],
        );
        column.coerce(ColumnType::Integer).expect("integral floats");
        assert_eq!(column.values[0], Some(Value::Integer(3)));

        let mut flags = Column::new("b", ColumnType::Boolean, vec![Some(Value::Boolean(true))]);
        flags.coerce(ColumnType::Integer).expect("bools");
        assert_eq!(flags.values[0], Some(Value::Integer(1)));

        let mut fractional = Column::new("f", ColumnType::Float, vec![Some(Value::Float(0.5))]);
        assert!(fractional.coerce(ColumnType::Integer).is_err());
    }

    #[test]
    fn set_column_rejects_length_mismatch_and_replaces_by_name() {
        let mut table = Table::from_columns(vec![Column::integers("a", [1, 2])]).unwrap();
        let err = table
            .set_column(Column::integers("b", [1]))
            .unwrap_err();
        assert!(matches!(err, FrameError::LengthMismatch { expected: 2, found: 1, .. }));

        table.set_column(Column::integers("a", [7, 8])).unwrap();
        assert_eq!(table.column_count(), 1);
        assert_eq!(table.column("a").unwrap().get(1), Some(&Value::Integer(8)));
    }

    #[test]
    fn append_pads_missing_columns_with_nulls() {
        let mut first = Table::from_columns(vec![
            Column::integers("a", [1, 2]),
            Column::strings("only_first", ["x", "y"]),
        ])
        .unwrap();
        let second = Table::from_columns(vec![
            Column::integers("a", [3]),
            Column::strings("only_second", ["z"]),
        ])
        .unwrap();

        first.append(second);

        assert_eq!(first.row_count(), 3);
        assert_eq!(first.headers(), vec!["a", "only_first", "only_second"]);
        assert_eq!(first.column("only_first").unwrap().values[2], None);
        assert_eq!(first.column("only_second").unwrap().values[0], None);
        assert_eq!(
            first.column("only_second").unwrap().values[2],
            Some(Value::String("z".into()))
        );
    }

    #[test]
    fn append_marks_disagreeing_types_as_mixed() {
        let mut first = Table::from_columns(vec![Column::integers("season", [2019])]).unwrap();
        let second = Table::from_columns(vec![Column::strings("season", ["2020/21"])]).unwrap();
        first.append(second);
        assert_eq!(first.column("season").unwrap().datatype, ColumnType::Mixed);
    }

    #[test]
    fn column_type_parses_common_aliases() {
        assert_eq!("int64".parse::<ColumnType>().unwrap(), ColumnType::Integer);
        assert_eq!("object".parse::<ColumnType>().unwrap(), ColumnType::String);
        assert!("decimal".parse::<ColumnType>().is_err());
    }
}
