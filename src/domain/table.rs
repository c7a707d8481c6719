use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::errors::TableError;

/// 行ID
///
/// ストアが挿入時に割り当てる1以上の一意な整数。再利用されない。
pub type RowId = i64;

/// まだ挿入されていない（クライアント側で生成された）行のID
pub const UNINSERTED_ROW_ID: RowId = -1;

/// 行IDの列位置（常に0番目）
pub const ROW_ID_COLUMN: usize = 0;

/// 行IDの列名
pub const ROW_ID_COLUMN_NAME: &str = "id";

/// 列の型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Int,
    Bool,
    Text,
    Blob,
}

impl ColumnType {
    /// 範囲フィルタで比較可能な型か
    pub fn is_orderable(&self) -> bool {
        !matches!(self, ColumnType::Blob)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Int => "int",
            ColumnType::Bool => "bool",
            ColumnType::Text => "text",
            ColumnType::Blob => "blob",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 列定義
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub ordinal: usize,
}

/// セルの値
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Bool(bool),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// 値の型（Nullは型を持たない）
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(ColumnType::Int),
            Value::Bool(_) => Some(ColumnType::Bool),
            Value::Text(_) => Some(ColumnType::Text),
            Value::Blob(_) => Some(ColumnType::Blob),
        }
    }

    /// 同じ型同士の自然順序で比較する
    ///
    /// 型が異なる場合、Blob同士の場合、片方だけがNullの場合は比較不能（None）。
    /// Null同士は等しいとみなす。
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// ============================================================================
// Schema
// ============================================================================

/// テーブルのスキーマ
///
/// 0番目の列は常に行ID（Int）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// データ列の定義からスキーマを作成する（行ID列は自動で先頭に追加される）
    pub fn new(columns: &[(&str, ColumnType)]) -> Self {
        let mut all = Vec::with_capacity(columns.len() + 1);
        all.push(Column {
            name: ROW_ID_COLUMN_NAME.to_string(),
            ty: ColumnType::Int,
            ordinal: ROW_ID_COLUMN,
        });
        for (i, (name, ty)) in columns.iter().enumerate() {
            all.push(Column {
                name: (*name).to_string(),
                ty: *ty,
                ordinal: i + 1,
            });
        }
        Self { columns: all }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// 行IDを含む列数
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// 列名から列定義を取得する
    pub fn column(&self, name: &str) -> Result<&Column, TableError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    /// 行の列数と各セルの型を検証する（Nullは常に許容）
    pub fn validate_row(&self, row: &Row) -> Result<(), TableError> {
        if row.width() != self.width() {
            return Err(TableError::ArityMismatch {
                expected: self.width(),
                actual: row.width(),
            });
        }
        for (column, value) in self.columns.iter().zip(row.values()) {
            match value.column_type() {
                None => {}
                Some(ty) if ty == column.ty => {}
                Some(_) => {
                    return Err(TableError::TypeMismatch {
                        column: column.name.clone(),
                        expected: column.ty,
                    });
                }
            }
        }
        Ok(())
    }

    /// フィルタが列の型に対して有効か検証する
    ///
    /// 比較不能な型（Blob）にNull以外の境界を指定するのは契約違反。
    pub fn validate_filter(&self, filter: &Filter) -> Result<(), TableError> {
        let column = self
            .columns
            .get(filter.column)
            .ok_or_else(|| TableError::UnknownColumn(filter.column.to_string()))?;

        for bound in [&filter.min, &filter.max].into_iter().flatten() {
            if bound.is_null() {
                continue;
            }
            if !column.ty.is_orderable() {
                return Err(TableError::UnorderableColumn(column.name.clone()));
            }
            if bound.column_type() != Some(column.ty) {
                return Err(TableError::TypeMismatch {
                    column: column.name.clone(),
                    expected: column.ty,
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Row
// ============================================================================

/// 行
///
/// 値の0番目は行ID。ストアからは常にコピーとして返されるため、
/// 取得した行を変更してもストアには影響しない（update呼び出しが必要）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// 未挿入の空行を作成する（行ID = -1、他の列はNull）
    pub fn blank(width: usize) -> Self {
        let mut values = vec![Value::Null; width.max(1)];
        values[ROW_ID_COLUMN] = Value::Int(UNINSERTED_ROW_ID);
        Self { values }
    }

    pub fn id(&self) -> RowId {
        match self.values[ROW_ID_COLUMN] {
            Value::Int(id) => id,
            _ => UNINSERTED_ROW_ID,
        }
    }

    pub fn is_inserted(&self) -> bool {
        self.id() != UNINSERTED_ROW_ID
    }

    /// 挿入時にストアが行IDを割り当てる
    pub fn assign_id(&mut self, id: RowId) {
        self.values[ROW_ID_COLUMN] = Value::Int(id);
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, ordinal: usize) -> Result<&Value, TableError> {
        self.values
            .get(ordinal)
            .ok_or_else(|| TableError::UnknownColumn(ordinal.to_string()))
    }

    /// セルに値を設定する（行ID列は変更不可）
    pub fn set(&mut self, ordinal: usize, value: impl Into<Value>) -> Result<(), TableError> {
        if ordinal == ROW_ID_COLUMN {
            return Err(TableError::ReadOnlyColumn(ROW_ID_COLUMN_NAME.to_string()));
        }
        let slot = self
            .values
            .get_mut(ordinal)
            .ok_or_else(|| TableError::UnknownColumn(ordinal.to_string()))?;
        *slot = value.into();
        Ok(())
    }

    pub fn int(&self, ordinal: usize) -> Result<i64, TableError> {
        match self.get(ordinal)? {
            Value::Int(v) => Ok(*v),
            _ => Err(Self::mismatch(ordinal, ColumnType::Int)),
        }
    }

    pub fn bool(&self, ordinal: usize) -> Result<bool, TableError> {
        match self.get(ordinal)? {
            Value::Bool(v) => Ok(*v),
            _ => Err(Self::mismatch(ordinal, ColumnType::Bool)),
        }
    }

    pub fn text(&self, ordinal: usize) -> Result<&str, TableError> {
        match self.get(ordinal)? {
            Value::Text(v) => Ok(v),
            _ => Err(Self::mismatch(ordinal, ColumnType::Text)),
        }
    }

    pub fn opt_text(&self, ordinal: usize) -> Result<Option<&str>, TableError> {
        match self.get(ordinal)? {
            Value::Null => Ok(None),
            Value::Text(v) => Ok(Some(v)),
            _ => Err(Self::mismatch(ordinal, ColumnType::Text)),
        }
    }

    pub fn blob(&self, ordinal: usize) -> Result<&[u8], TableError> {
        match self.get(ordinal)? {
            Value::Blob(v) => Ok(v),
            _ => Err(Self::mismatch(ordinal, ColumnType::Blob)),
        }
    }

    fn mismatch(ordinal: usize, expected: ColumnType) -> TableError {
        TableError::TypeMismatch {
            column: ordinal.to_string(),
            expected,
        }
    }
}

// ============================================================================
// Filter
// ============================================================================

/// 行フィルタ
///
/// 列参照 + 任意の最小値/最大値（両端を含む）。
/// 等価条件は min == max で表現する。境界がなければ制約なし。
/// 複数のフィルタはANDで結合される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: usize,
    pub min: Option<Value>,
    pub max: Option<Value>,
}

impl Filter {
    pub fn eq(column: usize, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            column,
            min: Some(value.clone()),
            max: Some(value),
        }
    }

    pub fn at_least(column: usize, min: impl Into<Value>) -> Self {
        Self {
            column,
            min: Some(min.into()),
            max: None,
        }
    }

    pub fn at_most(column: usize, max: impl Into<Value>) -> Self {
        Self {
            column,
            min: None,
            max: Some(max.into()),
        }
    }

    pub fn between(column: usize, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        Self {
            column,
            min: Some(min.into()),
            max: Some(max.into()),
        }
    }

    /// 行がフィルタ条件を満たすか
    ///
    /// 比較不能な組み合わせ（Nullセルに非Nullの境界など）は条件を満たさない。
    pub fn matches(&self, row: &Row) -> bool {
        let Ok(cell) = row.get(self.column) else {
            return false;
        };

        if let Some(min) = &self.min {
            match cell.compare(min) {
                Some(Ordering::Equal | Ordering::Greater) => {}
                _ => return false,
            }
        }
        if let Some(max) = &self.max {
            match cell.compare(max) {
                Some(Ordering::Equal | Ordering::Less) => {}
                _ => return false,
            }
        }
        true
    }
}

/// すべてのフィルタを満たすか（AND）
pub fn matches_all(filters: &[Filter], row: &Row) -> bool {
    filters.iter().all(|f| f.matches(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: usize = 1;
    const VERSION: usize = 2;
    const DATA: usize = 3;

    fn schema() -> Schema {
        Schema::new(&[
            ("name", ColumnType::Text),
            ("version", ColumnType::Int),
            ("data", ColumnType::Blob),
        ])
    }

    fn row(id: RowId, name: &str, version: i64) -> Row {
        let mut row = Row::blank(schema().width());
        row.assign_id(id);
        row.set(NAME, name).unwrap();
        row.set(VERSION, version).unwrap();
        row.set(DATA, vec![0u8]).unwrap();
        row
    }

    fn rows() -> Vec<Row> {
        let mut rows: Vec<Row> = (1..=5).map(|v| row(v, "S", v)).collect();
        rows.push(row(6, "T", 3));
        rows
    }

    fn versions(filters: &[Filter]) -> Vec<(String, i64)> {
        rows()
            .iter()
            .filter(|r| matches_all(filters, r))
            .map(|r| (r.text(NAME).unwrap().to_string(), r.int(VERSION).unwrap()))
            .collect()
    }

    #[test]
    fn test_schema_prepends_row_id_column() {
        let schema = schema();

        assert_eq!(schema.width(), 4);
        assert_eq!(schema.columns()[0].name, ROW_ID_COLUMN_NAME);
        assert_eq!(schema.column("version").unwrap().ordinal, VERSION);
        assert!(matches!(
            schema.column("missing"),
            Err(TableError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_blank_row_is_not_inserted() {
        let row = Row::blank(4);

        assert_eq!(row.id(), UNINSERTED_ROW_ID);
        assert!(!row.is_inserted());
        assert!(row.get(NAME).unwrap().is_null());
    }

    #[test]
    fn test_row_id_column_is_read_only() {
        let mut row = Row::blank(4);

        let result = row.set(ROW_ID_COLUMN, 7i64);

        assert!(matches!(result, Err(TableError::ReadOnlyColumn(_))));
    }

    #[test]
    fn test_range_filter() {
        let s_only = Filter::eq(NAME, "S");

        let result = versions(&[Filter::at_least(VERSION, 2i64), s_only]);

        assert_eq!(
            result.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
            vec![2, 3, 4, 5]
        );
    }

    #[test]
    fn test_equality_filter() {
        let result = versions(&[Filter::eq(VERSION, 3i64)]);

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|(_, v)| *v == 3));
    }

    #[test]
    fn test_combined_filters_intersect() {
        let result = versions(&[Filter::eq(VERSION, 3i64), Filter::eq(NAME, "S")]);

        assert_eq!(result, vec![("S".to_string(), 3)]);
    }

    #[test]
    fn test_between_filter_is_inclusive() {
        let result = versions(&[Filter::between(VERSION, 2i64, 4i64), Filter::eq(NAME, "S")]);

        assert_eq!(
            result.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
    }

    #[test]
    fn test_null_cell_never_matches_non_null_bound() {
        let mut row = Row::blank(schema().width());
        row.assign_id(1);

        assert!(!Filter::at_least(VERSION, 0i64).matches(&row));
        assert!(Filter::eq(VERSION, Value::Null).matches(&row));
    }

    #[test]
    fn test_filter_on_blob_is_contract_violation() {
        let result = schema().validate_filter(&Filter::eq(DATA, vec![1u8]));

        assert!(matches!(result, Err(TableError::UnorderableColumn(_))));
    }

    #[test]
    fn test_filter_with_wrong_bound_type_is_rejected() {
        let result = schema().validate_filter(&Filter::eq(VERSION, "three"));

        assert!(matches!(result, Err(TableError::TypeMismatch { .. })));
    }

    #[test]
    fn test_validate_row_rejects_wrong_type() {
        let mut row = Row::blank(schema().width());
        row.set(VERSION, "not a number").unwrap();

        let result = schema().validate_row(&row);

        assert!(matches!(
            result,
            Err(TableError::TypeMismatch { ref column, .. }) if column == "version"
        ));
    }
}
