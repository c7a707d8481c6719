use crate::domain::errors::TableError;
use crate::domain::table::{Column, Filter, Row, RowId, Schema};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, TableError>;

/// テーブルストアポート
///
/// 安定した行IDを持つ、フィルタ可能な行の集合を抽象化する。
/// テーブルベースのイベントストアとメッセージインボックスの両方の土台となる。
///
/// 実装が保証すべきこと：
/// - 行IDは1以上で単調増加し、再利用されない
/// - 行は値（コピー）として返され、ストア内部への参照は返さない
#[async_trait]
pub trait Table: Send + Sync {
    /// スキーマ（0番目の列は常に行ID）
    fn schema(&self) -> &Schema;

    fn columns(&self) -> &[Column] {
        self.schema().columns()
    }

    /// 未挿入の空行（行ID = -1）を作成する
    fn new_row(&self) -> Row {
        Row::blank(self.schema().width())
    }

    /// 行を挿入し、割り当てた行IDを返す
    ///
    /// 渡された行にも行IDが設定される。
    ///
    /// # エラー
    /// 挿入済みの行は `TableError::AlreadyInserted`
    async fn insert(&self, row: &mut Row) -> Result<RowId>;

    /// 行IDが一致する行を上書きする
    ///
    /// # エラー
    /// 行が存在しなければ `TableError::RowNotFound`
    async fn update(&self, row: &Row) -> Result<()>;

    /// 保存済みの行がすべてのフィルタを満たす場合に限り上書きする
    ///
    /// 判定と書き込みは不可分に行われる。書き込んだ場合は `true`、
    /// 行が存在しないかフィルタを満たさない場合は `false` を返す。
    async fn update_where(&self, row: &Row, filters: &[Filter]) -> Result<bool>;

    /// 行を削除する
    ///
    /// # エラー
    /// 行が存在しなければ `TableError::RowNotFound`
    async fn delete(&self, row: &Row) -> Result<()>;

    /// すべてのフィルタを満たす行を返す（順序は不定）
    async fn rows(&self, filters: &[Filter]) -> Result<Vec<Row>>;
}
