mod cumulative;

use std::sync::Arc;

use crate::column::Column;
use crate::error::{Error, Result};
use crate::index::{Index, TableIndex};
use crate::ops::align::{gather, reindex_positions, FillPolicy};
use crate::value::{DType, Label, Value};

/// Series構造体: ラベル付きの一次元カラム
///
/// インデックスは `Arc` で共有され、変更操作は常に新しいSeriesを返す。
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// 行インデックス
    index: Arc<TableIndex>,

    /// 値
    column: Column,

    /// 名前（オプション）
    name: Option<String>,
}

impl Series {
    /// カラムとインデックスからSeriesを作成
    pub fn new(column: Column, index: TableIndex, name: Option<String>) -> Result<Self> {
        Self::with_shared_index(column, Arc::new(index), name)
    }

    /// 共有インデックス付きでSeriesを作成
    pub fn with_shared_index(
        column: Column,
        index: Arc<TableIndex>,
        name: Option<String>,
    ) -> Result<Self> {
        if column.len() != index.len() {
            return Err(Error::LengthMismatch {
                expected: index.len(),
                actual: column.len(),
            });
        }
        Ok(Series {
            index,
            column,
            name,
        })
    }

    /// 0..n の整数インデックスでSeriesを作成
    pub fn from_column(column: Column, name: Option<String>) -> Self {
        let index = Arc::new(TableIndex::range(column.len()));
        Series {
            index,
            column,
            name,
        }
    }

    /// 値のベクトルからSeriesを作成（型は推論される）
    pub fn from_values<V: Into<Value>>(values: Vec<V>, name: Option<String>) -> Result<Self> {
        let column = Column::from_values(values.into_iter().map(Into::into).collect())?;
        Ok(Self::from_column(column, name))
    }

    /// ラベルと値のベクトルからSeriesを作成
    pub fn from_labeled<L, V>(labels: Vec<L>, values: Vec<V>, name: Option<String>) -> Result<Self>
    where
        L: Into<Label>,
        V: Into<Value>,
    {
        let column = Column::from_values(values.into_iter().map(Into::into).collect())?;
        Self::new(column, TableIndex::Flat(Index::from_values(labels)), name)
    }

    /// インデックスを差し替える
    pub fn with_index(&self, index: TableIndex) -> Result<Self> {
        Self::new(self.column.clone(), index, self.name.clone())
    }

    pub fn index(&self) -> &TableIndex {
        &self.index
    }

    pub(crate) fn index_arc(&self) -> &Arc<TableIndex> {
        &self.index
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 名前を変更した新しいSeriesを返す
    pub fn rename(&self, name: Option<String>) -> Self {
        Series {
            index: Arc::clone(&self.index),
            column: self.column.clone(),
            name,
        }
    }

    pub fn len(&self) -> usize {
        self.column.len()
    }

    pub fn is_empty(&self) -> bool {
        self.column.is_empty()
    }

    pub fn dtype(&self) -> DType {
        self.column.dtype()
    }

    /// 位置から値を取得（範囲外はNull）
    pub fn get(&self, pos: usize) -> Value {
        self.column.get(pos)
    }

    /// 一意なラベルの値を取得
    pub fn get_label<L: Into<Label>>(&self, label: L) -> Result<Value> {
        let pos = self.index.get_loc(&[label.into()])?;
        Ok(self.column.get(pos))
    }

    /// ラベルタプル（または外側レベルの接頭辞）に一致する行
    pub fn loc(&self, key: &[Label]) -> Result<Series> {
        let positions = self.index.positions_of_strict(key)?;
        self.take(&positions)
    }

    /// 位置で行を選択
    pub fn iloc(&self, positions: &[usize]) -> Result<Series> {
        self.take(positions)
    }

    pub fn take(&self, positions: &[usize]) -> Result<Series> {
        Ok(Series {
            index: Arc::new(self.index.take(positions)?),
            column: self.column.take(positions)?,
            name: self.name.clone(),
        })
    }

    /// 先頭n行
    pub fn head(&self, n: usize) -> Result<Series> {
        let positions: Vec<usize> = (0..n.min(self.len())).collect();
        self.take(&positions)
    }

    /// すべての値を取り出す
    pub fn to_vec(&self) -> Vec<Value> {
        self.column.values()
    }

    /// 数値として取り出す（Nullは `None`）
    pub fn to_f64(&self) -> Result<Vec<Option<f64>>> {
        self.column.to_f64()
    }

    pub fn null_count(&self) -> usize {
        self.column.null_count()
    }

    /// Nullを `fill` で置き換える
    pub fn fill_null(&self, fill: &Value) -> Result<Series> {
        Ok(self.with_column(self.column.fill_null(fill)?))
    }

    /// Nullの行を除く
    pub fn dropna(&self) -> Result<Series> {
        let positions: Vec<usize> = (0..self.len())
            .filter(|&i| self.column.is_valid(i))
            .collect();
        self.take(&positions)
    }

    pub fn cast(&self, dtype: DType) -> Result<Series> {
        Ok(self.with_column(self.column.cast(dtype)?))
    }

    /// 新しいインデックスに合わせて並べ替える
    pub fn reindex(&self, index: TableIndex, policy: FillPolicy) -> Result<Series> {
        let positions = reindex_positions(&self.index, &index, &policy)?;
        let column = gather(&self.column, &positions, &policy)?;
        Series::new(column, index, self.name.clone())
    }

    /// インデックスでソート（`level` から始まる辞書順）
    pub fn sort_index(&self, level: usize) -> Result<Series> {
        let order = self.index.sort_order(level)?;
        self.take(&order)
    }

    /// 同じインデックスでカラムだけ差し替える
    pub(crate) fn with_column(&self, column: Column) -> Series {
        Series {
            index: Arc::clone(&self.index),
            column,
            name: self.name.clone(),
        }
    }

    /// インデックスとカラムを分解する
    pub fn into_parts(self) -> (Arc<TableIndex>, Column, Option<String>) {
        (self.index, self.column, self.name)
    }
}
