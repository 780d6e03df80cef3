use log::debug;

use crate::error::{Error, Result};
use crate::groupby::{AggFunc, AggSpec, GroupKey, GroupOptions};
use crate::table::Table;
use crate::value::Label;

impl Table {
    /// ピボット: `set_index(index + columns)` の後で列キーのレベルをunstackする
    ///
    /// # 引数
    /// * `index` - 行になる列
    /// * `columns` - 列になる列
    /// * `values` - 値の列（空なら残りすべて）
    ///
    /// 値の列が1つなら結果の列は列キーの値だけになる。
    /// 同じ (行, 列) の組が2回以上現れると `DuplicateKey`。
    pub fn pivot(&self, index: &[Label], columns: &[Label], values: &[Label]) -> Result<Table> {
        check_keys(index, columns)?;
        let mut keys = index.to_vec();
        keys.extend(columns.iter().cloned());
        let indexed = self.set_index(&keys, true)?;
        let indexed = if values.is_empty() {
            indexed
        } else {
            indexed.select(values)?
        };

        let levels: Vec<usize> = (index.len()..keys.len()).collect();
        debug!(
            "pivot: {} row keys, {} column keys, {} value columns",
            index.len(),
            columns.len(),
            indexed.ncols()
        );
        if indexed.ncols() == 1 {
            indexed.column_at(0)?.unstack_levels(&levels)
        } else {
            indexed.unstack_levels(&levels)
        }
    }

    /// ピボットテーブル: 重複する組み合わせは `aggfunc` で集計する
    pub fn pivot_table(
        &self,
        index: &[Label],
        columns: &[Label],
        values: &[Label],
        aggfunc: AggFunc,
    ) -> Result<Table> {
        check_keys(index, columns)?;
        let mut keys = index.to_vec();
        keys.extend(columns.iter().cloned());
        let grouped = self.groupby_with(
            GroupKey::Columns(keys.clone()),
            GroupOptions::default().with_sort(true),
        )?;
        let grouped = if values.is_empty() {
            grouped
        } else {
            grouped.select(values)?
        };
        let aggregated = grouped.aggregate(AggSpec::Single(aggfunc))?;

        let levels: Vec<usize> = (index.len()..keys.len()).collect();
        if aggregated.ncols() == 1 {
            aggregated.column_at(0)?.unstack_levels(&levels)
        } else {
            aggregated.unstack_levels(&levels)
        }
    }
}

fn check_keys(index: &[Label], columns: &[Label]) -> Result<()> {
    if index.is_empty() || columns.is_empty() {
        return Err(Error::InvalidInput(
            "pivot needs at least one index column and one column key".into(),
        ));
    }
    if let Some(dup) = index.iter().find(|l| columns.contains(l)) {
        return Err(Error::InvalidInput(format!(
            "column {} used as both row and column key",
            dup
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn sales() -> Table {
        Table::from_rows(
            vec![
                vec![Value::from(1i64), Value::from("A"), Value::from(9i64)],
                vec![Value::from(1i64), Value::from("A"), Value::from(1i64)],
                vec![Value::from(2i64), Value::from("B"), Value::from(7i64)],
            ],
            vec!["k", "c", "v"],
        )
        .unwrap()
    }

    #[test]
    fn pivot_rejects_duplicates() {
        let err = sales()
            .pivot(&[Label::from("k")], &[Label::from("c")], &[Label::from("v")])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
    }

    #[test]
    fn pivot_table_aggregates_duplicates() {
        let t = sales()
            .pivot_table(&[Label::from("k")], &[Label::from("c")], &[Label::from("v")], AggFunc::Sum)
            .unwrap();
        assert_eq!(t.value(&[Label::Int(1)], &[Label::from("A")]).unwrap(), Value::Int64(10));
        assert_eq!(t.value(&[Label::Int(2)], &[Label::from("A")]).unwrap(), Value::Null);
    }
}
