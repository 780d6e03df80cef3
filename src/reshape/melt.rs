use crate::column::Column;
use crate::error::{Error, Result};
use crate::index::{Index, TableIndex};
use crate::table::Table;
use crate::value::{Label, Value};

/// melt操作のオプション
#[derive(Debug, Clone)]
pub struct MeltOptions {
    /// 固定する列（識別列）
    pub id_vars: Vec<Label>,
    /// 値として縦に並べる列（Noneなら識別列以外のすべて）
    pub value_vars: Option<Vec<Label>>,
    /// 変数名の列名（Noneなら列インデックスの名前、なければ "variable"）
    pub var_name: Option<String>,
    /// 値の列名
    pub value_name: String,
}

impl Default for MeltOptions {
    fn default() -> Self {
        Self {
            id_vars: Vec::new(),
            value_vars: None,
            var_name: None,
            value_name: "value".to_string(),
        }
    }
}

impl MeltOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_vars<L: Into<Label>>(mut self, labels: Vec<L>) -> Self {
        self.id_vars = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn value_vars<L: Into<Label>>(mut self, labels: Vec<L>) -> Self {
        self.value_vars = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn var_name(mut self, name: impl Into<String>) -> Self {
        self.var_name = Some(name.into());
        self
    }

    pub fn value_name(mut self, name: impl Into<String>) -> Self {
        self.value_name = name.into();
        self
    }
}

impl Table {
    /// ワイド形式から長形式へ変換する
    ///
    /// 値列ごとにすべての行を並べる（変数が外側のループ）。
    /// 結果の行インデックスは 0..n。
    pub fn melt(&self, options: &MeltOptions) -> Result<Table> {
        let TableIndex::Flat(columns) = self.columns() else {
            return Err(Error::InvalidInput("melt needs flat column labels".into()));
        };

        let id_positions = options
            .id_vars
            .iter()
            .map(|l| columns.get_loc(l))
            .collect::<Result<Vec<_>>>()?;
        let value_labels: Vec<Label> = match &options.value_vars {
            Some(labels) => labels.clone(),
            None => columns
                .labels()
                .iter()
                .filter(|l| !options.id_vars.contains(l))
                .cloned()
                .collect(),
        };
        let value_positions = value_labels
            .iter()
            .map(|l| columns.get_loc(l))
            .collect::<Result<Vec<_>>>()?;

        let var_name = options
            .var_name
            .clone()
            .or_else(|| columns.name().map(str::to_string))
            .unwrap_or_else(|| "variable".to_string());

        let n = self.nrows();
        let repeated: Vec<usize> = (0..value_positions.len()).flat_map(|_| 0..n).collect();

        let mut labels: Vec<Label> = Vec::with_capacity(id_positions.len() + 2);
        let mut data = Vec::with_capacity(id_positions.len() + 2);
        for (&p, l) in id_positions.iter().zip(&options.id_vars) {
            labels.push(l.clone());
            data.push(self.data()[p].take(&repeated)?);
        }

        let variables: Vec<Value> = value_labels
            .iter()
            .flat_map(|l| std::iter::repeat(l.to_value()).take(n))
            .collect();
        labels.push(Label::from(var_name));
        data.push(Column::from_values(variables)?);

        let parts: Vec<Column> = value_positions.iter().map(|&p| self.data()[p].clone()).collect();
        labels.push(Label::from(options.value_name.clone()));
        data.push(if parts.is_empty() {
            Column::from_values(Vec::new())?
        } else {
            Column::concat(&parts)?
        });

        Table::new(
            TableIndex::range(repeated.len()),
            TableIndex::Flat(Index::new(labels)),
            data,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn melt_is_variable_major() {
        let t = Table::from_columns(vec![
            ("id", vec![Value::from(1i64), Value::from(2i64)]),
            ("A", vec![Value::from(11i64), Value::from(21i64)]),
            ("B", vec![Value::from(12i64), Value::from(22i64)]),
        ])
        .unwrap();
        let long = t.melt(&MeltOptions::new().id_vars(vec!["id"])).unwrap();
        assert_eq!(long.shape(), (4, 3));
        assert_eq!(
            long.column("variable").unwrap().to_vec(),
            vec![Value::from("A"), Value::from("A"), Value::from("B"), Value::from("B")]
        );
        assert_eq!(
            long.column("value").unwrap().to_vec(),
            vec![Value::from(11i64), Value::from(21i64), Value::from(12i64), Value::from(22i64)]
        );
    }
}
