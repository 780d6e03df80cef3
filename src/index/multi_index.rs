use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::index::Index;
use crate::value::{format_tuple, Label};

/// MultiIndex構造体
///
/// 複数レベルの階層化されたインデックスを表現します。
/// 各レベルの一意な値 (`levels`) と、行ごとのコード配列 (`codes`) を
/// 並列配列として保持します。重複したタプルも許可されます。
#[derive(Debug, Clone)]
pub struct MultiIndex {
    /// 各レベルの一意なラベル（初出順）
    levels: Vec<Vec<Label>>,

    /// 各レベルの値のインデックスを示すコード
    codes: Vec<Vec<usize>>,

    /// 各レベルの名前
    names: Vec<Option<String>>,

    /// タプルから位置のリストへのマッピング
    map: HashMap<Vec<Label>, Vec<usize>>,
}

impl PartialEq for MultiIndex {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.nlevels() == other.nlevels()
            && (0..self.len()).all(|i| self.get_tuple(i) == other.get_tuple(i))
    }
}

impl MultiIndex {
    /// 新しいMultiIndexを作成
    ///
    /// # 引数
    /// * `levels` - 各レベルの一意な値のリスト
    /// * `codes` - 各レベルでのインデックス位置を示すコード
    /// * `names` - 各レベルの名前（オプション）
    pub fn new(
        levels: Vec<Vec<Label>>,
        codes: Vec<Vec<usize>>,
        names: Option<Vec<Option<String>>>,
    ) -> Result<Self> {
        if levels.is_empty() {
            return Err(Error::InvalidInput(
                "a MultiIndex needs at least one level".into(),
            ));
        }

        if levels.len() != codes.len() {
            return Err(Error::LengthMismatch {
                expected: levels.len(),
                actual: codes.len(),
            });
        }

        // 行数の一貫性確認
        let n_rows = codes[0].len();
        for level_codes in &codes {
            if level_codes.len() != n_rows {
                return Err(Error::LengthMismatch {
                    expected: n_rows,
                    actual: level_codes.len(),
                });
            }
        }

        // コードの有効性確認
        for (level_idx, level_codes) in codes.iter().enumerate() {
            let size = levels[level_idx].len();
            if let Some(&code) = level_codes.iter().find(|&&c| c >= size) {
                return Err(Error::IndexOutOfBounds { index: code, size });
            }
        }

        let names = match names {
            Some(n) => {
                if n.len() != levels.len() {
                    return Err(Error::LengthMismatch {
                        expected: levels.len(),
                        actual: n.len(),
                    });
                }
                n
            }
            None => vec![None; levels.len()],
        };

        // マップの構築
        let mut map: HashMap<Vec<Label>, Vec<usize>> = HashMap::with_capacity(n_rows);
        for i in 0..n_rows {
            let tuple: Vec<Label> = (0..levels.len())
                .map(|l| levels[l][codes[l][i]].clone())
                .collect();
            map.entry(tuple).or_default().push(i);
        }

        Ok(MultiIndex {
            levels,
            codes,
            names,
            map,
        })
    }

    /// pandasの`MultiIndex.from_tuples`と同様にタプルリストから作成
    pub fn from_tuples(tuples: Vec<Vec<Label>>, names: Option<Vec<Option<String>>>) -> Result<Self> {
        let n_levels = match (tuples.first(), &names) {
            (Some(t), _) => t.len(),
            (None, Some(n)) => n.len(),
            (None, None) => {
                return Err(Error::InvalidInput(
                    "cannot infer level count from an empty tuple list".into(),
                ))
            }
        };

        for tuple in &tuples {
            if tuple.len() != n_levels {
                return Err(Error::LengthMismatch {
                    expected: n_levels,
                    actual: tuple.len(),
                });
            }
        }

        let mut levels: Vec<Vec<Label>> = vec![Vec::new(); n_levels];
        let mut level_maps: Vec<HashMap<Label, usize>> = vec![HashMap::new(); n_levels];
        let mut codes: Vec<Vec<usize>> = vec![Vec::with_capacity(tuples.len()); n_levels];

        for tuple in &tuples {
            for (level_idx, value) in tuple.iter().enumerate() {
                let code = match level_maps[level_idx].get(value) {
                    Some(&code) => code,
                    None => {
                        let new_code = levels[level_idx].len();
                        levels[level_idx].push(value.clone());
                        level_maps[level_idx].insert(value.clone(), new_code);
                        new_code
                    }
                };
                codes[level_idx].push(code);
            }
        }

        MultiIndex::new(levels, codes, names)
    }

    /// レベルごとの配列から作成（`pd.MultiIndex.from_arrays`）
    pub fn from_arrays(arrays: Vec<Vec<Label>>, names: Option<Vec<Option<String>>>) -> Result<Self> {
        let n_rows = arrays.first().map(|a| a.len()).unwrap_or(0);
        if let Some(bad) = arrays.iter().find(|a| a.len() != n_rows) {
            return Err(Error::LengthMismatch {
                expected: n_rows,
                actual: bad.len(),
            });
        }
        let tuples: Vec<Vec<Label>> = (0..n_rows)
            .map(|i| arrays.iter().map(|a| a[i].clone()).collect())
            .collect();
        if tuples.is_empty() {
            let names = names.unwrap_or_else(|| vec![None; arrays.len()]);
            return MultiIndex::new(vec![Vec::new(); names.len()], vec![Vec::new(); names.len()], Some(names));
        }
        MultiIndex::from_tuples(tuples, names)
    }

    /// 特定の位置のタプルを取得
    pub fn get_tuple(&self, pos: usize) -> Option<Vec<Label>> {
        if pos >= self.len() {
            return None;
        }
        Some(
            (0..self.levels.len())
                .map(|l| self.levels[l][self.codes[l][pos]].clone())
                .collect(),
        )
    }

    /// 全タプルを取得
    pub fn tuples(&self) -> Vec<Vec<Label>> {
        (0..self.len()).filter_map(|i| self.get_tuple(i)).collect()
    }

    /// タプルに一致する全ての位置
    pub fn positions_of(&self, key: &[Label]) -> Vec<usize> {
        if key.len() != self.levels.len() {
            return self.positions_of_prefix(key);
        }
        self.map.get(key).cloned().unwrap_or_default()
    }

    /// 一意な位置を取得（重複時はエラー）
    pub fn get_loc(&self, key: &[Label]) -> Result<usize> {
        let positions = self.positions_of(key);
        match positions.len() {
            0 => Err(Error::KeyNotFound(format_tuple(key))),
            1 => Ok(positions[0]),
            _ => Err(Error::DuplicateLabel(format_tuple(key))),
        }
    }

    /// 外側のレベルから部分一致する位置（部分インデックス）
    pub fn positions_of_prefix(&self, prefix: &[Label]) -> Vec<usize> {
        if prefix.len() > self.levels.len() {
            return Vec::new();
        }
        let mut level_codes = Vec::with_capacity(prefix.len());
        for (l, label) in prefix.iter().enumerate() {
            match self.levels[l].iter().position(|v| v == label) {
                Some(code) => level_codes.push(code),
                None => return Vec::new(),
            }
        }
        (0..self.len())
            .filter(|&i| {
                level_codes
                    .iter()
                    .enumerate()
                    .all(|(l, &code)| self.codes[l][i] == code)
            })
            .collect()
    }

    /// 指定レベルの値が`label`である位置（クロスセクション用）
    pub fn level_positions(&self, level: usize, label: &Label) -> Result<Vec<usize>> {
        self.check_level(level)?;
        let code = match self.levels[level].iter().position(|v| v == label) {
            Some(c) => c,
            None => return Ok(Vec::new()),
        };
        Ok(self.codes[level]
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == code)
            .map(|(i, _)| i)
            .collect())
    }

    /// インデックスの長さ（行数）を取得
    pub fn len(&self) -> usize {
        self.codes.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// レベル数を取得
    pub fn nlevels(&self) -> usize {
        self.levels.len()
    }

    /// 各レベルの値を取得
    pub fn levels(&self) -> &[Vec<Label>] {
        &self.levels
    }

    /// 各レベルのコードを取得
    pub fn codes(&self) -> &[Vec<usize>] {
        &self.codes
    }

    /// 各レベルの名前を取得
    pub fn names(&self) -> &[Option<String>] {
        &self.names
    }

    /// 名前からレベル番号を取得
    pub fn level_number(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .ok_or_else(|| Error::KeyNotFound(format!("level '{}'", name)))
    }

    pub fn is_unique(&self) -> bool {
        self.map.len() == self.len()
    }

    /// 特定のレベルの値を取得
    pub fn get_level_values(&self, level: usize) -> Result<Index> {
        self.check_level(level)?;
        let values = self.codes[level]
            .iter()
            .map(|&code| self.levels[level][code].clone())
            .collect();
        Ok(Index::with_name(values, self.names[level].clone()))
    }

    /// レベルを交換して新しいMultiIndexを作成
    pub fn swaplevel(&self, i: usize, j: usize) -> Result<Self> {
        self.check_level(i)?;
        self.check_level(j)?;

        let mut new_levels = self.levels.clone();
        let mut new_codes = self.codes.clone();
        let mut new_names = self.names.clone();

        new_levels.swap(i, j);
        new_codes.swap(i, j);
        new_names.swap(i, j);

        MultiIndex::new(new_levels, new_codes, Some(new_names))
    }

    /// 指定したレベルを削除したタプルの列（残り1レベルの場合は呼び出し側でフラット化）
    pub(crate) fn droplevel_tuples(&self, level: usize) -> Result<(Vec<Vec<Label>>, Vec<Option<String>>)> {
        self.check_level(level)?;
        if self.levels.len() == 1 {
            return Err(Error::InvalidInput(
                "cannot drop the only level of an index".into(),
            ));
        }
        let tuples = self
            .tuples()
            .into_iter()
            .map(|mut t| {
                t.remove(level);
                t
            })
            .collect();
        let mut names = self.names.clone();
        names.remove(level);
        Ok((tuples, names))
    }

    /// 新しい名前でコピー
    pub fn with_names(&self, names: Vec<Option<String>>) -> Result<Self> {
        if names.len() != self.levels.len() {
            return Err(Error::LengthMismatch {
                expected: self.levels.len(),
                actual: names.len(),
            });
        }
        let mut out = self.clone();
        out.names = names;
        Ok(out)
    }

    /// 位置を指定して抽出
    pub fn take(&self, positions: &[usize]) -> Result<Self> {
        let len = self.len();
        if let Some(&bad) = positions.iter().find(|&&p| p >= len) {
            return Err(Error::IndexOutOfBounds { index: bad, size: len });
        }
        let codes = self
            .codes
            .iter()
            .map(|level_codes| positions.iter().map(|&p| level_codes[p]).collect())
            .collect();
        MultiIndex::new(self.levels.clone(), codes, Some(self.names.clone()))
    }

    /// `level`から始まる辞書式順序での並べ替え順序（安定ソート）
    ///
    /// 指定レベルを第一キー、残りのレベルを元の順で後続キーとする。
    pub fn sort_order(&self, level: usize) -> Result<Vec<usize>> {
        self.check_level(level)?;
        let mut key_order: Vec<usize> = vec![level];
        key_order.extend((0..self.levels.len()).filter(|&l| l != level));

        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            for &l in &key_order {
                let la = &self.levels[l][self.codes[l][a]];
                let lb = &self.levels[l][self.codes[l][b]];
                match la.cmp(lb) {
                    std::cmp::Ordering::Equal => continue,
                    other => return other,
                }
            }
            std::cmp::Ordering::Equal
        });
        Ok(order)
    }

    fn check_level(&self, level: usize) -> Result<()> {
        if level >= self.levels.len() {
            return Err(Error::IndexOutOfBounds {
                index: level,
                size: self.levels.len(),
            });
        }
        Ok(())
    }
}
