use std::sync::Arc;

use crate::error::{Error, Result};

/// 有効値（非NULL）を追跡するビットマスク
///
/// ビットが1の位置は値が存在し、0の位置はNULLを表す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMask {
    data: Arc<[u8]>,
    len: usize,
}

impl BitMask {
    /// すべての値が有効なビットマスクを作成する
    pub fn all_valid(length: usize) -> Self {
        let bytes_needed = (length + 7) / 8;
        let mut data = vec![0xFFu8; bytes_needed];

        // 不完全な最後のバイトを調整
        let remaining_bits = length % 8;
        if remaining_bits != 0 {
            let last_byte_mask = (1u8 << remaining_bits) - 1;
            if let Some(last) = data.last_mut() {
                *last &= last_byte_mask;
            }
        }

        Self {
            data: data.into(),
            len: length,
        }
    }

    /// すべての値がNULLのビットマスクを作成する
    pub fn all_null(length: usize) -> Self {
        let bytes_needed = (length + 7) / 8;
        Self {
            data: vec![0u8; bytes_needed].into(),
            len: length,
        }
    }

    /// ブール値のスライスから作成する（trueが有効値）
    pub fn from_bools(valid: &[bool]) -> Self {
        let length = valid.len();
        let bytes_needed = (length + 7) / 8;
        let mut data = vec![0u8; bytes_needed];

        for (i, &is_set) in valid.iter().enumerate() {
            if is_set {
                data[i / 8] |= 1 << (i % 8);
            }
        }

        Self {
            data: data.into(),
            len: length,
        }
    }

    /// ビットが設定されているかどうかを確認する
    pub fn get(&self, index: usize) -> Result<bool> {
        if index >= self.len {
            return Err(Error::IndexOutOfBounds {
                index,
                size: self.len,
            });
        }
        Ok(self.is_set(index))
    }

    /// 範囲チェックなしでビットを読む（呼び出し側が範囲を保証する）
    #[inline]
    pub(crate) fn is_set(&self, index: usize) -> bool {
        debug_assert!(index < self.len);
        (self.data[index / 8] & (1 << (index % 8))) != 0
    }

    /// 設定されているビットの数
    pub fn count_set(&self) -> usize {
        (0..self.len).filter(|&i| self.is_set(i)).count()
    }

    /// すべてのビットが設定されているか
    pub fn all_set(&self) -> bool {
        self.count_set() == self.len
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// ブール値のベクトルに展開する
    pub fn to_bools(&self) -> Vec<bool> {
        (0..self.len).map(|i| self.is_set(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_last_byte() {
        let mask = BitMask::all_valid(10);
        assert_eq!(mask.count_set(), 10);
        assert!(mask.get(9).unwrap());
        assert!(mask.get(10).is_err());
    }

    #[test]
    fn from_bools_round_trips() {
        let bools = vec![true, false, true, true, false, false, true, false, true];
        let mask = BitMask::from_bools(&bools);
        assert_eq!(mask.to_bools(), bools);
        assert_eq!(mask.count_set(), 5);
        assert!(!mask.all_set());
    }
}
