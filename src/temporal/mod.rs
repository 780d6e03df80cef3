//! 時系列データ操作のためのモジュール
//!
//! 時刻インデックスを持つSeries/Tableのリサンプリングとウィンドウ集計。

mod frequency;
mod resample;
mod window;

pub use self::frequency::Frequency;
pub use self::resample::{Origin, ResampleRule, SeriesResampler, Side, TableResampler};
pub use self::window::{
    Ewm, EwmOptions, Rolling, TableEwm, TableRolling, Window, WindowFn, WindowType,
};
