//! 月単位の日付（MM-YYYY）を表す値型
//!
//! サブスクリプションの開始月・終了月は日付の精度を持たず、
//! 内部的には月初日の `NaiveDate` として保持します。

use crate::shared::errors::{AppError, AppResult};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// DATE列に保存する書式
const SQL_DATE_FORMAT: &str = "%Y-%m-%d";

/// 受け付ける書式（2桁の月、ダッシュ、4桁の年）
pub const MONTH_YEAR_FORMAT: &str = "MM-YYYY";

static MONTH_YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})-(\d{4})$").expect("月年パターンが不正です"));

/// 月単位の日付
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthYear(NaiveDate);

impl MonthYear {
    /// 年と月から作成する（範囲外の月はNone）
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    /// 任意の日付をその月の月初に丸めて作成する
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    /// 文字列を解析する
    ///
    /// # 引数
    /// * `text` - `MM-YYYY` 形式の文字列
    ///
    /// # 戻り値
    /// 空文字列・`""`・`null` の場合は `None`、形式不正の場合はバリデーションエラー
    pub fn parse(text: &str) -> AppResult<Option<Self>> {
        let trimmed = text.trim().trim_matches('"');
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(None);
        }

        let captures = MONTH_YEAR_PATTERN.captures(trimmed).ok_or_else(|| {
            AppError::bad_request(format!(
                "日付は{MONTH_YEAR_FORMAT}形式で入力してください: {trimmed}"
            ))
        })?;

        let month: u32 = captures[1]
            .parse()
            .map_err(|_| AppError::bad_request(format!("月が不正です: {trimmed}")))?;
        let year: i32 = captures[2]
            .parse()
            .map_err(|_| AppError::bad_request(format!("年が不正です: {trimmed}")))?;

        Self::new(year, month)
            .map(Some)
            .ok_or_else(|| AppError::bad_request(format!("月は01から12の間で入力してください: {trimmed}")))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// 月初日の日付
    pub fn first_day(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:04}", self.month(), self.year())
    }
}

impl Serialize for MonthYear {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MonthYear {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        match MonthYear::parse(&text) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(serde::de::Error::custom("月年の値が空です")),
            Err(e) => Err(serde::de::Error::custom(e.user_message())),
        }
    }
}

/// DATE列（YYYY-MM-DD）として保存する
impl ToSql for MonthYear {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(
            self.first_day().format(SQL_DATE_FORMAT).to_string(),
        ))
    }
}

impl FromSql for MonthYear {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        NaiveDate::column_result(value).map(MonthYear::from_date)
    }
}
