use std::collections::BTreeMap;
use thiserror::Error;

/// フィールド名からエラーメッセージへのマッピング
pub type FieldErrors = BTreeMap<String, String>;

/// アプリケーション全体で使用される統一エラー型
#[derive(Debug, Error)]
pub enum AppError {
    /// 期間の不変条件違反（終了月が開始月より前）
    #[error("不変条件違反: 無効な期間です")]
    InvalidPeriod,

    /// リソースが見つからない場合のエラー
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// ストレージ操作の失敗
    #[error("リポジトリエラー: {0}")]
    Repository(String),

    /// リクエストのバリデーションエラー（フィールド単位）
    #[error("バリデーションエラー: {}", format_fields(.0))]
    Validation(FieldErrors),

    /// 不正な形式のリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),

    /// 設定関連のエラー
    #[error("設定エラー: {0}")]
    Configuration(String),

    /// I/O関連のエラー
    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),

    /// JSON解析エラー
    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),
}

/// エラーの重要度を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// 低重要度（ユーザー入力エラーなど）
    Low,
    /// 中重要度（I/Oエラーなど）
    Medium,
    /// 高重要度（データベースエラーなど）
    High,
    /// 最重要（起動不能な設定エラーなど）
    Critical,
}

impl ErrorSeverity {
    /// 重要度に対応するログレベルを取得
    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Low => log::Level::Warn,
            ErrorSeverity::Medium | ErrorSeverity::High | ErrorSeverity::Critical => {
                log::Level::Error
            }
        }
    }
}

impl AppError {
    /// ユーザーに表示するためのメッセージを取得
    ///
    /// ストレージや設定の内部情報はレスポンスに含めない。
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidPeriod => "終了月は開始月より前にできません".to_string(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Repository(_) => "データベース操作でエラーが発生しました".to_string(),
            AppError::Validation(_) => "validation error".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Configuration(_) => "設定エラーが発生しました".to_string(),
            AppError::Io(_) => "ファイル操作でエラーが発生しました".to_string(),
            AppError::Json(e) => format!("リクエストの形式が不正です: {e}"),
        }
    }

    /// エラーの詳細情報を取得
    ///
    /// # 戻り値
    /// エラーの詳細情報（ログ出力用）
    pub fn details(&self) -> String {
        format!("{self}")
    }

    /// エラーの重要度を取得
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::InvalidPeriod => ErrorSeverity::Low,
            AppError::NotFound(_) => ErrorSeverity::Low,
            AppError::Repository(_) => ErrorSeverity::High,
            AppError::Validation(_) => ErrorSeverity::Low,
            AppError::BadRequest(_) => ErrorSeverity::Low,
            AppError::Configuration(_) => ErrorSeverity::Critical,
            AppError::Io(_) => ErrorSeverity::Medium,
            AppError::Json(_) => ErrorSeverity::Low,
        }
    }

    /// HTTPステータスコードを取得
    ///
    /// # 対応
    /// - NotFound → 404
    /// - Validation → 422
    /// - InvalidPeriod / BadRequest / Json → 400
    /// - その他 → 500
    pub fn status_code(&self) -> hyper::StatusCode {
        use hyper::StatusCode;

        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidPeriod | AppError::BadRequest(_) | AppError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Repository(_) | AppError::Configuration(_) | AppError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// リソース未発見エラーを作成するヘルパー関数
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        AppError::NotFound(format!("{}が見つかりません", resource.into()))
    }

    /// リポジトリエラーを作成するヘルパー関数
    pub fn repository<S: Into<String>>(message: S) -> Self {
        AppError::Repository(message.into())
    }

    /// 単一フィールドのバリデーションエラーを作成するヘルパー関数
    pub fn field<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.into(), message.into());
        AppError::Validation(fields)
    }

    /// 不正リクエストエラーを作成するヘルパー関数
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        AppError::BadRequest(message.into())
    }

    /// 設定エラーを作成するヘルパー関数
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        AppError::Configuration(message.into())
    }

    /// 存在しないレコードを示すエラーかどうか
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

/// rusqlite::ErrorからAppErrorへの変換
impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        AppError::Repository(error.to_string())
    }
}

fn format_fields(fields: &FieldErrors) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result型のエイリアス（アプリケーション全体で使用）
pub type AppResult<T> = Result<T, AppError>;
