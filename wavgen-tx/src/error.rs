use thiserror::Error;
use wavgen_hal::HalError;
use wavgen_types::WavError;

pub type TxResult<T> = std::result::Result<T, TxError>;

#[derive(Debug, Error)]
pub enum TxError {
    /// Некорректная конфигурация передатчика
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ошибка генерации сигнала
    #[error("Waveform error: {0}")]
    Waveform(#[from] WavError),

    /// Ошибка передающего устройства
    #[error("Sink error: {0}")]
    Sink(#[from] HalError),

    /// Нарушен порядок записей отчёта
    #[error("Report error: {0}")]
    Report(String),

    /// Ошибка записи файла отчёта
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации отчёта
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TxError {
    pub fn config<S: Into<String>>(s: S) -> Self {
        Self::Config(s.into())
    }
}
