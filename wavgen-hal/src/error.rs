use thiserror::Error;

pub type HalResult<T> = std::result::Result<T, HalError>;

#[derive(Debug, Error)]
pub enum HalError {
    /// Ошибка устройства (не найдено, не сконфигурировано, отказ драйвера)
    #[error("Transmit device error: {0}")]
    Device(String),

    /// Частота, скорость или усиление вне допустимого диапазона
    #[error("Invalid tuning: {0}")]
    InvalidTuning(String),

    /// Устройство сообщило о приёме большего числа выборок, чем было передано
    #[error("Sink accepted {accepted} samples but only {offered} were offered")]
    Overcommit { offered: usize, accepted: usize },
}

impl HalError {
    pub fn device<S: Into<String>>(s: S) -> Self {
        Self::Device(s.into())
    }

    pub fn tuning<S: Into<String>>(s: S) -> Self {
        Self::InvalidTuning(s.into())
    }
}
