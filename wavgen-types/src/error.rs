use thiserror::Error;

/// Результат для операций генерации сигнала.
pub type WavResult<T> = std::result::Result<T, WavError>;

/// Ошибки конфигурации и генерации сигнала.
#[derive(Debug, Error)]
pub enum WavError {
    /// Некорректный параметр конфигурации
    #[error("Configuration error: {0}")]
    Config(String),

    /// Неизвестная схема модуляции/шума
    #[error("Unknown modulation scheme '{0}'")]
    UnknownModulation(String),

    /// Длительность хопа меньше времени установления фильтра
    #[error("Requested hop duration too small: {requested} samples, need at least {required}")]
    HopTooShort { requested: usize, required: usize },

    /// Длина выходного буфера не совпадает с ожидаемой
    #[error("Buffer length mismatch: expected {expected}, found {found}")]
    BufferLength { expected: usize, found: usize },

    /// Не удалось выделить ресурсы (буферы, FFT-планы, пул потоков)
    #[error("Resource allocation failed: {0}")]
    Resource(String),
}

impl WavError {
    pub fn config<S: Into<String>>(s: S) -> Self {
        Self::Config(s.into())
    }

    pub fn resource<S: Into<String>>(s: S) -> Self {
        Self::Resource(s.into())
    }
}
