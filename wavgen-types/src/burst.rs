use serde::{Deserialize, Serialize};

/// Описание одного burst'а для отчёта об активности.
///
/// Создаётся планировщиком в момент генерации и больше не меняется.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstRecord {
    /// Несущая частота (Гц)
    pub center_frequency: f64,
    /// Занимаемая полоса (Гц)
    pub bandwidth: f64,
    /// Время начала (секунды; абсолютное либо относительно начала блока)
    pub start_time: f64,
    /// Длительность (секунды)
    pub duration: f64,
    /// Метка модуляции (`qpsk`, `noise`, `ofdm`, ...)
    pub modulation: String,
}

impl BurstRecord {
    pub fn new<S: Into<String>>(
        center_frequency: f64,
        bandwidth: f64,
        start_time: f64,
        duration: f64,
        modulation: S,
    ) -> Self {
        Self {
            center_frequency,
            bandwidth,
            start_time,
            duration,
            modulation: modulation.into(),
        }
    }

    /// Время окончания burst'а.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Копия записи, сдвинутая на `offset` секунд.
    pub fn shifted(
        &self,
        offset: f64,
    ) -> Self {
        Self {
            start_time: self.start_time + offset,
            ..self.clone()
        }
    }

    /// Копия записи с длительностью, обрезанной до `max_duration`.
    pub fn truncated(
        &self,
        max_duration: f64,
    ) -> Self {
        Self {
            duration: self.duration.min(max_duration).max(0.0),
            ..self.clone()
        }
    }
}
