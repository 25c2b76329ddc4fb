use wavgen_types::{IqSample, TxMetadata};

use crate::{HalError, HalResult, SimulatedSink};

/// Абстракция передающего тракта SDR.
// Реализация: [`SimulatedSink`]. Настоящие драйверы (UHD, HackRF)
// подключаются через этот же трейт.
pub trait TxSink: Send {
    /// Информация об устройстве
    fn info(&self) -> SinkInfo;

    /// Запрашивает частоту дискретизации. Устройство может округлить её до
    /// достижимого значения, поэтому после вызова нужно перечитать
    /// [`TxSink::actual_rate`].
    fn set_rate(
        &mut self,
        rate_hz: f64,
    ) -> HalResult<()>;

    /// Фактическая частота дискретизации (Гц).
    fn actual_rate(&self) -> f64;

    fn set_frequency(
        &mut self,
        freq_hz: f64,
    ) -> HalResult<()>;

    fn set_gain(
        &mut self,
        gain_db: f64,
    ) -> HalResult<()>;

    /// Выставляет аппаратные часы в `time` (секунды).
    fn set_clock(
        &mut self,
        time: f64,
    ) -> HalResult<()>;

    /// Текущее время аппаратных часов (секунды).
    fn time_now(&self) -> f64;

    /// Передаёт `samples` с метаданными `md`.
    ///
    /// Возвращает число принятых выборок: от нуля до `samples.len()`.
    /// Частичный приём штатный, вызывающий повторяет передачу остатка.
    fn send(
        &mut self,
        samples: &[IqSample],
        md: &TxMetadata,
    ) -> HalResult<usize>;

    /// Посылка нулевой длины с флагом end-of-burst.
    fn send_end_of_burst(&mut self) -> HalResult<()> {
        self.send(&[], &TxMetadata::end_of_burst()).map(|_| ())
    }

    /// Конфигурирует скорость, частоту и усиление одним вызовом.
    fn configure(
        &mut self,
        rate_hz: f64,
        freq_hz: f64,
        gain_db: f64,
    ) -> HalResult<()> {
        self.set_rate(rate_hz)?;
        self.set_frequency(freq_hz)?;
        self.set_gain(gain_db)
    }
}

/// Информация об устройстве (для логирования и отчёта).
#[derive(Debug, Clone)]
pub struct SinkInfo {
    pub name: String,
    pub serial: Option<String>,
    pub sample_rate_hz: f64,
    pub center_freq_hz: f64,
    pub gain_db: f64,
}

/// Тип передающего устройства.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Встроенный симулятор (не требует железа)
    Simulated,
    /// Ettus USRP через UHD
    Usrp,
}

impl std::fmt::Display for SinkKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            SinkKind::Simulated => write!(f, "sim"),
            SinkKind::Usrp => write!(f, "usrp"),
        }
    }
}

impl std::str::FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sim" | "simulated" => Ok(SinkKind::Simulated),
            "usrp" | "uhd" => Ok(SinkKind::Usrp),
            _ => Err(format!("Unknown device type: '{s}'. Use: sim, usrp")),
        }
    }
}

/// Создаёт передающее устройство нужного типа.
pub fn create_sink(kind: SinkKind) -> HalResult<Box<dyn TxSink>> {
    match kind {
        SinkKind::Simulated => Ok(Box::new(SimulatedSink::new())),
        SinkKind::Usrp => Err(HalError::device(
            "UHD driver support is not compiled into this build",
        )),
    }
}
