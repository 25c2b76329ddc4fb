use std::path::PathBuf;

use wavgen_core::{GainEnvelope, HopPolicy, DEFAULT_NFFT, DEFAULT_WORKERS, MIN_NFFT};
use wavgen_hal::SinkKind;
use wavgen_types::{FilterType, Modulation, SymbolScheme};

use crate::{TxError, TxResult};

/// Семейство генерируемого сигнала.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformKind {
    /// Непрерывная линейная модуляция или шум
    LinMod,
    /// Широкополосный многонесущий (OFDM-подобный) шум
    Wideband,
    /// Последовательности хопов
    Hop,
}

/// Параметры генератора.
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
    LinMod {
        /// Полоса как доля частоты дискретизации
        bandwidth: f32,
        scheme: SymbolScheme,
        filter: FilterType,
        /// Выборок в блоке передачи
        block_len: usize,
    },
    Wideband {
        nfft: usize,
        cplen: usize,
        workers: usize,
        /// Занятая полоса для отчёта (доля частоты дискретизации)
        bandwidth: f32,
    },
    Hop {
        policy: HopPolicy,
        span: f32,
        bandwidth: f32,
        hop_samples: usize,
        num_hops: usize,
        scheme: SymbolScheme,
    },
}

/// Политика расстановки burst'ов.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BurstMode {
    /// Один растущий burst, метка времени только на первом блоке
    Continuous,
    /// Повторный запуск burst'а раз в `dwell + squelch` секунд
    Discrete { dwell_secs: f64, squelch_secs: f64 },
}

/// Полная конфигурация сессии передачи.
#[derive(Debug, Clone)]
pub struct TransmitConfig {
    /// Тип передающего устройства
    pub device: SinkKind,
    /// Несущая частота (Гц)
    pub center_freq_hz: f64,
    /// Запрошенная частота дискретизации (Гц)
    pub sample_rate_hz: f64,
    /// Аппаратное усиление (дБ)
    pub gain_db: f64,
    /// Размах программной огибающей (дБ), 0 = постоянное усиление
    pub gain_range_db: f32,
    /// Период программной огибающей (секунды)
    pub gain_cycle_secs: f64,
    /// Ограничение по времени в эфире (None = до Ctrl+C)
    pub duration_secs: Option<f64>,
    /// Запас между "сейчас" и первой выборкой (секунды)
    pub start_margin_secs: f64,
    /// Частота, на которую уводится радио после передачи
    pub park_freq_hz: f64,
    pub burst_mode: BurstMode,
    pub waveform: Waveform,
    /// Путь к JSON-отчёту об активности
    pub report_path: Option<PathBuf>,
    /// Строка идентификации устройства для отчёта
    pub device_args: String,
    /// Интервал вывода статистики (секунды)
    pub stats_interval_secs: u64,
    /// Seed генераторов (None = из энтропии)
    pub seed: Option<u64>,
    /// Только показать конфигурацию
    pub dry_run: bool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Waveform {
    pub fn kind(&self) -> WaveformKind {
        match self {
            Waveform::LinMod { .. } => WaveformKind::LinMod,
            Waveform::Wideband { .. } => WaveformKind::Wideband,
            Waveform::Hop { .. } => WaveformKind::Hop,
        }
    }

    /// Длина блока, который генератор выдаёт за одну итерацию.
    pub fn block_len(&self) -> usize {
        match self {
            Waveform::LinMod { block_len, .. } => *block_len,
            // cplen всегда принудительно обнуляется генератором
            Waveform::Wideband { nfft, workers, .. } => nfft * workers,
            Waveform::Hop {
                hop_samples,
                num_hops,
                ..
            } => hop_samples * num_hops,
        }
    }

    /// Метка модуляции для отчёта.
    pub fn modulation_label(&self) -> &'static str {
        match self {
            Waveform::LinMod { scheme, .. } | Waveform::Hop { scheme, .. } => scheme.label(),
            Waveform::Wideband { .. } => "ofdm",
        }
    }

    fn validate(&self) -> TxResult<()> {
        let fraction = |name: &str, v: f32| -> TxResult<()> {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(TxError::config(format!("{name} must be in (0, 1], got {v}")))
            }
        };

        match self {
            Waveform::LinMod {
                bandwidth,
                block_len,
                ..
            } => {
                fraction("bandwidth", *bandwidth)?;
                if *block_len == 0 {
                    return Err(TxError::config("block length must be > 0"));
                }
            }
            Waveform::Wideband {
                nfft,
                workers,
                bandwidth,
                ..
            } => {
                fraction("bandwidth", *bandwidth)?;
                if *nfft < MIN_NFFT {
                    return Err(TxError::config(format!("nfft must be >= {MIN_NFFT}, got {nfft}")));
                }
                if *workers == 0 {
                    return Err(TxError::config("worker pool size must be > 0"));
                }
            }
            Waveform::Hop {
                span,
                bandwidth,
                hop_samples,
                num_hops,
                ..
            } => {
                fraction("span", *span)?;
                fraction("hop bandwidth", *bandwidth)?;
                if *hop_samples == 0 || *num_hops == 0 {
                    return Err(TxError::config("hop length and hop count must be > 0"));
                }
            }
        }

        Ok(())
    }
}

impl BurstMode {
    /// Период повторного запуска burst'а.
    pub fn loop_time(&self) -> Option<f64> {
        match self {
            BurstMode::Continuous => None,
            BurstMode::Discrete {
                dwell_secs,
                squelch_secs,
            } => Some(dwell_secs + squelch_secs),
        }
    }

    /// Блоков в одном дискретном burst'е: `max(1, ceil(round(dwell * rate) / block_len))`.
    pub fn blocks_per_burst(
        &self,
        sample_rate_hz: f64,
        block_len: usize,
    ) -> Option<u64> {
        match self {
            BurstMode::Continuous => None,
            BurstMode::Discrete { dwell_secs, .. } => {
                // dwell сперва округляется до целых выборок
                let dwell_samples = (dwell_secs * sample_rate_hz).round();
                let blocks = (dwell_samples / block_len as f64).ceil();
                Some((blocks as u64).max(1))
            }
        }
    }

    /// Проверяет, что burst из целых блоков укладывается в `dwell + squelch`,
    /// иначе следующий burst запланирован бы поверх текущего.
    pub fn check_fits(
        &self,
        sample_rate_hz: f64,
        block_len: usize,
    ) -> TxResult<()> {
        let (Some(blocks), Some(loop_time)) = (
            self.blocks_per_burst(sample_rate_hz, block_len),
            self.loop_time(),
        ) else {
            return Ok(());
        };

        let burst_secs = blocks as f64 * block_len as f64 / sample_rate_hz;

        // Допуск в полвыборки на округление
        if burst_secs > loop_time + 0.5 / sample_rate_hz {
            return Err(TxError::config(format!(
                "burst of {blocks} x {block_len} samples lasts {burst_secs:.6}s, \
                 longer than dwell + squelch ({loop_time:.6}s)"
            )));
        }

        Ok(())
    }
}

impl TransmitConfig {
    /// Проверяет конфигурацию до любых обращений к радио.
    pub fn validate(&self) -> TxResult<()> {
        if !(self.sample_rate_hz > 0.0 && self.sample_rate_hz.is_finite()) {
            return Err(TxError::config(format!(
                "sample rate must be > 0, got {}",
                self.sample_rate_hz
            )));
        }

        if !(self.center_freq_hz > 0.0 && self.park_freq_hz > 0.0) {
            return Err(TxError::config("center and park frequencies must be > 0"));
        }

        if !(self.gain_db >= 0.0) {
            return Err(TxError::config(format!("gain must be >= 0 dB, got {}", self.gain_db)));
        }

        if let Some(d) = self.duration_secs {
            if !(d > 0.0) {
                return Err(TxError::config(format!("duration must be > 0, got {d}")));
            }
        }

        if !(self.start_margin_secs >= 0.0) {
            return Err(TxError::config("start margin must be >= 0"));
        }

        if let BurstMode::Discrete {
            dwell_secs,
            squelch_secs,
        } = self.burst_mode
        {
            if !(dwell_secs > 0.0 && squelch_secs >= 0.0) {
                return Err(TxError::config(format!(
                    "dwell must be > 0 and squelch >= 0, got {dwell_secs}/{squelch_secs}"
                )));
            }
        }

        self.waveform.validate()?;

        let block_len = self.waveform.block_len();
        self.burst_mode.check_fits(self.sample_rate_hz, block_len)?;

        // Нулевой цикл огибающей ловится здесь, до настройки радио
        self.gain_envelope(self.sample_rate_hz, block_len)?;

        Ok(())
    }

    /// Огибающая усиления для фактической частоты дискретизации.
    pub fn gain_envelope(
        &self,
        sample_rate_hz: f64,
        block_len: usize,
    ) -> TxResult<GainEnvelope> {
        Ok(GainEnvelope::from_cycle_secs(
            self.gain_cycle_secs,
            sample_rate_hz,
            block_len,
            self.gain_range_db,
        )?)
    }

    /// Вид модуляции сигнала в отчёте: одна или много несущих.
    pub fn modality(&self) -> &'static str {
        match self.waveform.kind() {
            WaveformKind::Wideband => "multi_carrier",
            WaveformKind::LinMod | WaveformKind::Hop => "single_carrier",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl std::fmt::Display for WaveformKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            WaveformKind::LinMod => write!(f, "linmod"),
            WaveformKind::Wideband => write!(f, "wbofdm"),
            WaveformKind::Hop => write!(f, "hop"),
        }
    }
}

impl std::str::FromStr for WaveformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linmod" | "linear" => Ok(WaveformKind::LinMod),
            "wbofdm" | "wideband" | "ofdm" => Ok(WaveformKind::Wideband),
            "hop" | "hopper" => Ok(WaveformKind::Hop),
            _ => Err(format!("Unknown waveform '{s}'. Use: linmod, wbofdm, hop")),
        }
    }
}

impl Default for Waveform {
    fn default() -> Self {
        Waveform::LinMod {
            bandwidth: 0.7,
            scheme: SymbolScheme::Linear(Modulation::Qpsk),
            filter: FilterType::Rrc,
            block_len: 800,
        }
    }
}

impl Waveform {
    /// Широкополосный генератор с параметрами по умолчанию.
    pub fn wideband() -> Self {
        Waveform::Wideband {
            nfft: DEFAULT_NFFT,
            cplen: 0,
            workers: DEFAULT_WORKERS,
            bandwidth: 0.8,
        }
    }
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            device: SinkKind::Simulated,
            center_freq_hz: 2.46e9,
            sample_rate_hz: 1e6,
            gain_db: 50.0,
            gain_range_db: 0.0,
            gain_cycle_secs: 2.0,
            duration_secs: None,
            start_margin_secs: 0.5,
            park_freq_hz: 6e9,
            burst_mode: BurstMode::Continuous,
            waveform: Waveform::default(),
            report_path: None,
            device_args: "type=sim".to_string(),
            stats_interval_secs: 5,
            seed: None,
            dry_run: false,
        }
    }
}

/// Парсит строку частоты в герцы.
///
/// Поддерживает суффиксы: `GHz`, `MHz`, `kHz`, `Hz` (регистронезависимо),
/// дробные значения и экспоненциальную запись.
///
/// # Примеры
/// ```
/// use wavgen_tx::config::parse_freq_hz;
/// assert_eq!(parse_freq_hz("2.46GHz").unwrap(), 2.46e9);
/// assert_eq!(parse_freq_hz("250kHz").unwrap(), 250e3);
/// assert_eq!(parse_freq_hz("16e6").unwrap(), 16e6);
/// ```
pub fn parse_freq_hz(s: &str) -> Result<f64, String> {
    let s = s.trim();
    let lower = s.to_lowercase();

    let (num_str, mult) = if let Some(v) = lower.strip_suffix("ghz") {
        (v.trim(), 1e9)
    } else if let Some(v) = lower.strip_suffix("mhz") {
        (v.trim(), 1e6)
    } else if let Some(v) = lower.strip_suffix("khz") {
        (v.trim(), 1e3)
    } else if let Some(v) = lower.strip_suffix("hz") {
        (v.trim(), 1.0)
    } else {
        (lower.as_str(), 1.0)
    };

    let n: f64 = num_str
        .parse()
        .map_err(|e| format!("Invalid frequency value '{s}': {e}"))?;

    if !n.is_finite() || n < 0.0 {
        return Err(format!("Invalid frequency value '{s}': must be finite and >= 0"));
    }

    Ok(n * mult)
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
