use std::f64::consts::TAU;

use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use wavgen_types::{BurstRecord, IqSample, WavError, WavResult};

use crate::{nco::Nco, symstream::SymbolSource};

/// Запас полосы: центр хопа не подходит к краю диапазона ближе 1.2·bw.
const EDGE_MARGIN: f32 = 1.2;

/// Политика выбора центральной частоты хопа.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopPolicy {
    /// Равномерно случайное смещение в пределах диапазона
    Random,
    /// Линейный проход диапазона один раз за последовательность
    UniformSweep,
    /// Диапазон разбит на `channels` равных слотов
    Channelized { channels: usize, sweep: bool },
}

/// Параметры последовательности хопов.
#[derive(Debug, Clone)]
pub struct HopConfig {
    pub policy: HopPolicy,
    /// Ширина перестраиваемого диапазона (доля частоты дискретизации)
    pub span: f32,
    /// Полоса одного хопа (доля частоты дискретизации)
    pub bandwidth: f32,
    /// Длительность хопа в выборках (включая хвост тишины)
    pub hop_samples: usize,
    /// Хопов в последовательности
    pub num_hops: usize,
    /// Несущая частота радио (Гц), для отчёта
    pub center_freq_hz: f64,
    /// Частота дискретизации (Гц), для отчёта
    pub sample_rate_hz: f64,
    pub seed: Option<u64>,
}

/// Планировщик хопов: выбирает частоту каждого хопа, генерирует его и
/// переносит на нужную частоту.
pub struct HopScheduler<S: SymbolSource> {
    config: HopConfig,
    source: S,
    mixer: Nco,
    rng: StdRng,
}

impl Default for HopConfig {
    fn default() -> Self {
        Self {
            policy: HopPolicy::Random,
            span: 1.0,
            bandwidth: 0.1,
            hop_samples: 4_000,
            num_hops: 16,
            center_freq_hz: 2.46e9,
            sample_rate_hz: 16e6,
            seed: None,
        }
    }
}

impl std::fmt::Display for HopPolicy {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            HopPolicy::Random => write!(f, "random"),
            HopPolicy::UniformSweep => write!(f, "sweep"),
            HopPolicy::Channelized {
                channels,
                sweep: false,
            } => write!(f, "channelized:{channels}"),
            HopPolicy::Channelized {
                channels,
                sweep: true,
            } => write!(f, "channelized-sweep:{channels}"),
        }
    }
}

/// `random`, `sweep`, `channelized:N` или `channelized-sweep:N`.
impl std::str::FromStr for HopPolicy {
    type Err = WavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let (name, channels) = match lower.split_once(':') {
            Some((n, c)) => (n, Some(c)),
            None => (lower.as_str(), None),
        };

        let parse_channels = |c: Option<&str>| -> WavResult<usize> {
            let c = c.ok_or_else(|| WavError::config(format!("'{s}': missing channel count")))?;
            match c.parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(WavError::config(format!("'{s}': invalid channel count '{c}'"))),
            }
        };

        match name {
            "random" | "rand" => Ok(HopPolicy::Random),
            "sweep" | "uniform" => Ok(HopPolicy::UniformSweep),
            "channelized" | "chan" => Ok(HopPolicy::Channelized {
                channels: parse_channels(channels)?,
                sweep: false,
            }),
            "channelized-sweep" | "chan-sweep" => Ok(HopPolicy::Channelized {
                channels: parse_channels(channels)?,
                sweep: true,
            }),
            _ => Err(WavError::config(format!(
                "Unknown hop policy '{s}'. Use: random, sweep, channelized:N, channelized-sweep:N"
            ))),
        }
    }
}

impl HopConfig {
    pub fn validate(&self) -> WavResult<()> {
        if !(self.span > 0.0 && self.span <= 1.0) {
            return Err(WavError::config(format!(
                "hop span must be in (0, 1], got {}",
                self.span
            )));
        }

        if !(self.bandwidth > 0.0 && self.bandwidth <= 1.0) {
            return Err(WavError::config(format!(
                "hop bandwidth must be in (0, 1], got {}",
                self.bandwidth
            )));
        }

        if self.hop_samples == 0 || self.num_hops == 0 {
            return Err(WavError::config("hop length and hop count must be > 0"));
        }

        if let HopPolicy::Channelized { channels: 0, .. } = self.policy {
            return Err(WavError::config("channelized policy needs at least one channel"));
        }

        if self.sample_rate_hz <= 0.0 {
            return Err(WavError::config("sample rate must be > 0"));
        }

        Ok(())
    }

    /// Общая длина буфера последовательности.
    pub fn sequence_len(&self) -> usize {
        self.hop_samples * self.num_hops
    }
}

////////////////////////////////////////////////////////////////////////////////
// Смещения частоты
////////////////////////////////////////////////////////////////////////////////

/// Случайное смещение; `u` равномерная величина из `[0, 1)`.
pub fn random_offset(
    span: f32,
    bandwidth: f32,
    u: f32,
) -> f32 {
    span * (1.0 - EDGE_MARGIN * bandwidth) * (u - 0.5)
}

/// Смещение `index`-го хопа из `total` при линейном проходе.
pub fn sweep_offset(
    span: f32,
    bandwidth: f32,
    index: usize,
    total: usize,
) -> f32 {
    span * (1.0 - EDGE_MARGIN * bandwidth) * (index as f32 / total as f32 - 0.5)
}

/// Центр слота `slot` при разбиении `span` на `channels` частей.
pub fn channel_offset(
    slot: usize,
    span: f32,
    channels: usize,
) -> f32 {
    let width = span / channels as f32;
    width * slot as f32 - 0.5 * (span - width)
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<S: SymbolSource> HopScheduler<S> {
    pub fn new(
        config: HopConfig,
        source: S,
    ) -> WavResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let scheduler = Self {
            config,
            source,
            mixer: Nco::default(),
            rng,
        };

        // Слишком короткий хоп: ошибка конфигурации, а не усечение
        scheduler.check_hop_len(scheduler.config.hop_samples)?;

        Ok(scheduler)
    }

    pub fn config(&self) -> &HopConfig {
        &self.config
    }

    /// Выборки тишины, поглощающие задержку фильтра: `ceil(delay + 1.5)`.
    pub fn dead_time(&self) -> usize {
        (self.source.group_delay() + 1.5).ceil() as usize
    }

    /// Активная часть хопа длиной `hop_len`.
    pub fn active_samples(
        &self,
        hop_len: usize,
    ) -> WavResult<usize> {
        self.check_hop_len(hop_len)?;
        Ok(hop_len - 2 * self.dead_time())
    }

    fn check_hop_len(
        &self,
        hop_len: usize,
    ) -> WavResult<()> {
        let required = 2 * self.dead_time();

        if hop_len < required {
            return Err(WavError::HopTooShort {
                requested: hop_len,
                required,
            });
        }

        Ok(())
    }

    /// Смещение частоты `index`-го хопа последовательности из `total`.
    pub fn next_offset(
        &mut self,
        index: usize,
        total: usize,
    ) -> f32 {
        let c = &self.config;

        match c.policy {
            HopPolicy::Random => random_offset(c.span, c.bandwidth, self.rng.gen::<f32>()),
            HopPolicy::UniformSweep => sweep_offset(c.span, c.bandwidth, index, total),
            HopPolicy::Channelized { channels, sweep } => {
                let slot = if sweep {
                    index % channels
                } else {
                    self.rng.gen_range(0..channels)
                };
                channel_offset(slot, c.span, channels)
            }
        }
    }

    /// Генерирует один хоп в `buf`: активная часть с усилением `gain`,
    /// затем `2·dead_time` выборок с нулевым усилением, затем перенос на `fc`.
    pub fn generate_hop(
        &mut self,
        fc: f32,
        gain: f32,
        buf: &mut [IqSample],
    ) -> WavResult<()> {
        let on = self.active_samples(buf.len())?;
        let (active, tail) = buf.split_at_mut(on);

        self.source.set_gain(gain);
        self.source.write_samples(active);
        self.source.set_gain(0.0);
        self.source.write_samples(tail);

        self.mixer.set_frequency(TAU * fc as f64);
        self.mixer.mix_block_up(buf);

        Ok(())
    }

    /// Заполняет `buf` последовательностью из `num_hops` хопов.
    ///
    /// Возвращает записи burst'ов со временем относительно начала буфера.
    pub fn generate_sequence(
        &mut self,
        buf: &mut [IqSample],
        gain: f32,
    ) -> WavResult<Vec<BurstRecord>> {
        let expected = self.config.sequence_len();

        if buf.len() != expected {
            return Err(WavError::BufferLength {
                expected,
                found: buf.len(),
            });
        }

        let hop = self.config.hop_samples;
        let total = self.config.num_hops;
        let rate = self.config.sample_rate_hz;
        let mut bursts = Vec::with_capacity(total);

        for (i, chunk) in buf.chunks_exact_mut(hop).enumerate() {
            let fc = self.next_offset(i, total);
            self.generate_hop(fc, gain, chunk)?;

            debug!("hop {i}: fc={fc:+.4} (normalized)");

            bursts.push(BurstRecord::new(
                self.config.center_freq_hz + fc as f64 * rate,
                self.config.bandwidth as f64 * rate,
                (i * hop) as f64 / rate,
                hop as f64 / rate,
                self.source.label(),
            ));
        }

        Ok(bursts)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
