// Адаптеры генераторов wavgen-core к циклу передачи. Каждый источник
// заполняет блок фиксированной длины и описывает, что в нём лежит, записями
// burst'ов в нормированных единицах: частоты в долях частоты дискретизации
// (смещение от несущей), время в выборках от начала блока. Абсолютные
// значения проставляет streamer, когда знает фактическую скорость и время
// выхода блока в эфир.

use log::debug;
use wavgen_core::{HopConfig, HopScheduler, SymbolSource, SymbolStream, SymbolStreamConfig, WidebandSynth};
use wavgen_types::{BurstRecord, IqSample};

use crate::{TransmitConfig, TxResult, Waveform};

/// Генератор блоков для [`crate::Transmitter`].
pub trait BlockSource: Send {
    /// Длина блока (выборки).
    fn block_len(&self) -> usize;

    /// Заполняет `block` с программным усилением `gain`.
    ///
    /// Возвращает описание содержимого блока в нормированных единицах.
    fn fill(
        &mut self,
        block: &mut [IqSample],
        gain: f32,
    ) -> TxResult<Vec<BurstRecord>>;

    /// Можно ли склеивать смежные одинаковые записи соседних блоков
    /// в один burst.
    fn merges_records(&self) -> bool {
        true
    }
}

/// Непрерывная линейная модуляция или шум.
pub struct LinModSource {
    stream: SymbolStream,
    bandwidth: f32,
    block_len: usize,
}

/// Широкополосный многонесущий шум.
pub struct WidebandSource {
    synth: WidebandSynth,
    bandwidth: f32,
}

/// Последовательности хопов, по одной на блок.
pub struct HopSource {
    scheduler: HopScheduler<SymbolStream>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl LinModSource {
    pub fn new(
        config: SymbolStreamConfig,
        block_len: usize,
    ) -> TxResult<Self> {
        let bandwidth = config.bandwidth;

        Ok(Self {
            stream: SymbolStream::new(config)?,
            bandwidth,
            block_len,
        })
    }
}

impl WidebandSource {
    pub fn new(
        synth: WidebandSynth,
        bandwidth: f32,
    ) -> Self {
        Self { synth, bandwidth }
    }
}

impl HopSource {
    /// `config` задаётся в нормированных единицах: несущая 0, скорость 1.
    pub fn new(
        config: HopConfig,
        stream: SymbolStream,
    ) -> TxResult<Self> {
        let config = HopConfig {
            center_freq_hz: 0.0,
            sample_rate_hz: 1.0,
            ..config
        };

        Ok(Self {
            scheduler: HopScheduler::new(config, stream)?,
        })
    }
}

impl BlockSource for LinModSource {
    fn block_len(&self) -> usize {
        self.block_len
    }

    fn fill(
        &mut self,
        block: &mut [IqSample],
        gain: f32,
    ) -> TxResult<Vec<BurstRecord>> {
        self.stream.set_gain(gain);
        self.stream.write_samples(block);

        Ok(vec![BurstRecord::new(
            0.0,
            self.bandwidth as f64,
            0.0,
            block.len() as f64,
            self.stream.label(),
        )])
    }
}

impl BlockSource for WidebandSource {
    fn block_len(&self) -> usize {
        self.synth.buf_len()
    }

    fn fill(
        &mut self,
        block: &mut [IqSample],
        gain: f32,
    ) -> TxResult<Vec<BurstRecord>> {
        self.synth.generate(block)?;
        block.iter_mut().for_each(|s| *s *= gain);

        Ok(vec![BurstRecord::new(
            0.0,
            self.bandwidth as f64,
            0.0,
            block.len() as f64,
            "ofdm",
        )])
    }
}

impl BlockSource for HopSource {
    fn block_len(&self) -> usize {
        self.scheduler.config().sequence_len()
    }

    fn fill(
        &mut self,
        block: &mut [IqSample],
        gain: f32,
    ) -> TxResult<Vec<BurstRecord>> {
        Ok(self.scheduler.generate_sequence(block, gain)?)
    }

    fn merges_records(&self) -> bool {
        false
    }
}

/// Создаёт источник по конфигурации.
///
/// Вызывается до настройки радио, поэтому ошибки конфигурации генератора
/// (короткий хоп, неверный фильтр) не затрагивают устройство.
pub fn create_source(config: &TransmitConfig) -> TxResult<Box<dyn BlockSource>> {
    match &config.waveform {
        Waveform::LinMod {
            bandwidth,
            scheme,
            filter,
            block_len,
        } => {
            let stream = SymbolStreamConfig {
                filter: *filter,
                bandwidth: *bandwidth,
                scheme: *scheme,
                seed: config.seed,
                ..Default::default()
            };
            debug!("Linear modulation source: {scheme}, bw={bandwidth}, block={block_len}");
            Ok(Box::new(LinModSource::new(stream, *block_len)?))
        }
        Waveform::Wideband {
            nfft,
            cplen,
            workers,
            bandwidth,
        } => {
            let synth = WidebandSynth::new(*nfft, *cplen, *workers, config.seed)?;
            Ok(Box::new(WidebandSource::new(synth, *bandwidth)))
        }
        Waveform::Hop {
            policy,
            span,
            bandwidth,
            hop_samples,
            num_hops,
            scheme,
        } => {
            let stream = SymbolStream::new(SymbolStreamConfig {
                bandwidth: *bandwidth,
                scheme: *scheme,
                seed: config.seed,
                ..Default::default()
            })?;
            let hops = HopConfig {
                policy: *policy,
                span: *span,
                bandwidth: *bandwidth,
                hop_samples: *hop_samples,
                num_hops: *num_hops,
                seed: config.seed.map(|s| s ^ 0x5eed),
                ..Default::default()
            };
            debug!("Hop source: {policy}, {num_hops} x {hop_samples} samples");
            Ok(Box::new(HopSource::new(hops, stream)?))
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
