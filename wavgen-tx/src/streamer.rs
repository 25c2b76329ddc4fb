// Цикл передачи: генерирует блоки, помечает первый блок burst'а абсолютным
// временем, проталкивает каждый блок в устройство до полного приёма и
// корректно закрывает передачу по Ctrl+C или по истечении длительности.
//
// Время внутри цикла считается относительно первой выборки сессии: абсолютная
// метка Unix в f64 даёт точность около 0.24 мкс, чего мало для сравнения
// границ блоков. Абсолютные значения появляются только в метках времени
// устройства и в итоговых записях burst'ов.

use std::{
    sync::{atomic::Ordering, Arc},
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use wavgen_core::GainEnvelope;
use wavgen_hal::TxSink;
use wavgen_types::{BurstRecord, IqSample, TxMetadata, IQ_ZERO};

use crate::{
    timeline::wall_clock_secs, BlockSource, CancellationToken, Marker, Timeline, TransferAccount,
    TransmitConfig, TransmitMetrics, TxError, TxResult,
};

/// Шаг ожидания опустошения эфира.
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Состояние цикла передачи.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Радио ещё не настроено
    Idle,
    /// Следующая посылка несёт start-of-burst и метку времени
    Armed,
    /// Блоки идут подряд без флагов
    Streaming,
    /// Устройство приняло блок не полностью, досылается остаток
    Draining,
    /// Отправлен завершающий end-of-burst
    Flushing,
    /// Эфир опустел, радио уведено с рабочей частоты
    Stopped,
}

/// Итог сессии передачи.
#[derive(Debug, Clone)]
pub struct TransmitSummary {
    /// Физически переданные burst'ы, в хронологическом порядке
    pub bursts: Vec<BurstRecord>,
    pub samples_requested: u64,
    pub samples_accepted: u64,
    /// Время выхода в эфир первой выборки (часы радио)
    pub initial_start: f64,
    /// Время окончания последней переданной выборки
    pub on_air_end: f64,
    pub actual_rate_hz: f64,
    /// Остановлено оператором
    pub cancelled: bool,
    pub timeline: Timeline,
}

/// Оркестрирует сессию передачи.
pub struct Transmitter {
    config: TransmitConfig,
    metrics: Arc<TransmitMetrics>,
    cancel: CancellationToken,
    timeline: Timeline,
    state: StreamState,
    flushed: bool,
}

/// Накопитель записей burst'ов; время отсчитывается от первой выборки.
struct BurstLog {
    records: Vec<BurstRecord>,
    tolerance: f64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl TransmitSummary {
    /// Фактическое время в эфире (секунды).
    pub fn time_on_air(&self) -> f64 {
        self.samples_accepted as f64 / self.actual_rate_hz
    }
}

impl Transmitter {
    /// Создаёт передатчик. Конфигурация проверяется здесь, до любых
    /// обращений к радио. Возвращает также shared-ссылку на метрики.
    pub fn new(
        config: TransmitConfig,
        cancel: CancellationToken,
    ) -> TxResult<(Self, Arc<TransmitMetrics>)> {
        config.validate()?;

        let metrics = TransmitMetrics::new();
        let tx = Self {
            config,
            metrics: metrics.clone(),
            cancel,
            timeline: Timeline::new(),
            state: StreamState::Idle,
            flushed: false,
        };

        Ok((tx, metrics))
    }

    pub fn config(&self) -> &TransmitConfig {
        &self.config
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Проводит сессию целиком: настройка радио, передача, завершающий
    /// end-of-burst, ожидание эфира, увод радио. Блокируется до конца.
    ///
    /// Радио уводится с рабочей частоты и при ошибке посередине передачи.
    pub fn run(
        &mut self,
        sink: &mut dyn TxSink,
        source: &mut dyn BlockSource,
    ) -> TxResult<TransmitSummary> {
        if self.state != StreamState::Idle {
            return Err(TxError::config("transmitter session already ran"));
        }

        if source.block_len() == 0 {
            return Err(TxError::config("block source produces empty blocks"));
        }

        let info = sink.info();
        info!(
            "Connecting to {} ({})",
            info.name,
            info.serial.as_deref().unwrap_or("no serial")
        );
        self.timeline.mark(Marker::StartDev);

        let result = match self.setup(sink, source.block_len()) {
            Ok((rate, envelope)) => self.stream(sink, source, rate, envelope),
            Err(e) => Err(e),
        };

        let teardown = self.teardown(sink);
        self.timeline.mark(Marker::StopApp);
        info!("Session timeline:\n{}", self.timeline);

        let mut summary = result?;
        teardown?;

        summary.timeline = self.timeline.clone();
        Ok(summary)
    }

    /// Отправляет завершающий end-of-burst. Повторный вызов ничего не делает.
    pub fn flush(
        &mut self,
        sink: &mut dyn TxSink,
    ) -> TxResult<()> {
        if self.flushed {
            debug!("End-of-burst already sent, ignoring flush");
            return Ok(());
        }

        self.transition(StreamState::Flushing);
        sink.send_end_of_burst()?;
        self.flushed = true;

        Ok(())
    }

    fn transition(
        &mut self,
        next: StreamState,
    ) {
        if self.state != next {
            debug!("{:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Скорость, частота и нулевое усиление; прогревочный end-of-burst;
    /// часы радио; рабочее усиление. Возвращает фактическую скорость и
    /// огибающую усиления, пересчитанную под неё.
    fn setup(
        &mut self,
        sink: &mut dyn TxSink,
        block_len: usize,
    ) -> TxResult<(f64, GainEnvelope)> {
        let cfg = &self.config;

        sink.configure(cfg.sample_rate_hz, cfg.center_freq_hz, 0.0)?;
        sink.send_end_of_burst()?;

        let rate = sink.actual_rate();
        if (rate - cfg.sample_rate_hz).abs() > 1e-3 {
            warn!(
                "Sample rate adjusted by device: requested {} Hz, actual {} Hz",
                cfg.sample_rate_hz, rate
            );
        }

        // На округлённой скорости параметры могли стать недопустимыми;
        // проверяется до рабочего усиления
        cfg.burst_mode.check_fits(rate, block_len)?;
        let envelope = cfg.gain_envelope(rate, block_len)?;

        let now = wall_clock_secs();
        sink.set_clock(now)?;
        self.timeline.set(Marker::StartTx, now);

        sink.set_gain(cfg.gain_db)?;

        info!(
            "Radio ready: {:.3} MHz, {:.3} Msps, gain {:.1} dB",
            cfg.center_freq_hz / 1e6,
            rate / 1e6,
            cfg.gain_db
        );

        Ok((rate, envelope))
    }

    fn teardown(
        &mut self,
        sink: &mut dyn TxSink,
    ) -> TxResult<()> {
        let detune = sink.set_frequency(self.config.park_freq_hz);
        let mute = sink.set_gain(0.0);

        self.transition(StreamState::Stopped);
        debug!(
            "Radio parked at {:.3} MHz, gain 0 dB",
            self.config.park_freq_hz / 1e6
        );

        detune?;
        mute?;
        Ok(())
    }

    fn stream(
        &mut self,
        sink: &mut dyn TxSink,
        source: &mut dyn BlockSource,
        rate: f64,
        mut envelope: GainEnvelope,
    ) -> TxResult<TransmitSummary> {
        let block_len = source.block_len();
        let merge = source.merges_records();

        let mode = self.config.burst_mode;
        let blocks_per_burst = mode.blocks_per_burst(rate, block_len);
        let loop_time = mode.loop_time().unwrap_or(0.0);
        let duration = self.config.duration_secs;
        let center_freq = self.config.center_freq_hz;
        let stats_interval = Duration::from_secs(self.config.stats_interval_secs);

        let mut block = vec![IQ_ZERO; block_len];
        let mut account = TransferAccount::new();
        let mut bursts = BurstLog::new(rate);

        let initial_start = sink.time_now() + self.config.start_margin_secs;
        let mut md = TxMetadata::armed(initial_start);
        // Начало текущего burst'а и принятое в нём (относительно initial_start)
        let mut period_offset = 0.0;
        let mut period_accepted: u64 = 0;
        let mut blocks_in_burst: u64 = 0;
        let mut on_air_end = 0.0;

        self.transition(StreamState::Armed);
        debug!("First sample scheduled at {initial_start:.6}");

        let session = Instant::now();
        let mut last_stats = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                info!("Stop signal received. Flushing...");
                break;
            }

            let gain = envelope.next_gain();
            let segments = source.fill(&mut block, gain)?;

            self.metrics.blocks_generated.fetch_add(1, Ordering::Relaxed);
            self.metrics
                .samples_requested
                .fetch_add(block_len as u64, Ordering::Relaxed);

            let block_offset = period_offset + period_accepted as f64 / rate;
            // Новый burst не продлевает предыдущую запись, даже вплотную к ней
            let opens_burst = md.start_of_burst;
            let sent = self.send_block(sink, &mut block, &mut md, &mut account)?;

            period_accepted += sent as u64;
            if sent > 0 {
                on_air_end = block_offset + sent as f64 / rate;
            }

            for (i, seg) in segments.iter().enumerate() {
                if let Some(b) = place(seg, block_offset, sent, rate, center_freq) {
                    if bursts.push(b, merge && !(opens_burst && i == 0)) {
                        self.metrics.bursts.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }

            if sent < block_len {
                // Остаток блока брошен только после сигнала остановки
                break;
            }

            if let Some(limit) = duration {
                if on_air_end >= limit {
                    info!("Duration limit reached ({limit}s). Flushing...");
                    break;
                }
            }

            if let Some(per_burst) = blocks_per_burst {
                blocks_in_burst += 1;

                if blocks_in_burst >= per_burst {
                    blocks_in_burst = 0;
                    period_offset += loop_time;
                    period_accepted = 0;

                    let tag = initial_start + period_offset;
                    md = TxMetadata::armed(tag);
                    self.transition(StreamState::Armed);

                    // Расписание не сдвигается, только предупреждение
                    let now = sink.time_now();
                    if tag < now {
                        self.metrics.late_bursts.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            "Burst scheduled {:.3}ms in the past, device will start it late",
                            (now - tag) * 1e3
                        );
                    }
                }
            }

            if last_stats.elapsed() >= stats_interval {
                self.log_progress(&session, rate);
                last_stats = Instant::now();
            }
        }

        self.flush(sink)?;
        self.timeline.mark(Marker::StopTx);

        let on_air_end = initial_start + on_air_end;
        if account.samples_accepted() > 0 {
            wait_until(&*sink, on_air_end);
        }
        self.transition(StreamState::Stopped);

        Ok(TransmitSummary {
            bursts: bursts.into_records(initial_start),
            samples_requested: account.samples_requested(),
            samples_accepted: account.samples_accepted(),
            initial_start,
            on_air_end,
            actual_rate_hz: rate,
            cancelled: self.cancel.is_cancelled(),
            timeline: Timeline::default(),
        })
    }

    /// Досылает блок, пока устройство не примет его целиком или не придёт
    /// сигнал остановки. Возвращает число принятых выборок.
    fn send_block(
        &mut self,
        sink: &mut dyn TxSink,
        block: &mut [IqSample],
        md: &mut TxMetadata,
        account: &mut TransferAccount,
    ) -> TxResult<usize> {
        let len = block.len();
        let mut remaining = len;
        account.request(len);

        while remaining > 0 {
            if self.cancel.is_cancelled() {
                debug!("Stop requested while draining, abandoning {remaining} samples");
                break;
            }

            let accepted = sink.send(&block[..remaining], md)?;
            self.metrics.sends.fetch_add(1, Ordering::Relaxed);
            account.accept(remaining, accepted)?;

            if accepted < remaining {
                self.metrics.partial_sends.fetch_add(1, Ordering::Relaxed);
                self.transition(StreamState::Draining);
                debug!("Partial send: {accepted}/{remaining} accepted");
            }

            if accepted == 0 {
                self.metrics.zero_accepts.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            // Флаги начала burst'а приняты железом вместе с первой порцией
            md.disarm();
            block.copy_within(accepted..remaining, 0);
            remaining -= accepted;

            self.metrics
                .samples_accepted
                .fetch_add(accepted as u64, Ordering::Relaxed);
        }

        if remaining == 0 {
            debug_assert!(account.is_settled());
            self.transition(StreamState::Streaming);
        }

        Ok(len - remaining)
    }

    fn log_progress(
        &self,
        start: &Instant,
        rate: f64,
    ) {
        let m = &self.metrics;
        let accepted = m.samples_accepted.load(Ordering::Relaxed);

        info!(
            "[ {:.0}s ] on-air={:.1}s samples={} sends={} partial={} ({:.2}%) bursts={}",
            start.elapsed().as_secs_f64(),
            accepted as f64 / rate,
            accepted,
            m.sends.load(Ordering::Relaxed),
            m.partial_sends.load(Ordering::Relaxed),
            m.partial_rate_pct(),
            m.bursts.load(Ordering::Relaxed),
        );
    }
}

impl BurstLog {
    fn new(rate: f64) -> Self {
        Self {
            records: Vec::new(),
            tolerance: 0.5 / rate,
        }
    }

    /// Добавляет запись или продлевает предыдущую, если она смежная и
    /// совпадает по частоте, полосе и модуляции. `true`, если это новая запись.
    fn push(
        &mut self,
        burst: BurstRecord,
        merge: bool,
    ) -> bool {
        if merge {
            if let Some(last) = self.records.last_mut() {
                let same = last.center_frequency == burst.center_frequency
                    && last.bandwidth == burst.bandwidth
                    && last.modulation == burst.modulation;

                if same && (burst.start_time - last.end_time()).abs() < self.tolerance {
                    last.duration = burst.end_time() - last.start_time;
                    return false;
                }
            }
        }

        self.records.push(burst);
        true
    }

    fn into_records(
        self,
        initial_start: f64,
    ) -> Vec<BurstRecord> {
        self.records
            .iter()
            .map(|b| b.shifted(initial_start))
            .collect()
    }
}

/// Переводит нормированную запись источника в секунды и герцы, обрезая её
/// по фактически принятой части блока.
fn place(
    seg: &BurstRecord,
    block_offset: f64,
    sent: usize,
    rate: f64,
    center_freq: f64,
) -> Option<BurstRecord> {
    let sent = sent as f64;

    if seg.start_time >= sent {
        return None;
    }

    let seg = seg.truncated(sent - seg.start_time);

    Some(BurstRecord::new(
        center_freq + seg.center_frequency * rate,
        seg.bandwidth * rate,
        block_offset + seg.start_time / rate,
        seg.duration / rate,
        seg.modulation,
    ))
}

/// Ждёт, пока часы радио не дойдут до `until`.
fn wait_until(
    sink: &dyn TxSink,
    until: f64,
) {
    loop {
        let left = until - sink.time_now();

        if left <= 0.0 {
            break;
        }

        thread::sleep(DRAIN_POLL.min(Duration::from_secs_f64(left)));
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
