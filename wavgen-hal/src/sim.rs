// Программный радиотракт: честно отрабатывает метки времени, частичный приём
// и темп реального времени, так что streamer видит почти то же, что с
// настоящего USRP. Сценарий приёма (`with_accepts`) позволяет воспроизвести
// backpressure железа в тестах, monitor-канал отдаёт принятые выборки.

use std::{
    collections::VecDeque,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Sender, TrySendError};
use log::{debug, warn};
use wavgen_types::{IqSample, TxMetadata};

use crate::{HalError, HalResult, SinkInfo, TxSink};

pub const MIN_FREQ_HZ: f64 = 10e6;
pub const MAX_FREQ_HZ: f64 = 6e9;
pub const MAX_RATE_HZ: f64 = 61.44e6;
pub const MAX_GAIN_DB: f64 = 90.0;

/// Одна посылка, как её увидело устройство.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SendRecord {
    pub offered: usize,
    pub accepted: usize,
    pub metadata: TxMetadata,
}

/// Симулятор передающего тракта.
pub struct SimulatedSink {
    /// Блокировать `send`, пока буфер устройства опережает эфир
    pub realtime: bool,
    /// Глубина буфера устройства (секунды эфира)
    pub buffer_secs: f64,
    /// Максимум выборок, принимаемых за один вызов
    pub max_accept: Option<usize>,
    /// Шаг сетки достижимых частот дискретизации
    pub rate_step: Option<f64>,
    actual_rate: f64,
    center_freq_hz: f64,
    gain_db: f64,
    clock_base: f64,
    clock_epoch: Instant,
    /// Время выхода в эфир следующей принятой выборки (None: burst закрыт)
    stream_time: Option<f64>,
    script: VecDeque<usize>,
    monitor: Option<Sender<Vec<IqSample>>>,
    sends: Vec<SendRecord>,
    late_bursts: u64,
    eob_count: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SimulatedSink {
    pub fn new() -> Self {
        Self {
            realtime: true,
            buffer_secs: 0.1,
            max_accept: None,
            rate_step: None,
            actual_rate: 0.0,
            center_freq_hz: MAX_FREQ_HZ,
            gain_db: 0.0,
            clock_base: 0.0,
            clock_epoch: Instant::now(),
            stream_time: None,
            script: VecDeque::new(),
            monitor: None,
            sends: Vec::new(),
            late_bursts: 0,
            eob_count: 0,
        }
    }

    /// Сценарий приёма: `n`-й непустой `send` вернёт `n`-е значение как есть
    /// (в том числе ноль или больше предложенного). После исчерпания
    /// сценария устройство принимает всё, с учётом `max_accept`.
    pub fn with_accepts<I: IntoIterator<Item = usize>>(
        mut self,
        accepts: I,
    ) -> Self {
        self.script.extend(accepts);
        self
    }

    /// Канал, в который копируется каждая принятая порция выборок.
    pub fn with_monitor(
        mut self,
        tx: Sender<Vec<IqSample>>,
    ) -> Self {
        self.monitor = Some(tx);
        self
    }

    /// Без темпа реального времени: `send` никогда не спит.
    pub fn unpaced(mut self) -> Self {
        self.realtime = false;
        self
    }

    pub fn sends(&self) -> &[SendRecord] {
        &self.sends
    }

    pub fn eob_count(&self) -> u64 {
        self.eob_count
    }

    /// Burst'ы, метка времени которых оказалась в прошлом.
    pub fn late_bursts(&self) -> u64 {
        self.late_bursts
    }

    pub fn samples_accepted(&self) -> u64 {
        self.sends.iter().map(|s| s.accepted as u64).sum()
    }

    pub fn center_freq_hz(&self) -> f64 {
        self.center_freq_hz
    }

    pub fn gain_db(&self) -> f64 {
        self.gain_db
    }

    fn decide_accept(
        &mut self,
        offered: usize,
    ) -> usize {
        if offered == 0 {
            return 0;
        }

        match self.script.pop_front() {
            Some(n) => n,
            None => self.max_accept.map_or(offered, |cap| cap.min(offered)),
        }
    }

    fn open_burst(
        &mut self,
        md: &TxMetadata,
    ) -> f64 {
        let now = self.time_now();

        if !md.has_time_spec {
            return self.stream_time.unwrap_or(now).max(now);
        }

        if md.time_spec < now {
            self.late_bursts += 1;
            warn!(
                "Late burst: time spec {:.6}s is {:.3}ms in the past",
                md.time_spec,
                (now - md.time_spec) * 1e3
            );
            now
        } else {
            md.time_spec
        }
    }

    fn tap(
        &mut self,
        samples: &[IqSample],
    ) {
        let Some(tx) = &self.monitor else {
            return;
        };

        match tx.try_send(samples.to_vec()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("Monitor channel full, {} samples not mirrored", samples.len()),
            Err(TrySendError::Disconnected(_)) => self.monitor = None,
        }
    }

    fn pace(&self) {
        let Some(stream_time) = self.stream_time else {
            return;
        };

        let ahead = stream_time - self.time_now() - self.buffer_secs;

        if self.realtime && ahead > 0.0 {
            thread::sleep(Duration::from_secs_f64(ahead));
        }
    }
}

impl Default for SimulatedSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TxSink for SimulatedSink {
    fn info(&self) -> SinkInfo {
        SinkInfo {
            name: "Simulated TX".to_string(),
            serial: Some("SIM-TX-0001".to_string()),
            sample_rate_hz: self.actual_rate,
            center_freq_hz: self.center_freq_hz,
            gain_db: self.gain_db,
        }
    }

    fn set_rate(
        &mut self,
        rate_hz: f64,
    ) -> HalResult<()> {
        if !(rate_hz > 0.0 && rate_hz <= MAX_RATE_HZ) {
            return Err(HalError::tuning(format!(
                "sample rate {rate_hz} Hz outside (0, {MAX_RATE_HZ}]"
            )));
        }

        self.actual_rate = match self.rate_step {
            Some(step) => (rate_hz / step).round().max(1.0) * step,
            None => rate_hz,
        };

        debug!("TX rate requested {rate_hz} Hz, actual {} Hz", self.actual_rate);
        Ok(())
    }

    fn actual_rate(&self) -> f64 {
        self.actual_rate
    }

    fn set_frequency(
        &mut self,
        freq_hz: f64,
    ) -> HalResult<()> {
        if !(MIN_FREQ_HZ..=MAX_FREQ_HZ).contains(&freq_hz) {
            return Err(HalError::tuning(format!(
                "frequency {freq_hz} Hz outside [{MIN_FREQ_HZ}, {MAX_FREQ_HZ}]"
            )));
        }

        self.center_freq_hz = freq_hz;
        Ok(())
    }

    fn set_gain(
        &mut self,
        gain_db: f64,
    ) -> HalResult<()> {
        if !(0.0..=MAX_GAIN_DB).contains(&gain_db) {
            return Err(HalError::tuning(format!(
                "gain {gain_db} dB outside [0, {MAX_GAIN_DB}]"
            )));
        }

        self.gain_db = gain_db;
        Ok(())
    }

    fn set_clock(
        &mut self,
        time: f64,
    ) -> HalResult<()> {
        self.clock_base = time;
        self.clock_epoch = Instant::now();
        self.stream_time = None;
        Ok(())
    }

    fn time_now(&self) -> f64 {
        self.clock_base + self.clock_epoch.elapsed().as_secs_f64()
    }

    fn send(
        &mut self,
        samples: &[IqSample],
        md: &TxMetadata,
    ) -> HalResult<usize> {
        if self.actual_rate <= 0.0 {
            return Err(HalError::device("send before sample rate was configured"));
        }

        let offered = samples.len();
        let accepted = self.decide_accept(offered);

        if accepted > 0 {
            if md.start_of_burst || self.stream_time.is_none() {
                self.stream_time = Some(self.open_burst(md));
            }

            self.tap(&samples[..accepted.min(offered)]);

            if let Some(t) = self.stream_time.as_mut() {
                *t += accepted as f64 / self.actual_rate;
            }
            self.pace();
        }

        if md.end_of_burst {
            self.eob_count += 1;
            self.stream_time = None;
        }

        self.sends.push(SendRecord {
            offered,
            accepted,
            metadata: *md,
        });

        Ok(accepted)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use wavgen_types::IQ_ZERO;

    use super::*;

    fn configured() -> SimulatedSink {
        let mut sink = SimulatedSink::new().unpaced();
        sink.configure(1e6, 915e6, 0.0).unwrap();
        sink
    }

    #[test]
    fn test_rate_snaps_to_grid() {
        let mut sink = SimulatedSink::new();
        sink.rate_step = Some(250e3);

        sink.set_rate(1.1e6).unwrap();
        assert_abs_diff_eq!(sink.actual_rate(), 1.0e6, epsilon = 1e-6);

        sink.set_rate(10.0).unwrap();
        assert_abs_diff_eq!(sink.actual_rate(), 250e3, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_tuning_rejected() {
        let mut sink = SimulatedSink::new();

        assert!(matches!(sink.set_rate(0.0), Err(HalError::InvalidTuning(_))));
        assert!(matches!(sink.set_frequency(1e3), Err(HalError::InvalidTuning(_))));
        assert!(matches!(sink.set_gain(-1.0), Err(HalError::InvalidTuning(_))));
        assert!(sink.set_frequency(MAX_FREQ_HZ).is_ok());
    }

    #[test]
    fn test_send_requires_rate() {
        let mut sink = SimulatedSink::new().unpaced();
        let buf = vec![IQ_ZERO; 10];

        assert!(matches!(
            sink.send(&buf, &TxMetadata::streaming()),
            Err(HalError::Device(_))
        ));
    }

    #[test]
    fn test_scripted_accepts_then_full() {
        let mut sink = configured().with_accepts([3, 0]);
        let buf = vec![IQ_ZERO; 10];
        let md = TxMetadata::streaming();

        assert_eq!(sink.send(&buf, &md).unwrap(), 3);
        assert_eq!(sink.send(&buf, &md).unwrap(), 0);
        assert_eq!(sink.send(&buf, &md).unwrap(), 10);
        assert_eq!(sink.samples_accepted(), 13);
        assert_eq!(sink.sends().len(), 3);
    }

    #[test]
    fn test_zero_length_send_keeps_script() {
        let mut sink = configured().with_accepts([4]);

        sink.send_end_of_burst().unwrap();
        assert_eq!(sink.eob_count(), 1);

        let buf = vec![IQ_ZERO; 10];
        assert_eq!(sink.send(&buf, &TxMetadata::streaming()).unwrap(), 4);
    }

    #[test]
    fn test_max_accept_caps_each_call() {
        let mut sink = configured();
        sink.max_accept = Some(64);
        let buf = vec![IQ_ZERO; 100];

        assert_eq!(sink.send(&buf, &TxMetadata::streaming()).unwrap(), 64);
        assert_eq!(sink.send(&buf[..10], &TxMetadata::streaming()).unwrap(), 10);
    }

    #[test]
    fn test_monitor_sees_accepted_prefix() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut sink = configured().with_accepts([2]).with_monitor(tx);
        let buf: Vec<IqSample> = (0..5).map(|i| IqSample::new(i as f32, 0.0)).collect();

        sink.send(&buf, &TxMetadata::armed(0.0)).unwrap();
        sink.send(&buf[2..], &TxMetadata::streaming()).unwrap();

        let seen: Vec<f32> = rx.try_iter().flatten().map(|s| s.re).collect();
        assert_eq!(seen, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_clock_and_late_bursts() {
        let mut sink = configured();
        sink.set_clock(100.0).unwrap();

        let now = sink.time_now();
        assert!((100.0..101.0).contains(&now));

        let buf = vec![IQ_ZERO; 8];
        sink.send(&buf, &TxMetadata::armed(50.0)).unwrap();
        assert_eq!(sink.late_bursts(), 1);

        sink.send_end_of_burst().unwrap();
        sink.send(&buf, &TxMetadata::armed(now + 10.0)).unwrap();
        assert_eq!(sink.late_bursts(), 1);
    }

    #[test]
    fn test_realtime_pacing_blocks() {
        let mut sink = SimulatedSink::new();
        sink.buffer_secs = 0.0;
        sink.set_rate(1e6).unwrap();

        let buf = vec![IQ_ZERO; 20_000];
        let start = Instant::now();

        for _ in 0..3 {
            sink.send(&buf, &TxMetadata::streaming()).unwrap();
        }

        // 60 000 выборок при 1 Msps = 60 мс эфира
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
