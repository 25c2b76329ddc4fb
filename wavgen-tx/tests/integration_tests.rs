use approx::assert_abs_diff_eq;
use wavgen_core::HopPolicy;
use wavgen_hal::{HalResult, SimulatedSink, SinkInfo, TxSink};
use wavgen_tx::{
    build_report, create_source, BlockSource, BurstMode, CancellationToken, Marker, ReportDocument,
    TransmitConfig, Transmitter, TxResult, Waveform,
};
use wavgen_types::{BurstRecord, IqSample, Modulation, SymbolScheme, TxMetadata};

/// Источник-счётчик: каждая выборка хранит свой порядковый номер.
struct RampSource {
    next: u32,
    block_len: usize,
}

impl BlockSource for RampSource {
    fn block_len(&self) -> usize {
        self.block_len
    }

    fn fill(
        &mut self,
        block: &mut [IqSample],
        _gain: f32,
    ) -> TxResult<Vec<BurstRecord>> {
        for s in block.iter_mut() {
            *s = IqSample::new(self.next as f32, 0.0);
            self.next += 1;
        }

        Ok(vec![BurstRecord::new(0.0, 0.2, 0.0, block.len() as f64, "ramp")])
    }
}

/// Радио, которое после `budget` выборок перестаёт принимать данные
/// и в этот момент «нажимает Ctrl+C».
struct StallingSink {
    inner: SimulatedSink,
    budget: usize,
    token: CancellationToken,
}

impl TxSink for StallingSink {
    fn info(&self) -> SinkInfo {
        self.inner.info()
    }

    fn set_rate(
        &mut self,
        rate_hz: f64,
    ) -> HalResult<()> {
        self.inner.set_rate(rate_hz)
    }

    fn actual_rate(&self) -> f64 {
        self.inner.actual_rate()
    }

    fn set_frequency(
        &mut self,
        freq_hz: f64,
    ) -> HalResult<()> {
        self.inner.set_frequency(freq_hz)
    }

    fn set_gain(
        &mut self,
        gain_db: f64,
    ) -> HalResult<()> {
        self.inner.set_gain(gain_db)
    }

    fn set_clock(
        &mut self,
        time: f64,
    ) -> HalResult<()> {
        self.inner.set_clock(time)
    }

    fn time_now(&self) -> f64 {
        self.inner.time_now()
    }

    fn send(
        &mut self,
        samples: &[IqSample],
        md: &TxMetadata,
    ) -> HalResult<usize> {
        if samples.is_empty() {
            return self.inner.send(samples, md);
        }

        let n = samples.len().min(self.budget);
        if n == 0 {
            self.token.cancel();
            return Ok(0);
        }

        let accepted = self.inner.send(&samples[..n], md)?;
        self.budget -= accepted;
        Ok(accepted)
    }
}

fn base_config() -> TransmitConfig {
    TransmitConfig {
        center_freq_hz: 2.46e9,
        sample_rate_hz: 1e6,
        gain_db: 40.0,
        start_margin_secs: 0.01,
        stats_interval_secs: 3_600,
        seed: Some(42),
        ..Default::default()
    }
}

#[test]
fn test_linmod_bounded_duration() {
    let config = TransmitConfig {
        duration_secs: Some(0.01),
        ..base_config()
    };
    let mut source = create_source(&config).unwrap();
    let mut sink = SimulatedSink::new().unpaced();
    let (mut tx, metrics) = Transmitter::new(config, CancellationToken::new()).unwrap();

    let summary = tx.run(&mut sink, source.as_mut()).unwrap();

    // 13 блоков по 800 выборок: первое превышение 10 мс
    assert_eq!(metrics.summary(&std::time::Instant::now()).blocks_generated, 13);
    assert_eq!(summary.samples_accepted, 10_400);
    assert_eq!(sink.samples_accepted(), 10_400);
    assert!(!summary.cancelled);

    assert_eq!(summary.bursts.len(), 1);
    let b = &summary.bursts[0];
    assert_abs_diff_eq!(b.start_time, summary.initial_start, epsilon = 1e-6);
    assert_abs_diff_eq!(b.duration, 0.0104, epsilon = 1e-9);
    assert_abs_diff_eq!(b.center_frequency, 2.46e9, epsilon = 1e-3);
    assert_abs_diff_eq!(b.bandwidth, 0.7e6, epsilon = 1.0);
    assert_eq!(b.modulation, "qpsk");

    // Эфир опустел до увода радио
    assert!(sink.time_now() >= summary.on_air_end);
    assert_eq!(sink.center_freq_hz(), 6e9);
    assert_eq!(sink.gain_db(), 0.0);
}

#[test]
fn test_stall_then_cancel_abandons_remainder() {
    let token = CancellationToken::new();
    let (monitor, rx) = crossbeam_channel::unbounded();
    let mut sink = StallingSink {
        inner: SimulatedSink::new().unpaced().with_monitor(monitor),
        budget: 1_500,
        token: token.clone(),
    };
    let (mut tx, _) = Transmitter::new(base_config(), token).unwrap();

    let summary = tx
        .run(
            &mut sink,
            &mut RampSource {
                next: 0,
                block_len: 1_000,
            },
        )
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.samples_requested, 2_000);
    assert_eq!(summary.samples_accepted, 1_500);

    let sent: Vec<u32> = rx.try_iter().flatten().map(|s| s.re as u32).collect();
    assert_eq!(sent, (0..1_500).collect::<Vec<u32>>());

    // Запись обрезана по фактически принятому
    assert_eq!(summary.bursts.len(), 1);
    assert_abs_diff_eq!(summary.bursts[0].duration, 1.5e-3, epsilon = 1e-9);
    assert_abs_diff_eq!(summary.bursts[0].bandwidth, 0.2e6, epsilon = 1e-3);

    // Завершающий end-of-burst всё равно ушёл
    assert_eq!(sink.inner.eob_count(), 2);
    assert_eq!(sink.inner.center_freq_hz(), 6e9);
}

#[test]
fn test_hop_sequences_are_reported_in_order() {
    let config = TransmitConfig {
        waveform: Waveform::Hop {
            policy: HopPolicy::Channelized {
                channels: 4,
                sweep: true,
            },
            span: 0.8,
            bandwidth: 0.1,
            hop_samples: 1_000,
            num_hops: 4,
            scheme: SymbolScheme::Linear(Modulation::Bpsk),
        },
        duration_secs: Some(0.006),
        ..base_config()
    };
    let mut source = create_source(&config).unwrap();
    let mut sink = SimulatedSink::new().unpaced();
    let (mut tx, _) = Transmitter::new(config, CancellationToken::new()).unwrap();

    let summary = tx.run(&mut sink, source.as_mut()).unwrap();

    // Две последовательности по 4 хопа, хопы не склеиваются
    assert_eq!(summary.samples_accepted, 8_000);
    assert_eq!(summary.bursts.len(), 8);

    for pair in summary.bursts.windows(2) {
        assert_abs_diff_eq!(pair[1].start_time, pair[0].end_time(), epsilon = 1e-6);
    }

    for b in &summary.bursts {
        assert!((b.center_frequency - 2.46e9).abs() <= 0.4e6 + 1.0);
        assert_abs_diff_eq!(b.bandwidth, 0.1e6, epsilon = 1.0);
        assert_abs_diff_eq!(b.duration, 1e-3, epsilon = 1e-9);
        assert_eq!(b.modulation, "bpsk");
    }

    // Sweep по каналам: четыре разные частоты в каждой последовательности
    let first: Vec<f64> = summary.bursts[..4].iter().map(|b| b.center_frequency).collect();
    for i in 0..4 {
        for j in (i + 1)..4 {
            assert!((first[i] - first[j]).abs() > 1e3);
        }
    }
}

#[test]
fn test_wideband_report_end_to_end() {
    let config = TransmitConfig {
        waveform: Waveform::Wideband {
            nfft: 64,
            cplen: 0,
            workers: 2,
            bandwidth: 0.8,
        },
        burst_mode: BurstMode::Discrete {
            dwell_secs: 0.0005,
            squelch_secs: 0.0005,
        },
        duration_secs: Some(0.0035),
        start_margin_secs: 0.05,
        ..base_config()
    };
    let mut source = create_source(&config).unwrap();
    let mut sink = SimulatedSink::new().unpaced();
    let (mut tx, _) = Transmitter::new(config.clone(), CancellationToken::new()).unwrap();

    let summary = tx.run(&mut sink, source.as_mut()).unwrap();
    assert_eq!(summary.bursts.len(), 4);
    assert_eq!(sink.late_bursts(), 0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activity.json");
    let report = build_report(&path, &config, &summary, "wavgen-tx wbofdm").unwrap();
    let written = report.finalize().unwrap();
    assert_eq!(written, path);

    let text = std::fs::read_to_string(&path).unwrap();
    let doc: ReportDocument = serde_json::from_str(&text).unwrap();

    assert_eq!(doc.metadata.activity_type, "lowprob_anomaly");
    assert_eq!(doc.metadata.protocol, "unknown");
    assert_eq!(doc.metadata.modality, "multi_carrier");
    assert_eq!(doc.metadata.modulation, "ofdm");
    assert_eq!(doc.metadata.device_origin, "type=sim");
    assert_eq!(doc.metadata.misc["command"], "wavgen-tx wbofdm");
    assert_eq!(doc.metadata.misc["waveform"], "wbofdm");
    for m in Marker::ALL {
        assert!(doc.metadata.misc.contains_key(m.key()), "{} missing", m.key());
    }

    assert_eq!(doc.bursts.len(), 4);
    for (k, b) in doc.bursts.iter().enumerate() {
        assert_abs_diff_eq!(b.start_time, summary.initial_start + k as f64 * 1e-3, epsilon = 1e-6);
        assert_abs_diff_eq!(b.duration, 512e-6, epsilon = 1e-9);
        assert_abs_diff_eq!(b.bandwidth, 0.8e6, epsilon = 1.0);
        assert_eq!(b.modulation, "ofdm");
    }

    let t = &summary.timeline;
    let start_tx = t.get(Marker::StartTx).unwrap();
    let stop_tx = t.get(Marker::StopTx).unwrap();
    assert!(start_tx <= stop_tx);
}

#[test]
fn test_invalid_config_never_touches_radio() {
    let config = TransmitConfig {
        gain_cycle_secs: 0.0,
        ..base_config()
    };

    assert!(Transmitter::new(config, CancellationToken::new()).is_err());
}
