use rustfft::FftPlanner;
use wavgen_core::{channel_offset, HopConfig, HopPolicy, HopScheduler, SymbolStream, SymbolStreamConfig};
use wavgen_types::{IqSample, Modulation, SymbolScheme, IQ_ZERO};

// ===========================================================================
// Helpers
// ===========================================================================

/// Центр масс спектра мощности (доли частоты дискретизации, `[-0.5, 0.5)`).
fn spectral_centroid(samples: &[IqSample]) -> f32 {
    let n = samples.len();
    let mut buf = samples.to_vec();
    FftPlanner::<f32>::new().plan_fft_forward(n).process(&mut buf);

    let (mut acc, mut total) = (0.0f32, 0.0f32);
    for (k, x) in buf.iter().enumerate() {
        let mut f = k as f32 / n as f32;
        if f >= 0.5 {
            f -= 1.0;
        }
        acc += f * x.norm_sqr();
        total += x.norm_sqr();
    }

    acc / total
}

fn narrowband_stream(seed: u64) -> SymbolStream {
    SymbolStream::new(SymbolStreamConfig {
        bandwidth: 0.05,
        scheme: SymbolScheme::Linear(Modulation::Qpsk),
        seed: Some(seed),
        ..Default::default()
    })
    .unwrap()
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn test_channelized_sweep_lands_energy_in_each_channel() {
    let config = HopConfig {
        policy: HopPolicy::Channelized {
            channels: 4,
            sweep: true,
        },
        span: 0.8,
        bandwidth: 0.05,
        hop_samples: 4_096,
        num_hops: 8,
        center_freq_hz: 2.46e9,
        sample_rate_hz: 16e6,
        seed: Some(11),
    };

    let mut scheduler = HopScheduler::new(config.clone(), narrowband_stream(1)).unwrap();
    let active = scheduler.active_samples(config.hop_samples).unwrap();
    let mut buf = vec![IQ_ZERO; config.sequence_len()];

    let bursts = scheduler.generate_sequence(&mut buf, 0.5).unwrap();
    assert_eq!(bursts.len(), 8);

    for (i, hop) in buf.chunks(config.hop_samples).enumerate() {
        let expected = channel_offset(i % 4, 0.8, 4);
        let centroid = spectral_centroid(&hop[..active.min(2_048)]);

        assert!(
            (centroid - expected).abs() < 0.03,
            "hop {i}: centroid {centroid:.4}, expected {expected:.4}"
        );

        // Фильтр успевает отзвучать к последним выборкам хопа
        let tail_power: f32 = hop[config.hop_samples - 3..].iter().map(|x| x.norm_sqr()).sum();
        assert!(tail_power < 1e-12, "hop {i}: tail not silent ({tail_power})");

        // Запись отчёта указывает на ту же частоту
        let fc_hz = config.center_freq_hz + expected as f64 * config.sample_rate_hz;
        assert!((bursts[i].center_frequency - fc_hz).abs() < 1.0);
        assert_eq!(bursts[i].modulation, "qpsk");
    }
}

#[test]
fn test_bursts_are_chronological_and_contiguous() {
    let config = HopConfig {
        policy: HopPolicy::Random,
        span: 1.0,
        bandwidth: 0.1,
        hop_samples: 1_024,
        num_hops: 5,
        center_freq_hz: 915e6,
        sample_rate_hz: 2e6,
        seed: Some(2),
    };

    let mut scheduler = HopScheduler::new(config.clone(), narrowband_stream(4)).unwrap();
    let mut buf = vec![IQ_ZERO; config.sequence_len()];
    let bursts = scheduler.generate_sequence(&mut buf, 0.5).unwrap();

    for w in bursts.windows(2) {
        assert!((w[0].end_time() - w[1].start_time).abs() < 1e-12);
    }
    for b in &bursts {
        assert!((b.center_frequency - 915e6).abs() <= 0.5 * 2e6);
    }
}
