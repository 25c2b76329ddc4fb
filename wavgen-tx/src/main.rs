use std::{path::PathBuf, time::Instant};

use clap::{Args, Parser, Subcommand};
use log::{error, info, warn, LevelFilter};
use wavgen_core::HopPolicy;
use wavgen_hal::{create_sink, SinkKind};
use wavgen_tx::{
    build_report, create_source, parse_freq_hz, BurstMode, CancellationToken, TransmitConfig,
    Transmitter, Waveform,
};
use wavgen_types::{FilterType, SymbolScheme};

#[derive(Parser, Debug)]
#[command(
    name = "wavgen-tx",
    version = env!("CARGO_PKG_VERSION"),
    about = "Generate waveforms and stream them to an SDR transmitter",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Непрерывная линейная модуляция или шум с циклом усиления
    Linmod {
        /// Модуляция: bpsk, qpsk, psk8, psk16, ask4, qam16, qam64, noise
        #[arg(short, long, default_value = "qpsk")]
        modulation: String,
        /// Полоса как доля частоты дискретизации (0, 1]
        #[arg(short, long, default_value = "0.7")]
        bandwidth: f32,
        /// Формирующий фильтр: rrc, rcos
        #[arg(long, default_value = "rrc")]
        filter: String,
        /// Выборок в блоке передачи
        #[arg(long, default_value = "800")]
        block_len: usize,
    },
    /// Широкополосный многонесущий шум, дискретные burst'ы
    Wbofdm {
        /// Размер FFT одной полосы
        #[arg(long, default_value = "2400")]
        nfft: usize,
        /// Длина циклического префикса (пока не поддерживается)
        #[arg(long, default_value = "0")]
        cplen: usize,
        /// Число параллельных полос
        #[arg(long, default_value = "16")]
        workers: usize,
        /// Занятая полоса для отчёта, доля частоты дискретизации
        #[arg(short, long, default_value = "0.8")]
        bandwidth: f32,
        /// Длительность burst'а (секунды)
        #[arg(long, default_value = "0.5")]
        dwell: f64,
        /// Пауза между burst'ами (секунды)
        #[arg(long, default_value = "0.5")]
        squelch: f64,
    },
    /// Последовательности хопов по частоте
    Hop {
        /// Политика: random, sweep, channelized:N, channelized-sweep:N
        #[arg(short, long, default_value = "random")]
        policy: String,
        /// Охват по частоте, доля частоты дискретизации
        #[arg(long, default_value = "0.8")]
        span: f32,
        /// Полоса хопа, доля частоты дискретизации
        #[arg(short, long, default_value = "0.05")]
        bandwidth: f32,
        /// Выборок на хоп
        #[arg(long, default_value = "4096")]
        hop_samples: usize,
        /// Хопов в последовательности
        #[arg(long, default_value = "16")]
        num_hops: usize,
        /// Модуляция хопа
        #[arg(short, long, default_value = "qpsk")]
        modulation: String,
        /// Длительность burst'а (секунды); вместе с --squelch включает дискретный режим
        #[arg(long, requires = "squelch")]
        dwell: Option<f64>,
        /// Пауза между burst'ами (секунды)
        #[arg(long, requires = "dwell")]
        squelch: Option<f64>,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Передающее устройство: sim, usrp
    #[arg(short, long, default_value = "sim", global = true)]
    device: String,
    /// Строка аргументов устройства (в отчёт как device_origin)
    #[arg(long, default_value = "type=sim", global = true)]
    device_args: String,
    /// Несущая частота (2.46GHz, 2460MHz, 2460000000)
    #[arg(short = 'f', long, default_value = "2.46GHz", global = true)]
    freq: String,
    /// Частота дискретизации (1MHz, 1000000)
    #[arg(short = 'r', long, default_value = "1MHz", global = true)]
    rate: String,
    /// Аппаратное усиление, дБ
    #[arg(short, long, default_value = "50.0", global = true)]
    gain: f64,
    /// Размах программной огибающей, дБ (0 = постоянное усиление)
    #[arg(long, default_value = "0.0", global = true)]
    gain_range: f32,
    /// Период программной огибающей (секунды)
    #[arg(long, default_value = "2.0", global = true)]
    gain_cycle: f64,
    /// Ограничение по времени в эфире (секунды). По умолчанию: до Ctrl+C
    #[arg(short = 't', long, global = true)]
    duration: Option<f64>,
    /// Путь к JSON-отчёту об активности
    #[arg(short, long, global = true)]
    json: Option<PathBuf>,
    /// Запас до первой выборки (секунды)
    #[arg(long, default_value = "0.5", global = true)]
    margin: f64,
    /// Зерно генератора случайных чисел
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Интервал вывода статистики (секунды)
    #[arg(long, default_value = "5", global = true)]
    stats_interval: u64,
    /// Только вывести конфигурацию
    #[arg(long, global = true)]
    dry_run: bool,
    /// Тихий режим (только ошибки)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Подробный вывод (debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

fn fail(msg: String) -> ! {
    error!("{msg}");
    std::process::exit(1);
}

fn parse_scheme(s: &str) -> SymbolScheme {
    s.parse()
        .unwrap_or_else(|e| fail(format!("--modulation: {e}")))
}

fn build_config(cli: &Cli) -> TransmitConfig {
    let c = &cli.common;

    let device: SinkKind = c
        .device
        .parse()
        .unwrap_or_else(|e| fail(format!("--device: {e}")));
    let center_freq_hz = parse_freq_hz(&c.freq).unwrap_or_else(|e| fail(format!("--freq: {e}")));
    let sample_rate_hz = parse_freq_hz(&c.rate).unwrap_or_else(|e| fail(format!("--rate: {e}")));

    let (waveform, burst_mode) = match &cli.mode {
        Mode::Linmod {
            modulation,
            bandwidth,
            filter,
            block_len,
        } => {
            let filter = FilterType::from_name(filter)
                .unwrap_or_else(|e| fail(format!("--filter: {e}")));
            let waveform = Waveform::LinMod {
                bandwidth: *bandwidth,
                scheme: parse_scheme(modulation),
                filter,
                block_len: *block_len,
            };
            (waveform, BurstMode::Continuous)
        }
        Mode::Wbofdm {
            nfft,
            cplen,
            workers,
            bandwidth,
            dwell,
            squelch,
        } => {
            let waveform = Waveform::Wideband {
                nfft: *nfft,
                cplen: *cplen,
                workers: *workers,
                bandwidth: *bandwidth,
            };
            let mode = BurstMode::Discrete {
                dwell_secs: *dwell,
                squelch_secs: *squelch,
            };
            (waveform, mode)
        }
        Mode::Hop {
            policy,
            span,
            bandwidth,
            hop_samples,
            num_hops,
            modulation,
            dwell,
            squelch,
        } => {
            let policy: HopPolicy = policy
                .parse()
                .unwrap_or_else(|e| fail(format!("--policy: {e}")));
            let waveform = Waveform::Hop {
                policy,
                span: *span,
                bandwidth: *bandwidth,
                hop_samples: *hop_samples,
                num_hops: *num_hops,
                scheme: parse_scheme(modulation),
            };
            let mode = match (dwell, squelch) {
                (Some(d), Some(s)) => BurstMode::Discrete {
                    dwell_secs: *d,
                    squelch_secs: *s,
                },
                _ => BurstMode::Continuous,
            };
            (waveform, mode)
        }
    };

    TransmitConfig {
        device,
        center_freq_hz,
        sample_rate_hz,
        gain_db: c.gain,
        gain_range_db: c.gain_range,
        gain_cycle_secs: c.gain_cycle,
        duration_secs: c.duration,
        start_margin_secs: c.margin,
        burst_mode,
        waveform,
        report_path: c.json.clone(),
        device_args: c.device_args.clone(),
        stats_interval_secs: c.stats_interval,
        seed: c.seed,
        dry_run: c.dry_run,
        ..Default::default()
    }
}

fn print_banner(config: &TransmitConfig) {
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Device        : {} ({})", config.device, config.device_args);
    info!(
        "  Waveform      : {} ({})",
        config.waveform.kind(),
        config.waveform.modulation_label()
    );
    info!("  Center freq   : {:.3} MHz", config.center_freq_hz / 1e6);
    info!("  Sample rate   : {:.3} Msps", config.sample_rate_hz / 1e6);
    info!(
        "  Gain          : {:.1} dB (range {:.1} dB, cycle {:.2}s)",
        config.gain_db, config.gain_range_db, config.gain_cycle_secs
    );
    info!("  Block length  : {} samples", config.waveform.block_len());

    match config.burst_mode {
        BurstMode::Continuous => info!("  Bursts        : continuous"),
        BurstMode::Discrete {
            dwell_secs,
            squelch_secs,
        } => info!("  Bursts        : dwell {dwell_secs:.3}s / squelch {squelch_secs:.3}s"),
    }

    match config.duration_secs {
        Some(d) => info!("  Duration      : {d:.3}s"),
        None => info!("  Duration      : until Ctrl+C"),
    }

    if let Some(path) = &config.report_path {
        info!("  Report        : {path:?}");
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.common.quiet {
        LevelFilter::Error
    } else if cli.common.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .format_timestamp_secs()
        .init();

    let config = build_config(&cli);
    let command = std::env::args().collect::<Vec<_>>().join(" ");

    // Конфигурация проверяется до любых обращений к радио
    let (mut transmitter, metrics) = Transmitter::new(config.clone(), CancellationToken::new())
        .unwrap_or_else(|e| fail(format!("Invalid configuration: {e}")));
    let mut source =
        create_source(&config).unwrap_or_else(|e| fail(format!("Invalid waveform: {e}")));

    print_banner(&config);

    if config.dry_run {
        info!("Dry run, radio not touched");
        return;
    }

    let mut sink = create_sink(config.device)
        .unwrap_or_else(|e| fail(format!("Failed to open device: {e}")));

    let token = transmitter.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || {
        if token.cancel() {
            // Второй Ctrl+C: принудительный выход
            warn!("Force exit");
            std::process::exit(130);
        }
        warn!("Ctrl+C received, finishing current block and flushing...");
    }) {
        warn!("Failed to set Ctrl+C handler: {e}");
    }

    let session_start = Instant::now();

    let summary = match transmitter.run(sink.as_mut(), source.as_mut()) {
        Ok(s) => s,
        Err(e) => fail(format!("Transmission failed: {e}")),
    };

    let stats = metrics.summary(&session_start);
    info!("\n{stats}");

    if stats.late_bursts > 0 {
        warn!(
            "⚠ {} bursts were scheduled in the past. Consider: larger --margin or lower --rate",
            stats.late_bursts
        );
    }

    if let Some(path) = &config.report_path {
        let written = build_report(path, &config, &summary, &command).and_then(|r| r.finalize());

        if let Err(e) = written {
            fail(format!("Failed to write report: {e}"));
        }
    }

    info!(
        "✓ Transmission complete: {} bursts, {:.3}s on air{}",
        summary.bursts.len(),
        summary.time_on_air(),
        if summary.cancelled { " (stopped by operator)" } else { "" }
    );
}
