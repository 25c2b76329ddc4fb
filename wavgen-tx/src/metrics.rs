use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

/// Счётчики передачи, обновляемые lock-free.
#[derive(Debug, Default)]
pub struct TransmitMetrics {
    pub blocks_generated: AtomicU64,
    pub samples_requested: AtomicU64,
    pub samples_accepted: AtomicU64,
    pub sends: AtomicU64,
    pub partial_sends: AtomicU64,
    pub zero_accepts: AtomicU64,
    pub bursts: AtomicU64,
    pub late_bursts: AtomicU64,
}

/// Snapshot метрик для отображения / тестирования.
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub duration_secs: f64,
    pub blocks_generated: u64,
    pub samples_requested: u64,
    pub samples_accepted: u64,
    pub sends: u64,
    pub partial_sends: u64,
    pub zero_accepts: u64,
    pub bursts: u64,
    pub late_bursts: u64,
    pub throughput_msps: f64,
    pub partial_rate_pct: f64,
}

impl TransmitMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn throughput_msps(
        &self,
        elapsed: &Instant,
    ) -> f64 {
        let secs = elapsed.elapsed().as_secs_f64();

        if secs < 1e-9 {
            return 0.0;
        }

        self.samples_accepted.load(Ordering::Relaxed) as f64 / secs / 1_000_000.0
    }

    /// Доля посылок, принятых устройством не полностью (0.0-100.0).
    pub fn partial_rate_pct(&self) -> f64 {
        let sends = self.sends.load(Ordering::Relaxed);
        let partial = self.partial_sends.load(Ordering::Relaxed);

        if sends == 0 {
            0.0
        } else {
            partial as f64 / sends as f64 * 100.0
        }
    }

    /// Итоговая сводка для вывода в конце сессии.
    pub fn summary(
        &self,
        elapsed: &Instant,
    ) -> MetricsSummary {
        MetricsSummary {
            duration_secs: elapsed.elapsed().as_secs_f64(),
            blocks_generated: self.blocks_generated.load(Ordering::Relaxed),
            samples_requested: self.samples_requested.load(Ordering::Relaxed),
            samples_accepted: self.samples_accepted.load(Ordering::Relaxed),
            sends: self.sends.load(Ordering::Relaxed),
            partial_sends: self.partial_sends.load(Ordering::Relaxed),
            zero_accepts: self.zero_accepts.load(Ordering::Relaxed),
            bursts: self.bursts.load(Ordering::Relaxed),
            late_bursts: self.late_bursts.load(Ordering::Relaxed),
            throughput_msps: self.throughput_msps(elapsed),
            partial_rate_pct: self.partial_rate_pct(),
        }
    }
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  Duration      : {:.1}s", self.duration_secs)?;
        writeln!(f, "  Blocks        : {}", self.blocks_generated)?;
        writeln!(
            f,
            "  Samples       : {} / {} accepted",
            self.samples_accepted, self.samples_requested
        )?;
        writeln!(
            f,
            "  Sends         : {} ({} partial, {:.2}%)",
            self.sends, self.partial_sends, self.partial_rate_pct
        )?;
        writeln!(f, "  Zero accepts  : {}", self.zero_accepts)?;
        writeln!(
            f,
            "  Bursts        : {} ({} late)",
            self.bursts, self.late_bursts
        )?;
        writeln!(f, "  Throughput    : {:.3} Msps", self.throughput_msps)?;
        write!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")
    }
}
