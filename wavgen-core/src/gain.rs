use std::f64::consts::PI;

use wavgen_types::{WavError, WavResult};

/// Базовый множитель линейного усиления: пик амплитуды 0.5 не даёт
/// переполнения при последующей конвертации в sc16.
pub const GAIN_BASELINE: f32 = 0.5;

/// Программная огибающая усиления (raised-cosine по циклу буферов).
///
/// `gain_dB(p) = -range * (0.5 - 0.5 * cos(2π p / cycle_length))`,
/// линейное усиление `0.5 * 10^(gain_dB / 20)`. Позиция увеличивается на
/// единицу за сгенерированный блок и заворачивается по модулю длины цикла.
#[derive(Debug, Clone)]
pub struct GainEnvelope {
    position: u64,
    cycle_length: u64,
    range_db: f32,
}

impl GainEnvelope {
    pub fn new(
        cycle_length: u64,
        range_db: f32,
    ) -> WavResult<Self> {
        if cycle_length == 0 {
            return Err(WavError::config("gain cycle length must be > 0 buffers"));
        }

        if !range_db.is_finite() || range_db < 0.0 {
            return Err(WavError::config(format!(
                "gain range must be a finite value >= 0 dB, got {range_db}"
            )));
        }

        Ok(Self {
            position: 0,
            cycle_length,
            range_db,
        })
    }

    /// Строит огибающую из длительности цикла в секундах.
    ///
    /// Число буферов в цикле: `floor(cycle_secs * sample_rate) / block_len`.
    pub fn from_cycle_secs(
        cycle_secs: f64,
        sample_rate_hz: f64,
        block_len: usize,
        range_db: f32,
    ) -> WavResult<Self> {
        if block_len == 0 {
            return Err(WavError::config("block length must be > 0"));
        }

        let samples_per_cycle = (cycle_secs * sample_rate_hz).max(0.0) as u64;
        let buffers_per_cycle = samples_per_cycle / block_len as u64;

        if buffers_per_cycle == 0 {
            return Err(WavError::config(format!(
                "gain cycle {cycle_secs}s at {sample_rate_hz} Hz is shorter than one \
                 {block_len}-sample block"
            )));
        }

        Self::new(buffers_per_cycle, range_db)
    }

    /// Усиление в дБ для произвольной позиции (в пределах `[-range, 0]`).
    pub fn gain_db_at(
        &self,
        position: u64,
    ) -> f32 {
        let phase = 2.0 * PI * position as f64 / self.cycle_length as f64;
        let db = -(self.range_db as f64) * (0.5 - 0.5 * phase.cos());

        db as f32
    }

    /// Линейное усиление для позиции.
    pub fn linear_at(
        &self,
        position: u64,
    ) -> f32 {
        GAIN_BASELINE * 10f32.powf(self.gain_db_at(position) / 20.0)
    }

    /// Возвращает усиление для текущего блока и сдвигает позицию.
    pub fn next_gain(&mut self) -> f32 {
        let g = self.linear_at(self.position);
        self.position = (self.position + 1) % self.cycle_length;
        g
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn cycle_length(&self) -> u64 {
        self.cycle_length
    }

    pub fn range_db(&self) -> f32 {
        self.range_db
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_zero_cycle_rejected() {
        assert!(matches!(GainEnvelope::new(0, 10.0), Err(WavError::Config(_))));
        assert!(GainEnvelope::new(4, -1.0).is_err());
        assert!(GainEnvelope::new(4, f32::NAN).is_err());
    }

    #[test]
    fn test_gain_db_bounded_by_range() {
        let env = GainEnvelope::new(37, 18.0).unwrap();

        for p in 0..env.cycle_length() {
            let db = env.gain_db_at(p);
            assert!(db <= 0.0 + 1e-6, "p={p}: {db} > 0");
            assert!(db >= -18.0 - 1e-4, "p={p}: {db} < -range");
        }
    }

    #[test]
    fn test_envelope_is_periodic_at_wraparound() {
        let env = GainEnvelope::new(10, 20.0).unwrap();

        assert_abs_diff_eq!(env.gain_db_at(0), env.gain_db_at(10), epsilon = 1e-5);
        // Минимум огибающей на середине цикла
        assert_abs_diff_eq!(env.gain_db_at(5), -20.0, epsilon = 1e-4);
        assert_abs_diff_eq!(env.linear_at(0), GAIN_BASELINE, epsilon = 1e-6);
        assert_abs_diff_eq!(env.linear_at(5), 0.05, epsilon = 1e-5);
    }

    #[test]
    fn test_next_gain_returns_to_start_after_cycle() {
        let mut env = GainEnvelope::new(10, 20.0).unwrap();

        let first = env.next_gain();
        for _ in 1..10 {
            env.next_gain();
        }

        assert_eq!(env.position(), 0);
        assert_abs_diff_eq!(env.next_gain(), first, epsilon = 1e-7);
    }

    #[test]
    fn test_zero_range_is_flat() {
        let mut env = GainEnvelope::new(3, 0.0).unwrap();

        for _ in 0..7 {
            assert_abs_diff_eq!(env.next_gain(), 0.5, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_from_cycle_secs() {
        // 2 s * 100 kHz / 800 = 250 буферов
        let env = GainEnvelope::from_cycle_secs(2.0, 100e3, 800, 6.0).unwrap();
        assert_eq!(env.cycle_length(), 250);

        // Цикл короче одного блока
        assert!(GainEnvelope::from_cycle_secs(0.001, 100e3, 800, 6.0).is_err());
    }
}
