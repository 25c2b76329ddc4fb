use std::{
    collections::VecDeque,
    f64::consts::{FRAC_1_SQRT_2, TAU},
};

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use wavgen_types::{FilterType, IqSample, Modulation, SymbolScheme, WavError, WavResult};

use crate::pulse::pulse;

/// Источник формированных символов.
///
/// Реализация: [`SymbolStream`]. В тестах планировщика подменяется
/// источником с заданной групповой задержкой.
pub trait SymbolSource: Send {
    /// Усиление, применяемое к символам на входе фильтра.
    fn set_gain(
        &mut self,
        gain: f32,
    );

    /// Заполняет весь `buf` следующими выборками потока.
    fn write_samples(
        &mut self,
        buf: &mut [IqSample],
    );

    /// Групповая задержка формирующего фильтра (выборки).
    fn group_delay(&self) -> f64;

    /// Метка модуляции для отчёта.
    fn label(&self) -> &str;
}

/// Параметры символьного потока.
#[derive(Debug, Clone)]
pub struct SymbolStreamConfig {
    /// Формирующий импульс
    pub filter: FilterType,
    /// Полоса как доля частоты дискретизации (символов на выборку), `(0, 1]`
    pub bandwidth: f32,
    /// Полудлина фильтра в символах
    pub semi_length: usize,
    /// Коэффициент скругления
    pub beta: f32,
    /// Модуляция или шум
    pub scheme: SymbolScheme,
    /// Seed ГПСЧ (None = из энтропии)
    pub seed: Option<u64>,
}

/// Линейно-модулированный (или шумовой) поток с произвольной дробной
/// символьной скоростью.
///
/// Выборка `n` равна `Σ a_k · p(n·bw − k − m)`: импульс сдвинут на `m`
/// символов, поэтому фильтр причинный и групповая задержка равна `m / bw`.
pub struct SymbolStream {
    config: SymbolStreamConfig,
    constellation: Vec<IqSample>,
    /// Символы с индексами `first_symbol..next_symbol`, уже умноженные на gain
    history: VecDeque<IqSample>,
    first_symbol: i64,
    next_symbol: i64,
    sample_index: u64,
    gain: f32,
    rng: StdRng,
}

impl Default for SymbolStreamConfig {
    fn default() -> Self {
        Self {
            filter: FilterType::Rrc,
            bandwidth: 0.7,
            semi_length: 12,
            beta: 0.25,
            scheme: SymbolScheme::Linear(Modulation::Qpsk),
            seed: None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SymbolStream {
    pub fn new(config: SymbolStreamConfig) -> WavResult<Self> {
        if !(config.bandwidth > 0.0 && config.bandwidth <= 1.0) {
            return Err(WavError::config(format!(
                "symbol stream bandwidth must be in (0, 1], got {}",
                config.bandwidth
            )));
        }

        if !(0.0..=1.0).contains(&config.beta) {
            return Err(WavError::config(format!(
                "excess bandwidth must be in [0, 1], got {}",
                config.beta
            )));
        }

        if config.semi_length == 0 {
            return Err(WavError::config("filter semi-length must be > 0"));
        }

        let constellation = match config.scheme {
            SymbolScheme::Linear(m) => constellation(m),
            SymbolScheme::Noise(_) => Vec::new(),
        };

        let rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            history: VecDeque::with_capacity(2 * config.semi_length + 2),
            config,
            constellation,
            first_symbol: 0,
            next_symbol: 0,
            sample_index: 0,
            gain: 1.0,
            rng,
        })
    }

    pub fn config(&self) -> &SymbolStreamConfig {
        &self.config
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    fn draw_symbol(&mut self) -> IqSample {
        match self.config.scheme {
            SymbolScheme::Linear(_) => {
                let idx = self.rng.gen_range(0..self.constellation.len());
                self.constellation[idx]
            }
            SymbolScheme::Noise(_) => {
                let re: f32 = self.rng.sample(StandardNormal);
                let im: f32 = self.rng.sample(StandardNormal);
                IqSample::new(re, im) * FRAC_1_SQRT_2 as f32
            }
        }
    }

    fn next_sample(&mut self) -> IqSample {
        let bw = self.config.bandwidth as f64;
        let m = self.config.semi_length as f64;
        let t = self.sample_index as f64 * bw;

        let newest = t.floor() as i64;
        while self.next_symbol <= newest {
            let s = self.draw_symbol() * self.gain;
            self.history.push_back(s);
            self.next_symbol += 1;
        }

        let oldest = (t - 2.0 * m).ceil() as i64;
        while self.first_symbol < oldest && self.history.pop_front().is_some() {
            self.first_symbol += 1;
        }

        let beta = self.config.beta as f64;
        let mut acc = IqSample::new(0.0, 0.0);

        for (i, s) in self.history.iter().enumerate() {
            let tau = t - (self.first_symbol + i as i64) as f64 - m;
            acc += *s * pulse(self.config.filter, tau, beta) as f32;
        }

        self.sample_index += 1;
        acc
    }
}

impl SymbolSource for SymbolStream {
    fn set_gain(
        &mut self,
        gain: f32,
    ) {
        self.gain = gain;
    }

    fn write_samples(
        &mut self,
        buf: &mut [IqSample],
    ) {
        for s in buf.iter_mut() {
            *s = self.next_sample();
        }
    }

    fn group_delay(&self) -> f64 {
        self.config.semi_length as f64 / self.config.bandwidth as f64
    }

    fn label(&self) -> &str {
        self.config.scheme.label()
    }
}

/// Точки созвездия, нормированные к единичной средней мощности.
pub fn constellation(m: Modulation) -> Vec<IqSample> {
    let psk = |order: usize| -> Vec<IqSample> {
        (0..order)
            .map(|k| IqSample::from_polar(1.0, (TAU * k as f64 / order as f64) as f32))
            .collect()
    };

    let square_qam = |side: usize| -> Vec<IqSample> {
        let levels: Vec<f32> = (0..side)
            .map(|i| 2.0 * i as f32 - (side as f32 - 1.0))
            .collect();
        let power = 2.0 * levels.iter().map(|l| l * l).sum::<f32>() / side as f32;
        let scale = 1.0 / power.sqrt();

        levels
            .iter()
            .flat_map(|&i| levels.iter().map(move |&q| IqSample::new(i * scale, q * scale)))
            .collect()
    };

    match m {
        Modulation::Bpsk => psk(2),
        Modulation::Qpsk => psk(4)
            .into_iter()
            .map(|s| s * IqSample::from_polar(1.0, std::f32::consts::FRAC_PI_4))
            .collect(),
        Modulation::Psk8 => psk(8),
        Modulation::Psk16 => psk(16),
        Modulation::Ask4 => {
            let scale = 1.0 / 5f32.sqrt();
            [-3.0f32, -1.0, 1.0, 3.0]
                .iter()
                .map(|&a| IqSample::new(a * scale, 0.0))
                .collect()
        }
        Modulation::Qam16 => square_qam(4),
        Modulation::Qam64 => square_qam(8),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use wavgen_types::{NoiseScheme, IQ_ZERO};

    use super::*;

    fn stream(scheme: SymbolScheme) -> SymbolStream {
        SymbolStream::new(SymbolStreamConfig {
            scheme,
            seed: Some(7),
            ..Default::default()
        })
        .unwrap()
    }

    fn mean_power(buf: &[IqSample]) -> f32 {
        buf.iter().map(|s| s.norm_sqr()).sum::<f32>() / buf.len() as f32
    }

    #[test]
    fn test_constellations_unit_power() {
        for m in Modulation::all() {
            let c = constellation(*m);
            assert_eq!(c.len(), m.order(), "{m}");
            assert_abs_diff_eq!(mean_power(&c), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad_bw = SymbolStreamConfig {
            bandwidth: 0.0,
            ..Default::default()
        };
        assert!(SymbolStream::new(bad_bw).is_err());

        let bad_beta = SymbolStreamConfig {
            beta: 1.5,
            ..Default::default()
        };
        assert!(SymbolStream::new(bad_beta).is_err());
    }

    #[test]
    fn test_group_delay() {
        let s = stream(SymbolScheme::Linear(Modulation::Qpsk));
        assert_abs_diff_eq!(s.group_delay(), 12.0 / 0.7, epsilon = 1e-4);
    }

    #[test]
    fn test_output_power_near_unity() {
        for scheme in [
            SymbolScheme::Linear(Modulation::Qpsk),
            SymbolScheme::Noise(NoiseScheme::Awgn),
        ] {
            let mut s = stream(scheme);
            let mut buf = vec![IQ_ZERO; 20_000];
            s.write_samples(&mut buf);

            // Пропускаем переходный процесс фильтра
            let p = mean_power(&buf[200..]);
            assert!((0.8..1.2).contains(&p), "{scheme}: power={p}");
        }
    }

    #[test]
    fn test_gain_scales_output() {
        let mut a = stream(SymbolScheme::Linear(Modulation::Qam16));
        let mut b = stream(SymbolScheme::Linear(Modulation::Qam16));
        b.set_gain(0.5);

        let mut xa = vec![IQ_ZERO; 500];
        let mut xb = vec![IQ_ZERO; 500];
        a.write_samples(&mut xa);
        b.write_samples(&mut xb);

        for (u, v) in xa.iter().zip(xb.iter()) {
            assert_abs_diff_eq!(u.re * 0.5, v.re, epsilon = 1e-5);
            assert_abs_diff_eq!(u.im * 0.5, v.im, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_zero_gain_rings_down_within_two_delays() {
        let mut s = stream(SymbolScheme::Linear(Modulation::Qpsk));
        let mut on = vec![IQ_ZERO; 400];
        s.write_samples(&mut on);

        s.set_gain(0.0);
        let tail = (2.0 * s.group_delay()).ceil() as usize + 1;
        let mut ring = vec![IQ_ZERO; tail];
        s.write_samples(&mut ring);

        let mut silent = vec![IQ_ZERO; 100];
        s.write_samples(&mut silent);
        assert!(silent.iter().all(|x| x.norm() == 0.0));
    }

    #[test]
    fn test_seeded_streams_are_reproducible() {
        let mut a = stream(SymbolScheme::Linear(Modulation::Psk8));
        let mut b = stream(SymbolScheme::Linear(Modulation::Psk8));
        let mut xa = vec![IQ_ZERO; 300];
        let mut xb = vec![IQ_ZERO; 300];

        a.write_samples(&mut xa);
        b.write_samples(&mut xb);

        assert_eq!(xa, xb);
    }
}
