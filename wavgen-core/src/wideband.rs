// Широкополосный OFDM-подобный генератор шумового заполнения. Каждая дорожка
// (lane) владеет своим IFFT-планом и буферами, поэтому параллельный цикл не
// требует синхронизации. Пул потоков создаётся один раз, планирование FFT
// тоже, при конструировании.

use std::{f64::consts::TAU, sync::Arc};

use log::{debug, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};
use wavgen_types::{IqSample, WavError, WavResult, IQ_ZERO};

/// Число параллельных дорожек по умолчанию.
pub const DEFAULT_WORKERS: usize = 16;

/// Размер FFT по умолчанию.
pub const DEFAULT_NFFT: usize = 2_400;

/// Минимальный размер FFT, при котором маска зануляет и DC, и `nfft/2`.
pub const MIN_NFFT: usize = 16;

/// Масштаб случайного ускорения фазы `dphi`.
const PHASE_ACCEL_SCALE: f64 = 1e-2;

/// Состояние одной дорожки.
struct Lane {
    fft: Arc<dyn Fft<f32>>,
    freq: Vec<IqSample>,
    time: Vec<IqSample>,
    scratch: Vec<IqSample>,
    rng: StdRng,
}

/// Параллельный синтезатор многонесущего сигнала.
pub struct WidebandSynth {
    nfft: usize,
    cplen: usize,
    gain: Vec<f32>,
    lanes: Vec<Lane>,
    pool: rayon::ThreadPool,
}

impl Lane {
    fn new(
        nfft: usize,
        seed: Option<u64>,
    ) -> WavResult<Self> {
        // Отдельный планировщик на дорожку: свой экземпляр преобразования
        let fft = FftPlanner::<f32>::new().plan_fft_inverse(nfft);
        let scratch_len = fft.get_outofplace_scratch_len();

        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            freq: alloc_buffer(nfft)?,
            time: alloc_buffer(nfft)?,
            scratch: alloc_buffer(scratch_len)?,
            fft,
            rng,
        })
    }

    /// Случайные символы → IFFT → `out` (первые `nfft` выборок).
    fn run(
        &mut self,
        gain: &[f32],
        out: &mut [IqSample],
    ) {
        let phi = self.rng.gen::<f64>() * TAU;
        let dphi = PHASE_ACCEL_SCALE * self.rng.sample::<f64, _>(StandardNormal);

        for (j, (bin, g)) in self.freq.iter_mut().zip(gain.iter()).enumerate() {
            let j = j as f64;
            let theta = (phi + j * j * dphi).rem_euclid(TAU);
            *bin = IqSample::from_polar(*g, theta as f32);
        }

        self.fft
            .process_outofplace_with_scratch(&mut self.freq, &mut self.time, &mut self.scratch);

        let n = self.time.len();
        out[..n].copy_from_slice(&self.time);
    }
}

impl WidebandSynth {
    /// Создаёт синтезатор с `workers` дорожками.
    ///
    /// Циклический префикс пока не поддерживается: ненулевой `cplen`
    /// принудительно обнуляется. Ошибка при выделении любой дорожки
    /// прерывает конструирование целиком.
    pub fn new(
        nfft: usize,
        cplen: usize,
        workers: usize,
        seed: Option<u64>,
    ) -> WavResult<Self> {
        if nfft < MIN_NFFT {
            return Err(WavError::config(format!(
                "nfft must be >= {MIN_NFFT}, got {nfft}"
            )));
        }

        if workers == 0 {
            return Err(WavError::config("worker pool size must be > 0"));
        }

        if cplen != 0 {
            warn!("Cyclic prefix not supported yet, forcing cplen=0 (requested {cplen})");
        }

        let lanes = (0..workers)
            .map(|i| Lane::new(nfft, seed.map(|s| s.wrapping_add(i as u64))))
            .collect::<WavResult<Vec<_>>>()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("wbofdm-{i}"))
            .build()
            .map_err(|e| WavError::resource(format!("worker pool: {e}")))?;

        let gain = subcarrier_mask(nfft);

        debug!("Wideband synth ready: nfft={nfft}, workers={workers}");

        Ok(Self {
            nfft,
            cplen: 0,
            gain,
            lanes,
            pool,
        })
    }

    /// Ожидаемая длина выходного буфера: `(nfft + cplen) * workers`.
    pub fn buf_len(&self) -> usize {
        (self.nfft + self.cplen) * self.lanes.len()
    }

    pub fn nfft(&self) -> usize {
        self.nfft
    }

    pub fn cplen(&self) -> usize {
        self.cplen
    }

    pub fn workers(&self) -> usize {
        self.lanes.len()
    }

    /// Маска усиления поднесущих.
    pub fn subcarrier_gains(&self) -> &[f32] {
        &self.gain
    }

    /// Заполняет `output` блоком из `workers` независимых OFDM-символов.
    ///
    /// `&mut self` исключает одновременные вызовы.
    pub fn generate(
        &mut self,
        output: &mut [IqSample],
    ) -> WavResult<()> {
        let expected = self.buf_len();

        if output.len() != expected {
            return Err(WavError::BufferLength {
                expected,
                found: output.len(),
            });
        }

        let Self {
            nfft,
            cplen,
            gain,
            lanes,
            pool,
        } = self;
        let gain: &[f32] = gain;
        let stride = *nfft + *cplen;

        pool.install(|| {
            lanes
                .par_iter_mut()
                .zip(output.par_chunks_mut(stride))
                .for_each(|(lane, out)| lane.run(gain, out));
        });

        Ok(())
    }
}

/// Маска поднесущих: DC и бины `[0.4·nfft, 0.6·nfft)` занулены, остальные
/// равны, `Σ g² = 1`.
pub fn subcarrier_mask(nfft: usize) -> Vec<f32> {
    // 5i ∈ [2n, 3n): та же граница без округлений
    let guard = |i: usize| 5 * i >= 2 * nfft && 5 * i < 3 * nfft;

    let mut gain: Vec<f32> = (0..nfft)
        .map(|i| if i == 0 || guard(i) { 0.0 } else { 1.0 })
        .collect();

    let power: f32 = gain.iter().map(|g| g * g).sum();
    let scale = 1.0 / power.sqrt();
    gain.iter_mut().for_each(|g| *g *= scale);

    gain
}

fn alloc_buffer(len: usize) -> WavResult<Vec<IqSample>> {
    let mut v = Vec::new();

    v.try_reserve_exact(len)
        .map_err(|e| WavError::resource(format!("buffer of {len} samples: {e}")))?;
    v.resize(len, IQ_ZERO);

    Ok(v)
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
