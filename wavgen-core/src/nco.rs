use std::f64::consts::TAU;

use wavgen_types::IqSample;

/// Численно управляемый генератор для переноса хопа на его частоту.
///
/// Фаза непрерывна между вызовами `mix_block_up`; смена частоты фазу не
/// сбрасывает.
#[derive(Debug, Clone, Default)]
pub struct Nco {
    /// Аккумулятор фазы (радианы, `[0, 2π)`)
    phase: f64,
    /// Приращение фазы за выборку (радианы)
    dphi: f64,
}

impl Nco {
    pub fn new(rad_per_sample: f64) -> Self {
        Self {
            phase: 0.0,
            dphi: rad_per_sample,
        }
    }

    /// Частота в радианах на выборку (`2π * fc`, `fc` как доля частоты
    /// дискретизации).
    pub fn set_frequency(
        &mut self,
        rad_per_sample: f64,
    ) {
        self.dphi = rad_per_sample;
    }

    pub fn frequency(&self) -> f64 {
        self.dphi
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn set_phase(
        &mut self,
        phase: f64,
    ) {
        self.phase = phase.rem_euclid(TAU);
    }

    /// Поворачивает каждую выборку на `exp(jθ)` и продвигает фазу (in place).
    pub fn mix_block_up(
        &mut self,
        buf: &mut [IqSample],
    ) {
        for s in buf.iter_mut() {
            let (sin, cos) = self.phase.sin_cos();
            *s *= IqSample::new(cos as f32, sin as f32);
            self.phase = (self.phase + self.dphi).rem_euclid(TAU);
        }
    }
}
