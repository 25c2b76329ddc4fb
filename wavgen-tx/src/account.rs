use wavgen_hal::HalError;

use crate::TxResult;

/// Учёт переданных выборок за сессию.
///
/// Счётчики монотонные и никогда не сбрасываются. `accepted <= requested`
/// на каждом шаге: устройство, сообщившее о приёме большего числа выборок,
/// чем ожидает подтверждения, нарушает протокол.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferAccount {
    requested: u64,
    accepted: u64,
}

impl TransferAccount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует сгенерированный блок длиной `n`.
    pub fn request(
        &mut self,
        n: usize,
    ) {
        self.requested += n as u64;
    }

    /// Регистрирует `n` выборок, принятых устройством из `offered`.
    pub fn accept(
        &mut self,
        offered: usize,
        n: usize,
    ) -> TxResult<()> {
        if n > offered || n as u64 > self.pending() {
            return Err(HalError::Overcommit {
                offered,
                accepted: n,
            }
            .into());
        }

        self.accepted += n as u64;
        Ok(())
    }

    /// Выборки, ещё не принятые устройством.
    pub fn pending(&self) -> u64 {
        self.requested - self.accepted
    }

    pub fn is_settled(&self) -> bool {
        self.requested == self.accepted
    }

    pub fn samples_requested(&self) -> u64 {
        self.requested
    }

    pub fn samples_accepted(&self) -> u64 {
        self.accepted
    }

    /// Суммарное время в эфире при частоте `rate_hz`.
    pub fn time_on_air(
        &self,
        rate_hz: f64,
    ) -> f64 {
        self.accepted as f64 / rate_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TxError;

    #[test]
    fn test_partial_accepts_settle_block() {
        let mut acc = TransferAccount::new();
        acc.request(1_000);

        for (offered, n) in [(1_000, 300), (700, 0), (700, 500), (200, 200)] {
            acc.accept(offered, n).unwrap();
        }

        assert!(acc.is_settled());
        assert_eq!(acc.samples_accepted(), 1_000);
        assert!((acc.time_on_air(1e6) - 1e-3).abs() < 1e-12);
    }

    #[test]
    fn test_overcommit_rejected() {
        let mut acc = TransferAccount::new();
        acc.request(100);

        assert!(matches!(
            acc.accept(100, 101),
            Err(TxError::Sink(HalError::Overcommit {
                offered: 100,
                accepted: 101
            }))
        ));
        assert_eq!(acc.samples_accepted(), 0);
    }

    #[test]
    fn test_counters_accumulate_across_blocks() {
        let mut acc = TransferAccount::new();

        for _ in 0..3 {
            acc.request(800);
            acc.accept(800, 800).unwrap();
        }

        assert_eq!(acc.samples_requested(), 2_400);
        assert_eq!(acc.pending(), 0);
    }
}
