/// Метаданные передачи, сопровождающие каждый вызов `send`.
///
/// `start_of_burst` и `has_time_spec` поднимаются только на первом блоке
/// непрерывной сессии (или каждого дискретного burst'а), `end_of_burst`
/// поднимается только на завершающей посылке нулевой длины.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TxMetadata {
    pub start_of_burst: bool,
    pub end_of_burst: bool,
    pub has_time_spec: bool,
    /// Абсолютное время аппаратных часов (секунды)
    pub time_spec: f64,
}

impl TxMetadata {
    /// Метаданные потокового блока: без флагов и без метки времени.
    pub fn streaming() -> Self {
        Self::default()
    }

    /// Метаданные первого блока burst'а с абсолютной меткой времени.
    pub fn armed(time_spec: f64) -> Self {
        Self {
            start_of_burst: true,
            end_of_burst: false,
            has_time_spec: true,
            time_spec,
        }
    }

    /// Завершающий маркер end-of-burst.
    pub fn end_of_burst() -> Self {
        Self {
            end_of_burst: true,
            ..Self::default()
        }
    }

    /// Снимает флаги начала burst'а: они уже приняты железом.
    pub fn disarm(&mut self) {
        self.start_of_burst = false;
        self.end_of_burst = false;
        self.has_time_spec = false;
    }

    pub fn is_armed(&self) -> bool {
        self.start_of_burst || self.has_time_spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_armed_then_disarm() {
        let mut md = TxMetadata::armed(12.5);
        assert!(md.is_armed());
        assert_eq!(md.time_spec, 12.5);

        md.disarm();
        assert!(!md.is_armed());
        assert!(!md.end_of_burst);
    }

    #[test]
    fn test_end_of_burst_has_no_time_spec() {
        let md = TxMetadata::end_of_burst();
        assert!(md.end_of_burst);
        assert!(!md.start_of_burst);
        assert!(!md.has_time_spec);
    }
}
