use crate::{WavError, WavResult};

/// Схема линейной модуляции.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    Bpsk,
    Qpsk,
    Psk8,
    Psk16,
    Ask4,
    Qam16,
    Qam64,
}

/// Схема генерации шумовых символов.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseScheme {
    /// Комплексный гауссов шум единичной мощности
    Awgn,
}

/// Что подаётся на формирующий фильтр: символы созвездия или шум.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScheme {
    Linear(Modulation),
    Noise(NoiseScheme),
}

/// Тип формирующего фильтра.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Root raised cosine
    Rrc,
    /// Raised cosine
    Rcos,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Modulation {
    /// Число точек созвездия.
    pub fn order(&self) -> usize {
        match self {
            Modulation::Bpsk => 2,
            Modulation::Qpsk => 4,
            Modulation::Ask4 => 4,
            Modulation::Psk8 => 8,
            Modulation::Psk16 => 16,
            Modulation::Qam16 => 16,
            Modulation::Qam64 => 64,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Modulation::Bpsk => "bpsk",
            Modulation::Qpsk => "qpsk",
            Modulation::Psk8 => "psk8",
            Modulation::Psk16 => "psk16",
            Modulation::Ask4 => "ask4",
            Modulation::Qam16 => "qam16",
            Modulation::Qam64 => "qam64",
        }
    }

    /// Все поддерживаемые схемы (для `--help` и сообщений об ошибках).
    pub fn all() -> &'static [Modulation] {
        &[
            Modulation::Bpsk,
            Modulation::Qpsk,
            Modulation::Psk8,
            Modulation::Psk16,
            Modulation::Ask4,
            Modulation::Qam16,
            Modulation::Qam64,
        ]
    }
}

impl SymbolScheme {
    pub fn label(&self) -> &'static str {
        match self {
            SymbolScheme::Linear(m) => m.label(),
            SymbolScheme::Noise(NoiseScheme::Awgn) => "noise",
        }
    }

    pub fn is_noise(&self) -> bool {
        matches!(self, SymbolScheme::Noise(_))
    }
}

impl FilterType {
    pub fn from_name(s: &str) -> WavResult<Self> {
        match s.to_lowercase().as_str() {
            "rrc" | "rrcos" => Ok(FilterType::Rrc),
            "rcos" | "rc" => Ok(FilterType::Rcos),
            _ => Err(WavError::config(format!(
                "Unknown filter type '{s}'. Use: rrc, rcos"
            ))),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl std::str::FromStr for Modulation {
    type Err = WavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bpsk" | "psk2" => Ok(Modulation::Bpsk),
            "qpsk" | "psk4" => Ok(Modulation::Qpsk),
            "psk8" | "8psk" => Ok(Modulation::Psk8),
            "psk16" | "16psk" => Ok(Modulation::Psk16),
            "ask4" | "4ask" => Ok(Modulation::Ask4),
            "qam16" | "16qam" => Ok(Modulation::Qam16),
            "qam64" | "64qam" => Ok(Modulation::Qam64),
            _ => Err(WavError::UnknownModulation(s.to_string())),
        }
    }
}

impl std::str::FromStr for SymbolScheme {
    type Err = WavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "noise" | "awgn" => Ok(SymbolScheme::Noise(NoiseScheme::Awgn)),
            other => other.parse::<Modulation>().map(SymbolScheme::Linear),
        }
    }
}

impl std::fmt::Display for Modulation {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::fmt::Display for SymbolScheme {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_fromstr() {
        assert_eq!(
            "qpsk".parse::<SymbolScheme>().unwrap(),
            SymbolScheme::Linear(Modulation::Qpsk)
        );
        assert_eq!(
            "16QAM".parse::<SymbolScheme>().unwrap(),
            SymbolScheme::Linear(Modulation::Qam16)
        );
        assert_eq!(
            "awgn".parse::<SymbolScheme>().unwrap(),
            SymbolScheme::Noise(NoiseScheme::Awgn)
        );
        assert!(matches!(
            "fsk9".parse::<SymbolScheme>(),
            Err(WavError::UnknownModulation(_))
        ));
    }

    #[test]
    fn test_labels_roundtrip_through_fromstr() {
        for m in Modulation::all() {
            assert_eq!(m.label().parse::<Modulation>().unwrap(), *m);
        }
        assert_eq!(SymbolScheme::Noise(NoiseScheme::Awgn).to_string(), "noise");
    }

    #[test]
    fn test_filter_type_from_name() {
        assert_eq!(FilterType::from_name("rrc").unwrap(), FilterType::Rrc);
        assert_eq!(FilterType::from_name("RCOS").unwrap(), FilterType::Rcos);
        assert!(FilterType::from_name("kaiser").is_err());
    }
}
