use chrono::{DateTime, Utc};

/// Контрольная точка жизненного цикла сессии.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Запуск приложения
    StartApp,
    /// Подключение к радио
    StartDev,
    /// Часы радио выставлены, начало передачи
    StartTx,
    /// Отправлен завершающий end-of-burst
    StopTx,
    /// Эфир опустел, радио освобождено
    StopApp,
}

/// Отметки времени (секунды Unix, UTC).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    marks: [Option<f64>; 5],
}

/// Текущее время UTC в секундах с эпохи Unix.
pub fn wall_clock_secs() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + now.timestamp_subsec_nanos() as f64 * 1e-9
}

impl Marker {
    pub const ALL: [Marker; 5] = [
        Marker::StartApp,
        Marker::StartDev,
        Marker::StartTx,
        Marker::StopTx,
        Marker::StopApp,
    ];

    /// Ключ в секции `misc` отчёта.
    pub fn key(&self) -> &'static str {
        match self {
            Marker::StartApp => "start_app",
            Marker::StartDev => "start_dev",
            Marker::StartTx => "start_tx",
            Marker::StopTx => "stop_tx",
            Marker::StopApp => "stop_app",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl Timeline {
    /// Новая шкала с отметкой [`Marker::StartApp`].
    pub fn new() -> Self {
        let mut t = Self::default();
        t.mark(Marker::StartApp);
        t
    }

    /// Ставит отметку текущим временем и возвращает его.
    pub fn mark(
        &mut self,
        marker: Marker,
    ) -> f64 {
        let now = wall_clock_secs();
        self.set(marker, now);
        now
    }

    pub fn set(
        &mut self,
        marker: Marker,
        time: f64,
    ) {
        self.marks[marker.index()] = Some(time);
    }

    pub fn get(
        &self,
        marker: Marker,
    ) -> Option<f64> {
        self.marks[marker.index()]
    }

    /// Проставленные отметки в хронологическом порядке жизненного цикла.
    pub fn iter(&self) -> impl Iterator<Item = (Marker, f64)> + '_ {
        Marker::ALL
            .iter()
            .filter_map(|m| self.get(*m).map(|t| (*m, t)))
    }
}

impl std::fmt::Display for Timeline {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        for (marker, t) in self.iter() {
            let secs = t.floor();
            let nanos = ((t - secs) * 1e9) as u32;
            let utc = DateTime::<Utc>::from_timestamp(secs as i64, nanos)
                .map(|d| d.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
                .unwrap_or_default();

            writeln!(f, "  {:<10}: {t:.9} ({utc})", marker.key())?;
        }

        Ok(())
    }
}
