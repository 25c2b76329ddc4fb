use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Запрос на остановку передачи, разделяемый между обработчиком Ctrl+C и
/// циклом передачи. Клоны указывают на один и тот же флаг.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Поднимает флаг. Возвращает `true`, если он уже был поднят раньше.
    pub fn cancel(&self) -> bool {
        self.flag.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
