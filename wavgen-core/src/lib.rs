//! Генераторы baseband сигнала wavgen
//!
//! Всё, что производит выборки для передатчика: программная огибающая
//! усиления, символьный поток с формирующим фильтром, NCO для переноса
//! частоты, планировщик хопов и широкополосный многонесущий синтезатор.
//!
//! # Быстрый старт
//!
//! ```no_run
//! use wavgen_core::{GainEnvelope, WidebandSynth};
//! use wavgen_types::IQ_ZERO;
//!
//! let mut envelope = GainEnvelope::new(10, 20.0)?;
//! let mut synth = WidebandSynth::new(2400, 0, 16, None)?;
//! let mut block = vec![IQ_ZERO; synth.buf_len()];
//!
//! synth.generate(&mut block)?;
//! let g = envelope.next_gain();
//! block.iter_mut().for_each(|s| *s *= g);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod gain;
pub mod nco;
pub mod pulse;
pub mod scheduler;
pub mod symstream;
pub mod wideband;

pub use gain::*;
pub use nco::*;
pub use pulse::*;
pub use scheduler::*;
pub use symstream::*;
pub use wideband::*;

/// Версия библиотеки.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
