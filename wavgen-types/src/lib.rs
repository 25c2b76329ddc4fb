pub mod burst;
pub mod error;
pub mod metadata;
pub mod scheme;

pub use burst::*;
pub use error::*;
pub use metadata::*;
pub use scheme::*;

/// Комплексная выборка baseband (I, Q), одинарная точность.
pub type IqSample = num_complex::Complex32;

/// Нулевая выборка, удобна для инициализации буферов.
pub const IQ_ZERO: IqSample = IqSample::new(0.0, 0.0);
