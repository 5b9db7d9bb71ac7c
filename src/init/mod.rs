//! Start-up initialisation

mod seeded;

pub use seeded::SeededAccountInitializer;
