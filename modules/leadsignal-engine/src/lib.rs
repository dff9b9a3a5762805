pub mod classifier;
pub mod export;
pub mod lifecycle;
pub mod pipeline;
pub mod resolver;
pub mod risk;
pub mod scorer;
pub mod service;
pub mod signals;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
