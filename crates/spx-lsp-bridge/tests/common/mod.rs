// Common test utilities

#[cfg(test)]
#[allow(dead_code)]
pub mod fake_engine;
#[cfg(test)]
#[allow(dead_code)]
pub mod tracing;
