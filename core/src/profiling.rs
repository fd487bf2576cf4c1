//! Profiling support via Tracy.
//!
//! Optional instrumentation using the [Tracy profiler](https://github.com/wolfpld/tracy),
//! enabled with the `profiling` Cargo feature. When the feature is off,
//! every macro compiles to a no-op with zero runtime overhead.
//!
//! ```ignore
//! use copperfern_core::profiling::profile_scope;
//!
//! fn step() {
//!     profile_scope!("step");
//!     // ... per-frame work ...
//! }
//! ```

// Re-export tracy-client types when profiling is enabled
#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, Span, span};

/// Create a profiling span for the current scope.
///
/// The span automatically ends when the scope exits.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Create a profiling span for the entire function.
///
/// Place this at the start of a function to profile its whole execution.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Create a profiling span for function (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

// Re-export macros at module level
pub use profile_function;
pub use profile_scope;

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_compile() {
        // These should compile regardless of profiling feature
        profile_scope!("test_scope");
        profile_function!();
    }
}
