// ABOUTME: Sealed trait pattern for shell-safe argument types.
// ABOUTME: Only validated types defined in this crate can be passed unquoted.

/// Sealed trait to prevent external implementations of `SafeArg`.
///
/// Implemented only by the validated types in `crate::types`, whose
/// constructors enforce a shell-safe character set.
pub trait Sealed {}
