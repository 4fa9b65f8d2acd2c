//! Common test macros.

/// Assert that a run error names `stage` and that its root cause matches `root`.
///
/// # Usage
/// ```ignore
/// assert_failed_at!(err, Stage::Write, PipelineError::IoWrite { .. });
/// ```
#[macro_export]
macro_rules! assert_failed_at {
    ($err:expr, $stage:expr, $root:pat) => {
        let err = &$err;
        assert_eq!(err.stage(), Some($stage), "unexpected stage for `{}`", err);
        assert!(
            matches!(err.root(), $root),
            "assertion failed: root cause\n  found: `{:?}`,\n   want: `{}`",
            err.root(),
            stringify!($root)
        );
    };
}
