// ABOUTME: Trybuild runner for compile-time type safety tests.
// ABOUTME: Verifies that invalid type usage and out-of-order install steps fail to compile.

#[test]
fn validated_types_not_interchangeable() {
    let t = trybuild::TestCases::new();
    t.compile_fail("tests/compile_fail/path_types_not_interchangeable.rs");
}

#[test]
fn free_text_rejected_as_shell_argument() {
    let t = trybuild::TestCases::new();
    t.compile_fail("tests/compile_fail/free_text_is_not_safe_arg.rs");
}

#[test]
fn restart_not_available_before_checkout() {
    let t = trybuild::TestCases::new();
    t.compile_fail("tests/compile_fail/restart_before_checkout.rs");
}

#[test]
fn environment_not_available_after_restart() {
    let t = trybuild::TestCases::new();
    t.compile_fail("tests/compile_fail/environment_after_finish.rs");
}
