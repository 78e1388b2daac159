//! Assertion failure records and the macros that capture their location.

use std::fmt;

/// Where and what failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// Source text of the failed expression.
    pub expression_text: String,
    /// File containing the assertion.
    pub source_file: String,
    /// Enclosing function.
    pub function_name: String,
    /// Line of the assertion.
    pub line_number: u32,
}

impl FailureRecord {
    /// Build a record from the four location fields.
    pub fn new(expression_text: &str, source_file: &str, function_name: &str, line_number: u32) -> Self {
        Self {
            expression_text: expression_text.to_owned(),
            source_file: source_file.to_owned(),
            function_name: function_name.to_owned(),
            line_number,
        }
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "assertion `{}` failed at {}:{} in {}",
            self.expression_text, self.source_file, self.line_number, self.function_name
        )
    }
}

/// Path of the enclosing function, closures stripped.
#[macro_export]
macro_rules! function_name {
    () => {{
        fn __pmu_here() {}
        fn __pmu_type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = __pmu_type_name_of(__pmu_here);
        let mut name = name.strip_suffix("::__pmu_here").unwrap_or(name);
        while let Some(outer) = name.strip_suffix("::{{closure}}") {
            name = outer;
        }
        name
    }};
}

/// Check a condition on a harness, filling in the source location.
///
/// Evaluates to the [`Outcome`](crate::Outcome) of
/// [`Harness::check`](crate::Harness::check); follow it with `?`.
#[macro_export]
macro_rules! pmu_check {
    ($harness:expr, $cond:expr $(,)?) => {
        $harness.check(
            $cond,
            ::std::stringify!($cond),
            ::std::file!(),
            $crate::function_name!(),
            ::std::line!(),
        )
    };
}

/// Begin a test named after the enclosing function.
#[macro_export]
macro_rules! pmu_begin {
    ($harness:expr $(,)?) => {
        $harness.begin($crate::function_name!())
    };
}

/// Abandon the running test at this location.
///
/// Evaluates to the [`Raised`](crate::Raised) value to return.
#[macro_export]
macro_rules! pmu_pile {
    ($harness:expr $(,)?) => {
        $harness.pile(::std::file!(), $crate::function_name!(), ::std::line!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_every_field() {
        let record = FailureRecord::new("a == b", "src/x.rs", "x::check_it", 17);
        assert_eq!(
            record.to_string(),
            "assertion `a == b` failed at src/x.rs:17 in x::check_it"
        );
    }

    #[test]
    fn function_name_is_enclosing_fn() {
        let name = crate::function_name!();
        assert!(name.ends_with("function_name_is_enclosing_fn"), "{}", name);
    }

    #[test]
    fn function_name_strips_closures() {
        let name = (|| crate::function_name!())();
        assert!(name.ends_with("function_name_strips_closures"), "{}", name);
    }
}
