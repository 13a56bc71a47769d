//! Recoverable gaps found while generating code. Each one leaves a
//! placeholder in the output and a [`Warning`] here; `--deny-warnings`
//! turns a non-empty list into a failure.

use std::fmt;

use colored::Colorize;

/// Name of the enclosing function, for backtraces.
macro_rules! function {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        type_name_of(f)
            .rsplit("::")
            .find(|&part| part != "f" && part != "{{closure}}")
            .unwrap_or("?")
    }};
}

/// Records a warning at `$location` (anything `Display`), formatting the
/// remaining arguments as the message.
macro_rules! report_warning {
    ($diagnostics:expr, $location:expr, $($message:tt)+) => {{
        #[cfg(feature = "error-backtrace")]
        let origin = Some(format!(
            "{}::{} (at {}:{}:{})",
            module_path!(),
            $crate::backend::diagnostics::function!(),
            file!(),
            line!(),
            column!()
        ));
        #[cfg(not(feature = "error-backtrace"))]
        let origin = None;

        $diagnostics.report($crate::backend::diagnostics::Warning {
            location: $location.to_string(),
            message: format!($($message)+),
            origin,
        })
    }};
}

pub(crate) use function;
pub(crate) use report_warning;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// `package.Function` or `package.Type`.
    pub location: String,
    pub message: String,
    /// Where in the generator the warning was raised.
    pub origin: Option<String>,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, warning: Warning) {
        tracing::debug!(
            location = %warning.location,
            origin = warning.origin.as_deref().unwrap_or_default(),
            "{}",
            warning.message
        );
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Colored, one warning per line, with the generator backtrace when
    /// `verbose`.
    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        for warning in &self.warnings {
            out.push_str(&format!(
                "{}: {}: {}\n",
                "warning".yellow().bold(),
                warning.location.bold(),
                warning.message
            ));
            if let (true, Some(origin)) = (verbose, &warning.origin) {
                out.push_str(&format!("  {}: {}\n", "backtrace".blue(), origin));
            }
        }
        out
    }
}
