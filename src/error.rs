//! The distinguished error type and the open error currency.

use std::fmt;

/// The error type middleware, setups, and checks trade in.
///
/// Any concrete error converts into it with `?` or `.into()`, including plain
/// string literals: `next.advance(Some("boom".into()))`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure of the harness run itself, as opposed to an error the middleware
/// forwarded on purpose.
///
/// Forwarded errors land in [`Outcome::error`](crate::Outcome::error) and are
/// delivered as-is. `Error` only ever surfaces as the `Err` of
/// [`Runner::run`](crate::Runner::run), and only for the two contract
/// violations below. A failing check is *not* an `Error`: its own error is
/// propagated untouched, so assertion failures keep their original type.
#[derive(Debug)]
pub enum Error {
    /// The middleware invoked its continuation more than once.
    CalledMoreThanOnce,
    /// The middleware future resolved to `Err` without forwarding that error
    /// through the continuation. Carries the original error.
    UnhandledRejection(BoxError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CalledMoreThanOnce => {
                f.write_str("middleware called its continuation more than once")
            }
            Self::UnhandledRejection(inner) => {
                write!(f, "unhandled rejection in middleware: {inner}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CalledMoreThanOnce => None,
            Self::UnhandledRejection(inner) => Some(inner.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendering_names_the_failure_kind() {
        let err = Error::CalledMoreThanOnce;
        assert!(err.to_string().contains("more than once"));

        let err = Error::UnhandledRejection("boom".into());
        let rendered = err.to_string();
        assert!(rendered.contains("unhandled rejection"));
        assert!(rendered.contains("boom"));
    }

    #[test]
    fn unhandled_rejection_exposes_the_inner_error_as_source() {
        use std::error::Error as _;

        let err = Error::UnhandledRejection("boom".into());
        assert_eq!(err.source().map(|e| e.to_string()), Some("boom".into()));
        assert!(Error::CalledMoreThanOnce.source().is_none());
    }
}
