//! # peek-error
//!
//! Errors classified by combinable role markers.
//!
//! A comma-separated marker list such as `"EInvalidArgument,ENotFound"`
//! resolves to an [`ErrorType`]. Types are cached by their normalized
//! definition in an [`ErrorFactory`], so every error raised with the same
//! markers shares one type and can be compared with
//! [`Glitch::same_type`]. Role checks see the whole ancestry:
//! `NotFound` is also `Runtime`.
//!
//! Names that are not built-in markers become custom markers, qualified
//! with the raising module's path.
//!
//! # Example
//!
//! ```
//! use peek_error::{ErrorFactory, Marker, glitch};
//!
//! let factory = ErrorFactory::new();
//! let err = glitch!(factory, "EInvalidArgument,ENotFound", "no user {}", 7).unwrap();
//!
//! assert!(err.is(Marker::NotFound));
//! assert!(err.is(Marker::Logic));
//! assert_eq!(err.http_status(), 400);
//! assert!(err.location().is_some_and(|at| at.file.ends_with(".rs")));
//! ```

mod error;
mod factory;
mod glitch;
mod marker;
mod parse;

pub use error::GlitchError;
pub use factory::{DEFAULT_HTTP_STATUS, ErrorFactory, ErrorType, Overrides};
pub use glitch::{Glitch, GlitchBuilder};
pub use marker::{Marker, Roles};
pub use parse::MarkerSpec;

/// Raise a [`Glitch`] from `factory` with the given markers and a
/// formatted message. Custom markers are qualified with the calling
/// module; the location is the macro call site.
///
/// Expands to `Result<Glitch, GlitchError>`.
#[macro_export]
macro_rules! glitch {
    ($factory:expr, $markers:expr, $($fmt:tt)+) => {
        $factory
            .glitch($markers, ::core::module_path!())
            .message(::std::format!($($fmt)+))
            .at(::core::file!(), ::core::line!())
            .build()
    };
}
