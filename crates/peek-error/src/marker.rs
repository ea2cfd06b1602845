//! The built-in error role taxonomy.
//!
//! Every marker has at most one parent. A marker's HTTP status and I/O kind
//! are resolved by walking up the parents until one is set, so leaves
//! inherit from their category unless they override it.

use std::fmt;
use std::io::ErrorKind;

use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Marker {
    Logic,
    Runtime,
    BadFunctionCall,
    BadMethodCall,
    Domain,
    InvalidArgument,
    Length,
    OutOfRange,
    OutOfBounds,
    Overflow,
    Range,
    Underflow,
    UnexpectedValue,
    Implementation,
    Definition,
    Setup,
    Io,
    NotFound,
    Unauthorized,
    Forbidden,
    ServiceUnavailable,
    NotImplemented,
    ComponentUnavailable,
}

impl Marker {
    pub const ALL: [Self; 23] = [
        Self::Logic,
        Self::Runtime,
        Self::BadFunctionCall,
        Self::BadMethodCall,
        Self::Domain,
        Self::InvalidArgument,
        Self::Length,
        Self::OutOfRange,
        Self::OutOfBounds,
        Self::Overflow,
        Self::Range,
        Self::Underflow,
        Self::UnexpectedValue,
        Self::Implementation,
        Self::Definition,
        Self::Setup,
        Self::Io,
        Self::NotFound,
        Self::Unauthorized,
        Self::Forbidden,
        Self::ServiceUnavailable,
        Self::NotImplemented,
        Self::ComponentUnavailable,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Logic => "Logic",
            Self::Runtime => "Runtime",
            Self::BadFunctionCall => "BadFunctionCall",
            Self::BadMethodCall => "BadMethodCall",
            Self::Domain => "Domain",
            Self::InvalidArgument => "InvalidArgument",
            Self::Length => "Length",
            Self::OutOfRange => "OutOfRange",
            Self::OutOfBounds => "OutOfBounds",
            Self::Overflow => "Overflow",
            Self::Range => "Range",
            Self::Underflow => "Underflow",
            Self::UnexpectedValue => "UnexpectedValue",
            Self::Implementation => "Implementation",
            Self::Definition => "Definition",
            Self::Setup => "Setup",
            Self::Io => "Io",
            Self::NotFound => "NotFound",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::NotImplemented => "NotImplemented",
            Self::ComponentUnavailable => "ComponentUnavailable",
        }
    }

    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Logic | Self::Runtime => None,
            Self::BadMethodCall => Some(Self::BadFunctionCall),
            Self::BadFunctionCall
            | Self::Domain
            | Self::InvalidArgument
            | Self::Length
            | Self::OutOfRange
            | Self::Implementation
            | Self::Definition
            | Self::Setup => Some(Self::Logic),
            Self::NotImplemented => Some(Self::Implementation),
            Self::OutOfBounds
            | Self::Overflow
            | Self::Range
            | Self::Underflow
            | Self::UnexpectedValue
            | Self::Io
            | Self::NotFound
            | Self::Unauthorized
            | Self::ServiceUnavailable => Some(Self::Runtime),
            Self::Forbidden => Some(Self::Unauthorized),
            Self::ComponentUnavailable => Some(Self::ServiceUnavailable),
        }
    }

    /// Status set on this marker itself, without inheritance.
    const fn own_http_status(self) -> Option<u16> {
        match self {
            Self::InvalidArgument | Self::UnexpectedValue => Some(400),
            Self::Unauthorized => Some(401),
            Self::Forbidden => Some(403),
            Self::NotFound => Some(404),
            Self::NotImplemented => Some(501),
            Self::ServiceUnavailable => Some(503),
            _ => None,
        }
    }

    /// I/O kind set on this marker itself, without inheritance.
    const fn own_io_kind(self) -> Option<ErrorKind> {
        match self {
            Self::InvalidArgument | Self::Domain | Self::Length => Some(ErrorKind::InvalidInput),
            Self::UnexpectedValue => Some(ErrorKind::InvalidData),
            Self::NotFound => Some(ErrorKind::NotFound),
            Self::Unauthorized => Some(ErrorKind::PermissionDenied),
            Self::NotImplemented => Some(ErrorKind::Unsupported),
            Self::ServiceUnavailable => Some(ErrorKind::ConnectionRefused),
            Self::Io => Some(ErrorKind::Other),
            _ => None,
        }
    }

    /// This marker followed by its ancestors, nearest first.
    pub fn ancestry(self) -> impl Iterator<Item = Self> {
        std::iter::successors(Some(self), |marker| marker.parent())
    }

    /// Number of ancestors.
    pub fn depth(self) -> usize {
        self.ancestry().count() - 1
    }

    /// The category at the top of this marker's ancestry.
    pub fn base(self) -> Self {
        self.ancestry().last().unwrap_or(self)
    }

    pub fn http_status(self) -> Option<u16> {
        self.ancestry().find_map(Self::own_http_status)
    }

    pub fn io_kind(self) -> Option<ErrorKind> {
        self.ancestry().find_map(Self::own_io_kind)
    }

    /// Temporary conditions worth retrying.
    pub fn is_retryable(self) -> bool {
        self.ancestry()
            .any(|marker| matches!(marker, Self::ServiceUnavailable | Self::Io))
    }

    pub fn role(self) -> Roles {
        Roles::from_bits_retain(1 << (self as u32 + 1))
    }

    /// Look a marker up by any accepted spelling: `EInvalidArgument`,
    /// `InvalidArgument`, `invalid-argument` or `invalid_argument`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = strip_e_prefix(name.trim());
        let folded: String = name
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self::ALL
            .into_iter()
            .find(|marker| marker.as_str().eq_ignore_ascii_case(&folded))
    }
}

/// `ENotFound` -> `NotFound`. A lone `E` or `Error` is left alone.
pub(crate) fn strip_e_prefix(name: &str) -> &str {
    match name.strip_prefix('E') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// A set of roles. Bit 0 is the root role every error carries; bit
    /// `n + 1` is the `n`th [`Marker`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Roles: u32 {
        const ROOT = 1;
        const _ = !0;
    }
}

impl Roles {
    /// The root role plus every marker and all their ancestors.
    pub fn closure(markers: impl IntoIterator<Item = Marker>) -> Self {
        markers
            .into_iter()
            .flat_map(Marker::ancestry)
            .fold(Self::ROOT, |roles, marker| roles | marker.role())
    }

    pub fn has(self, marker: Marker) -> bool {
        self.contains(marker.role())
    }

    /// Markers in this set, in declaration order.
    pub fn markers(self) -> impl Iterator<Item = Marker> {
        Marker::ALL.into_iter().filter(move |marker| self.has(*marker))
    }
}
