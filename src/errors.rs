//! Structured errors shared by every stage.
//!
//! A [`ReleaseError`] records the operation that produced it, an optional
//! classification ([`Kind`]), an optional message and an optional cause. A
//! cause is either another `ReleaseError` or a foreign error, so walking the
//! chain yields a readable operation trail like
//! `publish.Run -> release.doPublish -> group.Wait`.

use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;

pub type Result<T, E = ReleaseError> = std::result::Result<T, E>;

/// Label of a function or stage taking part in a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Op(pub &'static str);

impl Op {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

const UNDEFINED_OP: Op = Op("undefined");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// The stage intentionally did nothing.
    Skipped,
    BuildError,
    /// Malformed tag or version.
    SemVerError,
    Unexpected,
}

impl Kind {
    pub fn describe(&self) -> &'static str {
        match self {
            Kind::Skipped => "stage was skipped",
            Kind::BuildError => "build failed",
            Kind::SemVerError => "invalid semantic version",
            Kind::Unexpected => "unexpected error",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// What a [`ReleaseError`] wraps.
#[derive(Debug)]
pub enum Source {
    Release(Box<ReleaseError>),
    Foreign(anyhow::Error),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Release(err) => write!(f, "{err}"),
            Source::Foreign(err) => write!(f, "{err:#}"),
        }
    }
}

impl From<ReleaseError> for Source {
    fn from(err: ReleaseError) -> Self {
        Source::Release(Box::new(err))
    }
}

impl From<anyhow::Error> for Source {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ReleaseError>() {
            Ok(structured) => Source::Release(Box::new(structured)),
            Err(err) => Source::Foreign(err),
        }
    }
}

macro_rules! foreign_source {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Source {
                fn from(err: $ty) -> Self {
                    Source::Foreign(anyhow::Error::new(err))
                }
            }
        )*
    };
}

foreign_source!(
    std::io::Error,
    serde_json::Error,
    serde_yaml::Error,
    glob::PatternError,
    glob::GlobError,
    rayon::ThreadPoolBuildError,
    reqwest::Error,
    semver::Error,
);

#[derive(Debug)]
pub struct ReleaseError {
    op: Op,
    kind: Option<Kind>,
    message: Option<String>,
    source: Option<Source>,
}

impl ReleaseError {
    pub fn new(op: Op, message: impl Into<String>) -> Self {
        Self {
            op,
            kind: None,
            message: Some(message.into()),
            source: None,
        }
    }

    pub fn caused_by(op: Op, cause: impl Into<Source>) -> Self {
        Self {
            op,
            kind: None,
            message: None,
            source: Some(cause.into()),
        }
    }

    /// Sets the classification on this layer, overriding whatever the
    /// wrapped chain carries.
    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn op(&self) -> Op {
        self.op
    }

    /// First explicit kind found walking outermost to innermost, or
    /// [`Kind::Unexpected`].
    pub fn kind(&self) -> Kind {
        self.explicit_kind().unwrap_or(Kind::Unexpected)
    }

    fn explicit_kind(&self) -> Option<Kind> {
        self.kind.or_else(|| match &self.source {
            Some(Source::Release(inner)) => inner.explicit_kind(),
            _ => None,
        })
    }

    pub fn ops(&self) -> Vec<Op> {
        let mut ops = vec![self.op];
        let mut current = self;
        while let Some(Source::Release(inner)) = &current.source {
            ops.push(inner.op);
            current = inner;
        }
        ops
    }

    pub fn is_skip(&self) -> bool {
        self.kind() == Kind::Skipped
    }

    /// The innermost foreign cause, if it is a `T`.
    pub fn find_cause<T>(&self) -> Option<&T>
    where
        T: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        let mut current = self;
        loop {
            match &current.source {
                Some(Source::Release(inner)) => current = inner,
                Some(Source::Foreign(err)) => return err.downcast_ref::<T>(),
                None => return None,
            }
        }
    }
}

impl fmt::Display for ReleaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.source) {
            (Some(message), Some(source)) => write!(f, "{message}: {source}"),
            (Some(message), None) => f.write_str(message),
            (None, Some(source)) => write!(f, "{source}"),
            (None, None) => write!(f, "{} failed", self.op),
        }
    }
}

impl StdError for ReleaseError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.source {
            Some(Source::Release(inner)) => Some(inner.as_ref()),
            Some(Source::Foreign(err)) => Some(&**err),
            None => None,
        }
    }
}

/// Builder for a [`ReleaseError`] layer.
#[must_use]
#[derive(Debug)]
pub struct Wrap {
    op: Op,
    kind: Option<Kind>,
    message: Option<String>,
    source: Option<Source>,
    parts: usize,
    location: &'static Location<'static>,
}

impl Wrap {
    #[track_caller]
    pub fn new(op: Op) -> Self {
        Self {
            op,
            kind: None,
            message: None,
            source: None,
            parts: 0,
            location: Location::caller(),
        }
    }

    pub fn cause(mut self, cause: impl Into<Source>) -> Self {
        self.parts += 1;
        self.source = Some(cause.into());
        self
    }

    /// Like [`Wrap::cause`], but a `None` leaves the cause unset.
    pub fn maybe_cause<E: Into<Source>>(mut self, cause: Option<E>) -> Self {
        self.parts += 1;
        if let Some(cause) = cause {
            self.source = Some(cause.into());
        }
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.parts += 1;
        self.message = Some(message.into());
        self
    }

    pub fn kind(mut self, kind: Kind) -> Self {
        self.parts += 1;
        self.kind = Some(kind);
        self
    }

    /// Returns `None` when parts were supplied but none of them carried a
    /// cause or a message. With no parts at all the result is a synthetic
    /// error naming the call site.
    pub fn finish(self) -> Option<ReleaseError> {
        if self.parts == 0 {
            return Some(self.synthetic("built with no parts"));
        }
        if self.source.is_none() && self.message.is_none() {
            return None;
        }
        Some(ReleaseError {
            op: self.op,
            kind: self.kind,
            message: self.message,
            source: self.source,
        })
    }

    /// Same as [`Wrap::finish`] for call sites that must produce an error.
    pub fn build(self) -> ReleaseError {
        let op = self.op;
        let location = self.location;
        self.finish().unwrap_or_else(|| ReleaseError {
            op,
            kind: None,
            message: Some(format!(
                "{op} produced no error - {}:{}",
                location.file(),
                location.line()
            )),
            source: None,
        })
    }

    fn synthetic(&self, what: &str) -> ReleaseError {
        ReleaseError {
            op: self.op,
            kind: None,
            message: Some(format!(
                "{} {what} - {}:{}",
                self.op,
                self.location.file(),
                self.location.line()
            )),
            source: None,
        }
    }
}

/// `wrap(op, None)` is `None`, so call sites can pass any optional error
/// straight through.
#[track_caller]
pub fn wrap<E: Into<Source>>(op: Op, cause: Option<E>) -> Option<ReleaseError> {
    Wrap::new(op).maybe_cause(cause).finish()
}

pub fn skip(op: Op, reason: impl fmt::Display) -> ReleaseError {
    ReleaseError::new(op, reason.to_string()).with_kind(Kind::Skipped)
}

pub fn is_skip(err: &ReleaseError) -> bool {
    err.is_skip()
}

/// Classification of any error; errors outside this model are
/// [`Kind::Unexpected`].
pub fn kind_of(err: &(dyn StdError + 'static)) -> Kind {
    err.downcast_ref::<ReleaseError>()
        .map(ReleaseError::kind)
        .unwrap_or(Kind::Unexpected)
}

pub fn ops_of(err: &(dyn StdError + 'static)) -> Vec<Op> {
    err.downcast_ref::<ReleaseError>()
        .map(ReleaseError::ops)
        .unwrap_or_else(|| vec![UNDEFINED_OP])
}

pub trait ResultExt<T> {
    fn wrap_op(self, op: Op) -> Result<T>;
    fn wrap_op_msg(self, op: Op, message: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Source>> ResultExt<T> for std::result::Result<T, E> {
    fn wrap_op(self, op: Op) -> Result<T> {
        self.map_err(|err| ReleaseError::caused_by(op, err))
    }

    fn wrap_op_msg(self, op: Op, message: impl Into<String>) -> Result<T> {
        self.map_err(|err| ReleaseError {
            op,
            kind: None,
            message: Some(message.into()),
            source: Some(err.into()),
        })
    }
}
