use arrow::error::ArrowError;
use datafusion_common::DataFusionError;
use std::num::ParseFloatError;
use std::result;
use thiserror::Error;

pub type Result<T> = result::Result<T, VegaQueryError>;

#[derive(Clone, Debug, Default)]
pub struct ErrorContext {
    pub contexts: Vec<String>,
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (i, context) in self.contexts.iter().enumerate() {
            writeln!(f, "    Context[{i}]: {context}")?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum VegaQueryError {
    #[error("Expression parsing error: {0}\n{1}")]
    ParseError(String, ErrorContext),

    #[error("Expression compilation error: {0}\n{1}")]
    CompilationError(String, ErrorContext),

    #[error("Internal error: {0}\n{1}")]
    InternalError(String, ErrorContext),

    #[error("External error: {0}\n{1}")]
    ExternalError(String, ErrorContext),

    #[error("Vega Specification error: {0}\n{1}")]
    SpecificationError(String, ErrorContext),

    #[error("Expression lookup error: {0}\n{1}")]
    LookupError(String, ErrorContext),

    #[error("Transform translation error: {0}\n{1}")]
    TranslationError(String, ErrorContext),

    #[error("Protocol error: {0}\n{1}")]
    ProtocolError(String, ErrorContext),

    #[error("Arrow error: {0}\n{1}")]
    ArrowError(ArrowError, ErrorContext),

    #[error("DataFusion error: {0}\n{1}")]
    DataFusionError(DataFusionError, ErrorContext),

    #[error("IO Error: {0}\n{1}")]
    IOError(std::io::Error, ErrorContext),

    #[error("Serde JSON Error: {0}\n{1}")]
    SerdeJsonError(serde_json::Error, ErrorContext),
}

impl VegaQueryError {
    fn context_mut(&mut self) -> &mut ErrorContext {
        use VegaQueryError::*;
        match self {
            ParseError(_, context)
            | CompilationError(_, context)
            | InternalError(_, context)
            | ExternalError(_, context)
            | SpecificationError(_, context)
            | LookupError(_, context)
            | TranslationError(_, context)
            | ProtocolError(_, context)
            | ArrowError(_, context)
            | DataFusionError(_, context)
            | IOError(_, context)
            | SerdeJsonError(_, context) => context,
        }
    }

    /// Append a new context level to the error
    pub fn with_context<S, F>(mut self, context_fn: F) -> Self
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.context_mut().contexts.push(context_fn().into());
        self
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::ParseError(message.into(), Default::default())
    }

    pub fn compilation<S: Into<String>>(message: S) -> Self {
        Self::CompilationError(message.into(), Default::default())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::InternalError(message.into(), Default::default())
    }

    pub fn external<S: Into<String>>(message: S) -> Self {
        Self::ExternalError(message.into(), Default::default())
    }

    pub fn specification<S: Into<String>>(message: S) -> Self {
        Self::SpecificationError(message.into(), Default::default())
    }

    pub fn lookup<S: Into<String>>(message: S) -> Self {
        Self::LookupError(message.into(), Default::default())
    }

    pub fn translation<S: Into<String>>(message: S) -> Self {
        Self::TranslationError(message.into(), Default::default())
    }

    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::ProtocolError(message.into(), Default::default())
    }

    /// Whether a render that fails with this error should show the placeholder chart
    /// instead of surfacing the error
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            VegaQueryError::LookupError(..)
                | VegaQueryError::TranslationError(..)
                | VegaQueryError::ProtocolError(..)
        )
    }

    /// Duplicate error. Wrapped foreign errors that aren't Clone become external errors
    pub fn duplicate(&self) -> Self {
        use VegaQueryError::*;
        match self {
            ParseError(msg, context) => ParseError(msg.clone(), context.clone()),
            CompilationError(msg, context) => CompilationError(msg.clone(), context.clone()),
            InternalError(msg, context) => InternalError(msg.clone(), context.clone()),
            ExternalError(msg, context) => ExternalError(msg.clone(), context.clone()),
            SpecificationError(msg, context) => SpecificationError(msg.clone(), context.clone()),
            LookupError(msg, context) => LookupError(msg.clone(), context.clone()),
            TranslationError(msg, context) => TranslationError(msg.clone(), context.clone()),
            ProtocolError(msg, context) => ProtocolError(msg.clone(), context.clone()),
            ArrowError(err, context) => ExternalError(err.to_string(), context.clone()),
            DataFusionError(err, context) => ExternalError(err.to_string(), context.clone()),
            IOError(err, context) => ExternalError(err.to_string(), context.clone()),
            SerdeJsonError(err, context) => ExternalError(err.to_string(), context.clone()),
        }
    }
}

pub trait ResultWithContext<R> {
    fn with_context<S, F>(self, context_fn: F) -> Result<R>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<R, E> ResultWithContext<R> for result::Result<R, E>
where
    E: Into<VegaQueryError>,
{
    fn with_context<S, F>(self, context_fn: F) -> Result<R>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|err| err.into().with_context(context_fn))
    }
}

impl<R> ResultWithContext<R> for Option<R> {
    fn with_context<S, F>(self, context_fn: F) -> Result<R>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.ok_or_else(|| VegaQueryError::internal(context_fn().into()))
    }
}

impl From<ParseFloatError> for VegaQueryError {
    fn from(err: ParseFloatError) -> Self {
        Self::parse(err.to_string())
    }
}

impl From<DataFusionError> for VegaQueryError {
    fn from(err: DataFusionError) -> Self {
        Self::DataFusionError(err, Default::default())
    }
}

impl From<ArrowError> for VegaQueryError {
    fn from(err: ArrowError) -> Self {
        Self::ArrowError(err, Default::default())
    }
}

impl From<std::io::Error> for VegaQueryError {
    fn from(err: std::io::Error) -> Self {
        Self::IOError(err, Default::default())
    }
}

impl From<serde_json::Error> for VegaQueryError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerdeJsonError(err, Default::default())
    }
}

pub trait ToExternalError<T> {
    fn external<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T, E: std::error::Error> ToExternalError<T> for std::result::Result<T, E> {
    fn external<S: Into<String>>(self, context: S) -> Result<T> {
        self.map_err(|err| {
            let context = ErrorContext {
                contexts: vec![context.into()],
            };
            VegaQueryError::ExternalError(err.to_string(), context)
        })
    }
}

pub trait DuplicateResult {
    fn duplicate(&self) -> Self;
}

impl<T> DuplicateResult for Result<T>
where
    T: Clone,
{
    fn duplicate(&self) -> Self {
        match self {
            Ok(v) => Ok(v.clone()),
            Err(err) => Err(err.duplicate()),
        }
    }
}
