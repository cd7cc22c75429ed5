//! The provider-graph analyzer: lowering to IR, provider-map
//! construction, acyclicity checking, and the call-plan solver.

pub mod format;
pub mod ir;
pub mod lower;
pub mod sets;
pub mod solve;

use crate::parser::ast::Span;
use thiserror::Error;

/// One hop of a provenance trace: how a type came to be provided,
/// including hops across imported sets.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceHop {
    pub message: String,
    pub span: Span,
}

/// Errors produced by the analyzer. Every pass collects all independent
/// errors before returning; messages render type handles textually because
/// printed forms are for diagnostics only.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("wrong signature for provider {name}: {reason}")]
    InvalidProvider {
        span: Span,
        name: String,
        reason: String,
    },

    #[error("inject {name}: {reason}")]
    InvalidInjector {
        span: Span,
        name: String,
        reason: String,
    },

    #[error("{reason}")]
    InvalidBinding { span: Span, reason: String },

    #[error("no binding target for {ty}")]
    MissingBindingTarget { span: Span, ty: String },

    #[error("{reason}")]
    InvalidValueExpression { span: Span, reason: String },

    #[error("call to {name} takes exactly {expected}")]
    PrimitiveArity {
        span: Span,
        name: &'static str,
        expected: &'static str,
    },

    #[error("unknown pattern")]
    UnknownPattern { span: Span },

    #[error("injector template must contain only a build call and an optional return")]
    MixedStubStatements { span: Span },

    #[error("multiple bindings for {ty}")]
    BindingConflict {
        span: Span,
        ty: String,
        previous: Vec<TraceHop>,
    },

    #[error("cycle for {ty}")]
    Cycle {
        span: Span,
        ty: String,
        /// `(type, provider)` pairs along the cycle, ending back at `ty`.
        trail: Vec<(String, String)>,
    },

    #[error("no provider found for {ty}")]
    MissingProvider {
        span: Option<Span>,
        ty: String,
        injector_output: bool,
        /// The requirement chain from the injector output down to `ty`.
        chain: Vec<TraceHop>,
    },

    #[error("inject {injector}: provider for {ty} returns cleanup but injection does not return cleanup function")]
    UnexpectedCleanup {
        span: Span,
        injector: String,
        ty: String,
    },

    #[error("inject {injector}: provider for {ty} returns error but injection not allowed to fail")]
    UnexpectedError {
        span: Span,
        injector: String,
        ty: String,
    },

    #[error("multiple inputs of the same type {ty}")]
    DuplicateInjectorInput { span: Span, ty: String },

    #[error("input of {ty} conflicts with {what}")]
    InputShadowsProvider {
        span: Span,
        ty: String,
        what: String,
        previous: Vec<TraceHop>,
    },

    #[error("provider set {name} includes itself")]
    SetImportCycle { span: Span, name: String },

    #[error("unused {kind} {name}")]
    UnusedMember {
        span: Span,
        kind: &'static str,
        name: String,
    },
}

impl AnalysisError {
    pub fn span(&self) -> Option<Span> {
        match self {
            AnalysisError::InvalidProvider { span, .. }
            | AnalysisError::InvalidInjector { span, .. }
            | AnalysisError::InvalidBinding { span, .. }
            | AnalysisError::MissingBindingTarget { span, .. }
            | AnalysisError::InvalidValueExpression { span, .. }
            | AnalysisError::PrimitiveArity { span, .. }
            | AnalysisError::UnknownPattern { span }
            | AnalysisError::MixedStubStatements { span }
            | AnalysisError::BindingConflict { span, .. }
            | AnalysisError::Cycle { span, .. }
            | AnalysisError::UnexpectedCleanup { span, .. }
            | AnalysisError::UnexpectedError { span, .. }
            | AnalysisError::DuplicateInjectorInput { span, .. }
            | AnalysisError::InputShadowsProvider { span, .. }
            | AnalysisError::SetImportCycle { span, .. }
            | AnalysisError::UnusedMember { span, .. } => Some(*span),
            AnalysisError::MissingProvider { span, .. } => *span,
        }
    }
}
