use super::{AnalysisError, TraceHop};
use crate::sources::FileSources;
use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use codespan_reporting::term;
use codespan_reporting::term::termcolor::WriteColor;
use crate::parser::ast::SourceId;

/// Reports analysis errors with their provenance traces.
pub fn report_errors(
    writer: &mut impl WriteColor,
    files: &FileSources,
    errors: &[AnalysisError],
) -> Result<(), codespan_reporting::files::Error> {
    let config = term::Config::default();
    for error in errors {
        let diag = diagnostic(error, Severity::Error);
        term::emit(writer, &config, files, &diag)?;
    }
    Ok(())
}

/// Reports unused-member diagnostics at the configured severity.
pub fn report_unused(
    writer: &mut impl WriteColor,
    files: &FileSources,
    diags: &[AnalysisError],
    strict: bool,
) -> Result<(), codespan_reporting::files::Error> {
    let severity = if strict {
        Severity::Error
    } else {
        Severity::Warning
    };
    let config = term::Config::default();
    for diag in diags {
        let rendered = diagnostic(diag, severity);
        term::emit(writer, &config, files, &rendered)?;
    }
    Ok(())
}

fn trace_labels(hops: &[TraceHop], labels: &mut Vec<Label<SourceId>>) {
    for hop in hops {
        labels.push(
            Label::secondary(hop.span.context, hop.span.start..hop.span.end)
                .with_message(hop.message.clone()),
        );
    }
}

fn diagnostic(error: &AnalysisError, severity: Severity) -> Diagnostic<SourceId> {
    let mut labels = Vec::new();
    if let Some(span) = error.span() {
        labels.push(Label::primary(span.context, span.start..span.end));
    }
    let mut notes = Vec::new();

    match error {
        AnalysisError::BindingConflict { previous, .. } => {
            trace_labels(previous, &mut labels);
            if !previous.is_empty() {
                notes.push("a previous binding already provides this type".to_string());
            }
        }
        AnalysisError::InputShadowsProvider { previous, .. } => {
            trace_labels(previous, &mut labels);
        }
        AnalysisError::MissingProvider {
            chain,
            injector_output,
            ..
        } => {
            trace_labels(chain, &mut labels);
            if *injector_output {
                notes.push("this type is the output of the injector".to_string());
            }
        }
        AnalysisError::Cycle { ty, trail, .. } => {
            let mut rendered = String::new();
            for (step_ty, producer) in trail {
                rendered.push_str(&format!("{} ({}) ->\n", step_ty, producer));
            }
            rendered.push_str(ty);
            notes.push(rendered);
        }
        _ => {}
    }

    Diagnostic::new(severity)
        .with_message(error.to_string())
        .with_labels(labels)
        .with_notes(notes)
}
