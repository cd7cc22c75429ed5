use crate::lexer;
use crate::loader::LoadError;
use crate::sources::FileSources;
use chumsky::span::Span as _;
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::term;
use codespan_reporting::term::termcolor::WriteColor;

/// Reports load errors. Lex batches are delegated to the lexer's own
/// formatter; parse errors are rendered here from their `Rich` payloads.
pub fn report_errors(
    writer: &mut impl WriteColor,
    files: &FileSources,
    errors: &[LoadError],
) -> Result<(), codespan_reporting::files::Error> {
    let config = term::Config::default();

    for error in errors {
        match error {
            LoadError::LexErrors { errors } => {
                lexer::format::report_errors(writer, files, errors)?;
            }
            LoadError::ParseErrors { errors } => {
                for parse_error in errors {
                    let span = parse_error.span();
                    let diagnostic = Diagnostic::error()
                        .with_message(format!("parse error: {}", parse_error))
                        .with_labels(vec![
                            Label::primary(span.context(), span.start..span.end)
                                .with_message(parse_error.reason().to_string()),
                        ]);
                    term::emit(writer, &config, files, &diagnostic)?;
                }
            }
            LoadError::PackageNameMismatch { span, .. }
            | LoadError::DuplicateDecl { span, .. }
            | LoadError::UnknownType { span, .. }
            | LoadError::UnknownQualifier { span, .. }
            | LoadError::NotAType { span, .. }
            | LoadError::InvalidReceiver { span }
            | LoadError::ImportCycle { span, .. } => {
                let mut labels =
                    vec![Label::primary(span.context, span.start..span.end)];
                if let LoadError::DuplicateDecl { previous, .. } = error {
                    labels.push(
                        Label::secondary(previous.context, previous.start..previous.end)
                            .with_message("previously declared here"),
                    );
                }
                let diagnostic = Diagnostic::error()
                    .with_message(error.to_string())
                    .with_labels(labels);
                term::emit(writer, &config, files, &diagnostic)?;
            }
            LoadError::PackageNotFound { span: Some(span), .. } => {
                let diagnostic = Diagnostic::error()
                    .with_message(error.to_string())
                    .with_labels(vec![Label::primary(span.context, span.start..span.end)]);
                term::emit(writer, &config, files, &diagnostic)?;
            }
            _ => {
                let diagnostic = Diagnostic::error().with_message(error.to_string());
                term::emit(writer, &config, files, &diagnostic)?;
            }
        }
    }

    Ok(())
}
