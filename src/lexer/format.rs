use crate::lexer::LexError;
use crate::sources::FileSources;
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::term;
use codespan_reporting::term::termcolor::WriteColor;

/// Reports lexer errors using codespan-reporting.
pub fn report_errors(
    writer: &mut impl WriteColor,
    files: &FileSources,
    errors: &[LexError],
) -> Result<(), codespan_reporting::files::Error> {
    let config = term::Config::default();

    for error in errors {
        let span = error.span();
        let diagnostic = match error {
            LexError::UnexpectedChar(_) => Diagnostic::error()
                .with_message("unexpected character")
                .with_labels(vec![
                    Label::primary(span.context, span.start..span.end)
                        .with_message("this character is not valid here"),
                ]),
            LexError::UnterminatedString(_) => Diagnostic::error()
                .with_message("unterminated string literal")
                .with_labels(vec![
                    Label::primary(span.context, span.start..span.end)
                        .with_message("string starts here but is never closed"),
                ]),
            LexError::MalformedNumber(_) => Diagnostic::error()
                .with_message("malformed number literal")
                .with_labels(vec![Label::primary(span.context, span.start..span.end)]),
            LexError::MalformedDirective(_) => Diagnostic::error()
                .with_message("malformed directive")
                .with_labels(vec![
                    Label::primary(span.context, span.start..span.end)
                        .with_message("expected `#:when <tag>` or `#:unless <tag>`"),
                ]),
        };

        term::emit(writer, &config, files, &diagnostic)?;
    }

    Ok(())
}
