//! Document assembly: wraps caller markup in the fixed standalone preamble.

use std::borrow::Cow;

use tracing::info;

use crate::domain::error::ValidationError;

const VARIATION_TABLE: &str = "tkzTab";
const VARIATION_TABLE_INIT: &str = "tkzTabInit";
const VARIATION_TABLE_BODY: &str = "tkzTabVar";

/// Initializer injected when a variation table is used without one.
pub const DEFAULT_VARIATION_TABLE_INIT: &str =
    r"\tkzTabInit[lgt=1,espcl=2]{x /1 , f' /1 , f /1}{$-\infty$,0,$+\infty$}";

const PREAMBLE: &str = r"\documentclass[tikz,border=5pt]{standalone}
\usepackage[utf8]{inputenc}
\usepackage{fontspec}
\setmainfont{DejaVu Sans}
\usepackage[vietnamese]{babel}
\usepackage{amsmath, amsfonts, amssymb}
\usepackage{tikz}
\usepackage{tkz-tab}
\usepackage{tkz-euclide}
\usepackage{tikz-3dplot}
\usepackage{pgfplots}
\pgfplotsset{
    compat=1.18,
    restrict y to domain=-1e6:1e6,
    restrict x to domain=-1e6:1e6,
    samples=200,
    axis lines=middle,
    grid=major,
    ticklabel style={font=\small}
}
\usetikzlibrary{calc, intersections, 3d, perspective, arrows.meta}
\begin{document}
";

const POSTAMBLE: &str = "\n\\end{document}\n";

/// Apply the variation-table heuristics to raw markup.
///
/// A table without an initializer gets the default one prepended; a table with an
/// initializer but no `\tkzTabVar` body is refused so no compiler run is wasted on it.
pub fn shape_markup(markup: &str) -> Result<Cow<'_, str>, ValidationError> {
    if !markup.contains(VARIATION_TABLE) {
        return Ok(Cow::Borrowed(markup));
    }

    if !markup.contains(VARIATION_TABLE_INIT) {
        info!(
            target = "application::render::document",
            op = "document::shape_markup",
            result = "init_injected",
            "Auto-added tkzTabInit for variation table"
        );
        return Ok(Cow::Owned(format!(
            "{DEFAULT_VARIATION_TABLE_INIT}\n{markup}"
        )));
    }

    if !markup.contains(VARIATION_TABLE_BODY) {
        return Err(ValidationError::MissingVariationBody);
    }

    Ok(Cow::Borrowed(markup))
}

/// Wrap already-shaped markup into a complete compilable document.
pub fn wrap_document(markup: &str) -> String {
    let mut document = String::with_capacity(PREAMBLE.len() + markup.len() + POSTAMBLE.len());
    document.push_str(PREAMBLE);
    document.push_str(markup);
    document.push_str(POSTAMBLE);
    document
}

/// Shape and wrap markup in one step.
pub fn assemble(markup: &str) -> Result<String, ValidationError> {
    let shaped = shape_markup(markup)?;
    Ok(wrap_document(&shaped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_markup_is_wrapped_verbatim() {
        let document = assemble("$x^2$").expect("assembled");
        assert!(document.starts_with(r"\documentclass[tikz,border=5pt]{standalone}"));
        assert!(document.contains("\\begin{document}\n$x^2$\n\\end{document}"));
        assert!(document.contains("restrict y to domain=-1e6:1e6"));
        assert!(document.contains(r"\setmainfont{DejaVu Sans}"));
    }

    #[test]
    fn missing_initializer_is_injected() {
        let markup = r"\begin{tikzpicture}\tkzTabVar{-/ $0$, +/ $1$}\end{tikzpicture}";
        let shaped = shape_markup(markup).expect("shaped");
        assert!(matches!(shaped, Cow::Owned(_)));
        assert!(shaped.starts_with(DEFAULT_VARIATION_TABLE_INIT));
        assert!(shaped.ends_with(markup));
    }

    #[test]
    fn injected_document_equals_manual_prepend() {
        let markup = r"\begin{tikzpicture}\tkzTabVar{-/ $0$, +/ $1$}\end{tikzpicture}";
        let manual = format!("{DEFAULT_VARIATION_TABLE_INIT}\n{markup}");
        assert_eq!(
            assemble(markup).expect("auto"),
            assemble(&manual).expect("manual")
        );
    }

    #[test]
    fn initializer_without_body_is_rejected() {
        let markup = r"\begin{tikzpicture}\tkzTabInit{$x$ /1}{$0$, $1$}\end{tikzpicture}";
        assert_eq!(
            shape_markup(markup).expect_err("rejected"),
            ValidationError::MissingVariationBody
        );
    }

    #[test]
    fn complete_table_passes_through() {
        let markup = r"\tkzTabInit{$x$ /1}{$0$, $1$}\tkzTabVar{-/ $0$, +/ $1$}";
        let shaped = shape_markup(markup).expect("shaped");
        assert!(matches!(shaped, Cow::Borrowed(_)));
    }
}
