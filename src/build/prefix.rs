//! Vendor prefixing for compiled stylesheets.
//!
//! Runs in-process with lightningcss against a browserslist target matrix.

use super::error::BuildError;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

const TOOL: &str = "lightningcss";

/// Adds the vendor prefixes a set of browsers needs.
#[derive(Debug, Clone)]
pub struct Prefixer {
    queries: Vec<String>,
    browsers: Option<Browsers>,
}

impl Prefixer {
    /// Resolve browserslist `queries` into a target matrix.
    pub fn new(queries: &[String]) -> Result<Self, BuildError> {
        let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str)).map_err(|e| {
            BuildError::InvalidDeclaration(format!(
                "invalid browsers query {:?}: {}",
                queries, e
            ))
        })?;
        Ok(Self { queries: queries.to_vec(), browsers })
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    fn targets(&self) -> Targets {
        Targets { browsers: self.browsers, ..Targets::default() }
    }

    /// Parse `css`, add prefixes and print it back.
    ///
    /// Input that is not plain CSS (for example uncompiled SCSS) is a syntax
    /// error attributed to the prefixer.
    pub fn process(&self, css: &str, filename: &str, minify: bool) -> Result<String, BuildError> {
        let syntax = |message: String| BuildError::SourceSyntax {
            tool: TOOL.to_string(),
            diagnostics: format!("{}: {}", filename, message),
        };

        let mut sheet = StyleSheet::parse(
            css,
            ParserOptions { filename: filename.to_string(), ..ParserOptions::default() },
        )
        .map_err(|e| syntax(e.to_string()))?;

        sheet
            .minify(MinifyOptions { targets: self.targets(), ..MinifyOptions::default() })
            .map_err(|e| syntax(e.to_string()))?;

        let printed = sheet
            .to_css(PrinterOptions { minify, targets: self.targets(), ..PrinterOptions::default() })
            .map_err(|e| syntax(e.to_string()))?;

        Ok(printed.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixer(queries: &[&str]) -> Prefixer {
        Prefixer::new(&queries.iter().map(|q| q.to_string()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn test_flex_prefixed_for_old_ie() {
        let css = prefixer(&["ie 10"]).process(".row { display: flex; }", "bundle.css", false).unwrap();
        assert!(css.contains("-ms-flexbox"), "missing prefix in: {}", css);
        assert!(css.contains("display: flex"));
    }

    #[test]
    fn test_modern_targets_leave_flex_alone() {
        let css = prefixer(&["last 1 chrome version"])
            .process(".row { display: flex; }", "bundle.css", false)
            .unwrap();
        assert!(!css.contains("-ms-flexbox"));
    }

    #[test]
    fn test_minified_output() {
        let css = prefixer(&["defaults"])
            .process(".a {\n  color: red;\n}\n", "bundle.css", true)
            .unwrap();
        assert_eq!(css, ".a{color:red}");
    }

    #[test]
    fn test_raw_scss_is_a_syntax_error() {
        let result = prefixer(&["defaults"]).process("$accent: red;\n.a { color: $accent; }", "app.scss", false);
        match result {
            Err(BuildError::SourceSyntax { tool, diagnostics }) => {
                assert_eq!(tool, "lightningcss");
                assert!(diagnostics.starts_with("app.scss: "));
            }
            other => panic!("expected SourceSyntax, got {:?}", other),
        }
    }

    #[test]
    fn test_deterministic_output() {
        let p = prefixer(&["ie 10", "safari 8"]);
        let input = ".a { display: flex; user-select: none; }";
        assert_eq!(p.process(input, "x.css", true).unwrap(), p.process(input, "x.css", true).unwrap());
    }

    #[test]
    fn test_bad_query_rejected() {
        let result = Prefixer::new(&["definitely not a browser 99".to_string()]);
        assert!(matches!(result, Err(BuildError::InvalidDeclaration(_))));
    }
}
