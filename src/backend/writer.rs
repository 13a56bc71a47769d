/// Line-oriented text output with block indentation.
#[derive(Debug, Default)]
pub struct SourceWriter {
    output: String,
    indent: usize,
}

impl SourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_output(self) -> String {
        self.output
    }

    pub fn indent_level(&self) -> usize {
        self.indent
    }

    fn push_line(&mut self, string: impl AsRef<str>) {
        self.output.push_str(string.as_ref());
        self.output.push('\n');
    }

    pub fn line(&mut self, string: impl AsRef<str>) {
        let string = string.as_ref();
        if string.is_empty() {
            return self.blank();
        }
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
        self.push_line(string);
    }

    pub fn blank(&mut self) {
        self.output.push('\n');
    }

    /// `// text`, one comment line per line of `text`.
    pub fn comment(&mut self, comment: impl AsRef<str>) {
        for line in comment.as_ref().lines() {
            self.line(format!("// {line}").trim_end());
        }
    }

    /// `header {` and one more level of indentation.
    pub fn open(&mut self, header: impl AsRef<str>) {
        match header.as_ref() {
            "" => self.line("{"),
            header => self.line(format!("{header} {{")),
        }
        self.indent += 1;
    }

    pub fn close(&mut self) {
        self.close_with("}");
    }

    /// Closes the current block with `text`, e.g. `});` or `} else {`.
    pub fn close_with(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    /// `} else {`
    pub fn reopen(&mut self, text: impl AsRef<str>) {
        self.close_with(text);
        self.indent += 1;
    }

    /// Appends text verbatim, without indentation.
    pub fn raw(&mut self, text: &str) {
        self.output.push_str(text);
        if !text.is_empty() && !text.ends_with('\n') {
            self.output.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn nested_blocks_indent() {
        let mut writer = SourceWriter::new();
        writer.open("fn f()");
        writer.open("if x");
        writer.line("a();");
        writer.reopen("} else {");
        writer.comment("two\nlines");
        writer.close();
        writer.close();

        assert_eq!(
            writer.into_output(),
            indoc! {"
                fn f() {
                    if x {
                        a();
                    } else {
                        // two
                        // lines
                    }
                }
            "}
        );
    }

    #[test]
    fn raw_text_keeps_its_layout() {
        let mut writer = SourceWriter::new();
        writer.open("mod m");
        writer.raw("fn g() {}");
        writer.close();

        assert_eq!(writer.into_output(), "mod m {\nfn g() {}\n}\n");
    }
}
