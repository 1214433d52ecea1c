//! Lexical normalization: whitespace stripping, comment removal and
//! line continuation, producing the lines the parser works on.

/// One logical source line. Line numbers are 1-based; zero and negative
/// numbers mark lines synthesized by the assembler itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub no: i32,
    /// Normalized text: no whitespace (outside character literals), no
    /// comments, continuations merged.
    pub text: String,
    /// The untouched source text, kept for diagnostics.
    pub raw: String,
}

impl SourceLine {
    pub fn synthetic(no: i32, raw: &str) -> Self {
        SourceLine {
            no,
            text: String::new(),
            raw: raw.to_string(),
        }
    }
}

/// Placeholder that protects the space inside `' '` / `" "` character
/// literals while every other whitespace character is removed.
const SPACE_MARK: &str = "__SS__";

/// Comment marker; everything after it on a line is discarded.
const COMMENT: &str = "//";

pub fn normalize<'a, I>(lines: I) -> Vec<SourceLine>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out: Vec<SourceLine> = Vec::new();

    for (idx, raw) in lines.into_iter().enumerate() {
        // Protect a space that immediately follows a quote, then smash all
        // remaining whitespace and restore the protected ones. The second
        // replacement keeps a doubled space alive long enough to produce a
        // sensible error later instead of a silently mangled literal.
        let text = raw
            .replace("' ", &format!("'{SPACE_MARK}"))
            .replace("\" ", &format!("\"{SPACE_MARK}"))
            .replace(&format!("{SPACE_MARK} "), &format!("{SPACE_MARK}{SPACE_MARK}"));
        let text: String = text.split_whitespace().collect();
        let text = text.replace(SPACE_MARK, " ");

        let text = match text.find(COMMENT) {
            Some(pos) => text[..pos].to_string(),
            None => text,
        };

        if text.is_empty() {
            continue;
        }

        out.push(SourceLine {
            no: (idx + 1) as i32,
            text,
            raw: raw.to_string(),
        });
    }

    // Merge `\`-continued lines into their successor. A continuation on the
    // very last line has no successor; the caller turns that into an error.
    let mut cur = 0;
    while out.len() > 1 && cur < out.len() - 1 {
        if out[cur].text.ends_with('\\') {
            let next = out.remove(cur + 1);
            let line = &mut out[cur];
            line.text.pop();
            line.text.push_str(&next.text);
            line.raw.push_str(&next.raw);
        } else {
            cur += 1;
        }
    }

    out
}
