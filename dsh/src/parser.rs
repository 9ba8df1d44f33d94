//! Turns one input line into a [`Pipeline`] of [`Stage`]s.
//!
//! Grammar, such as it is: the line is split on `|` into at most
//! [`MAX_STAGES`] segments. Each segment is split on unquoted blanks; a `"`
//! toggles quoting and is dropped from the token. An unterminated quote runs
//! to the end of its segment. Unquoted `<`, `>` and `>>` introduce file
//! redirections, either as separate words or glued to the file name.

use crate::error::ParseError;
use crate::limits::{ARG_MAX, EXE_MAX, MAX_STAGES, PIPE_CHAR, QUOTE_CHAR};
use std::ffi::{CString, NulError};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRedirect {
    pub path: PathBuf,
    pub append: bool,
}

/// One command of a pipeline. `argv[0]` is the executable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    argv: Vec<String>,
    input: Option<PathBuf>,
    output: Option<OutputRedirect>,
}

impl Stage {
    /// Builds a stage without redirections; an empty `argv` is an
    /// [`ParseError::EmptyStage`].
    pub fn new<I, S>(argv: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        if argv.is_empty() {
            return Err(ParseError::EmptyStage);
        }
        Ok(Stage { argv, input: None, output: None })
    }

    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input = Some(path.into());
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>, append: bool) -> Self {
        self.output = Some(OutputRedirect { path: path.into(), append });
        self
    }

    pub fn exe(&self) -> &str {
        &self.argv[0]
    }

    /// Arguments after the executable name.
    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn input(&self) -> Option<&Path> {
        self.input.as_deref()
    }

    pub fn output(&self) -> Option<&OutputRedirect> {
        self.output.as_ref()
    }

    /// Exec-style argument vector.
    pub(crate) fn c_argv(&self) -> Result<Vec<CString>, NulError> {
        self.argv.iter().map(|a| CString::new(a.as_str())).collect()
    }
}

/// Ordered stages of one input line, bounded by [`MAX_STAGES`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline { stages: Vec::with_capacity(MAX_STAGES) }
    }

    /// Appends a stage, refusing to grow past [`MAX_STAGES`].
    pub fn push(&mut self, stage: Stage) -> Result<(), ParseError> {
        if self.stages.len() >= MAX_STAGES {
            return Err(ParseError::TooManyStages);
        }
        self.stages.push(stage);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn first(&self) -> Option<&Stage> {
        self.stages.first()
    }

    /// Drops the leading stage and returns it.
    pub fn shift(&mut self) -> Option<Stage> {
        if self.stages.is_empty() {
            None
        } else {
            Some(self.stages.remove(0))
        }
    }

    pub fn into_stages(self) -> Vec<Stage> {
        self.stages
    }
}

impl TryFrom<Vec<Stage>> for Pipeline {
    type Error = ParseError;

    fn try_from(stages: Vec<Stage>) -> Result<Self, Self::Error> {
        let mut pipeline = Pipeline::new();
        for stage in stages {
            pipeline.push(stage)?;
        }
        Ok(pipeline)
    }
}

pub fn parse_line(line: &str) -> Result<Pipeline, ParseError> {
    if line.contains('\0') {
        return Err(ParseError::NulByte);
    }
    if line.trim().is_empty() {
        return Err(ParseError::NoCommands);
    }
    let segments: Vec<&str> = line.split(PIPE_CHAR).collect();
    if segments.len() > MAX_STAGES {
        return Err(ParseError::TooManyStages);
    }
    let mut pipeline = Pipeline::new();
    for seg in segments {
        pipeline.push(parse_stage(seg.trim())?)?;
    }
    Ok(pipeline)
}

#[derive(Debug)]
struct Token {
    text: String,
    quoted: bool,
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn tokenize(seg: &str) -> Vec<Token> {
    let mut toks = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    for c in seg.chars() {
        if c == QUOTE_CHAR {
            in_quotes = !in_quotes;
            quoted = true;
            continue;
        }
        if !in_quotes && is_blank(c) {
            if !cur.is_empty() {
                toks.push(Token { text: std::mem::take(&mut cur), quoted });
            }
            quoted = false;
            continue;
        }
        cur.push(c);
    }
    if !cur.is_empty() {
        toks.push(Token { text: cur, quoted });
    }
    toks
}

enum RedirOp {
    Input,
    Output { append: bool },
}

fn split_redirect(text: &str) -> Option<(RedirOp, &str)> {
    if let Some(rest) = text.strip_prefix(">>") {
        Some((RedirOp::Output { append: true }, rest))
    } else if let Some(rest) = text.strip_prefix('>') {
        Some((RedirOp::Output { append: false }, rest))
    } else {
        text.strip_prefix('<').map(|rest| (RedirOp::Input, rest))
    }
}

fn parse_stage(seg: &str) -> Result<Stage, ParseError> {
    let toks = tokenize(seg);
    if toks.is_empty() {
        return Err(ParseError::EmptyStage);
    }
    // limits apply to the raw words, redirections included
    if toks[0].text.len() >= EXE_MAX {
        return Err(ParseError::CmdOrArgsTooBig);
    }
    let rest = &toks[1..];
    let combined = rest.iter().map(|t| t.text.len()).sum::<usize>() + rest.len().saturating_sub(1);
    if combined >= ARG_MAX {
        return Err(ParseError::CmdOrArgsTooBig);
    }

    let mut argv = Vec::with_capacity(toks.len());
    let mut input = None;
    let mut output = None;
    let mut it = toks.into_iter();
    while let Some(tok) = it.next() {
        let redir = if tok.quoted {
            None
        } else {
            split_redirect(&tok.text).map(|(op, glued)| (op, glued.to_string()))
        };
        match redir {
            Some((op, glued)) => {
                let target = if glued.is_empty() {
                    it.next().map(|t| t.text).ok_or(ParseError::MissingRedirectTarget)?
                } else {
                    glued
                };
                match op {
                    RedirOp::Input => input = Some(PathBuf::from(target)),
                    RedirOp::Output { append } => {
                        output = Some(OutputRedirect { path: PathBuf::from(target), append })
                    }
                }
            }
            None => argv.push(tok.text),
        }
    }
    if argv.is_empty() {
        return Err(ParseError::EmptyStage);
    }
    Ok(Stage { argv, input, output })
}
