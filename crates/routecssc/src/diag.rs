use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diag {
    pub level: Level,
    pub message: String,
    /// 1-based line of the declaration the diagnostic belongs to.
    pub line: usize,
}

impl fmt::Display for Diag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            Level::Error => "error",
            Level::Warning => "warning",
        };
        write!(f, "{level}: {} (line {})", self.message, self.line)
    }
}

#[derive(Default, Debug)]
pub struct Diagnostics {
    diags: Vec<Diag>,
}

impl Diagnostics {
    pub fn error<S: Into<String>>(&mut self, line: usize, message: S) {
        self.diags.push(Diag {
            level: Level::Error,
            message: message.into(),
            line,
        });
    }

    pub fn warning<S: Into<String>>(&mut self, line: usize, message: S) {
        self.diags.push(Diag {
            level: Level::Warning,
            message: message.into(),
            line,
        });
    }

    pub fn into_vec(self) -> Vec<Diag> {
        self.diags
    }
}

pub fn has_errors(diags: &[Diag]) -> bool {
    diags.iter().any(|d| d.level == Level::Error)
}
