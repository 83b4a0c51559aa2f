//! Structured diagnostics.
//!
//! Every public operation in this crate reports problems as [`Diagnostic`]
//! values instead of aborting. A diagnostic carries a severity, a kind from the
//! error taxonomy, a one-line summary, an optional detail paragraph and an
//! optional source location inside a configuration document.
//!
//! [`Diagnostics`] is the append-only collection returned to callers.
//! [`SharedDiagnostics`] is the accumulator used while nodes are evaluated in
//! parallel; it never loses or duplicates an entry.

use std::fmt;
use std::sync::Mutex;

use serde::Serialize;

/// How serious a diagnostic is. The caller decides whether to halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Warning,
  Error,
}

impl Severity {
  pub fn as_str(&self) -> &'static str {
    match self {
      Severity::Warning => "warning",
      Severity::Error => "error",
    }
  }
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Which part of the system produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
  /// Malformed configuration document or expression.
  Parse,
  /// Datasource failure, dependency cycle, bad reference.
  Evaluation,
  /// Unmatched selection pattern, invalid build definition.
  Selection,
  /// Missing plugin binary, conflicting requirement.
  Plugin,
  /// Invalid option combination or lifecycle misuse.
  Usage,
}

impl DiagnosticKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      DiagnosticKind::Parse => "parse",
      DiagnosticKind::Evaluation => "evaluation",
      DiagnosticKind::Selection => "selection",
      DiagnosticKind::Plugin => "plugin",
      DiagnosticKind::Usage => "usage",
    }
  }
}

impl fmt::Display for DiagnosticKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A location inside a configuration document.
///
/// `pointer` is a JSON pointer (RFC 6901) into the decoded document, e.g.
/// `/locals/ami_name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SourceRange {
  pub file: String,
  pub pointer: String,
}

impl SourceRange {
  pub fn new(file: impl Into<String>, pointer: impl Into<String>) -> Self {
    Self {
      file: file.into(),
      pointer: pointer.into(),
    }
  }

  /// Returns a new range pointing at a child key of this one.
  pub fn child(&self, key: &str) -> Self {
    let escaped = key.replace('~', "~0").replace('/', "~1");
    Self {
      file: self.file.clone(),
      pointer: format!("{}/{}", self.pointer, escaped),
    }
  }
}

impl fmt::Display for SourceRange {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.pointer.is_empty() {
      write!(f, "{}", self.file)
    } else {
      write!(f, "{}#{}", self.file, self.pointer)
    }
  }
}

/// A single structured message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
  pub severity: Severity,
  pub kind: DiagnosticKind,
  pub summary: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub detail: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub subject: Option<SourceRange>,
}

impl Diagnostic {
  pub fn new(severity: Severity, kind: DiagnosticKind, summary: impl Into<String>) -> Self {
    Self {
      severity,
      kind,
      summary: summary.into(),
      detail: None,
      subject: None,
    }
  }

  pub fn error(kind: DiagnosticKind, summary: impl Into<String>) -> Self {
    Self::new(Severity::Error, kind, summary)
  }

  pub fn warning(kind: DiagnosticKind, summary: impl Into<String>) -> Self {
    Self::new(Severity::Warning, kind, summary)
  }

  pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
    self.detail = Some(detail.into());
    self
  }

  pub fn with_subject(mut self, subject: SourceRange) -> Self {
    self.subject = Some(subject);
    self
  }

  /// Attach a subject only when one is known.
  pub fn with_subject_opt(mut self, subject: Option<SourceRange>) -> Self {
    self.subject = subject;
    self
  }

  pub fn is_error(&self) -> bool {
    self.severity == Severity::Error
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.severity, self.summary)?;
    if let Some(detail) = &self.detail {
      write!(f, ": {}", detail)?;
    }
    if let Some(subject) = &self.subject {
      write!(f, " (at {})", subject)?;
    }
    Ok(())
  }
}

/// Append-only collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, diagnostic: Diagnostic) {
    self.0.push(diagnostic);
  }

  pub fn extend(&mut self, other: Diagnostics) {
    self.0.extend(other.0);
  }

  pub fn has_errors(&self) -> bool {
    self.0.iter().any(Diagnostic::is_error)
  }

  pub fn error_count(&self) -> usize {
    self.0.iter().filter(|d| d.is_error()).count()
  }

  pub fn warning_count(&self) -> usize {
    self.0.len() - self.error_count()
  }

  pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
    self.0.iter().filter(move |d| d.kind == kind)
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn into_vec(self) -> Vec<Diagnostic> {
    self.0
  }
}

impl From<Diagnostic> for Diagnostics {
  fn from(diagnostic: Diagnostic) -> Self {
    Self(vec![diagnostic])
  }
}

impl From<Vec<Diagnostic>> for Diagnostics {
  fn from(diagnostics: Vec<Diagnostic>) -> Self {
    Self(diagnostics)
  }
}

impl FromIterator<Diagnostic> for Diagnostics {
  fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl IntoIterator for Diagnostics {
  type Item = Diagnostic;
  type IntoIter = std::vec::IntoIter<Diagnostic>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.into_iter()
  }
}

impl<'a> IntoIterator for &'a Diagnostics {
  type Item = &'a Diagnostic;
  type IntoIter = std::slice::Iter<'a, Diagnostic>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.iter()
  }
}

/// Thread-safe accumulator for diagnostics produced by parallel work.
#[derive(Debug, Default)]
pub struct SharedDiagnostics {
  inner: Mutex<Vec<Diagnostic>>,
}

impl SharedDiagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&self, diagnostic: Diagnostic) {
    // A panic in another worker must not drop what was already collected.
    let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.push(diagnostic);
  }

  pub fn extend(&self, diagnostics: Diagnostics) {
    let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.extend(diagnostics);
  }

  pub fn into_diagnostics(self) -> Diagnostics {
    Diagnostics(self.inner.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()))
  }
}
