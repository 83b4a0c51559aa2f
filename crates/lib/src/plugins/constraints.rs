//! Plugin version constraints.
//!
//! Constraints are written as comma-separated clauses, every clause must hold:
//!
//! ```text
//! >= 1.2.0, < 2.0.0
//! ~> 1.4          (at least 1.4.0, below 2.0.0)
//! ~> 1.4.2        (at least 1.4.2, below 1.5.0)
//! 1.3.0           (exactly 1.3.0)
//! != 1.3.1
//! ```
//!
//! Clauses are normalized into `semver` comparators with every version part
//! present, which keeps the interval arithmetic used for conflict detection
//! simple.

use std::cmp::Ordering;
use std::fmt;

use semver::{Comparator, Op, Prerelease, Version, VersionReq};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstraintError {
  #[error("empty clause in version constraint '{0}'")]
  EmptyClause(String),

  #[error("'{clause}' is not a valid version constraint: {message}")]
  Invalid { clause: String, message: String },
}

/// A merged set of version constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionConstraints {
  clauses: Vec<String>,
  req: VersionReq,
  excluded: Vec<Version>,
}

/// One end of the interval a set of constraints allows.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Bound {
  version: Version,
  inclusive: bool,
}

impl VersionConstraints {
  /// Constraints that every version satisfies.
  pub fn any() -> Self {
    Self::default()
  }

  pub fn parse(text: &str) -> Result<Self, ConstraintError> {
    let mut constraints = Self::any();
    if text.trim().is_empty() {
      return Ok(constraints);
    }

    for clause in text.split(',') {
      let clause = clause.trim();
      if clause.is_empty() {
        return Err(ConstraintError::EmptyClause(text.to_string()));
      }
      constraints.push_clause(clause)?;
      constraints.clauses.push(clause.to_string());
    }
    Ok(constraints)
  }

  fn push_clause(&mut self, clause: &str) -> Result<(), ConstraintError> {
    let (op, rest) = ["~>", ">=", "<=", "!=", ">", "<", "="]
      .iter()
      .find_map(|op| clause.strip_prefix(op).map(|rest| (*op, rest)))
      .unwrap_or(("=", clause));

    let (version, precision) = parse_partial(rest.trim()).map_err(|message| ConstraintError::Invalid {
      clause: clause.to_string(),
      message,
    })?;

    match op {
      "=" => self.push(Op::Exact, &version),
      ">=" => self.push(Op::GreaterEq, &version),
      ">" => self.push(Op::Greater, &version),
      "<=" => self.push(Op::LessEq, &version),
      "<" => self.push(Op::Less, &version),
      "!=" => self.excluded.push(version),
      _ => {
        // pessimistic: the last given part may grow
        let upper = match precision {
          3 => Version::new(version.major, version.minor + 1, 0),
          _ => Version::new(version.major + 1, 0, 0),
        };
        self.push(Op::GreaterEq, &version);
        self.push(Op::Less, &upper);
      }
    }
    Ok(())
  }

  fn push(&mut self, op: Op, version: &Version) {
    self.req.comparators.push(Comparator {
      op,
      major: version.major,
      minor: Some(version.minor),
      patch: Some(version.patch),
      pre: version.pre.clone(),
    });
  }

  /// Add every clause of `other` to this set.
  pub fn merge(&mut self, other: &VersionConstraints) {
    for clause in &other.clauses {
      if !self.clauses.contains(clause) {
        self.clauses.push(clause.clone());
      }
    }
    self.req.comparators.extend(other.req.comparators.iter().cloned());
    self.excluded.extend(other.excluded.iter().cloned());
  }

  pub fn is_any(&self) -> bool {
    self.clauses.is_empty()
  }

  pub fn satisfied_by(&self, version: &Version) -> bool {
    self.req.matches(version) && !self.excluded.contains(version)
  }

  /// Returns false when no version can satisfy every clause.
  pub fn is_satisfiable(&self) -> bool {
    let (lower, upper) = self.bounds();
    match (&lower, &upper) {
      (Some(lo), Some(hi)) => match lo.version.cmp(&hi.version) {
        Ordering::Greater => false,
        Ordering::Equal => lo.inclusive && hi.inclusive && !self.excluded.contains(&lo.version),
        Ordering::Less => true,
      },
      _ => true,
    }
  }

  fn bounds(&self) -> (Option<Bound>, Option<Bound>) {
    let mut lower: Option<Bound> = None;
    let mut upper: Option<Bound> = None;

    for comparator in &self.req.comparators {
      let version = Version {
        major: comparator.major,
        minor: comparator.minor.unwrap_or(0),
        patch: comparator.patch.unwrap_or(0),
        pre: comparator.pre.clone(),
        build: Default::default(),
      };
      let (lo, hi) = match comparator.op {
        Op::Exact => (Some(true), Some(true)),
        Op::GreaterEq => (Some(true), None),
        Op::Greater => (Some(false), None),
        Op::LessEq => (None, Some(true)),
        Op::Less => (None, Some(false)),
        _ => (None, None),
      };
      if let Some(inclusive) = lo {
        tighten(&mut lower, Bound { version: version.clone(), inclusive }, Ordering::Greater);
      }
      if let Some(inclusive) = hi {
        tighten(&mut upper, Bound { version, inclusive }, Ordering::Less);
      }
    }
    (lower, upper)
  }
}

/// Replace `current` when `candidate` is stricter in direction `stricter`.
fn tighten(current: &mut Option<Bound>, candidate: Bound, stricter: Ordering) {
  let replace = match current {
    None => true,
    Some(existing) => match candidate.version.cmp(&existing.version) {
      Ordering::Equal => existing.inclusive && !candidate.inclusive,
      ord => ord == stricter,
    },
  };
  if replace {
    *current = Some(candidate);
  }
}

/// Parse `1`, `1.2`, `1.2.3` or `v1.2.3-beta`, returning how many numeric
/// parts were given.
fn parse_partial(text: &str) -> Result<(Version, usize), String> {
  let text = text.strip_prefix('v').unwrap_or(text);
  if text.is_empty() {
    return Err("missing version".to_string());
  }
  let (core, pre) = match text.split_once('-') {
    Some((core, pre)) => (core, Some(pre)),
    None => (text, None),
  };

  let parts: Vec<&str> = core.split('.').collect();
  if parts.len() > 3 {
    return Err(format!("too many version parts in '{}'", text));
  }
  let mut numbers = [0u64; 3];
  for (slot, part) in numbers.iter_mut().zip(&parts) {
    *slot = part.parse().map_err(|_| format!("'{}' is not a number", part))?;
  }

  let mut version = Version::new(numbers[0], numbers[1], numbers[2]);
  if let Some(pre) = pre {
    version.pre = Prerelease::new(pre).map_err(|e| e.to_string())?;
  }
  Ok((version, parts.len()))
}

impl fmt::Display for VersionConstraints {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_any() {
      f.write_str("any version")
    } else {
      f.write_str(&self.clauses.join(", "))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
  }

  #[test]
  fn pessimistic_operator_depends_on_precision() {
    let minor = VersionConstraints::parse("~> 1.4").unwrap();
    assert!(minor.satisfied_by(&v("1.9.0")));
    assert!(!minor.satisfied_by(&v("2.0.0")));
    assert!(!minor.satisfied_by(&v("1.3.9")));

    let patch = VersionConstraints::parse("~> 1.4.2").unwrap();
    assert!(patch.satisfied_by(&v("1.4.7")));
    assert!(!patch.satisfied_by(&v("1.5.0")));
  }

  #[test]
  fn bare_versions_are_exact_and_exclusions_apply() {
    let constraints = VersionConstraints::parse("1.3.0").unwrap();
    assert!(constraints.satisfied_by(&v("1.3.0")));
    assert!(!constraints.satisfied_by(&v("1.3.1")));

    let constraints = VersionConstraints::parse(">= 1.0, != 1.2.0").unwrap();
    assert!(!constraints.satisfied_by(&v("1.2.0")));
    assert!(constraints.satisfied_by(&v("1.2.1")));
  }

  #[test]
  fn merged_ranges_detect_conflicts() {
    let mut constraints = VersionConstraints::parse(">= 2.0.0").unwrap();
    constraints.merge(&VersionConstraints::parse("< 3.0.0").unwrap());
    assert!(constraints.is_satisfiable());
    assert_eq!(constraints.to_string(), ">= 2.0.0, < 3.0.0");

    constraints.merge(&VersionConstraints::parse("~> 1.1").unwrap());
    assert!(!constraints.is_satisfiable());
  }

  #[test]
  fn touching_bounds_need_both_inclusive() {
    assert!(VersionConstraints::parse(">= 1.0.0, <= 1.0.0").unwrap().is_satisfiable());
    assert!(!VersionConstraints::parse(">= 1.0.0, < 1.0.0").unwrap().is_satisfiable());
    assert!(!VersionConstraints::parse("1.0.0, != 1.0.0").unwrap().is_satisfiable());
  }

  #[test]
  fn invalid_clauses_are_errors() {
    assert!(matches!(
      VersionConstraints::parse(">= one"),
      Err(ConstraintError::Invalid { .. })
    ));
    assert!(matches!(
      VersionConstraints::parse(">= 1.0,"),
      Err(ConstraintError::EmptyClause(_))
    ));
    assert!(VersionConstraints::parse("").unwrap().is_any());
  }
}
