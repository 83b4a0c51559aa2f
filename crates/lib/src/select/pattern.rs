//! Build name patterns.

/// A build name pattern. `*` matches any run of characters (including dots),
/// `?` matches exactly one character; everything else matches itself.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pattern(String);

impl Pattern {
  pub fn new(pattern: impl Into<String>) -> Self {
    Self(pattern.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn matches(&self, name: &str) -> bool {
    let pattern: Vec<char> = self.0.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0, 0);
    // position of the last `*` and the name index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
      match pattern.get(p) {
        Some('*') => {
          backtrack = Some((p, n));
          p += 1;
        }
        Some('?') => {
          p += 1;
          n += 1;
        }
        Some(&c) if c == name[n] => {
          p += 1;
          n += 1;
        }
        _ => match backtrack {
          Some((star, tried)) => {
            p = star + 1;
            n = tried + 1;
            backtrack = Some((star, tried + 1));
          }
          None => return false,
        },
      }
    }

    pattern[p..].iter().all(|&c| c == '*')
  }
}

impl std::fmt::Display for Pattern {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}
