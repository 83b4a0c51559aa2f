//! Configuration model.
//!
//! A configuration is one or more JSON documents ([`ConfigFile`]). Decoding
//! merges them into a single [`Config`] whose values are parsed expressions,
//! reporting every problem as a diagnostic rather than stopping at the first.

mod load;
mod types;
pub mod variables;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, SourceRange};
use crate::expr::{Expr, Reference};
use crate::fix;
use crate::value::{Value, ValueType};

pub use load::{ConfigFile, LoadError, load_paths};
pub use types::{BuildDecl, ConfigDocument, PluginDecl, StepDecl, VariableDecl};

/// A plugin requirement exactly as declared, before merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredRequirement {
  pub accessor: String,
  pub source: String,
  pub version: Option<String>,
  pub subject: SourceRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef {
  pub name: String,
  pub ty: ValueType,
  pub default: Option<Value>,
  pub description: Option<String>,
  pub sensitive: bool,
  pub subject: SourceRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalDef {
  pub name: String,
  pub expr: Expr,
  pub subject: SourceRange,
}

impl LocalDef {
  pub fn reference(&self) -> Reference {
    Reference::Local(self.name.clone())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasourceDef {
  pub kind: String,
  pub name: String,
  pub body: BTreeMap<String, Expr>,
  pub subject: SourceRange,
}

impl DatasourceDef {
  pub fn reference(&self) -> Reference {
    Reference::Data {
      kind: self.kind.clone(),
      name: self.name.clone(),
    }
  }
}

/// A provisioner or post-processor attached to a build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildStep {
  pub step_type: String,
  pub only: Vec<String>,
  pub except: Vec<String>,
  pub body: BTreeMap<String, Expr>,
  pub subject: SourceRange,
}

/// One named artifact-producing build unit.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildDefinition {
  pub name: String,
  pub builder_type: String,
  pub group: Option<String>,
  pub body: BTreeMap<String, Expr>,
  pub provisioners: Vec<BuildStep>,
  pub post_processors: Vec<BuildStep>,
  pub subject: SourceRange,
}

impl BuildDefinition {
  /// `type.name`, the name patterns are usually written against.
  pub fn short_name(&self) -> String {
    format!("{}.{}", self.builder_type, self.name)
  }

  /// `group.type.name` for grouped builds, `type.name` otherwise.
  pub fn full_name(&self) -> String {
    match &self.group {
      Some(group) => format!("{}.{}", group, self.short_name()),
      None => self.short_name(),
    }
  }
}

/// The merged, decoded configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
  /// Directory of the first configuration file, exposed as `path.root`.
  pub root: PathBuf,
  pub requirements: Vec<DeclaredRequirement>,
  pub variables: BTreeMap<String, VariableDef>,
  pub locals: BTreeMap<String, LocalDef>,
  pub datasources: BTreeMap<(String, String), DatasourceDef>,
  pub builds: Vec<Arc<BuildDefinition>>,
}

impl Config {
  /// Decode and merge configuration files.
  ///
  /// Always returns a config; entries that could not be decoded are left out
  /// and reported as parse diagnostics.
  pub fn decode(files: &[ConfigFile]) -> (Config, Diagnostics) {
    let mut config = Config {
      root: files
        .first()
        .map(|f| root_of(&f.path))
        .unwrap_or_else(|| PathBuf::from(".")),
      ..Config::default()
    };
    let mut diags = Diagnostics::new();

    for file in files {
      let file_name = file.display_name();
      let document = match serde_json::from_value::<ConfigDocument>(file.document.clone()) {
        Ok(doc) => doc,
        Err(e) => {
          let mut diag = Diagnostic::error(DiagnosticKind::Parse, "Invalid configuration document")
            .with_subject(SourceRange::new(&file_name, ""));
          let legacy = fix::pending_fixes(&file.document);
          diag = if legacy.is_empty() {
            diag.with_detail(e.to_string())
          } else {
            diag.with_detail(format!(
              "{}; this document uses a legacy layout ({}), run `kiln fix` to upgrade it",
              e,
              legacy.join(", ")
            ))
          };
          diags.push(diag);
          continue;
        }
      };
      config.merge_document(&file_name, document, &mut diags);
    }

    debug!(
      variables = config.variables.len(),
      locals = config.locals.len(),
      datasources = config.datasources.len(),
      builds = config.builds.len(),
      "decoded configuration"
    );

    (config, diags)
  }

  pub fn local(&self, name: &str) -> Option<&LocalDef> {
    self.locals.get(name)
  }

  pub fn datasource(&self, kind: &str, name: &str) -> Option<&DatasourceDef> {
    self.datasources.get(&(kind.to_string(), name.to_string()))
  }

  /// Returns true when `reference` names something declared in this config.
  pub fn declares(&self, reference: &Reference) -> bool {
    match reference {
      Reference::Variable(name) => self.variables.contains_key(name),
      Reference::Local(name) => self.locals.contains_key(name),
      Reference::Data { kind, name } => self.datasource(kind, name).is_some(),
      Reference::Path(_) => true,
    }
  }

  fn merge_document(&mut self, file_name: &str, document: ConfigDocument, diags: &mut Diagnostics) {
    let root = SourceRange::new(file_name, "");

    let plugins = root.child("required_plugins");
    for (accessor, decl) in document.required_plugins {
      self.requirements.push(DeclaredRequirement {
        subject: plugins.child(&accessor),
        accessor,
        source: decl.source,
        version: decl.version,
      });
    }

    let variables = root.child("variables");
    for (name, decl) in document.variables {
      let subject = variables.child(&name);
      if let Some(existing) = self.variables.get(&name) {
        diags.push(duplicate("variable", &name, &existing.subject, subject));
        continue;
      }
      if let Some(def) = decode_variable(&name, decl, subject, diags) {
        self.variables.insert(name, def);
      }
    }

    let locals = root.child("locals");
    for (name, raw) in document.locals {
      let subject = locals.child(&name);
      if let Some(existing) = self.locals.get(&name) {
        diags.push(duplicate("local value", &name, &existing.subject, subject));
        continue;
      }
      match Expr::from_json(&raw) {
        Ok(expr) => {
          self.locals.insert(name.clone(), LocalDef { name, expr, subject });
        }
        Err(e) => diags.push(expression_error(&e, subject)),
      }
    }

    let data = root.child("data");
    for (kind, by_name) in document.data {
      let kind_range = data.child(&kind);
      for (name, raw_body) in by_name {
        let subject = kind_range.child(&name);
        let key = (kind.clone(), name.clone());
        if let Some(existing) = self.datasources.get(&key) {
          diags.push(duplicate("data source", &format!("{}.{}", kind, name), &existing.subject, subject));
          continue;
        }
        if let Some(body) = decode_body(&raw_body, &subject, diags) {
          self.datasources.insert(
            key,
            DatasourceDef {
              kind: kind.clone(),
              name,
              body,
              subject,
            },
          );
        }
      }
    }

    let builds = root.child("builds");
    for (idx, decl) in document.builds.into_iter().enumerate() {
      let subject = builds.child(&idx.to_string());
      if let Some(build) = decode_build(decl, subject, diags) {
        let full_name = build.full_name();
        if let Some(existing) = self.builds.iter().find(|b| b.full_name() == full_name) {
          diags.push(duplicate("build", &full_name, &existing.subject, build.subject.clone()));
          continue;
        }
        self.builds.push(Arc::new(build));
      }
    }
  }
}

fn root_of(path: &Path) -> PathBuf {
  match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => PathBuf::from("."),
  }
}

fn duplicate(what: &str, name: &str, first: &SourceRange, subject: SourceRange) -> Diagnostic {
  Diagnostic::error(DiagnosticKind::Parse, format!("Duplicate {} \"{}\"", what, name))
    .with_detail(format!("first declared at {}", first))
    .with_subject(subject)
}

fn expression_error(err: &crate::expr::ParseError, subject: SourceRange) -> Diagnostic {
  Diagnostic::error(DiagnosticKind::Parse, "Invalid expression")
    .with_detail(err.to_string())
    .with_subject(subject)
}

fn decode_variable(name: &str, decl: VariableDecl, subject: SourceRange, diags: &mut Diagnostics) -> Option<VariableDef> {
  let ty = match decl.ty.as_deref().map(ValueType::parse) {
    None => ValueType::Any,
    Some(Ok(ty)) => ty,
    Some(Err(e)) => {
      diags.push(
        Diagnostic::error(DiagnosticKind::Parse, "Invalid variable type")
          .with_detail(e.to_string())
          .with_subject(subject.child("type")),
      );
      return None;
    }
  };

  let default = decl.default.map(Value::from);
  if let Some(value) = &default
    && !value.conforms_to(&ty)
  {
    diags.push(
      Diagnostic::error(DiagnosticKind::Parse, "Invalid default value for variable")
        .with_detail(format!(
          "var.{} is declared as {} but its default is a {}",
          name,
          ty,
          value.type_name()
        ))
        .with_subject(subject.child("default")),
    );
    return None;
  }

  Some(VariableDef {
    name: name.to_string(),
    ty,
    default,
    description: decl.description,
    sensitive: decl.sensitive,
    subject,
  })
}

fn decode_body(
  raw: &BTreeMap<String, serde_json::Value>,
  subject: &SourceRange,
  diags: &mut Diagnostics,
) -> Option<BTreeMap<String, Expr>> {
  let mut body = BTreeMap::new();
  let mut ok = true;
  for (key, value) in raw {
    match Expr::from_json(value) {
      Ok(expr) => {
        body.insert(key.clone(), expr);
      }
      Err(e) => {
        diags.push(expression_error(&e, subject.child(key)));
        ok = false;
      }
    }
  }
  ok.then_some(body)
}

fn decode_steps(decls: Vec<StepDecl>, subject: &SourceRange, diags: &mut Diagnostics) -> Option<Vec<BuildStep>> {
  let mut steps = Vec::with_capacity(decls.len());
  let mut ok = true;
  for (idx, decl) in decls.into_iter().enumerate() {
    let step_subject = subject.child(&idx.to_string());
    match decode_body(&decl.config, &step_subject.child("config"), diags) {
      Some(body) => steps.push(BuildStep {
        step_type: decl.step_type,
        only: decl.only,
        except: decl.except,
        body,
        subject: step_subject,
      }),
      None => ok = false,
    }
  }
  ok.then_some(steps)
}

fn decode_build(decl: BuildDecl, subject: SourceRange, diags: &mut Diagnostics) -> Option<BuildDefinition> {
  let body = decode_body(&decl.config, &subject.child("config"), diags);
  let provisioners = decode_steps(decl.provisioners, &subject.child("provisioners"), diags);
  let post_processors = decode_steps(decl.post_processors, &subject.child("post_processors"), diags);

  Some(BuildDefinition {
    name: decl.name,
    builder_type: decl.builder_type,
    group: decl.group,
    body: body?,
    provisioners: provisioners?,
    post_processors: post_processors?,
    subject,
  })
}
