//! Human-readable report of a configuration.

use std::io::{self, Write};

use crate::config::Config;
use crate::eval::Evaluation;
use crate::plugins::PluginRequirement;
use crate::value::Value;

fn render(value: &Value) -> String {
  match value {
    Value::Unknown(_) => "<unknown>".to_string(),
    Value::String(s) => format!("{:?}", s),
    other => other.to_string(),
  }
}

/// Write the inspection report.
///
/// `evaluation` is expected to come from a schema-only run, so datasource
/// outputs are usually unknown.
pub fn write_report(
  config: &Config,
  requirements: &[PluginRequirement],
  evaluation: &Evaluation,
  out: &mut dyn Write,
) -> io::Result<()> {
  writeln!(out, "Required plugins:")?;
  if requirements.is_empty() {
    writeln!(out, "  (none)")?;
  }
  for req in requirements {
    writeln!(out, "  {:<16} {}  {}", req.accessor, req.source, req.constraints)?;
  }

  writeln!(out)?;
  writeln!(out, "Variables:")?;
  if config.variables.is_empty() {
    writeln!(out, "  (none)")?;
  }
  for (name, def) in &config.variables {
    let value = if def.sensitive {
      "<sensitive>".to_string()
    } else {
      evaluation
        .context
        .variables
        .get(name)
        .map(render)
        .unwrap_or_else(|| "<unknown>".to_string())
    };
    write!(out, "  var.{}: {} = {}", name, def.ty, value)?;
    match &def.description {
      Some(description) => writeln!(out, "  # {}", description)?,
      None => writeln!(out)?,
    }
  }

  writeln!(out)?;
  writeln!(out, "Local values:")?;
  if config.locals.is_empty() {
    writeln!(out, "  (none)")?;
  }
  for name in config.locals.keys() {
    let value = evaluation
      .locals()
      .get(name)
      .map(render)
      .unwrap_or_else(|| "<unknown>".to_string());
    writeln!(out, "  local.{} = {}", name, value)?;
  }

  writeln!(out)?;
  writeln!(out, "Data sources:")?;
  if config.datasources.is_empty() {
    writeln!(out, "  (none)")?;
  }
  for (kind, name) in config.datasources.keys() {
    match evaluation.datasource(kind, name) {
      Some(Value::Unknown(ty)) => writeln!(out, "  data.{}.{}: {}", kind, name, ty)?,
      Some(value) => writeln!(out, "  data.{}.{} = {}", kind, name, render(value))?,
      None => writeln!(out, "  data.{}.{}: <unknown>", kind, name)?,
    }
  }

  writeln!(out)?;
  writeln!(out, "Builds:")?;
  if config.builds.is_empty() {
    writeln!(out, "  (none)")?;
  }
  for build in &config.builds {
    writeln!(out, "  {}", build.full_name())?;
    for (label, steps) in [
      ("provisioners", &build.provisioners),
      ("post-processors", &build.post_processors),
    ] {
      if steps.is_empty() {
        continue;
      }
      let names: Vec<&str> = steps.iter().map(|s| s.step_type.as_str()).collect();
      writeln!(out, "    {}: {}", label, names.join(", "))?;
    }
  }

  Ok(())
}
