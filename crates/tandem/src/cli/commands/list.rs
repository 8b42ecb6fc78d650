//! List command

use clap::Args;
use console::style;
use tracing::info;

use tandem_core::{Package, WorkingSet};

use crate::cli::output;
use crate::cli::{Cli, OutputFormat};

use super::context::Context;

/// List the selected packages in name order
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Also show local dependencies and dependents
    #[arg(short, long)]
    pub long: bool,
}

impl ListCommand {
    pub fn execute(&self, cli: &Cli, context: &Context) -> anyhow::Result<()> {
        info!("executing list command");
        let (_, working_set) = context.working_set()?;

        match cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&list_json(&working_set, context))?);
            }
            OutputFormat::Text => {
                if working_set.is_empty() {
                    if !cli.quiet {
                        output::warning("No packages selected");
                    }
                    return Ok(());
                }
                for package in &working_set {
                    self.print_package(package, context);
                }
                if !cli.quiet {
                    println!();
                    println!(
                        "{}",
                        style(output::count(working_set.len(), "package")).dim()
                    );
                }
            }
        }

        Ok(())
    }

    fn print_package(&self, package: &Package, context: &Context) {
        println!(
            "{} {} {}",
            output::name_style().apply_to(&package.name),
            output::version_style().apply_to(package.version.as_deref().unwrap_or("-")),
            output::path_style().apply_to(relative(package, context)),
        );
        if self.long {
            if !package.local_dependencies.is_empty() {
                println!("  {}", style("dependencies:").dim());
                for dep in &package.local_dependencies {
                    println!("    {}", dep);
                }
            }
            if !package.local_dependents.is_empty() {
                println!("  {}", style("dependents:").dim());
                for dependent in &package.local_dependents {
                    println!("    {}", dependent);
                }
            }
        }
    }
}

fn relative(package: &Package, context: &Context) -> String {
    package
        .path
        .strip_prefix(&context.run.root_dir)
        .unwrap_or(&package.path)
        .display()
        .to_string()
}

fn list_json(working_set: &WorkingSet, context: &Context) -> serde_json::Value {
    serde_json::Value::Array(
        working_set
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "version": p.version,
                    "path": relative(p, context),
                    "scripts": p.scripts.keys().collect::<Vec<_>>(),
                    "dependencies": p.local_dependencies,
                    "dependents": p.local_dependents,
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_list_json() {
        let temp = TempDir::new().unwrap();
        for (dir, manifest) in [
            ("ui", r#"{"name": "ui", "version": "2.0.0", "dependencies": {"core": "^1"}}"#),
            ("core", r#"{"name": "core", "scripts": {"build": "tsc"}}"#),
        ] {
            let dir = temp.path().join("packages").join(dir);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("package.json"), manifest).unwrap();
        }

        let cli = Cli::try_parse_from(["tandem", "-C", temp.path().to_str().unwrap(), "list"])
            .unwrap();
        let context = Context::load(&cli).unwrap();
        let (_, working_set) = context.working_set().unwrap();
        let json = list_json(&working_set, &context);

        assert_eq!(json[0]["name"], "core");
        assert_eq!(json[0]["scripts"], serde_json::json!(["build"]));
        assert_eq!(json[0]["dependents"], serde_json::json!(["ui"]));
        assert_eq!(json[1]["version"], "2.0.0");
        assert_eq!(json[1]["path"], "packages/ui");
    }
}
