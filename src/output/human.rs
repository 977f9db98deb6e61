//! Human-readable output formatting

use crate::output::formatter::Report;

pub fn format_human(report: &Report) -> String {
    match report {
        Report::Outcomes(outcomes) => {
            if outcomes.is_empty() {
                return "No scripts".to_string();
            }
            let mut output = String::new();
            for outcome in outcomes {
                match &outcome.error {
                    None => output.push_str(&format!("  ok      {}\n", outcome.script)),
                    Some(err) => output.push_str(&format!("  FAILED  {}: {}\n", outcome.script, err)),
                }
            }
            let failed = outcomes.iter().filter(|o| !o.success).count();
            output.push_str(&format!(
                "\n{} script(s), {} failed",
                outcomes.len(),
                failed
            ));
            output
        }
        Report::Bundles { root, names } => {
            let mut output = format!("Bundles in {}\n", root);
            output.push_str(&"-".repeat(output.len() - 1));
            output.push('\n');
            if names.is_empty() {
                output.push_str("(none)");
            }
            for name in names {
                output.push_str(&format!("  {}\n", name));
            }
            output.trim_end().to_string()
        }
        Report::Scripts(scripts) => {
            if scripts.is_empty() {
                return "No scripts loaded".to_string();
            }
            let mut output = format!(
                "{:<20} {:<10} {:>5}  {:<20} {}\n",
                "NAME", "STATE", "TASKS", "LOADED", "COMMANDS"
            );
            for script in scripts {
                output.push_str(&format!(
                    "{:<20} {:<10} {:>5}  {:<20} {}\n",
                    script.name,
                    script.state,
                    script.tasks,
                    script.loaded_at.format("%Y-%m-%d %H:%M:%S"),
                    script.commands.join(", ")
                ));
            }
            output.trim_end().to_string()
        }
        Report::Commands(commands) => {
            if commands.is_empty() {
                return "No commands registered".to_string();
            }
            let mut output = String::new();
            for command in commands {
                output.push_str(&format!(
                    "  {:<16} {:<16} {}\n",
                    command.name,
                    format!("({})", command.owner),
                    command.description.as_deref().unwrap_or("")
                ));
            }
            output.trim_end().to_string()
        }
        Report::Variable(var) => match &var.value {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(value) => value.to_string(),
            None => format!("{}: '{}' is not set", var.script, var.path),
        },
        Report::Message(msg) => msg.clone(),
    }
}
