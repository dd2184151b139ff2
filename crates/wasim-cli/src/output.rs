//! Structured step responses and human-facing output helpers.

use colored::Colorize;
use serde::{Deserialize, Serialize};

/// Structured record emitted for each step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    pub id: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<StepResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<u64>,
}

impl Response {
    /// Print the response as one JSON object, plus short human-facing
    /// summary lines.
    pub fn print(&self) {
        match serde_json::to_string(self) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::error!(error = %e, "failed to encode response"),
        }

        if let Some(result) = &self.result {
            if let Some(first) = result.response.as_ref().and_then(|r| r.first()) {
                println!("{} {}", "response:".blue(), first);
            }
            if let Some(balance) = result.balance {
                println!("{} {}", "fee balance:".yellow(), balance);
            }
        }
        if let Some(error) = &self.error {
            println!("{} {}", "error:".red(), error);
        }
    }
}

pub fn print_plan_banner(name: &str) {
    println!("{}{}\n", "simulating: ".green(), name);
}

pub fn print_success(msg: &str) {
    println!("{}", msg.green());
}
