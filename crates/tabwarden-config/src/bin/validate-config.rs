//! Config validation CLI tool
//!
//! Validates a tabwarden configuration file and reports any errors.

use std::path::PathBuf;
use std::process::ExitCode;
use tabwarden_util::default_config_path;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a tabwarden configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match tabwarden_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", tabwarden_config::CURRENT_CONFIG_VERSION);
            println!("  Daily budget: {}s", policy.budget.daily_seconds);
            println!(
                "  Close probability: +{} per timer, -{}/hour",
                policy.probability.step, policy.probability.decay_per_hour
            );
            println!("  Cooldown window: {}s", policy.cooldown.window.as_secs());
            println!(
                "  Grace period: {}s (landing URL > {} chars)",
                policy.grace.duration.as_secs(),
                policy.grace.min_url_length
            );

            println!();
            println!("Default blacklist:");
            for site in &policy.default_sites {
                println!("  - {}", site);
            }

            println!();
            println!("Search contexts:");
            for ctx in &policy.grace.search_contexts {
                println!("  - {}", ctx);
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                tabwarden_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                tabwarden_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                tabwarden_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                tabwarden_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        tabwarden_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
