//! # llm-call
//!
//! Command-line front end for [`LlmCaller`].
//!
//! - `llm-call ask <PROMPT>` sends a prompt and prints the validated answer
//! - `llm-call route <MODEL>` shows where a model name is routed
//! - `llm-call validators` lists the validator names
//! - `llm-call config-paths` shows where configuration is looked up
//!
//! Exit code 2 means the answer needs human review; 1 means every attempt
//! failed validation or another error occurred.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use llm_call::config::{self, LlmCallConfig};
use llm_call::llm::resolve_route;
use llm_call::logging::{init_file_logging, init_stderr_logging, LogLevel, LoggingConfig, LoggingGuard};
use llm_call::retry::RetryConfig;
use llm_call::validation::{ValidatorRegistry, ValidatorSpec};
use llm_call::{LlmCaller, LlmRequest};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Route prompts to LLM providers and retry until the answers validate
#[derive(Parser, Debug)]
#[command(name = "llm-call")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, env = "LLM_CALL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a prompt and print the validated response
    Ask {
        /// The prompt text
        prompt: String,

        /// Model name, e.g. gpt-4o-mini, claude-cli/sonnet, ollama/llama3.2
        #[arg(short, long)]
        model: Option<String>,

        /// System prompt
        #[arg(short, long)]
        system: Option<String>,

        /// Validator name, or a JSON spec like '{"type":"length","params":{"max_length":200}}'
        #[arg(long = "validate", value_name = "NAME")]
        validators: Vec<String>,

        /// Maximum attempts, overriding the configured retry policy
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Ask for a JSON object response
        #[arg(long)]
        json: bool,
    },

    /// Print the provider and model a model name routes to
    Route {
        /// The model name to resolve
        model: String,
    },

    /// List registered validator names
    Validators,

    /// Print the configuration search paths
    ConfigPaths,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ask {
            prompt,
            model,
            system,
            validators,
            max_attempts,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let _guard = init_logging(&config.logging, cli.verbose)?;

            let mut request = LlmRequest::prompt(prompt);
            if let Some(model) = model {
                request = request.with_model(model);
            }
            if let Some(system) = system {
                request = request.with_system(system);
            }
            for validator in &validators {
                request = request.with_validator(parse_validator(validator)?);
            }
            if let Some(max_attempts) = max_attempts {
                request = request.with_retry(RetryConfig {
                    max_attempts,
                    ..config.retry
                });
            }
            if json {
                request = request.json();
            }

            let caller = LlmCaller::from_config(config)?;
            match caller.make_llm_request(request).await {
                Ok(result) => {
                    tracing::debug!(
                        request_id = %result.request_id,
                        attempts = result.attempts,
                        "done"
                    );
                    println!("{}", result.response.content);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) if e.is_human_review() => {
                    eprintln!("{e}");
                    Ok(ExitCode::from(2))
                }
                Err(e) if e.is_exhausted() => {
                    eprintln!("{e}");
                    Ok(ExitCode::from(1))
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::Route { model } => {
            init_logging(&LoggingConfig::default(), cli.verbose)?;
            let route = resolve_route(&model)?;
            println!("provider: {}", route.provider);
            println!("model:    {}", route.model);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validators => {
            for name in ValidatorRegistry::with_builtins().names() {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::ConfigPaths => {
            for path in config::search_paths() {
                let marker = if path.exists() { " (found)" } else { "" };
                println!("{}{}", path.display(), marker);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<LlmCallConfig> {
    match path {
        Some(path) => config::from_path(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => config::load().context("loading configuration"),
    }
}

/// File logging when the config enables it, stderr otherwise.
fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<Option<LoggingGuard>> {
    if logging.enabled {
        let logging = if verbose {
            logging.clone().with_level(LogLevel::Debug)
        } else {
            logging.clone()
        };
        return Ok(init_file_logging(&logging)?);
    }

    let level = if verbose { LogLevel::Debug } else { LogLevel::Warn };
    init_stderr_logging(level)?;
    Ok(None)
}

fn parse_validator(arg: &str) -> Result<ValidatorSpec> {
    if arg.trim_start().starts_with('{') {
        serde_json::from_str(arg).with_context(|| format!("invalid validator spec: {arg}"))
    } else {
        Ok(ValidatorSpec::named(arg.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_collects_repeated_validators() {
        let cli = Cli::try_parse_from([
            "llm-call",
            "ask",
            "hello",
            "--validate",
            "json_string",
            "--validate",
            "response_not_empty",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Ask { validators, json, .. } => {
                assert_eq!(validators, vec!["json_string", "response_not_empty"]);
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn validator_args_accept_json_specs() {
        let spec = parse_validator(r#"{"type": "length", "params": {"max_length": 10}}"#).unwrap();
        assert_eq!(spec, ValidatorSpec::named("length").with_param("max_length", 10));
        assert_eq!(parse_validator("code").unwrap(), ValidatorSpec::named("code"));
        assert!(parse_validator("{not json").is_err());
    }
}
