
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};

use super::{ApiConfig, Config, ConfigError};
use crate::openai::{API_KEY_ENV, api_key_from_env};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 MGL Assist Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("OpenAI API Configuration").bold().yellow());
    eprintln!("Configure the API endpoint and models used for embeddings and chat.");
    eprintln!(
        "The API key itself is never stored here; set the {API_KEY_ENV} environment variable."
    );
    eprintln!();

    configure_api(&mut config.api)?;

    eprintln!();
    eprintln!("{}", style("Retrieval Configuration").bold().yellow());

    let top_k: usize = Input::new()
        .with_prompt("Number of passages to retrieve per question")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> std::result::Result<(), &str> {
            if *input == 0 {
                Err("Must retrieve at least one passage")
            } else if *input > 100 {
                Err("Retrieving more than 100 passages is not supported")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    config.retrieval.top_k = top_k;

    config.session.stream = Confirm::new()
        .with_prompt("Stream answers as they are generated?")
        .default(config.session.stream)
        .interact()?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_api_connection(&config.api) {
        eprintln!("{}", style("✓ API endpoint reachable!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the API endpoint").yellow()
        );
        eprintln!("You can continue, but check the base URL before building the index.");
    }

    if api_key_from_env().is_none() {
        eprintln!(
            "{}",
            style(format!("⚠ {API_KEY_ENV} is not set in this shell")).yellow()
        );
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());

        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("API Settings:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.api.base_url).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.api.embedding_model).cyan()
    );
    eprintln!("  Chat Model: {}", style(&config.api.chat_model).cyan());
    eprintln!("  Timeout: {}s", style(config.api.timeout_secs).cyan());
    eprintln!(
        "  Embed Retries: {}",
        style(config.api.embed_retries).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Input Cap: {} chars",
        style(config.retrieval.max_input_chars).cyan()
    );
    eprintln!(
        "  Snippet Length: {} chars",
        style(config.retrieval.snippet_chars).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Session Settings:").bold().yellow());
    eprintln!(
        "  History Window: {} messages",
        style(config.session.history_window).cyan()
    );
    eprintln!("  Streaming: {}", style(config.session.stream).cyan());

    eprintln!();
    let key_status = if api_key_from_env().is_some() {
        style("set").green()
    } else {
        style("not set").red()
    };
    eprintln!("  {API_KEY_ENV}: {key_status}");

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    eprintln!(
        "Index artifacts: {}",
        style(config.index_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config::default())
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_api(api: &mut ApiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(api.base_url.clone())
        .validate_with(|input: &String| -> std::result::Result<(), ConfigError> {
            let temp_config = ApiConfig {
                base_url: input.clone(),
                ..ApiConfig::default()
            };
            temp_config.validate()?;
            Ok(())
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(api.embedding_model.clone())
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(api.chat_model.clone())
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let timeout_secs: u64 = Input::new()
        .with_prompt("Request timeout in seconds")
        .default(api.timeout_secs)
        .validate_with(|input: &u64| -> std::result::Result<(), &str> {
            if *input == 0 {
                Err("Timeout must be greater than 0")
            } else if *input > 300 {
                Err("Timeout must be 300 seconds or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    api.base_url = base_url.trim_end_matches('/').to_string();
    api.embedding_model = embedding_model;
    api.chat_model = chat_model;
    api.timeout_secs = timeout_secs;

    Ok(())
}

fn test_api_connection(api: &ApiConfig) -> bool {
    let url = api.endpoint("models");

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    let request = agent.get(&url);
    let request = match api_key_from_env() {
        Some(key) => request.header("Authorization", &format!("Bearer {key}")),
        None => request,
    };

    // An auth failure still proves the endpoint is there.
    match request.call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
