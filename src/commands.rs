use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::corpus;
use crate::index;
use crate::index::store::{self, Manifest};
use crate::openai::chat::{ChatClient, ChatMessage};
use crate::openai::embeddings::EmbeddingClient;
use crate::openai::{API_KEY_ENV, api_key_from_env};
use crate::retrieval::Retriever;
use crate::session::ChatSession;

/// Build the vector index from a directory of statute section files
#[inline]
pub fn build(corpus_dir: &Path) -> Result<()> {
    info!("Building vector index from {}", corpus_dir.display());

    let config = Config::load().context("Failed to load configuration")?;
    let api_key = require_api_key()?;

    let sections = corpus::load_sections(corpus_dir, &config.citations)
        .context("Failed to load corpus")?;
    if sections.is_empty() {
        println!("No text files found in {}", corpus_dir.display());
        println!("Nothing to index.");
        return Ok(());
    }
    println!(
        "Loaded {} section files from {}",
        sections.len(),
        corpus_dir.display()
    );

    let embeddings = EmbeddingClient::new(&config.api, api_key, config.retrieval.max_input_chars);
    let (flat_index, records) =
        index::build_index(&embeddings, &sections, config.api.embed_retries)?;
    let skipped = sections.len() - records.len();

    let manifest = Manifest::new(
        config.api.embedding_model.clone(),
        flat_index.dimension(),
        records,
    );
    let index_path = config.index_path();
    let metadata_path = config.metadata_path();
    store::save_pair(&flat_index, &manifest, &index_path, &metadata_path)
        .context("Failed to save index artifacts")?;

    println!();
    println!(
        "✅ Indexed {} sections ({} dimensions per vector)",
        flat_index.len(),
        flat_index.dimension()
    );
    if skipped > 0 {
        println!("⚠️  Skipped {skipped} sections that failed to embed");
    }
    println!("   Index: {}", index_path.display());
    println!("   Metadata: {}", metadata_path.display());

    Ok(())
}

/// Start the interactive retrieval-grounded chat session
#[inline]
pub fn chat() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let api_key = require_api_key()?;
    let (retriever, chat_client) = load_pipeline(&config, api_key)?;
    let session = ChatSession::new(retriever, chat_client, config.session.clone());

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    run_chat_loop(session, &mut stdin.lock(), &mut stdout.lock())
}

/// Ask a single question and print the answer
#[inline]
pub fn ask(question: &str) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let api_key = require_api_key()?;
    let (retriever, chat_client) = load_pipeline(&config, api_key)?;

    let context = retriever.retrieve(question).context_block();
    let system_prompt = format!("{}\n{}", config.session.base_prompt, context);
    let messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(question.to_string()),
    ];

    match chat_client.complete(&messages) {
        Ok(answer) => println!("{answer}"),
        Err(e) => println!("{}", e.user_message()),
    }

    Ok(())
}

/// Show the state of the index artifacts and configuration
#[inline]
pub fn show_status() -> Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("📊 MGL Assist Status");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔑 API:");
    println!("   Endpoint: {}", config.api.base_url);
    println!("   Embedding Model: {}", config.api.embedding_model);
    println!("   Chat Model: {}", config.api.chat_model);
    if api_key_from_env().is_some() {
        println!("   ✅ {API_KEY_ENV} is set");
    } else {
        println!("   ❌ {API_KEY_ENV} is not set");
    }

    println!();
    println!("📦 Index Artifacts:");
    let index_path = config.index_path();
    let metadata_path = config.metadata_path();
    match store::load_pair(&index_path, &metadata_path) {
        Ok((flat_index, manifest)) => {
            println!(
                "   ✅ Index: {} ({} vectors × {} dims)",
                index_path.display(),
                flat_index.len(),
                flat_index.dimension()
            );
            println!(
                "   ✅ Metadata: {} ({} sections)",
                metadata_path.display(),
                manifest.sections.len()
            );
            println!(
                "   Built: {}",
                manifest.built_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("   Embedding Model: {}", manifest.embedding_model);
            if manifest.embedding_model != config.api.embedding_model {
                println!(
                    "   ⚠️  Configured model differs from the one the index was built with"
                );
            }
        }
        Err(e) => {
            println!("   ❌ {e}");
        }
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'mgl-assist build <dir>' to index a directory of section files");
    println!("   • Use 'mgl-assist chat' to start an interactive session");
    println!("   • Use 'mgl-assist config' to adjust models and retrieval settings");

    Ok(())
}

/// Load the saved artifact pair and wire up the query-time clients.
fn load_pipeline(config: &Config, api_key: String) -> Result<(Retriever, ChatClient)> {
    let (flat_index, manifest) = store::load_pair(&config.index_path(), &config.metadata_path())?;
    info!(
        "Loaded index: {} vectors, {} dims, built {}",
        flat_index.len(),
        flat_index.dimension(),
        manifest.built_at
    );

    let embeddings = EmbeddingClient::new(
        &config.api,
        api_key.clone(),
        config.retrieval.max_input_chars,
    );
    let retriever = Retriever::new(
        embeddings,
        flat_index,
        manifest.sections,
        config.retrieval.clone(),
    );
    let chat_client = ChatClient::new(&config.api, api_key);
    Ok((retriever, chat_client))
}

/// One line of input per turn; `exit`/`quit` (case-insensitive) ends the
/// session, as does end of input. Every other line, blank ones included,
/// is submitted as a query.
fn run_chat_loop(
    mut session: ChatSession,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "Welcome to the RAG-enabled ChatGPT CLI!")?;
    writeln!(out, "You can ask questions about Massachusetts real-estate law.")?;
    writeln!(
        out,
        "Note: This chatbot is NOT a lawyer and cannot provide legal advice."
    )?;
    writeln!(out, "Type 'exit' or 'quit' to end the session.")?;
    writeln!(out)?;

    let mut line = String::new();
    loop {
        write!(out, "Enter your query: ")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(out, "Goodbye!")?;
            break;
        }
        let user_input = line.trim();
        if matches!(user_input.to_lowercase().as_str(), "exit" | "quit") {
            writeln!(out, "Goodbye!")?;
            break;
        }

        session.submit(user_input, out)?;
        writeln!(out)?;
    }

    Ok(())
}

fn require_api_key() -> Result<String> {
    api_key_from_env().ok_or_else(|| {
        anyhow::anyhow!("{API_KEY_ENV} is not set. Export your OpenAI API key and try again")
    })
}
