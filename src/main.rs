use charterqa::config::AppConfig;
use charterqa::quiz;
use charterqa::rag::RagService;
use charterqa::Result;
use clap::Parser;
use clap::Subcommand;
use tracing::info;

#[derive(Parser)]
#[command(name = "charterqa")]
#[command(about = "Retrieval-augmented QA over organizational governance documents")]
#[command(version)]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question about the governance documents
    Ask {
        /// The question to answer
        question: String,
        /// Print the supporting context passages
        #[arg(short, long)]
        context: bool,
        /// On a low-confidence answer, retry with the full-rules fallback
        #[arg(short, long)]
        fallback: bool,
    },
    /// Manage the local corpus directory
    Corpus {
        #[command(subcommand)]
        action: CorpusAction,
    },
    /// Manage the persisted vector index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Generate a quiz question from the corpus
    Quiz,
}

#[derive(Subcommand)]
enum CorpusAction {
    /// Download the corpus from the configured bulk-storage location
    Fetch,
}

#[derive(Subcommand)]
enum IndexAction {
    /// Rebuild the index from the corpus and persist it
    Build,
    /// Show index statistics
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;

    if cli.verbose {
        charterqa::logging::init_debug_logging()?;
    } else {
        charterqa::logging::init_logging_with_config(Some(&config))?;
    }

    let service = RagService::new(&config)?;

    match cli.command {
        Commands::Ask {
            question,
            context,
            fallback,
        } => {
            let record = service.get_response(&question).await?;

            if record.confidence_low && fallback {
                info!("Low-confidence answer, retrying with full-rules fallback");
                let answer = service.fallback_response(&question, &[]).await?;
                println!("{answer}");
            } else {
                println!("{}", record.answer);
            }

            if context {
                println!("\n參考條文：");
                for passage in &record.context {
                    println!("  [{}] {}", passage.id, passage.content);
                }
            }
        }
        Commands::Corpus { action } => match action {
            CorpusAction::Fetch => {
                let count = service.fetch_corpus().await?;
                println!("Corpus fetched into {}: {count} passages", config.corpus_dir());
            }
        },
        Commands::Index { action } => match action {
            IndexAction::Build => {
                let count = service.rebuild_index().await?;
                println!("Index built: {count} passages");
            }
            IndexAction::Info => {
                let count = service.index_len().await?;
                println!("Index path: {}", config.index_path());
                println!("Embedding model: {}", config.embedding_model());
                println!("Indexed passages: {count}");
            }
        },
        Commands::Quiz => {
            let passages = charterqa::corpus::load_corpus(config.corpus_dir())?;
            let rules: Vec<String> = passages.into_iter().map(|p| p.content).collect();

            let llm = charterqa::llm::LlmService::new(&config)?;
            let question = quiz::generate_quiz(&llm, &rules.join("\n"), &[]).await?;

            println!("題目：{}", question.question);
            for option in &question.options {
                println!("{option}");
            }
            println!("答案：{}", question.answer);
        }
    }

    Ok(())
}
