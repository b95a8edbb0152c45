use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fitroom_contracts::progress::ProgressFn;
use fitroom_contracts::request::EditRequest;
use fitroom_contracts::result::EditResult;
use fitroom_engine::codec::EncodedImage;
use fitroom_engine::composer::DryrunComposer;
use fitroom_engine::gemini::{GeminiClient, GeminiConfig};
use fitroom_engine::history_store::{JsonlHistoryStore, SupabaseHistory, SupabaseHistoryConfig};
use fitroom_engine::storage::{LocalDirStore, SupabaseStorage, SupabaseStorageConfig};
use fitroom_engine::TryOnService;

#[derive(Debug, Parser)]
#[command(name = "fitroom", version, about = "Garment try-on pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compose one garment edit.
    Edit(EditArgs),
    /// Run a file of edit requests sequentially.
    Batch(BatchArgs),
    /// List recent edits.
    History(HistoryArgs),
    /// Delete one edit record and its stored composite.
    Delete(DeleteArgs),
    /// Print the usage rollup for the user.
    Stats(StatsArgs),
}

#[derive(Debug, Parser)]
struct EditArgs {
    /// Subject photo: file path, URL, or data URL.
    #[arg(long)]
    subject: String,
    /// Garment photo: file path, URL, or data URL.
    #[arg(long)]
    garment: String,
    #[arg(long)]
    placement: Option<String>,
    #[arg(long)]
    fit: Option<String>,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    instructions: Option<String>,
    /// Persist this attempt to history.
    #[arg(long)]
    save: bool,
    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
    #[arg(long, default_value = "local-user")]
    user: String,
    /// Use the offline composer and local stores.
    #[arg(long)]
    dryrun: bool,
    /// Root directory for dryrun artifacts.
    #[arg(long, default_value = ".fitroom")]
    out: PathBuf,
    /// Override the image model id.
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Parser)]
struct BatchArgs {
    /// JSON file holding an array of edit requests.
    #[arg(long)]
    requests: PathBuf,
    #[arg(long)]
    json: bool,
    #[arg(long, default_value = "local-user")]
    user: String,
    #[arg(long)]
    dryrun: bool,
    #[arg(long, default_value = ".fitroom")]
    out: PathBuf,
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Parser)]
struct HistoryArgs {
    #[arg(long)]
    limit: Option<u32>,
    #[arg(long, default_value = "local-user")]
    user: String,
    #[arg(long)]
    dryrun: bool,
    #[arg(long, default_value = ".fitroom")]
    out: PathBuf,
}

#[derive(Debug, Parser)]
struct DeleteArgs {
    #[arg(long)]
    id: String,
    #[arg(long, default_value = "local-user")]
    user: String,
    #[arg(long)]
    dryrun: bool,
    #[arg(long, default_value = ".fitroom")]
    out: PathBuf,
}

#[derive(Debug, Parser)]
struct StatsArgs {
    #[arg(long, default_value = "local-user")]
    user: String,
    #[arg(long)]
    dryrun: bool,
    #[arg(long, default_value = ".fitroom")]
    out: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("fitroom error: {err:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Edit(args) => run_edit(args).await,
        Command::Batch(args) => run_batch(args).await,
        Command::History(args) => run_history(args).await,
        Command::Delete(args) => run_delete(args).await,
        Command::Stats(args) => run_stats(args).await,
    }
}

async fn run_edit(args: EditArgs) -> Result<i32> {
    let svc = build_service(&args.user, args.dryrun, &args.out, args.model.as_deref())?;
    let mut request = EditRequest::new(ref_or_file(&args.subject)?, ref_or_file(&args.garment)?);
    request.placement = args.placement;
    request.fit = args.fit;
    request.style = args.style;
    request.custom_instructions = args.instructions;

    let result = svc.edit(&request).await?;
    print_result(&result, args.json)?;
    if args.save {
        let id = svc.save_history(&request, &result).await?;
        println!("History id: {id}");
    }
    Ok(if result.is_success() { 0 } else { 1 })
}

async fn run_batch(args: BatchArgs) -> Result<i32> {
    let svc = build_service(&args.user, args.dryrun, &args.out, args.model.as_deref())?;
    let raw = fs::read_to_string(&args.requests)
        .with_context(|| format!("reading {}", args.requests.display()))?;
    let mut requests: Vec<EditRequest> =
        serde_json::from_str(&raw).context("requests file must hold a JSON array of edits")?;
    for request in &mut requests {
        request.subject_image = ref_or_file(&request.subject_image)?;
        request.garment_image = ref_or_file(&request.garment_image)?;
    }

    let observer = ProgressFn(|completed: usize, total: usize, current: Option<&EditResult>| {
        let status = current
            .map(|result| {
                if result.is_success() {
                    "completed"
                } else {
                    "failed"
                }
            })
            .unwrap_or("pending");
        println!("[{completed}/{total}] {status}");
    });
    let results = svc.batch_edit(&requests, &observer).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for (index, result) in results.iter().enumerate() {
            match result.success() {
                Some(success) => println!("{}: {}", index + 1, success.composite_url),
                None => println!(
                    "{}: failed ({})",
                    index + 1,
                    result.error().unwrap_or("unknown error")
                ),
            }
        }
    }
    let failures = results.iter().filter(|result| !result.is_success()).count();
    println!("{} of {} edits succeeded", results.len() - failures, results.len());
    Ok(if failures == 0 { 0 } else { 1 })
}

async fn run_history(args: HistoryArgs) -> Result<i32> {
    let svc = build_service(&args.user, args.dryrun, &args.out, None)?;
    let records = svc.get_history(args.limit).await?;
    if records.is_empty() {
        println!("No history for {}", svc.user_id());
        return Ok(0);
    }
    for record in &records {
        println!(
            "{}  {}  {}  {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.id,
            record.status.as_str(),
            record.composite_image_url.as_deref().unwrap_or("-")
        );
    }
    Ok(0)
}

async fn run_delete(args: DeleteArgs) -> Result<i32> {
    let svc = build_service(&args.user, args.dryrun, &args.out, None)?;
    if svc.delete_history(&args.id).await? {
        println!("Deleted {}", args.id);
        Ok(0)
    } else {
        println!("No record {} for {}", args.id, svc.user_id());
        Ok(1)
    }
}

async fn run_stats(args: StatsArgs) -> Result<i32> {
    let svc = build_service(&args.user, args.dryrun, &args.out, None)?;
    let summary = svc.usage_stats().await?;
    println!("Total edits: {}", summary.total_edits);
    println!("Successful: {}", summary.successful_edits);
    println!("This month: {}", summary.this_month_edits);
    println!(
        "Average processing time: {:.0} ms",
        summary.average_processing_time_ms
    );
    Ok(0)
}

fn build_service(
    user: &str,
    dryrun: bool,
    out: &Path,
    model: Option<&str>,
) -> Result<TryOnService> {
    if dryrun {
        let store = LocalDirStore::new(out.join("objects"));
        let history = JsonlHistoryStore::new(out.join("history.jsonl"));
        return Ok(TryOnService::new(
            user,
            Arc::new(DryrunComposer),
            Arc::new(store),
            Arc::new(history),
        ));
    }

    let api_key = non_empty_env("GEMINI_API_KEY")
        .or_else(|| non_empty_env("GOOGLE_API_KEY"))
        .context("GEMINI_API_KEY or GOOGLE_API_KEY not set")?;
    let mut gemini = GeminiConfig::new(api_key);
    if let Some(model) = model {
        gemini.model = model.to_string();
    }
    let composer = GeminiClient::new(gemini)?;

    let supabase_url = non_empty_env("SUPABASE_URL").context("SUPABASE_URL not set")?;
    let service_key = non_empty_env("SUPABASE_SERVICE_ROLE_KEY")
        .or_else(|| non_empty_env("SUPABASE_KEY"))
        .context("SUPABASE_SERVICE_ROLE_KEY or SUPABASE_KEY not set")?;

    let mut storage = SupabaseStorageConfig::new(supabase_url.clone(), service_key.clone());
    if let Some(bucket) = non_empty_env("FITROOM_BUCKET") {
        storage.bucket = bucket;
    }
    let mut history = SupabaseHistoryConfig::new(supabase_url, service_key);
    if let Some(table) = non_empty_env("FITROOM_HISTORY_TABLE") {
        history.table = table;
    }

    Ok(TryOnService::new(
        user,
        Arc::new(composer),
        Arc::new(SupabaseStorage::new(storage)),
        Arc::new(SupabaseHistory::new(history)),
    ))
}

fn print_result(result: &EditResult, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    match result.success() {
        Some(success) => {
            println!("Composite: {}", success.composite_url);
            println!("Confidence: {:.2}", success.confidence);
            println!("Model: {}", success.details.model);
            println!("Processing time: {} ms", result.processing_time_ms);
        }
        None => {
            println!(
                "Edit failed after {} ms: {}",
                result.processing_time_ms,
                result.error().unwrap_or("unknown error")
            );
        }
    }
    Ok(())
}

/// Local paths are inlined as data URLs; URLs and data URLs pass through for
/// the pipeline to resolve.
fn ref_or_file(value: &str) -> Result<String> {
    if value.starts_with("http://") || value.starts_with("https://") || value.starts_with("data:") {
        return Ok(value.to_string());
    }
    let bytes = fs::read(value).with_context(|| format!("reading image file {value}"))?;
    Ok(EncodedImage::from_bytes(&bytes).to_data_url(mime_for_path(value)))
}

fn mime_for_path(value: &str) -> &'static str {
    match Path::new(value)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
