use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use scribematch::{
    attribute_and_render, derive_participants, parse_blocks, select_best, speaker_hints_from_json,
    AttributionContext, ConsolidationConfig, DirOverrideStore, DirPendingStore, IdentityConfig,
    JsonRecordStore, MatchConfig, OverrideStore, PendingRecord, PendingStore, RecordStore,
    SessionType, TranscriptDoc, TranscriptRecord,
};

#[derive(Parser)]
#[command(name = "scribematch")]
#[command(author, version, about = "Match meeting summaries to recorded transcripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct IdentityArgs {
    /// Display name for the local speaker
    #[arg(long, default_value = "Me")]
    name: String,

    /// Additional alias for the local speaker (repeatable)
    #[arg(long = "alias")]
    aliases: Vec<String>,
}

impl IdentityArgs {
    fn build(&self) -> IdentityConfig {
        let mut aliases: Vec<&str> = vec!["me"];
        aliases.extend(self.aliases.iter().map(String::as_str));
        IdentityConfig::new(self.name.clone(), &aliases)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Process every pending summary against the record file, writing
    /// transcript notes for confident matches
    Reconcile {
        /// Transcript record export (JSON)
        #[arg(short, long)]
        records: PathBuf,

        /// Directory of pending summary records
        #[arg(short, long)]
        pending: PathBuf,

        /// Directory of manual speaker-label overrides
        #[arg(long)]
        overrides: PathBuf,

        /// Root directory for written transcript notes
        #[arg(short, long)]
        output: PathBuf,

        /// Merge likely-duplicate diarization speakers
        #[arg(long)]
        consolidate: bool,

        #[command(flatten)]
        identity: IdentityArgs,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Score one pending summary and print ranked candidate diagnostics
    Match {
        /// Transcript record export (JSON)
        #[arg(short, long)]
        records: PathBuf,

        /// One pending record file
        #[arg(short, long)]
        pending: PathBuf,

        #[command(flatten)]
        identity: IdentityArgs,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Render one record's transcript by id and print it
    Render {
        /// Transcript record export (JSON)
        #[arg(short, long)]
        records: PathBuf,

        /// Record id to render
        #[arg(short, long)]
        id: String,

        /// Directory of manual speaker-label overrides
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Merge likely-duplicate diarization speakers
        #[arg(long)]
        consolidate: bool,

        #[command(flatten)]
        identity: IdentityArgs,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Save manual speaker-label overrides for one record
    Relabel {
        /// Directory of manual speaker-label overrides
        #[arg(long)]
        overrides: PathBuf,

        /// Record id the overrides apply to
        #[arg(short, long)]
        id: String,

        /// Override assignment, "key=Name" (repeatable); bare keys are
        /// treated as speaker ids
        #[arg(short, long = "set")]
        set: Vec<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Reconcile {
            records,
            pending,
            overrides,
            output,
            consolidate,
            identity,
            verbose,
        } => {
            setup_logging(verbose);
            reconcile(
                &records,
                &pending,
                &overrides,
                &output,
                consolidate,
                &identity.build(),
            )
        }
        Commands::Match {
            records,
            pending,
            identity,
            verbose,
        } => {
            setup_logging(verbose);
            match_one(&records, &pending, &identity.build())
        }
        Commands::Render {
            records,
            id,
            overrides,
            consolidate,
            identity,
            verbose,
        } => {
            setup_logging(verbose);
            render_one(
                &records,
                &id,
                overrides.as_deref(),
                consolidate,
                &identity.build(),
            )
        }
        Commands::Relabel {
            overrides,
            id,
            set,
            verbose,
        } => {
            setup_logging(verbose);
            relabel(&overrides, &id, &set)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn reconcile(
    records: &Path,
    pending_dir: &Path,
    overrides_dir: &Path,
    output: &Path,
    consolidate: bool,
    identity: &IdentityConfig,
) -> Result<()> {
    let store = JsonRecordStore::from_file(records)
        .with_context(|| format!("failed to load records from {}", records.display()))?;
    info!("Loaded {} transcript records", store.len());

    let pending_store = DirPendingStore::new(pending_dir);
    let override_store = DirOverrideStore::new(overrides_dir);
    let cfg = MatchConfig::default();
    let ccfg = ConsolidationConfig {
        enabled: consolidate,
        ..Default::default()
    };

    let paths = pending_store.list()?;
    info!("Found {} pending records", paths.len());

    let mut matched = 0usize;
    let mut unresolved = 0usize;
    for path in paths {
        let pd = match pending_store.load(&path) {
            Ok(pd) => pd,
            Err(e) => {
                warn!("Skipping unreadable pending file {:?}: {}", path, e);
                continue;
            }
        };
        let selection = select_best(&pd, &store, &cfg, identity)?;
        let Some(record) = selection.record else {
            info!("No match yet for {:?}", pd.meeting_title);
            unresolved += 1;
            continue;
        };

        let rendered = render_record(&store, &record, &pd, &override_store, identity, &ccfg)?;
        let doc = TranscriptDoc {
            date: &pd.meeting_date,
            title: &pd.meeting_title,
            session_type: pd.session_type,
            summary_path: pd.summary_path.as_deref(),
            record: &record,
            reason: selection.reason,
        };
        let written = scribematch::write_transcript_file(output, &doc, &rendered)?;
        info!(
            "Matched {:?} -> {} ({})",
            pd.meeting_title,
            written.display(),
            selection
                .reason
                .map(|r| r.to_string())
                .unwrap_or_default()
        );
        if let Some(summary) = pd.summary_path.as_deref() {
            let stem = written
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            scribematch::inject_summary_backlink(Path::new(summary), stem)?;
        }
        pending_store.delete(&path)?;
        matched += 1;
    }

    info!("Complete: {} matched, {} unresolved", matched, unresolved);
    Ok(())
}

fn match_one(records: &Path, pending: &Path, identity: &IdentityConfig) -> Result<()> {
    let store = JsonRecordStore::from_file(records)
        .with_context(|| format!("failed to load records from {}", records.display()))?;
    let content = std::fs::read_to_string(pending)
        .with_context(|| format!("failed to read {}", pending.display()))?;
    let pd: PendingRecord = serde_json::from_str(&content)
        .with_context(|| format!("invalid pending record in {}", pending.display()))?;

    let selection = select_best(&pd, &store, &MatchConfig::default(), identity)?;
    let report = json!({
        "matched_id": selection.record.as_ref().map(|r| r.id.as_str()),
        "matched_title": selection.record.as_ref().map(|r| r.title.as_str()),
        "reason": selection.reason.map(|r| r.to_string()),
        "candidates": selection.diagnostics,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn render_one(
    records: &Path,
    id: &str,
    overrides_dir: Option<&Path>,
    consolidate: bool,
    identity: &IdentityConfig,
) -> Result<()> {
    let store = JsonRecordStore::from_file(records)
        .with_context(|| format!("failed to load records from {}", records.display()))?;
    let record = store
        .fetch_by_id(id)?
        .ok_or_else(|| scribematch::StoreError::NotFound(id.to_string()))?;
    if !record.has_transcript() {
        bail!("record {} has no transcript content", id);
    }

    let pd = PendingRecord {
        meeting_title: record.title.clone(),
        meeting_date: String::new(),
        session_type: SessionType::from_title(&record.title),
        participants: vec![],
        quill_meeting_id: None,
        quill_title: None,
        quill_start_ms: None,
        quill_end_ms: None,
        transcript_snippet: None,
        summary_path: None,
    };
    let override_store = DirOverrideStore::new(
        overrides_dir.map(Path::to_path_buf).unwrap_or_default(),
    );
    let ccfg = ConsolidationConfig {
        enabled: consolidate,
        ..Default::default()
    };
    let rendered = render_record(&store, &record, &pd, &override_store, identity, &ccfg)?;

    println!("# {}", record.title);
    println!();
    for (key, name) in &rendered.speaker_map {
        let blocks = rendered.block_counts.get(key).copied().unwrap_or(0);
        println!("{}: {} ({} blocks)", key, name, blocks);
    }
    println!();
    println!("{}", rendered.body);
    Ok(())
}

fn relabel(overrides_dir: &Path, id: &str, assignments: &[String]) -> Result<()> {
    if assignments.is_empty() {
        bail!("no --set assignments given");
    }
    let store = DirOverrideStore::new(overrides_dir);
    let mut mapping = store.load(id)?;
    for assignment in assignments {
        let Some((key, name)) = assignment.split_once('=') else {
            bail!("invalid --set {:?}, expected key=Name", assignment);
        };
        let (key, name) = (key.trim(), name.trim());
        if key.is_empty() || name.is_empty() {
            bail!("invalid --set {:?}, expected key=Name", assignment);
        }
        mapping.insert(key.to_string(), name.to_string());
    }
    store.save(id, &mapping)?;
    info!("Saved {} overrides for {}", mapping.len(), id);
    println!("{}", serde_json::to_string_pretty(&mapping)?);
    Ok(())
}

/// Shared render path: collect hints and participants for the record, then
/// run attribution.
fn render_record(
    store: &JsonRecordStore,
    record: &TranscriptRecord,
    pd: &PendingRecord,
    override_store: &DirOverrideStore,
    identity: &IdentityConfig,
    ccfg: &ConsolidationConfig,
) -> Result<scribematch::RenderedTranscript> {
    let blocks = parse_blocks(record.raw_transcript.as_deref().unwrap_or(""));
    if blocks.is_empty() {
        warn!("Record {} parsed to zero transcript blocks", record.id);
    }

    let mut hints: HashMap<String, String> = store.fetch_speaker_hints(&record.id)?;
    if hints.is_empty() {
        if let Some(sj) = record.speakers_json.as_deref() {
            hints = speaker_hints_from_json(sj);
        }
    }
    let hint_ref = (!hints.is_empty()).then_some(&hints);
    let store_participants = derive_participants(record, hint_ref, identity);
    let overrides = override_store.load(&record.id)?;

    let ctx = AttributionContext {
        meeting_title: pd.meeting_title.clone(),
        record_title: record.title.clone(),
        desired_participants: pd.participants.clone(),
        store_participants,
    };
    Ok(attribute_and_render(
        &blocks, &ctx, &overrides, &hints, identity, ccfg,
    ))
}
