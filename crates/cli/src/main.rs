use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use archive::ArchiveDb;
use generation::providers::gemini::GeminiConfig;
use generation::providers::mock::MockConfig;
use generation::{ProviderConfig, RewriteGoal, ShotAnalyst};
use sequencer::{process_batch, refine_shots, DraftStatus, StudioSession};
use storyboard::{
    add_slot, assign_image, ingest, push_target_to_next, remove_slot, sync_source_to_target,
    AnchorId, AnchorKind, BatchMode, DraftSlot, DropTarget, ImageRef, Project, SlotField, SlotId,
    VisualAnchor,
};

/// The message fragment the upstream API uses for an invalid or expired
/// key; the host maps it to a re-select-key hint.
const KEY_NOT_FOUND_MARKER: &str = "Requested entity was not found.";

const DEFAULT_STYLE_DIRECTIVE: &str =
    "Cinematic storyboards, high-fidelity textures, detailed lighting, dynamic action sequence.";

#[derive(Parser)]
#[command(name = "continuity-cli")]
#[command(about = "Continuity - headless storyboard drafting and sequencing studio")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Archive database path (defaults to the per-user data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project
    New {
        /// Project title
        title: String,
    },

    /// List archived projects
    List,

    /// Show a project's shot sequence and drafting queue
    Show {
        /// Project id (or prefix) or exact title
        project: String,
    },

    /// Drop a batch of images into the drafting queue
    Ingest {
        project: String,

        /// Image files, in drop order
        files: Vec<PathBuf>,

        /// Which side of the pairs the drop binds to
        #[arg(long, value_enum, default_value = "mixed")]
        drop: DropArg,

        /// How a mixed drop pairs the images
        #[arg(long, value_enum, default_value = "chained")]
        mode: ModeArg,
    },

    /// Append one empty slot to the drafting queue
    AddSlot {
        project: String,
    },

    /// Remove a slot from the drafting queue
    RemoveSlot {
        project: String,

        /// Slot position (1-based) or id prefix
        slot: String,
    },

    /// Copy a slot's start frame over its end frame
    SyncSlot {
        project: String,
        slot: String,
    },

    /// Copy a slot's end frame into the next slot's start frame
    PushSlot {
        project: String,
        slot: String,
    },

    /// Assign one image file to a slot field
    Assign {
        project: String,
        slot: String,

        #[arg(long, value_enum)]
        field: FieldArg,

        file: PathBuf,
    },

    /// Run the drafting batch over every eligible slot
    Draft {
        project: String,

        /// Aesthetic style directive passed to the analyst
        #[arg(long)]
        style: Option<String>,

        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Rewrite every action prompt under an aesthetic directive
    Refine {
        project: String,
        directive: String,

        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Rewrite every action prompt for render-engine density
    Optimize {
        project: String,

        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Write the production master pack (zip of frames + transcript)
    Export {
        project: String,

        /// Output path (defaults to <Title>_Master_Pack.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete one shot from the sequence (numbers are never reused)
    DeleteShot {
        project: String,

        /// Sequence number or shot id prefix
        shot: String,
    },

    /// Set the starting sequence number for future shots
    SetStart {
        project: String,
        number: i64,
    },

    /// Pin a named reference frame to the project's visual DNA library
    AddAnchor {
        project: String,
        name: String,

        #[arg(long, value_enum, default_value = "character")]
        kind: AnchorArg,

        file: PathBuf,
    },

    /// Remove an anchor by name or id prefix
    RemoveAnchor {
        project: String,
        anchor: String,
    },

    /// Wipe shots, drafting queue, and anchors back to a blank project
    Reset {
        project: String,
    },

    /// Delete a project from the archive
    Delete {
        project: String,
    },
}

#[derive(clap::Args)]
struct ProviderArgs {
    /// Use the offline mock analyst instead of Gemini
    #[arg(long)]
    mock: bool,

    /// Gemini API key (falls back to GEMINI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Gemini model name
    #[arg(long)]
    model: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DropArg {
    Source,
    Target,
    Mixed,
}

impl From<DropArg> for DropTarget {
    fn from(value: DropArg) -> Self {
        match value {
            DropArg::Source => DropTarget::SourceOnly,
            DropArg::Target => DropTarget::TargetOnly,
            DropArg::Mixed => DropTarget::Mixed,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Standard,
    Chained,
    Looper,
}

impl From<ModeArg> for BatchMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Standard => BatchMode::Standard,
            ModeArg::Chained => BatchMode::Chained,
            ModeArg::Looper => BatchMode::Looper,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AnchorArg {
    Character,
    Scene,
    Prop,
}

impl From<AnchorArg> for AnchorKind {
    fn from(value: AnchorArg) -> Self {
        match value {
            AnchorArg::Character => AnchorKind::Character,
            AnchorArg::Scene => AnchorKind::Scene,
            AnchorArg::Prop => AnchorKind::Prop,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FieldArg {
    Source,
    Target,
}

impl From<FieldArg> for SlotField {
    fn from(value: FieldArg) -> Self {
        match value {
            FieldArg::Source => SlotField::Source,
            FieldArg::Target => SlotField::Target,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let db = open_db(cli.db.as_deref())?;

    match cli.command {
        Commands::New { title } => new_command(&db, title),
        Commands::List => list_command(&db),
        Commands::Show { project } => show_command(&db, &project),
        Commands::Ingest {
            project,
            files,
            drop,
            mode,
        } => ingest_command(&db, &project, files, drop.into(), mode.into()),
        Commands::AddSlot { project } => {
            edit_command(&db, &project, |p| add_slot(&mut p.draft_slots))
        }
        Commands::RemoveSlot { project, slot } => slot_command(&db, &project, &slot, |p, id| {
            remove_slot(&mut p.draft_slots, id)
        }),
        Commands::SyncSlot { project, slot } => slot_command(&db, &project, &slot, |p, id| {
            sync_source_to_target(&mut p.draft_slots, id)
        }),
        Commands::PushSlot { project, slot } => slot_command(&db, &project, &slot, |p, id| {
            push_target_to_next(&mut p.draft_slots, id)
        }),
        Commands::Assign {
            project,
            slot,
            field,
            file,
        } => assign_command(&db, &project, &slot, field.into(), &file),
        Commands::Draft {
            project,
            style,
            provider,
        } => draft_command(&db, &project, style, provider),
        Commands::Refine {
            project,
            directive,
            provider,
        } => rewrite_command(&db, &project, RewriteGoal::Aesthetic { directive }, provider),
        Commands::Optimize { project, provider } => {
            rewrite_command(&db, &project, RewriteGoal::EngineOptimize, provider)
        }
        Commands::Export { project, output } => export_command(&db, &project, output),
        Commands::DeleteShot { project, shot } => delete_shot_command(&db, &project, &shot),
        Commands::SetStart { project, number } => {
            edit_command(&db, &project, |p| p.set_starting_sequence(number))
        }
        Commands::AddAnchor {
            project,
            name,
            kind,
            file,
        } => add_anchor_command(&db, &project, name, kind.into(), &file),
        Commands::RemoveAnchor { project, anchor } => remove_anchor_command(&db, &project, &anchor),
        Commands::Reset { project } => edit_command(&db, &project, |p| p.reset()),
        Commands::Delete { project } => delete_command(&db, &project),
    }
}

fn open_db(override_path: Option<&Path>) -> Result<ArchiveDb> {
    let path = match override_path {
        Some(path) => path.to_path_buf(),
        None => archive::app_data_dir().join("continuity.db"),
    };
    ArchiveDb::open_or_create(&path)
}

fn new_command(db: &ArchiveDb, title: String) -> Result<()> {
    let project = Project::new(title);
    save_project(db, &project);
    info!("Created project '{}'", project.title);
    println!("{}", project.id);
    Ok(())
}

fn list_command(db: &ArchiveDb) -> Result<()> {
    let entries = db.list_entries()?;
    if entries.is_empty() {
        println!("No projects archived yet.");
        return Ok(());
    }
    for entry in entries {
        let modified = chrono::DateTime::from_timestamp(entry.last_modified, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("{}  {}  (modified {})", entry.id, entry.title, modified);
    }
    Ok(())
}

fn show_command(db: &ArchiveDb, query: &str) -> Result<()> {
    let project = find_project(db, query)?;
    println!("{} ({})", project.title, project.id);
    println!(
        "Starting sequence number: {}",
        project.starting_sequence_number
    );

    println!("\nShots:");
    if project.shots.is_empty() {
        println!("  (none)");
    }
    for shot in project.sorted_shots() {
        println!("  #{:03} [{}] {}", shot.sequence_order, shot.topic, shot.id);
    }

    println!("\nDrafting queue:");
    for (index, slot) in project.draft_slots.iter().enumerate() {
        println!(
            "  [{}] {:?}  start:{} end:{}  {}",
            index + 1,
            slot.status,
            presence(&slot.source),
            presence(&slot.target),
            slot.id
        );
    }
    if !project.anchors.is_empty() {
        println!("\nAnchors:");
        for anchor in &project.anchors {
            println!("  {:?} '{}' {}", anchor.kind, anchor.name, anchor.id);
        }
    }
    Ok(())
}

fn presence(image: &Option<ImageRef>) -> &'static str {
    if image.is_some() {
        "set"
    } else {
        "-"
    }
}

fn ingest_command(
    db: &ArchiveDb,
    query: &str,
    files: Vec<PathBuf>,
    drop: DropTarget,
    mode: BatchMode,
) -> Result<()> {
    let mut project = find_project(db, query)?;
    let mut images = Vec::new();
    for file in &files {
        match read_image(file) {
            Ok(image) => images.push(image),
            Err(err) => warn!(file = %file.display(), error = %err, "skipping file"),
        }
    }
    if images.is_empty() {
        bail!("no readable image files in the drop");
    }
    let before = project.draft_slots.len();
    let current = std::mem::take(&mut project.draft_slots);
    project.draft_slots = ingest(current, images, drop, mode);
    project.touch();
    info!(
        "Queue went from {} to {} slots",
        before,
        project.draft_slots.len()
    );
    save_project(db, &project);
    Ok(())
}

fn edit_command(db: &ArchiveDb, query: &str, edit: impl FnOnce(&mut Project)) -> Result<()> {
    let mut project = find_project(db, query)?;
    edit(&mut project);
    project.touch();
    save_project(db, &project);
    Ok(())
}

fn slot_command(
    db: &ArchiveDb,
    query: &str,
    slot: &str,
    edit: impl FnOnce(&mut Project, SlotId),
) -> Result<()> {
    let mut project = find_project(db, query)?;
    let id = resolve_slot(&project, slot)?;
    edit(&mut project, id);
    project.touch();
    save_project(db, &project);
    Ok(())
}

fn assign_command(
    db: &ArchiveDb,
    query: &str,
    slot: &str,
    field: SlotField,
    file: &Path,
) -> Result<()> {
    let image = read_image(file)?;
    slot_command(db, query, slot, |project, id| {
        assign_image(&mut project.draft_slots, id, field, image)
    })
}

fn draft_command(
    db: &ArchiveDb,
    query: &str,
    style: Option<String>,
    provider: ProviderArgs,
) -> Result<()> {
    let project = find_project(db, query)?;
    let eligible = project.eligible_slot_ids().len();
    if eligible == 0 {
        info!("No eligible slots; fill both frames of at least one slot first.");
        return Ok(());
    }
    info!("Drafting {} eligible pair(s)", eligible);

    let analyst = build_analyst(provider)?;
    let style = style.unwrap_or_else(|| DEFAULT_STYLE_DIRECTIVE.to_string());

    let session = StudioSession::new(project);
    let rx = session.rx_events.clone();
    let printer = std::thread::spawn(move || {
        for event in rx.iter() {
            match event.status {
                DraftStatus::Processing => info!(slot = %event.slot_id, "analyzing pair"),
                DraftStatus::Completed { sequence, .. } => {
                    info!(slot = %event.slot_id, sequence, "shot drafted")
                }
                DraftStatus::Failed { message } => {
                    warn!(slot = %event.slot_id, error = %message, "pair failed")
                }
            }
        }
    });

    let result = process_batch(&session, analyst.as_ref(), &style);
    let updated = session.snapshot();
    drop(session);
    let _ = printer.join();

    let report = result?;
    save_project(db, &updated);

    info!(
        "Batch finished: {} shot(s) created, {} failure(s)",
        report.created.len(),
        report.failures.len()
    );
    if report
        .failures
        .iter()
        .any(|(_, message)| message.contains(KEY_NOT_FOUND_MARKER))
    {
        warn!("The selected API key looks invalid or expired; select a fresh key and retry.");
    }
    Ok(())
}

fn rewrite_command(
    db: &ArchiveDb,
    query: &str,
    goal: RewriteGoal,
    provider: ProviderArgs,
) -> Result<()> {
    let project = find_project(db, query)?;
    if project.shots.is_empty() {
        info!("No shots to rewrite.");
        return Ok(());
    }
    let analyst = build_analyst(provider)?;
    let session = StudioSession::new(project);
    let updated = refine_shots(&session, analyst.as_ref(), goal)?;
    let project = session.snapshot();
    save_project(db, &project);
    info!("Rewrote {} prompt(s)", updated);
    Ok(())
}

fn export_command(db: &ArchiveDb, query: &str, output: Option<PathBuf>) -> Result<()> {
    let project = find_project(db, query)?;
    if project.shots.is_empty() {
        bail!("project has no shots to export");
    }
    let output = output.unwrap_or_else(|| PathBuf::from(exporters::pack_file_name(&project.title)));
    exporters::export_master_pack(&project, &output)?;
    info!("Wrote master pack to {}", output.display());
    Ok(())
}

fn delete_shot_command(db: &ArchiveDb, query: &str, shot: &str) -> Result<()> {
    let mut project = find_project(db, query)?;
    let id = project
        .sorted_shots()
        .iter()
        .find(|s| {
            shot.parse::<i64>().map(|n| s.sequence_order == n).unwrap_or(false)
                || s.id.to_string().starts_with(shot)
        })
        .map(|s| s.id)
        .ok_or_else(|| anyhow!("no shot matches '{shot}'"))?;
    project.delete_shot(id);
    project.touch();
    save_project(db, &project);
    Ok(())
}

fn add_anchor_command(
    db: &ArchiveDb,
    query: &str,
    name: String,
    kind: AnchorKind,
    file: &Path,
) -> Result<()> {
    let image = read_image(file)?;
    edit_command(db, query, |project| {
        project.add_anchor(VisualAnchor {
            id: AnchorId::new(),
            name,
            image,
            kind,
        })
    })
}

fn remove_anchor_command(db: &ArchiveDb, query: &str, anchor: &str) -> Result<()> {
    let mut project = find_project(db, query)?;
    let id = project
        .anchors
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(anchor) || a.id.to_string().starts_with(anchor))
        .map(|a| a.id)
        .ok_or_else(|| anyhow!("no anchor matches '{anchor}'"))?;
    project.remove_anchor(id);
    project.touch();
    save_project(db, &project);
    Ok(())
}

fn delete_command(db: &ArchiveDb, query: &str) -> Result<()> {
    let project = find_project(db, query)?;
    db.delete_project(project.id)?;
    info!("Deleted project '{}'", project.title);
    Ok(())
}

fn build_analyst(provider: ProviderArgs) -> Result<Box<dyn ShotAnalyst>> {
    let config = if provider.mock {
        ProviderConfig::Mock(MockConfig::default())
    } else {
        let api_key = provider
            .api_key
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .unwrap_or_default();
        let mut gemini = GeminiConfig {
            api_key,
            ..GeminiConfig::default()
        };
        if let Some(model) = provider.model {
            gemini.model = model;
        }
        ProviderConfig::Gemini(gemini)
    };
    config.build().map_err(|err| anyhow!("{err}"))
}

/// The in-memory project stays the source of truth; a failed save is
/// logged and the session carries on.
fn save_project(db: &ArchiveDb, project: &Project) {
    if let Err(err) = db.upsert_project(project) {
        warn!(error = %err, "saving project failed; state kept in memory only");
    }
}

fn find_project(db: &ArchiveDb, query: &str) -> Result<Project> {
    let projects = db.load_all()?;
    let matches: Vec<&Project> = projects
        .iter()
        .filter(|p| {
            let id = p.id.to_string();
            id == query || id.starts_with(query) || p.title.eq_ignore_ascii_case(query)
        })
        .collect();
    match matches.len() {
        0 => bail!("no project matches '{query}'"),
        1 => Ok(matches[0].clone()),
        n => bail!("'{query}' is ambiguous ({n} projects match); use a longer id prefix"),
    }
}

fn resolve_slot(project: &Project, key: &str) -> Result<SlotId> {
    if let Ok(index) = key.parse::<usize>() {
        if index >= 1 && index <= project.draft_slots.len() {
            return Ok(project.draft_slots[index - 1].id);
        }
        bail!(
            "slot position {index} is out of range (queue has {} slots)",
            project.draft_slots.len()
        );
    }
    let matches: Vec<&DraftSlot> = project
        .draft_slots
        .iter()
        .filter(|s| s.id.to_string().starts_with(key))
        .collect();
    match matches.len() {
        0 => bail!("no slot matches '{key}'"),
        1 => Ok(matches[0].id),
        n => bail!("'{key}' is ambiguous ({n} slots match); use a longer id prefix"),
    }
}

fn read_image(path: &Path) -> Result<ImageRef> {
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        other => bail!(
            "'{}' is not a supported image file (extension {:?})",
            path.display(),
            other
        ),
    };
    let bytes = std::fs::read(path)?;
    Ok(ImageRef::from_bytes(mime, &bytes))
}
