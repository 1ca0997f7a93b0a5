//! Command-line surface: argument types and command handlers.
//!
//! Handlers return the text to print so they can be driven from tests
//! without capturing stdout.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use uuid::Uuid;

use proofdeck_core::comment::{self, NewComment};
use proofdeck_core::creative::{
    stored_file_name, validate_upload_batch, Creative, CreativeStatus, TrackedField, UploadedFile,
};
use proofdeck_core::pin::{self, PinAnnotation, PinPlacement, Size, ViewTransform};
use proofdeck_core::project::{self, Project, ProjectSummary};
use proofdeck_core::revision::TimelineEntry;
use proofdeck_core::word_diff::{self, DiffKind, DiffResult};

use crate::config::CliConfig;
use crate::store;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "proofdeck",
    version,
    about = "Review creatives: caption history, word diffs and pinned feedback"
)]
pub struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or delete projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Register uploaded files or delete creatives
    #[command(subcommand)]
    Creative(CreativeCommand),
    /// Word-level diff of two texts
    Diff(DiffArgs),
    /// Show the edit timeline of a tracked text field
    History(FieldArgs),
    /// Save a new value for a tracked text field
    Edit(EditArgs),
    /// Change the review status of a creative
    Status(StatusArgs),
    /// Add or delete review comments
    #[command(subcommand)]
    Comment(CommentCommand),
    /// List comment threads with pin marker numbers
    Threads(CreativeArgs),
    /// Map a click on a zoomed and panned view to pin percentages
    Pin(PinArgs),
    /// Per-project approval counts
    Summary,
    /// Shareable client review link for a project or creative
    #[command(name = "review-link")]
    ReviewLink(ReviewLinkArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Project(ProjectCommand::Create(_)) => "project create",
            Self::Project(ProjectCommand::Delete(_)) => "project delete",
            Self::Creative(CreativeCommand::Add(_)) => "creative add",
            Self::Creative(CreativeCommand::Delete(_)) => "creative delete",
            Self::Diff(_) => "diff",
            Self::History(_) => "history",
            Self::Edit(_) => "edit",
            Self::Status(_) => "status",
            Self::Comment(CommentCommand::Add(_)) => "comment add",
            Self::Comment(CommentCommand::Delete(_)) => "comment delete",
            Self::Threads(_) => "threads",
            Self::Pin(_) => "pin",
            Self::Summary => "summary",
            Self::ReviewLink(_) => "review-link",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create an empty project
    Create(ProjectCreateArgs),
    /// Delete a project with all of its creatives
    Delete(ProjectArgs),
}

#[derive(Args, Debug)]
pub struct ProjectCreateArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub client: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[arg(long)]
    pub project: Uuid,
}

#[derive(Subcommand, Debug)]
pub enum CreativeCommand {
    /// Register a batch of uploaded files with a project
    Add(CreativeAddArgs),
    /// Remove a creative and its comments
    Delete(CreativeArgs),
}

#[derive(Args, Debug)]
pub struct CreativeAddArgs {
    #[arg(long)]
    pub project: Uuid,
    /// Uploaded file as NAME:SIZE_BYTES:MIME_TYPE; repeat for a batch
    #[arg(long = "file", value_parser = parse_upload)]
    pub files: Vec<UploadSpec>,
}

/// One `--file` entry of `creative add`.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSpec {
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

fn parse_upload(raw: &str) -> Result<UploadSpec, String> {
    let mut parts = raw.rsplitn(3, ':');
    let (Some(mime_type), Some(size), Some(name)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected NAME:SIZE_BYTES:MIME_TYPE, got '{raw}'"));
    };
    if name.trim().is_empty() || mime_type.trim().is_empty() {
        return Err(format!("file name and mime type are required in '{raw}'"));
    }
    let size_bytes = size
        .trim()
        .parse()
        .map_err(|_| format!("invalid size '{size}' in '{raw}'"))?;
    Ok(UploadSpec {
        name: name.trim().to_string(),
        size_bytes,
        mime_type: mime_type.trim().to_string(),
    })
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Previous text
    pub old: String,
    /// New text
    pub new: String,
}

#[derive(Args, Debug)]
pub struct CreativeArgs {
    #[arg(long)]
    pub project: Uuid,
    #[arg(long)]
    pub creative: Uuid,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FieldArg {
    Caption,
    ImageText,
}

impl From<FieldArg> for TrackedField {
    fn from(field: FieldArg) -> Self {
        match field {
            FieldArg::Caption => TrackedField::Caption,
            FieldArg::ImageText => TrackedField::ImageText,
        }
    }
}

#[derive(Args, Debug)]
pub struct FieldArgs {
    #[command(flatten)]
    pub target: CreativeArgs,
    #[arg(long, value_enum, default_value = "caption")]
    pub field: FieldArg,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    #[command(flatten)]
    pub field: FieldArgs,
    /// New value for the field
    #[arg(long)]
    pub text: String,
    /// Editor name; falls back to PROOFDECK_DEFAULT_AUTHOR
    #[arg(long)]
    pub author: Option<String>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: CreativeArgs,
    /// pending, approved or revision_requested
    #[arg(value_parser = parse_status)]
    pub status: CreativeStatus,
}

fn parse_status(raw: &str) -> Result<CreativeStatus, String> {
    CreativeStatus::from_str(&raw.trim().replace('-', "_")).map_err(|e| e.to_string())
}

#[derive(Subcommand, Debug)]
pub enum CommentCommand {
    /// Add a comment, optionally pinned or as a reply
    Add(CommentArgs),
    /// Delete a comment together with its replies
    Delete(CommentDeleteArgs),
}

#[derive(Args, Debug)]
pub struct CommentDeleteArgs {
    #[command(flatten)]
    pub target: CreativeArgs,
    #[arg(long)]
    pub comment: Uuid,
}

#[derive(Args, Debug)]
pub struct CommentArgs {
    #[command(flatten)]
    pub target: CreativeArgs,
    #[arg(long)]
    pub text: String,
    /// Reviewer name; blank means Anonymous
    #[arg(long)]
    pub author: Option<String>,
    /// Top-level comment this one answers
    #[arg(long)]
    pub reply_to: Option<Uuid>,
    /// Pin x as a percentage of the image width
    #[arg(long, requires = "pin_y")]
    pub pin_x: Option<f64>,
    /// Pin y as a percentage of the image height
    #[arg(long, requires = "pin_x")]
    pub pin_y: Option<f64>,
}

#[derive(Args, Debug)]
pub struct PinArgs {
    /// Click x in viewport pixels
    #[arg(long, allow_negative_numbers = true)]
    pub x: f64,
    /// Click y in viewport pixels
    #[arg(long, allow_negative_numbers = true)]
    pub y: f64,
    /// Viewport width in pixels
    #[arg(long)]
    pub width: f64,
    /// Viewport height in pixels
    #[arg(long)]
    pub height: f64,
    #[arg(long, default_value_t = 1.0)]
    pub zoom: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub pan_x: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub pan_y: f64,
}

#[derive(Args, Debug)]
pub struct ReviewLinkArgs {
    #[arg(long)]
    pub project: Uuid,
    #[arg(long)]
    pub creative: Option<Uuid>,
    /// Origin the review pages are served from
    #[arg(long, default_value = "http://localhost:3000")]
    pub base_url: String,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run one command and return its output.
pub async fn run(cli: Cli, config: &CliConfig) -> anyhow::Result<String> {
    tracing::info!(command = cli.command.name(), "Running command");
    let out = Output {
        json: cli.json,
        pretty: config.pretty_json,
    };

    match cli.command {
        Commands::Project(ProjectCommand::Create(args)) => create_project(args, config, out).await,
        Commands::Project(ProjectCommand::Delete(args)) => delete_project(args, config, out).await,
        Commands::Creative(CreativeCommand::Add(args)) => add_creatives(args, config, out).await,
        Commands::Creative(CreativeCommand::Delete(args)) => {
            delete_creative(args, config, out).await
        }
        Commands::Diff(args) => diff(args, config, out),
        Commands::History(args) => history(args, config, out).await,
        Commands::Edit(args) => edit(args, config, out).await,
        Commands::Status(args) => status(args, config, out).await,
        Commands::Comment(CommentCommand::Add(args)) => add_comment(args, config, out).await,
        Commands::Comment(CommentCommand::Delete(args)) => {
            delete_comment(args, config, out).await
        }
        Commands::Threads(args) => threads(args, config, out).await,
        Commands::Pin(args) => pin(args, out),
        Commands::Summary => summary(config, out).await,
        Commands::ReviewLink(args) => review_link(args, config).await,
    }
}

#[derive(Debug, Clone, Copy)]
struct Output {
    json: bool,
    pretty: bool,
}

impl Output {
    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(json)
    }
}

/// Inline word-diff markup: `[-removed-]` and `{+added+}`.
pub fn render_diff(diff: &DiffResult) -> String {
    diff.tokens
        .iter()
        .map(|t| match t.kind {
            DiffKind::Same => t.text.clone(),
            DiffKind::Added => format!("{{+{}+}}", t.text),
            DiffKind::Removed => format!("[-{}-]", t.text),
        })
        .collect()
}

/// Status badge text, including the revision round when one was requested.
pub fn status_label(status: CreativeStatus, revision_number: u32) -> String {
    match status {
        CreativeStatus::RevisionRequested => {
            format!("{} (Rev. {revision_number})", status.label())
        }
        _ => status.label().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_project(
    args: ProjectCreateArgs,
    config: &CliConfig,
    out: Output,
) -> anyhow::Result<String> {
    let mut projects = store::load_projects(&config.data_file).await?;
    let created = Project::new(&args.name, args.client.as_deref(), Utc::now())?;
    tracing::info!(project_id = %created.id, name = %created.name, "Created project");
    projects.push(created.clone());
    store::save_projects(&config.data_file, &projects, config.pretty_json).await?;

    if out.json {
        return out.to_json(&created);
    }
    Ok(format!("Created project {} ({}).", created.name, created.id))
}

async fn delete_project(
    args: ProjectArgs,
    config: &CliConfig,
    out: Output,
) -> anyhow::Result<String> {
    let mut projects = store::load_projects(&config.data_file).await?;
    let removed = project::remove_project(&mut projects, args.project)?;
    tracing::info!(
        project_id = %removed.id,
        creatives = removed.creatives.len(),
        "Deleted project"
    );
    store::save_projects(&config.data_file, &projects, config.pretty_json).await?;

    if out.json {
        return out.to_json(&removed.summary());
    }
    Ok(format!(
        "Deleted project {} with {} creatives.",
        removed.name,
        removed.creatives.len()
    ))
}

async fn add_creatives(
    args: CreativeAddArgs,
    config: &CliConfig,
    out: Output,
) -> anyhow::Result<String> {
    validate_upload_batch(args.files.len())?;

    let mut projects = store::load_projects(&config.data_file).await?;
    let project = project::find_project_mut(&mut projects, args.project)?;
    let project_id = project.id;

    let now = Utc::now();
    let created = args
        .files
        .into_iter()
        .map(|file| {
            let upload = UploadedFile {
                stored_name: stored_file_name(&file.name, now),
                original_name: file.name,
                size_bytes: file.size_bytes,
                mime_type: file.mime_type,
            };
            Creative::from_upload(project_id, upload, now)
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(%project_id, count = created.len(), "Registered uploads");
    project.add_creatives(created.iter().cloned());
    store::save_projects(&config.data_file, &projects, config.pretty_json).await?;

    if out.json {
        return out.to_json(&created);
    }
    let lines: Vec<String> = created
        .iter()
        .map(|c| format!("Added {} ({}) as {}", c.original_name, c.media_type.as_str(), c.id))
        .collect();
    Ok(lines.join("\n"))
}

async fn delete_creative(
    args: CreativeArgs,
    config: &CliConfig,
    out: Output,
) -> anyhow::Result<String> {
    let mut projects = store::load_projects(&config.data_file).await?;
    let project = project::find_project_mut(&mut projects, args.project)?;
    let removed = project.remove_creative(args.creative)?;
    tracing::info!(creative_id = %removed.id, "Deleted creative");
    store::save_projects(&config.data_file, &projects, config.pretty_json).await?;

    if out.json {
        return out.to_json(&removed);
    }
    Ok(format!("Deleted creative {}.", removed.display_title()))
}

fn diff(args: DiffArgs, config: &CliConfig, out: Output) -> anyhow::Result<String> {
    let cells = word_diff::table_cells(&args.old, &args.new);
    if cells > config.diff_warn_cells {
        tracing::warn!(
            cells,
            limit = config.diff_warn_cells,
            "Large diff input, table size grows with the product of token counts"
        );
    }

    let result = word_diff::diff(&args.old, &args.new);
    if out.json {
        return out.to_json(&result);
    }
    Ok(render_diff(&result))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryOutput<'a> {
    original: &'a str,
    current: &'a str,
    changes_from_original: Option<&'a DiffResult>,
    timeline: &'a [TimelineEntry],
}

async fn history(args: FieldArgs, config: &CliConfig, out: Output) -> anyhow::Result<String> {
    let projects = store::load_projects(&config.data_file).await?;
    let project = project::find_project(&projects, args.target.project)?;
    let creative = project.find_creative(args.target.creative)?;
    let field: TrackedField = args.field.into();

    let Some(log) = creative.text_log(field) else {
        if out.json {
            return out.to_json(&serde_json::Value::Null);
        }
        return Ok(format!("No {} recorded yet.", field.as_str()));
    };

    let timeline = log.timeline();
    let changes = log.changes_from_original();
    if out.json {
        return out.to_json(&HistoryOutput {
            original: &log.original,
            current: &log.current,
            changes_from_original: changes.as_ref(),
            timeline: &timeline,
        });
    }

    let mut lines = vec![format!("Current: {}", log.current)];
    if timeline.is_empty() {
        lines.push("No edits since the original value.".to_string());
    }
    for entry in &timeline {
        lines.push(format!(
            "#{} {} by {}",
            entry.index + 1,
            entry.timestamp.to_rfc3339(),
            entry.author
        ));
        lines.push(format!("  {}", render_diff(&entry.diff)));
    }
    lines.push(format!("Original: {}", log.original));
    if let Some(changes) = &changes {
        lines.push(format!("Changes from original: {}", render_diff(changes)));
    }
    Ok(lines.join("\n"))
}

async fn edit(args: EditArgs, config: &CliConfig, out: Output) -> anyhow::Result<String> {
    let author = args.author.or_else(|| config.default_author.clone());
    let field: TrackedField = args.field.field.into();

    let mut projects = store::load_projects(&config.data_file).await?;
    let project = project::find_project_mut(&mut projects, args.field.target.project)?;
    let creative = project.find_creative_mut(args.field.target.creative)?;

    let changed = creative
        .record_text(field, &args.text, author.as_deref(), Utc::now())
        .with_context(|| format!("Could not save {}", field.as_str()))?;
    let log = creative
        .text_log(field)
        .cloned()
        .context("Tracked field missing after save")?;

    if changed {
        tracing::info!(
            creative_id = %creative.id,
            field = field.as_str(),
            edits = log.edit_count(),
            "Recorded text edit"
        );
        store::save_projects(&config.data_file, &projects, config.pretty_json).await?;
    }

    if out.json {
        return out.to_json(&log);
    }
    Ok(match (changed, log.has_edits()) {
        (false, _) => format!("{} unchanged.", field.as_str()),
        (true, false) => format!("Recorded original {}.", field.as_str()),
        (true, true) => format!(
            "Saved {} edit #{} by {}.",
            field.as_str(),
            log.edit_count(),
            log.last_edited_by.as_deref().unwrap_or_default()
        ),
    })
}

async fn status(args: StatusArgs, config: &CliConfig, out: Output) -> anyhow::Result<String> {
    let mut projects = store::load_projects(&config.data_file).await?;
    let project = project::find_project_mut(&mut projects, args.target.project)?;
    let creative = project.find_creative_mut(args.target.creative)?;

    let previous = creative.set_status(args.status);
    let (status, revision_number) = (creative.status, creative.revision_number);
    tracing::info!(
        creative_id = %creative.id,
        from = %previous,
        to = %status,
        revision_number,
        "Updated creative status"
    );
    store::save_projects(&config.data_file, &projects, config.pretty_json).await?;

    if out.json {
        return out.to_json(&serde_json::json!({
            "status": status,
            "revisionNumber": revision_number,
        }));
    }
    Ok(status_label(status, revision_number))
}

async fn add_comment(args: CommentArgs, config: &CliConfig, out: Output) -> anyhow::Result<String> {
    let pin = match (args.pin_x, args.pin_y) {
        (Some(x), Some(y)) => Some(PinAnnotation::new(x, y)?),
        (None, None) => None,
        _ => bail!("--pin-x and --pin-y must be given together"),
    };

    let mut projects = store::load_projects(&config.data_file).await?;
    let project = project::find_project_mut(&mut projects, args.target.project)?;
    let creative = project.find_creative_mut(args.target.creative)?;

    let input = NewComment {
        author: args.author,
        text: args.text,
        parent_id: args.reply_to,
        pin,
    };
    let created = creative.add_comment(input, Utc::now())?.clone();
    tracing::info!(
        creative_id = %creative.id,
        comment_id = %created.id,
        pinned = created.is_pinned(),
        "Added comment"
    );
    store::save_projects(&config.data_file, &projects, config.pretty_json).await?;

    if out.json {
        return out.to_json(&created);
    }
    Ok(format!("Added comment {} by {}.", created.id, created.author))
}

async fn delete_comment(
    args: CommentDeleteArgs,
    config: &CliConfig,
    out: Output,
) -> anyhow::Result<String> {
    let mut projects = store::load_projects(&config.data_file).await?;
    let project = project::find_project_mut(&mut projects, args.target.project)?;
    let creative = project.find_creative_mut(args.target.creative)?;

    let before = creative.comments.len();
    let removed = creative.remove_comment(args.comment)?;
    let replies = before - creative.comments.len() - 1;
    tracing::info!(
        creative_id = %creative.id,
        comment_id = %removed.id,
        replies,
        "Deleted comment"
    );
    store::save_projects(&config.data_file, &projects, config.pretty_json).await?;

    if out.json {
        return out.to_json(&serde_json::json!({
            "deleted": removed.id,
            "repliesDeleted": replies,
        }));
    }
    let noun = if replies == 1 { "reply" } else { "replies" };
    Ok(format!("Deleted comment {} and {replies} {noun}.", removed.id))
}

async fn threads(args: CreativeArgs, config: &CliConfig, out: Output) -> anyhow::Result<String> {
    let projects = store::load_projects(&config.data_file).await?;
    let project = project::find_project(&projects, args.project)?;
    let creative = project.find_creative(args.creative)?;

    let threads = creative.comment_threads();
    let markers = comment::pin_markers(&creative.comments);
    if out.json {
        return out.to_json(&serde_json::json!({
            "threads": threads,
            "markers": markers,
        }));
    }

    if threads.is_empty() {
        return Ok("No comments yet.".to_string());
    }

    let mut lines = Vec::new();
    for thread in &threads {
        let marker = markers
            .iter()
            .find(|m| m.comment_id == thread.root.id)
            .map(|m| format!("[{}] ", m.number))
            .unwrap_or_default();
        lines.push(format!("{marker}{}: {}", thread.root.author, thread.root.text));
        for reply in &thread.replies {
            lines.push(format!("    {}: {}", reply.author, reply.text));
        }
    }
    Ok(lines.join("\n"))
}

#[derive(Debug, Serialize)]
struct PinOutput {
    placed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y: Option<f64>,
}

fn pin(args: PinArgs, out: Output) -> anyhow::Result<String> {
    if args.width <= 0.0 || args.height <= 0.0 {
        bail!("Viewport width and height must be positive");
    }
    let transform = ViewTransform::new(args.zoom, args.pan_x, args.pan_y)?;
    let viewport = Size::new(args.width, args.height);
    let placement = pin::to_percent(args.x, args.y, viewport, &transform);

    let result = match placement {
        PinPlacement::Placed(p) => PinOutput {
            placed: true,
            x: Some(p.x),
            y: Some(p.y),
        },
        PinPlacement::OutOfBounds => PinOutput {
            placed: false,
            x: None,
            y: None,
        },
    };

    if out.json {
        return out.to_json(&result);
    }
    Ok(match (result.x, result.y) {
        (Some(x), Some(y)) => format!("Pin at {x:.1}%, {y:.1}%"),
        _ => "Click is outside the image; no pin placed.".to_string(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryRow {
    #[serde(flatten)]
    summary: ProjectSummary,
    approval_percent: u32,
}

async fn summary(config: &CliConfig, out: Output) -> anyhow::Result<String> {
    let projects = store::load_projects(&config.data_file).await?;
    let rows: Vec<SummaryRow> = projects
        .iter()
        .map(|p| {
            let summary = p.summary();
            SummaryRow {
                approval_percent: summary.approval_percent(),
                summary,
            }
        })
        .collect();

    if out.json {
        return out.to_json(&rows);
    }
    if rows.is_empty() {
        return Ok("No projects yet.".to_string());
    }

    let lines: Vec<String> = rows
        .iter()
        .map(|row| {
            let s = &row.summary;
            let client = if s.client_name.is_empty() {
                String::new()
            } else {
                format!(" ({})", s.client_name)
            };
            format!(
                "{}{client}: {}/{} approved ({}%), {} pending, {} revision requested",
                s.name,
                s.approved_count,
                s.creative_count,
                row.approval_percent,
                s.pending_count,
                s.revision_count
            )
        })
        .collect();
    Ok(lines.join("\n"))
}

async fn review_link(args: ReviewLinkArgs, config: &CliConfig) -> anyhow::Result<String> {
    let projects = store::load_projects(&config.data_file).await?;
    let project = project::find_project(&projects, args.project)?;
    let path = match args.creative {
        Some(creative_id) => project.creative_review_path(creative_id)?,
        None => project.review_path(),
    };
    Ok(format!("{}{path}", args.base_url.trim_end_matches('/')))
}
