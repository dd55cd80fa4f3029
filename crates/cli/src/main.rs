use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

use rendezvous::collab::{
    CachedOracle, CachedProvider, DiscIsochrones, IsochroneProvider, LookupCache,
    StraightLineOracle, TravelTimeOracle,
};
use rendezvous::error::{InputError, PlanError};
use rendezvous::geom::Region;
use rendezvous::response::{ErrorResponse, PlanResponse};
use rendezvous::{MeetingRequest, Outcome, PlanCfg, PlanResult, Planner};

mod mapbox;
mod provenance;

#[derive(Parser)]
#[command(name = "cli")]
#[command(about = "Fair meeting-point planner")]
struct Cmd {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Plan a meeting point for a JSON request and print the result
    Meet(MeetArgs),
    /// Print a small provenance JSON block
    Report,
}

#[derive(Args, Debug)]
struct MeetArgs {
    /// Request file: {"participants":[{address,lat,lng}], profile, max_minutes, objective}
    #[arg(long)]
    request: PathBuf,
    /// Use disc isochrones and straight-line travel times instead of Mapbox
    #[arg(long)]
    offline: bool,
    /// Also write the result here, with a provenance sidecar
    #[arg(long)]
    out: Option<PathBuf>,
    /// Include the common region and candidates as GeoJSON
    #[arg(long)]
    debug: bool,
    /// Candidate grid pitch in meters when the request has none
    #[arg(long)]
    grid_spacing: Option<f64>,
    /// Maximum in-flight travel-time lookups
    #[arg(long, default_value_t = 8)]
    concurrency: usize,
    /// Per-call deadline for provider and oracle lookups
    #[arg(long, default_value_t = 20)]
    timeout_secs: u64,
    /// Entries per lookup cache
    #[arg(long, default_value_t = 4096)]
    cache_capacity: usize,
    /// Mapbox API root (ignored with --offline)
    #[arg(long, default_value = mapbox::DEFAULT_BASE_URL)]
    mapbox_url: String,
}

impl MeetArgs {
    fn plan_cfg(&self) -> PlanCfg {
        let defaults = PlanCfg::default();
        PlanCfg {
            grid_spacing_m: self.grid_spacing.unwrap_or(defaults.grid_spacing_m),
            oracle_concurrency: self.concurrency,
            call_timeout: Duration::from_secs(self.timeout_secs),
            debug_candidates: self.debug,
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    SubscriberBuilder::default()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let cmd = Cmd::parse();
    match cmd.action {
        Action::Meet(args) => meet(args).await,
        Action::Report => report(),
    }
}

async fn meet(args: MeetArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.request)
        .with_context(|| format!("reading {}", args.request.display()))?;
    let request = match parse_request(&raw) {
        Ok(request) => request,
        Err(err) => return report_failure(err),
    };
    let cfg = args.plan_cfg();
    tracing::info!(
        request = %args.request.display(),
        offline = args.offline,
        participants = request.participants.len(),
        "meet"
    );

    let result = if args.offline {
        plan_with(
            DiscIsochrones::default(),
            StraightLineOracle::default(),
            cfg,
            args.cache_capacity,
            &request,
        )
        .await
    } else {
        let token = std::env::var("MAPBOX_TOKEN")
            .context("MAPBOX_TOKEN is not set (use --offline to plan without network access)")?;
        let client =
            mapbox::MapboxClient::new(token, cfg.call_timeout)?.with_base_url(&args.mapbox_url);
        plan_with(client.clone(), client, cfg, args.cache_capacity, &request).await
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => return report_failure(err),
    };
    let response = PlanResponse::from_outcome(&outcome, args.debug);
    let body = serde_json::to_string_pretty(&response)?;
    println!("{body}");
    if let Some(out) = &args.out {
        write_output(out, &body)?;
        let payload = provenance::Payload::new(params_json(&args, &request))
            .with_summary(summary_json(&outcome));
        let sidecar = provenance::write_sidecar(out, payload)?;
        tracing::info!(out = %out.display(), sidecar = %sidecar.display(), "written");
    }
    Ok(())
}

/// Malformed JSON is reported as an input error, like an out-of-range field.
fn parse_request(raw: &str) -> PlanResult<MeetingRequest> {
    serde_json::from_str(raw)
        .map_err(|e| PlanError::Input(InputError::MalformedRequest(e.to_string())))
}

fn error_envelope(err: &PlanError) -> serde_json::Value {
    json!({ "error": ErrorResponse::from(err) })
}

/// Print the error envelope on stdout and fail the command.
fn report_failure(err: PlanError) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&error_envelope(&err))?);
    Err(anyhow!(err).context("planning failed"))
}

/// Run the planner with both collaborators behind fresh lookup caches.
async fn plan_with<P, O>(
    provider: P,
    oracle: O,
    cfg: PlanCfg,
    cache_capacity: usize,
    request: &MeetingRequest,
) -> PlanResult<Outcome>
where
    P: IsochroneProvider,
    O: TravelTimeOracle,
{
    let regions = Arc::new(LookupCache::<Region>::with_capacity(cache_capacity));
    let times = Arc::new(LookupCache::<f64>::with_capacity(cache_capacity));
    let planner = Planner::new(
        CachedProvider::new(provider, regions.clone()),
        CachedOracle::new(oracle, times.clone()),
        cfg,
    );
    let result = planner.plan(request).await;
    tracing::debug!(regions = ?regions.stats(), times = ?times.stats(), "cache_stats");
    result
}

fn write_output(out: &Path, body: &str) -> Result<()> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    std::fs::write(out, body).with_context(|| format!("writing {}", out.display()))
}

fn params_json(args: &MeetArgs, request: &MeetingRequest) -> serde_json::Value {
    json!({
        "request": args.request.to_string_lossy(),
        "offline": args.offline,
        "participants": request.participants.len(),
        "profile": request.profile,
        "objective": request.objective,
        "max_minutes": request.max_minutes,
        "grid_resolution_m": request.grid_resolution_m,
        "grid_spacing_default_m": args.grid_spacing,
        "concurrency": args.concurrency,
        "timeout_secs": args.timeout_secs,
    })
}

fn summary_json(outcome: &Outcome) -> serde_json::Value {
    match outcome {
        Outcome::Reachable(m) => json!({
            "reachable": true,
            "max_minutes": m.effective_budget,
            "relaxed": m.relaxed,
            "selection": m.selection,
            "meeting_point": m.meeting_point,
        }),
        Outcome::Unreachable {
            reason,
            effective_budget,
        } => json!({
            "reachable": false,
            "reason": reason.as_str(),
            "max_minutes": effective_budget,
        }),
    }
}

fn report() -> Result<()> {
    let mut obj = provenance::header();
    obj["params"] = json!({});
    obj["outputs"] = json!([]);
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}
