use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use routeline_cli::gpx_export::write_gpx;
use routeline_cli::overlay::{path_to_svg, render_overlay};
use routeline_cli::{server, AppConfig, RouteLine, SimilarityMode, TraceConfig, TrackSession, ValhallaClient};
use routeline_core::{init_thread_pool, GeoPoint, PixelPoint, ReferencePoint};
use routeline_trace::decode_image;
use std::path::{Path, PathBuf};
use std::time::Instant;
use time::OffsetDateTime;

#[derive(Parser)]
#[command(name = "routeline")]
#[command(about = "Trace a drawn route line in an image and turn it into a GPX track")]
#[command(version)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Tracer settings file, TOML or `.json`; replaces the `[trace]` section
    #[arg(long, global = true)]
    trace_config: Option<PathBuf>,

    /// Worker threads (overrides the configuration)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace the line under a seed pixel.
    Trace(TraceArgs),

    /// Trace, georeference and export a GPX track.
    Track(TrackArgs),

    /// Run the HTTP API.
    Serve {
        /// Address to listen on (overrides the configuration)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print or write the default configuration.
    Config {
        #[arg(long)]
        out: Option<PathBuf>,

        /// Also write the default tracer settings on their own, TOML or `.json`
        #[arg(long)]
        trace_out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct SeedArgs {
    /// Input image (PNG, JPEG, ...).
    #[arg(long)]
    image: PathBuf,

    /// Seed pixel column.
    #[arg(long, allow_hyphen_values = true)]
    x: i64,

    /// Seed pixel row.
    #[arg(long, allow_hyphen_values = true)]
    y: i64,
}

#[derive(Debug, Clone, Args)]
struct TraceArgs {
    #[command(flatten)]
    seed: SeedArgs,

    /// Write the traced points as JSON.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the normalized path as SVG.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Write a PNG with the path drawn over the image.
    #[arg(long)]
    overlay: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Uniform,
    AxisAligned,
}

impl From<ModeArg> for SimilarityMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Uniform => SimilarityMode::Uniform,
            ModeArg::AxisAligned => SimilarityMode::AxisAligned,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct TrackArgs {
    #[command(flatten)]
    seed: SeedArgs,

    /// Reference point as PX,PY:LAT,LNG; give two or more.
    #[arg(long = "ref", value_parser = parse_reference, required = true, allow_hyphen_values = true)]
    references: Vec<ReferencePoint>,

    /// Two-point transform model.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Snap the track to roads through the routing service.
    #[arg(long)]
    snap: bool,

    /// Snap search radius in meters.
    #[arg(long)]
    radius: Option<f64>,

    /// Douglas-Peucker tolerance in pixels.
    #[arg(long)]
    simplify: Option<f64>,

    /// Track name stored in the GPX file.
    #[arg(long)]
    name: Option<String>,

    /// Output GPX file.
    #[arg(long)]
    out: PathBuf,

    /// Write a PNG with the traced and snapped paths drawn over the image.
    #[arg(long)]
    overlay: Option<PathBuf>,
}

/// Parse `PX,PY:LAT,LNG`
fn parse_reference(text: &str) -> Result<ReferencePoint, String> {
    let (pixel, geo) = text
        .split_once(':')
        .ok_or_else(|| format!("expected PX,PY:LAT,LNG, got {:?}", text))?;
    let pair = |part: &str| -> Result<(String, String), String> {
        part.split_once(',')
            .map(|(a, b)| (a.trim().to_string(), b.trim().to_string()))
            .ok_or_else(|| format!("expected two comma separated numbers in {:?}", part))
    };

    let (px, py) = pair(pixel)?;
    let (lat, lng) = pair(geo)?;
    let px: i64 = px.parse().map_err(|_| format!("pixel x {:?} is not an integer", px))?;
    let py: i64 = py.parse().map_err(|_| format!("pixel y {:?} is not an integer", py))?;
    let lat: f64 = lat.parse().map_err(|_| format!("latitude {:?} is not a number", lat))?;
    let lng: f64 = lng.parse().map_err(|_| format!("longitude {:?} is not a number", lng))?;

    let geo = GeoPoint::validated(lat, lng).map_err(|e| e.to_string())?;
    Ok(ReferencePoint::new(PixelPoint::new(px, py), geo))
}

fn read_image(path: &Path) -> Result<image::RgbImage> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    decode_image(&bytes).with_context(|| format!("decoding {}", path.display()))
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn load_trace_config(path: &Path) -> Result<TraceConfig> {
    let loaded = if is_json(path) { TraceConfig::load_json(path) } else { TraceConfig::load_toml(path) };
    loaded.map_err(|e| anyhow!("loading tracer settings from {}: {}", path.display(), e))
}

fn save_trace_config(config: &TraceConfig, path: &Path) -> Result<()> {
    let saved = if is_json(path) { config.save_json(path) } else { config.save_toml(path) };
    saved.map_err(|e| anyhow!("writing {}: {}", path.display(), e))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn run_trace(config: &AppConfig, args: &TraceArgs) -> Result<()> {
    let route = RouteLine::new(config)?;
    let img = read_image(&args.seed.image)?;
    let seed = PixelPoint::new(args.seed.x, args.seed.y);

    let t0 = Instant::now();
    let raw = route.trace(&img, seed)?;
    let elapsed = t0.elapsed();

    if raw.is_single() {
        warn!("no line found at ({}, {})", seed.x, seed.y);
    }
    let path = if raw.is_single() { raw } else { route.simplify(&raw) };
    let bounds = path.bounds();
    println!("Time taken: {:.2?}", elapsed);
    println!("Traced {} points, {:.1} px long", path.len(), path.length_px());
    println!("Bounds: ({}, {}) - ({}, {})", bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y);

    if let Some(out) = &args.json {
        let body = serde_json::json!({
            "points": path.points().iter().map(|p| [p.x, p.y]).collect::<Vec<_>>(),
            "normalized_points": path.normalized().points().iter().map(|p| [p.x, p.y]).collect::<Vec<_>>(),
            "width": img.width(),
            "height": img.height(),
            "bounds": bounds,
            "line_found": !path.is_single(),
        });
        write_text(out, &serde_json::to_string_pretty(&body)?)?;
    }
    if let Some(out) = &args.svg {
        write_text(out, &path_to_svg(&path, img.width(), img.height()))?;
    }
    if let Some(out) = &args.overlay {
        render_overlay(&img, &path, seed, None)?
            .save(out)
            .with_context(|| format!("writing {}", out.display()))?;
        info!("wrote {}", out.display());
    }
    Ok(())
}

fn run_track(mut config: AppConfig, args: &TrackArgs) -> Result<()> {
    if args.references.len() < 2 {
        bail!("at least two --ref points are needed, got {}", args.references.len());
    }
    if let Some(mode) = args.mode {
        config.pipeline.similarity_mode = mode.into();
    }
    if let Some(epsilon) = args.simplify {
        config.pipeline.simplify_epsilon = epsilon;
    }
    config.pipeline.reference_points = args.references.len();
    config.validate()?;

    let mut session = TrackSession::from_config(&config)?;
    let img = read_image(&args.seed.image)?;
    session.load_decoded(img);

    let seed = PixelPoint::new(args.seed.x, args.seed.y);
    let path = session.trace(seed)?;
    info!("traced {} points", path.len());

    for reference in &args.references {
        session.place_pixel(reference.pixel)?;
        session.place_geo(reference.geo)?;
    }
    if let Some(transform) = session.transform() {
        println!("{}", transform.summary());
        println!("RMS error at references: {:.2} m", transform.rms_error(session.references()));
    }

    if args.snap {
        let client = ValhallaClient::new(config.snap.clone())?;
        let radius = args.radius.unwrap_or(config.pipeline.snap_radius_m);
        session.snap_or_fallback(&client, radius)?;
    }

    let track = session.best_track()?;
    println!("Track: {} points, {:.0} m", track.len(), track.length_m());
    let document = write_gpx(track, args.name.as_deref(), OffsetDateTime::now_utc())?;
    write_text(&args.out, &document)?;

    if let Some(out) = &args.overlay {
        let snapped = session.snapped_path().zip(session.transform());
        let img = session.image().context("image dropped from session")?;
        render_overlay(img, &path, seed, snapped)?
            .save(out)
            .with_context(|| format!("writing {}", out.display()))?;
        info!("wrote {}", out.display());
    }
    Ok(())
}

fn run_serve(mut config: AppConfig, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    runtime.block_on(server::serve(config))?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Commands::Config { out, trace_out } = &cli.command {
        let defaults = AppConfig::new();
        let text = defaults.to_toml()?;
        match out {
            Some(path) => write_text(path, &text)?,
            None => print!("{}", text),
        }
        if let Some(path) = trace_out {
            save_trace_config(&defaults.trace, path)?;
        }
        return Ok(());
    }

    let mut config = AppConfig::load(cli.config.as_deref())
        .with_context(|| match &cli.config {
            Some(path) => format!("loading configuration from {}", path.display()),
            None => "checking default configuration".to_string(),
        })?;
    if let Some(path) = &cli.trace_config {
        config.trace = load_trace_config(path)?;
        config.validate()?;
    }
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    if let Err(e) = init_thread_pool(config.threads) {
        warn!("Thread pool already initialized: {}", e);
    }

    match cli.command {
        Commands::Trace(args) => run_trace(&config, &args),
        Commands::Track(args) => run_track(config, &args),
        Commands::Serve { bind } => run_serve(config, bind),
        Commands::Config { .. } => Ok(()),
    }
}
