// tlc - reconciled ZTF light curves, positions and cutouts
// Fetches from Kowalski/Fritz or works offline on saved broker JSON.

mod exit_codes;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use serde_json::{json, Value};

use transient_cli::ingest::{ingest_page, IngestError, IngestReport};
use transient_client::{ClientError, FritzClient, KowalskiClient, KowalskiCredentials};
use transient_config::secrets::{FRITZ_TOKEN_ENV, KOWALSKI_PASSWORD_ENV, KOWALSKI_USERNAME_ENV};
use transient_config::{resolve_secret, ConfigError, Settings};
use transient_photometry::config::DEFAULT_MIN_FIELDS;
use transient_photometry::cutout::{Channel, STAMP_SIZE};
use transient_photometry::loader::{build_input, parse_alert_packets, parse_optional};
use transient_photometry::model::ztf_filter_name;
use transient_photometry::series::{points_by_filter, SeriesByFilter};
use transient_photometry::{
    estimate_position, galactic_latitude, make_triplet, reconcile, CutoutError, HistoryInclusion,
    LightCurve, LimitPreference, PageCursor, PhotometryError, PrvCandidate, ReconcileConfig,
    SkyPosition, StampSet,
};
use transient_store::export::export_light_curve;
use transient_store::{SourceRepository, SqliteStore, StoreError};

use exit_codes::{
    client_exit_code, cutout_exit_code, photometry_exit_code, store_exit_code, EXIT_FETCH_AUTH,
    EXIT_FETCH_NOT_FOUND, EXIT_STORE_WRITE, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "tlc")]
#[command(about = "Reconciled ZTF light curves, sky positions and cutout triplets")]
#[command(version)]
struct Cli {
    /// Settings file (default: <config dir>/transient/settings.toml)
    #[arg(long, global = true, env = "TLC_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch an object's alerts and histories from Kowalski and reconcile them
    #[command(after_help = "\
Examples:
  tlc lc ZTF21aagppzg
  tlc lc ZTF21aagppzg --json > lc.json
  tlc lc ZTF21aagppzg --csv lc.csv --no-forced")]
    Lc {
        /// Object id, e.g. ZTF21aagppzg
        object: String,

        /// Print the light curve as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Also write the light curve as CSV
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,

        /// Skip the forced-photometry history
        #[arg(long)]
        no_forced: bool,

        /// Skip the previous-candidate history
        #[arg(long)]
        no_prv: bool,

        #[command(flatten)]
        tuning: TuningArgs,

        #[command(flatten)]
        kowalski: KowalskiArgs,
    },

    /// Reconcile saved broker JSON without network access
    #[command(after_help = "\
Examples:
  tlc reconcile --alerts alerts.json --forced fp_hists.json --prv prv.json
  tlc reconcile --alerts alerts.json --json --csv lc.csv")]
    Reconcile {
        /// Alert packets (JSON array of {\"candidate\": {...}} or bare candidates)
        #[arg(long, value_name = "FILE")]
        alerts: PathBuf,

        /// Forced-photometry history (JSON array)
        #[arg(long, value_name = "FILE")]
        forced: Option<PathBuf>,

        /// Previous-candidate history (JSON array)
        #[arg(long, value_name = "FILE")]
        prv: Option<PathBuf>,

        /// Object id for output (default: first packet's objectId)
        #[arg(long)]
        object: Option<String>,

        /// Print the light curve as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Also write the light curve as CSV
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Median sky position and positional scatter
    #[command(after_help = "\
Examples:
  tlc position ZTF21aagppzg
  tlc position --alerts alerts.json --prv prv.json --json")]
    Position {
        /// Object id to fetch from Kowalski
        #[arg(conflicts_with = "alerts")]
        object: Option<String>,

        /// Alert packets (JSON array) instead of fetching
        #[arg(long, value_name = "FILE")]
        alerts: Option<PathBuf>,

        /// Previous-candidate history (JSON array), with --alerts
        #[arg(long, value_name = "FILE", requires = "alerts")]
        prv: Option<PathBuf>,

        #[arg(long)]
        json: bool,

        #[command(flatten)]
        tuning: TuningArgs,

        #[command(flatten)]
        kowalski: KowalskiArgs,
    },

    /// Decode an alert's cutout stamps into a 63x63x3 triplet
    #[command(after_help = "\
Examples:
  tlc triplet --alert packet.json --normalize
  tlc triplet ZTF21aagppzg --json")]
    Triplet {
        /// Object id whose latest alert is fetched from Kowalski
        #[arg(conflicts_with = "alert")]
        object: Option<String>,

        /// A saved alert packet with cutoutScience/Template/Difference
        #[arg(long, value_name = "FILE")]
        alert: Option<PathBuf>,

        /// Scale each channel to unit Frobenius norm
        #[arg(long)]
        normalize: bool,

        #[arg(long)]
        json: bool,

        #[command(flatten)]
        kowalski: KowalskiArgs,
    },

    /// Ingest the next page of Fritz sources into the local catalog
    Ingest {
        /// Fetch this page instead of the one after the saved cursor
        #[arg(long, value_name = "N")]
        page: Option<u32>,

        /// Fritz API token
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// List recently ingested sources
    Sources {
        #[arg(long, default_value = "20")]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Per-filter plot series of a catalog source's stored photometry
    Series {
        object: String,

        #[arg(long)]
        json: bool,
    },

    /// Inspect settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print effective settings (credentials masked)
    Show,
    /// Print the settings file path
    Path,
}

/// Overrides for the `[reconcile]` settings section.
#[derive(Args)]
struct TuningArgs {
    /// Forced-photometry SNR above which it counts as a detection
    #[arg(long, value_name = "SNR")]
    snr_threshold: Option<f64>,

    /// Which limiting magnitude wins when both histories have one
    #[arg(long, value_name = "PREF")]
    limit_preference: Option<LimitArg>,

    /// Which previous candidates join the positional scatter
    #[arg(long, value_name = "RULE")]
    history: Option<HistoryArg>,

    /// Field-count threshold for --history field-count
    #[arg(long, value_name = "N")]
    min_fields: Option<usize>,
}

#[derive(Args)]
struct KowalskiArgs {
    /// Kowalski username
    #[arg(long, value_name = "USER")]
    kowalski_username: Option<String>,

    /// Kowalski password
    #[arg(long, value_name = "PASSWORD")]
    kowalski_password: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LimitArg {
    ForcedFiveSigma,
    DiffImage,
    Deepest,
}

impl From<LimitArg> for LimitPreference {
    fn from(arg: LimitArg) -> Self {
        match arg {
            LimitArg::ForcedFiveSigma => LimitPreference::ForcedFiveSigma,
            LimitArg::DiffImage => LimitPreference::DiffImage,
            LimitArg::Deepest => LimitPreference::Deepest,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum HistoryArg {
    FieldCount,
    Coordinates,
}

impl TuningArgs {
    fn apply(&self, base: &ReconcileConfig) -> Result<ReconcileConfig, CliError> {
        let mut config = base.clone();
        if let Some(snr) = self.snr_threshold {
            config.snr_threshold = snr;
        }
        if let Some(pref) = self.limit_preference {
            config.limit_preference = pref.into();
        }
        config.history_inclusion = match (self.history, self.min_fields) {
            (Some(HistoryArg::Coordinates), Some(_)) => {
                return Err(CliError::args("--min-fields only applies to --history field-count"));
            }
            (Some(HistoryArg::Coordinates), None) => HistoryInclusion::HasCoordinates,
            (Some(HistoryArg::FieldCount), n) => HistoryInclusion::FieldCount {
                min_fields: n.unwrap_or(DEFAULT_MIN_FIELDS),
            },
            (None, Some(n)) => HistoryInclusion::FieldCount { min_fields: n },
            (None, None) => config.history_inclusion,
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let result = load_settings(cli.config.as_deref()).and_then(|settings| run(cli.command, cli.config, settings));

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn run(command: Commands, config_path: Option<PathBuf>, settings: Settings) -> Result<(), CliError> {
    match command {
        Commands::Lc {
            object,
            json,
            csv,
            no_forced,
            no_prv,
            tuning,
            kowalski,
        } => cmd_lc(&settings, &object, json, csv, no_forced, no_prv, &tuning, &kowalski),
        Commands::Reconcile {
            alerts,
            forced,
            prv,
            object,
            json,
            csv,
            tuning,
        } => cmd_reconcile(&settings, &alerts, forced, prv, object, json, csv, &tuning),
        Commands::Position {
            object,
            alerts,
            prv,
            json,
            tuning,
            kowalski,
        } => cmd_position(&settings, object, alerts, prv, json, &tuning, &kowalski),
        Commands::Triplet {
            object,
            alert,
            normalize,
            json,
            kowalski,
        } => cmd_triplet(&settings, object, alert, normalize, json, &kowalski),
        Commands::Ingest { page, token, json } => cmd_ingest(&settings, page, token, json),
        Commands::Sources { limit, json } => cmd_sources(&settings, limit, json),
        Commands::Series { object, json } => cmd_series(&settings, &object, json),
        Commands::Config { command } => match command {
            ConfigCommands::Show => cmd_config_show(&settings),
            ConfigCommands::Path => {
                let path = config_path.unwrap_or_else(Settings::config_path);
                println!("{}", path.display());
                Ok(())
            }
        },
    }
}

/// An explicit `--config` must load; the default location falls back to
/// defaults with a warning.
fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    match path {
        Some(path) => Settings::load_from(path).map_err(|e| {
            CliError::args(e.to_string()).with_hint("check the file or drop --config to use defaults")
        }),
        None => Ok(Settings::load()),
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_STORE_WRITE, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<PhotometryError> for CliError {
    fn from(err: PhotometryError) -> Self {
        let hint = match &err {
            PhotometryError::InsufficientData(_) => {
                Some("no alert packet carries both ra and dec".to_string())
            }
            PhotometryError::MissingJoinKey { .. } => {
                Some("every alert, forced and prv record needs a numeric jd".to_string())
            }
            _ => None,
        };
        Self { code: photometry_exit_code(&err), message: err.to_string(), hint }
    }
}

impl From<CutoutError> for CliError {
    fn from(err: CutoutError) -> Self {
        Self { code: cutout_exit_code(&err), message: err.to_string(), hint: None }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        let hint = match &err {
            StoreError::UnknownSource(_) => Some("run `tlc ingest` or check `tlc sources`".to_string()),
            StoreError::SchemaVersion { .. } => Some("this catalog was written by a newer tlc".to_string()),
            _ => None,
        };
        Self { code: store_exit_code(&err), message: err.to_string(), hint }
    }
}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        let hint = match &err {
            ClientError::AuthRejected(_) => Some("check your credentials with `tlc config show`".to_string()),
            ClientError::Network(_) => Some("check the broker host in the settings file".to_string()),
            _ => None,
        };
        Self { code: client_exit_code(&err), message: err.to_string(), hint }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match &err {
            ConfigError::MissingSecret { env_var, .. } => Self {
                code: EXIT_FETCH_AUTH,
                message: err.to_string(),
                hint: Some(format!("export {env_var}=...")),
            },
            _ => CliError::args(err.to_string()),
        }
    }
}

impl From<IngestError> for CliError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Fetch(e) => e.into(),
            IngestError::Store(e) => e.into(),
        }
    }
}

// ============================================================================
// Clients and inputs
// ============================================================================

fn kowalski_client(settings: &Settings, args: &KowalskiArgs) -> Result<KowalskiClient, CliError> {
    let k = &settings.kowalski;
    let username = resolve_secret(
        "Kowalski username",
        args.kowalski_username.as_deref(),
        KOWALSKI_USERNAME_ENV,
        k.username.as_deref(),
    )?;
    let password = resolve_secret(
        "Kowalski password",
        args.kowalski_password.as_deref(),
        KOWALSKI_PASSWORD_ENV,
        k.password.as_deref(),
    )?;
    log::debug!(
        "Kowalski credentials from {} / {}",
        username.source.as_str(),
        password.source.as_str()
    );

    let creds = KowalskiCredentials {
        protocol: k.protocol.clone(),
        host: k.host.clone(),
        port: k.port,
        username: username.value,
        password: password.value,
    };
    Ok(KowalskiClient::new(&creds)?)
}

fn fritz_client(settings: &Settings, token: Option<&str>) -> Result<FritzClient, CliError> {
    let token = resolve_secret(
        "Fritz API token",
        token,
        FRITZ_TOKEN_ENV,
        settings.fritz.token.as_deref(),
    )?;
    log::debug!("Fritz token from {}", token.source.as_str());
    Ok(FritzClient::with_base_url(token.value, settings.fritz.base_url.clone())?)
}

fn open_store(settings: &Settings) -> Result<SqliteStore, CliError> {
    let path = settings.effective_database();
    log::debug!("catalog at {}", path.display());
    Ok(SqliteStore::open(&path)?)
}

fn read_json(path: &Path) -> Result<Value, CliError> {
    let text = fs::read_to_string(path)
        .map_err(|e| CliError::args(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&text).map_err(|e| {
        CliError::args(format!("{}: invalid JSON: {}", path.display(), e))
            .with_hint("expected a JSON array of broker records")
    })
}

fn read_json_array(path: &Path) -> Result<Vec<Value>, CliError> {
    match read_json(path)? {
        Value::Array(items) => Ok(items),
        _ => Err(CliError::args(format!("{}: expected a JSON array", path.display()))),
    }
}

fn read_optional(path: Option<&Path>) -> Result<Option<Value>, CliError> {
    path.map(read_json).transpose()
}

fn write_stdout(text: &str) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", text).map_err(|e| CliError::io(e.to_string()))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
    write_stdout(&text)
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "-".to_string(),
    }
}

// ============================================================================
// lc / reconcile
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn cmd_lc(
    settings: &Settings,
    object: &str,
    json: bool,
    csv: Option<PathBuf>,
    no_forced: bool,
    no_prv: bool,
    tuning: &TuningArgs,
    kowalski: &KowalskiArgs,
) -> Result<(), CliError> {
    let config = tuning.apply(&settings.reconcile)?;
    let client = kowalski_client(settings, kowalski)?;

    let alerts = client.alerts(object)?;
    let forced = if no_forced {
        None
    } else {
        optional_history(object, "forced history", client.forced_history(object))
    };
    let prv = if no_prv {
        None
    } else {
        optional_history(object, "previous candidates", client.prv_candidates(object))
    };
    log::debug!("{object}: {} alert packets", alerts.len());

    let input = build_input(object, &alerts, forced.as_ref(), prv.as_ref())?;
    let lc = reconcile(&config, &input)?;
    emit_light_curve(&lc, json, csv.as_deref())
}

/// Histories only refine the curve, so a failed fetch is logged and the
/// command carries on without it.
fn optional_history(
    object: &str,
    what: &str,
    fetched: Result<Option<Value>, ClientError>,
) -> Option<Value> {
    fetched.unwrap_or_else(|e| {
        log::warn!("{object}: {what} unavailable: {e}");
        None
    })
}

#[allow(clippy::too_many_arguments)]
fn cmd_reconcile(
    settings: &Settings,
    alerts: &Path,
    forced: Option<PathBuf>,
    prv: Option<PathBuf>,
    object: Option<String>,
    json: bool,
    csv: Option<PathBuf>,
    tuning: &TuningArgs,
) -> Result<(), CliError> {
    let config = tuning.apply(&settings.reconcile)?;
    let packets = read_json_array(alerts)?;
    let forced = read_optional(forced.as_deref())?;
    let prv = read_optional(prv.as_deref())?;

    let object = object
        .or_else(|| {
            packets
                .iter()
                .find_map(|p| p.get("objectId").and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| "unknown".to_string());

    let input = build_input(&object, &packets, forced.as_ref(), prv.as_ref())?;
    let lc = reconcile(&config, &input)?;
    emit_light_curve(&lc, json, csv.as_deref())
}

fn emit_light_curve(lc: &LightCurve, json: bool, csv: Option<&Path>) -> Result<(), CliError> {
    if let Some(path) = csv {
        export_light_curve(lc, path)?;
        eprintln!("Wrote {} rows to {}", lc.rows.len(), path.display());
    }

    if json {
        print_json(lc)?;
    } else if !lc.is_empty() {
        let mut out = format!(
            "{:>15}  {:<6} {:>7} {:>6} {:>7}  {:<3}  {}",
            "jd", "filter", "mag", "emag", "maglim", "det", "alert"
        );
        for row in &lc.rows {
            let filter = row.fid.map(ztf_filter_name).unwrap_or("-");
            out.push_str(&format!(
                "\n{:>15.5}  {:<6} {:>7} {:>6} {:>7}  {:<3}  {}",
                row.jd,
                filter,
                fmt_opt(row.mag_final, 3),
                fmt_opt(row.emag_final, 3),
                fmt_opt(row.maglim, 3),
                if row.is_detection { "yes" } else { "no" },
                if row.is_alert { "yes" } else { "no" },
            ));
        }
        write_stdout(&out)?;
    }

    let r = &lc.report;
    if lc.is_empty() {
        eprintln!("{}: no alert detections, light curve is empty", lc.object_id);
    } else {
        eprintln!(
            "{}: {} epochs ({} detections, {} upper limits); alerts {}, forced {}, prv {}, dropped {}",
            lc.object_id,
            lc.rows.len(),
            lc.detections().count(),
            lc.upper_limits().count(),
            r.alert_epochs,
            if r.forced_joined { r.forced_epochs.to_string() } else { "-".into() },
            if r.prv_joined { r.prv_epochs.to_string() } else { "-".into() },
            r.dropped_rows,
        );
    }
    Ok(())
}

// ============================================================================
// position
// ============================================================================

fn cmd_position(
    settings: &Settings,
    object: Option<String>,
    alerts: Option<PathBuf>,
    prv: Option<PathBuf>,
    json: bool,
    tuning: &TuningArgs,
    kowalski: &KowalskiArgs,
) -> Result<(), CliError> {
    let config = tuning.apply(&settings.reconcile)?;

    let (label, packets, history) = match (object, alerts) {
        (Some(object), None) => {
            let client = kowalski_client(settings, kowalski)?;
            let packets = client.alerts(&object)?;
            let history =
                optional_history(&object, "previous candidates", client.prv_candidates(&object));
            (object, packets, history)
        }
        (None, Some(path)) => {
            let packets = read_json_array(&path)?;
            let history = read_optional(prv.as_deref())?;
            (path.display().to_string(), packets, history)
        }
        _ => {
            return Err(CliError::args("position needs an object id or --alerts FILE")
                .with_hint("tlc position ZTF21aagppzg"))
        }
    };

    let candidates = parse_alert_packets(&packets)?;
    let history = parse_optional::<PrvCandidate>(history.as_ref())?;
    let position = estimate_position(&candidates, history.as_deref(), config.history_inclusion)?;
    let b = galactic_latitude(position.ra, position.dec);

    if json {
        print_json(&position_json(&position, b))
    } else {
        write_stdout(&format!(
            "ra       {:.6}\ndec      {:.6}\nscatter  {:.3} arcsec\ngal_b    {:.3}",
            position.ra, position.dec, position.scatter_arcsec, b
        ))?;
        eprintln!(
            "{}: {} alert points, {} history points",
            label, position.alert_points, position.history_points
        );
        Ok(())
    }
}

fn position_json(position: &SkyPosition, galactic_b: f64) -> Value {
    json!({
        "ra": position.ra,
        "dec": position.dec,
        "scatter_arcsec": position.scatter_arcsec,
        "galactic_latitude": galactic_b,
        "alert_points": position.alert_points,
        "history_points": position.history_points,
    })
}

// ============================================================================
// triplet
// ============================================================================

fn cmd_triplet(
    settings: &Settings,
    object: Option<String>,
    alert: Option<PathBuf>,
    normalize: bool,
    json: bool,
    kowalski: &KowalskiArgs,
) -> Result<(), CliError> {
    let packet = match (object, alert) {
        (Some(object), None) => {
            let client = kowalski_client(settings, kowalski)?;
            client.latest_alert(&object)?.ok_or_else(|| CliError {
                code: EXIT_FETCH_NOT_FOUND,
                message: format!("no alert packet for {object}"),
                hint: None,
            })?
        }
        (None, Some(path)) => read_json(&path)?,
        _ => {
            return Err(CliError::args("triplet needs an object id or --alert FILE")
                .with_hint("tlc triplet --alert packet.json"))
        }
    };

    let stamps = StampSet::from_alert_json(&packet)?;
    let triplet = make_triplet(&stamps, normalize)?;

    if json {
        let mut channels = serde_json::Map::new();
        for channel in Channel::ALL {
            channels.insert(channel.name().to_string(), json!(triplet.stats(channel)));
        }
        print_json(&json!({
            "size": [STAMP_SIZE, STAMP_SIZE, 3],
            "normalized": normalize,
            "channels": channels,
        }))
    } else {
        let mut out = format!("{:<11} {:>14} {:>14} {:>14}", "channel", "min", "max", "sum");
        for channel in Channel::ALL {
            let s = triplet.stats(channel);
            out.push_str(&format!(
                "\n{:<11} {:>14.6e} {:>14.6e} {:>14.6e}",
                channel.name(),
                s.min,
                s.max,
                s.sum
            ));
        }
        write_stdout(&out)
    }
}

// ============================================================================
// ingest / sources / series
// ============================================================================

fn cmd_ingest(settings: &Settings, page: Option<u32>, token: Option<String>, json: bool) -> Result<(), CliError> {
    let fritz = fritz_client(settings, token.as_deref())?;
    let mut store = open_store(settings)?;

    let per_page = settings.fritz.per_page;
    let cursor = match page {
        Some(0) => return Err(CliError::args("--page starts at 1")),
        // the page before N, so the ingest fetches exactly N
        Some(n) => PageCursor { page: n - 1, per_page },
        None => PageCursor { per_page, ..store.load_cursor()? },
    };

    let report = ingest_page(&fritz, &mut store, cursor)?;
    store.save_cursor(PageCursor { page: report.page, per_page })?;

    if json {
        print_json(&report)
    } else {
        print_ingest_summary(&report);
        Ok(())
    }
}

fn print_ingest_summary(report: &IngestReport) {
    eprintln!(
        "Page {}: {} listed, {} inserted, {} already stored, {} photometry points",
        report.page, report.listed, report.inserted, report.skipped, report.photometry_points
    );
    for failure in &report.failures {
        eprintln!("  {}: {}", failure.obj_id, failure.message);
    }
}

fn cmd_sources(settings: &Settings, limit: usize, json: bool) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let sources = store.recent_sources(limit)?;

    if json {
        return print_json(&sources);
    }
    if sources.is_empty() {
        eprintln!("Catalog is empty; run `tlc ingest`");
        return Ok(());
    }
    let mut out = format!("{:>5}  {:<14} {:>11} {:>11} {:>8}", "id", "obj_id", "ra", "dec", "z");
    for s in &sources {
        let r = &s.record;
        out.push_str(&format!(
            "\n{:>5}  {:<14} {:>11} {:>11} {:>8}",
            s.id,
            r.obj_id,
            fmt_opt(r.ra, 6),
            fmt_opt(r.dec, 6),
            fmt_opt(r.redshift, 4),
        ));
    }
    write_stdout(&out)
}

fn cmd_series(settings: &Settings, object: &str, json: bool) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let points = store.photometry_for(object)?;
    let series = points_by_filter(&points, chrono::Utc::now());

    if json {
        return print_json(&series);
    }
    write_stdout(&render_series(&series))?;
    eprintln!("{}: {} stored points", object, points.len());
    Ok(())
}

fn render_series(series: &SeriesByFilter) -> String {
    let mut lines = Vec::new();
    for (filter, s) in series {
        lines.push(format!(
            "{} ({} detections, {} upper limits)",
            filter,
            s.detections.len(),
            s.upper_limits.len()
        ));
        for d in &s.detections {
            lines.push(format!("  {:>10.3} d ago  {:.3} ± {}", d.days_ago, d.mag, fmt_opt(d.emag, 3)));
        }
        for l in &s.upper_limits {
            lines.push(format!("  {:>10.3} d ago  > {:.3}", l.days_ago, l.maglim));
        }
    }
    lines.join("\n")
}

// ============================================================================
// config
// ============================================================================

fn cmd_config_show(settings: &Settings) -> Result<(), CliError> {
    let text = settings.redacted().to_toml()?;
    write_stdout(text.trim_end())?;
    eprintln!("database: {}", settings.effective_database().display());
    Ok(())
}
