//! CLI definition and dispatch.

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::{JsonReportAdapter, render_json};
use crate::adapters::local_narrator::LocalNarrator;
use crate::adapters::sandbox_adapter::InterpreterSandbox;
use crate::adapters::static_interpreter::StaticInterpreter;
use crate::domain::anomaly::scan_volume;
use crate::domain::backtest::{BacktestOrchestrator, BacktestRequest};
use crate::domain::error::PatternIqError;
use crate::domain::predicate::Predicate;
use crate::domain::report::Report;
use crate::domain::settings::{DataProvider, DataSettings, LogSettings, Settings, parse_symbols};
use crate::domain::strategy::PredicateSource;
use crate::ports::data_port::DataPort;
use crate::ports::interpretation_port::InterpretationPort;
use crate::ports::narrative_port::NarrativePort;
use crate::ports::report_port::ReportPort;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "PATTERNIQ_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "patterniq",
    version,
    about = "Backtest plain-English trading strategies"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest(BacktestArgs),
    /// Parse a predicate and print its canonical form
    CheckPredicate {
        /// Predicate source text
        #[arg(required_unless_present = "file")]
        source: Option<String>,
        #[arg(short, long, conflicts_with = "source")]
        file: Option<PathBuf>,
    },
    /// Scan symbols for unusual volume
    Scan {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Comma-separated symbols, overriding [scan] symbols
        #[arg(long)]
        symbols: Option<String>,
    },
    /// Start the HTTP API server
    Serve {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Match strategies against built-in templates and narrate locally
        #[arg(long)]
        offline: bool,
    },
}

#[derive(Args, Debug)]
pub struct BacktestArgs {
    #[arg(long)]
    pub symbol: String,
    #[arg(long, default_value = "1d")]
    pub interval: String,
    #[arg(long, default_value_t = 100_000.0)]
    pub capital: f64,
    /// Percent of equity risked per trade
    #[arg(long = "risk", default_value_t = 2.0)]
    pub risk_percent: f64,
    /// Stop-loss distance in percent
    #[arg(long = "sl", default_value_t = 2.0)]
    pub sl_percent: f64,
    /// Target distance in percent
    #[arg(long = "target", default_value_t = 4.0)]
    pub target_percent: f64,
    /// Strategy in plain English
    #[arg(long)]
    pub strategy: String,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Structured strategy JSON used instead of the interpretation service
    #[arg(long)]
    pub spec: Option<PathBuf>,
    /// Predicate DSL file for pattern strategies
    #[arg(long)]
    pub predicate: Option<PathBuf>,
    /// Use only the built-in entry templates; implies --local-narrative
    #[arg(long)]
    pub offline: bool,
    #[arg(long)]
    pub local_narrative: bool,
    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl BacktestArgs {
    fn request(&self) -> BacktestRequest {
        BacktestRequest {
            symbol: self.symbol.clone(),
            interval: self.interval.clone(),
            capital: self.capital,
            risk_percent: self.risk_percent,
            sl_percent: self.sl_percent,
            target_percent: self.target_percent,
            strategy_text: self.strategy.clone(),
        }
    }

    fn uses_static_interpreter(&self) -> bool {
        self.offline || self.spec.is_some()
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest(args) => run_backtest(&args),
        Command::CheckPredicate { source, file } => {
            run_check_predicate(source.as_deref(), file.as_ref())
        }
        Command::Scan { config, symbols } => run_scan(config.as_ref(), symbols.as_deref()),
        Command::Serve { config, offline } => run_serve(config.as_ref(), offline),
    }
}

/// Load and validate settings; without a path the defaults apply.
pub fn load_config(path: Option<&PathBuf>) -> Result<Settings, ExitCode> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
        .and_then(|adapter| Settings::from_config(&adapter))
        .map_err(|e| {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        })
}

/// Install the global subscriber. `PATTERNIQ_LOG` wins over `[log] level`.
pub fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&log.level));
    let registry = tracing_subscriber::registry().with(filter);
    let result = if log.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("warning: logging not initialised: {e}");
    }
}

type SharedData = Arc<dyn DataPort + Send + Sync>;
type SharedInterpreter = Arc<dyn InterpretationPort + Send + Sync>;
type SharedNarrator = Arc<dyn NarrativePort + Send + Sync>;

pub fn build_data_port(settings: &DataSettings) -> Result<SharedData, PatternIqError> {
    match settings.provider {
        DataProvider::Csv => Ok(Arc::new(CsvAdapter::new(PathBuf::from(&settings.csv_dir)))),
        DataProvider::Yahoo => {
            #[cfg(feature = "http")]
            {
                use crate::adapters::yahoo_adapter::YahooAdapter;
                Ok(Arc::new(YahooAdapter::from_settings(settings)?))
            }

            #[cfg(not(feature = "http"))]
            {
                Err(PatternIqError::ConfigInvalid {
                    section: "data".into(),
                    key: "provider".into(),
                    reason: "yahoo requires the http feature".into(),
                })
            }
        }
    }
}

/// The remote interpretation/narrative service, one client behind both ports.
#[cfg(feature = "http")]
fn remote_service(
    settings: &Settings,
) -> Result<(SharedInterpreter, SharedNarrator), PatternIqError> {
    use crate::adapters::gemini_adapter::GeminiAdapter;
    let service = Arc::new(GeminiAdapter::from_settings(&settings.llm)?);
    let interpreter: SharedInterpreter = service.clone();
    let narrator: SharedNarrator = service;
    Ok((interpreter, narrator))
}

#[cfg(not(feature = "http"))]
fn remote_service(
    _settings: &Settings,
) -> Result<(SharedInterpreter, SharedNarrator), PatternIqError> {
    Err(PatternIqError::ConfigInvalid {
        section: "llm".into(),
        key: "base_url".into(),
        reason: "the interpretation service requires the http feature".into(),
    })
}

fn build_collaborators(
    settings: &Settings,
    args: &BacktestArgs,
) -> Result<(SharedInterpreter, SharedNarrator), PatternIqError> {
    let local_narrative = args.local_narrative || args.offline;
    if !args.uses_static_interpreter() {
        let (interpreter, narrator) = remote_service(settings)?;
        let narrator: SharedNarrator = if local_narrative {
            Arc::new(LocalNarrator)
        } else {
            narrator
        };
        return Ok((interpreter, narrator));
    }

    let interpreter: SharedInterpreter = Arc::new(StaticInterpreter::from_files(
        args.spec.as_deref(),
        args.predicate.as_deref(),
    )?);
    let narrator: SharedNarrator = if local_narrative {
        Arc::new(LocalNarrator)
    } else {
        remote_service(settings)?.1
    };
    Ok((interpreter, narrator))
}

fn print_summary(report: &Report) {
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Symbol:           {} ({})", report.symbol, report.interval);
    eprintln!("Signal Source:    {}", report.signal_source);
    eprintln!("Bars Evaluated:   {}", report.bars_evaluated);
    eprintln!("Total Trades:     {}", report.num_trades);
    eprintln!("Win Rate:         {:.2}%", report.win_rate);
    eprintln!("Net P/L:          {:.2} ({:.2}%)", report.pnl, report.pnl_percent);
    eprintln!("Profit Factor:    {:.2}", report.profit_factor);
    eprintln!("Max Drawdown:     {:.2}%", report.max_drawdown);
    eprintln!("Final Equity:     {:.2}", report.final_equity);

    if !report.trades.is_empty() {
        eprintln!("\n=== Trades ===");
        for trade in &report.trades {
            let sign = if trade.pnl_percent >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {} @ {:.2} -> {} @ {:.2}  {:?}  {}{:.2}%",
                trade.entry_date,
                trade.entry_price,
                trade.exit_date,
                trade.exit_price,
                trade.reason,
                sign,
                trade.pnl_percent,
            );
        }
    }

    eprintln!("\n=== Analysis ===");
    eprintln!("{}", report.narrative);
}

fn run_backtest(args: &BacktestArgs) -> ExitCode {
    // Stage 1: Load config
    let settings = match load_config(args.config.as_ref()) {
        Ok(s) => s,
        Err(code) => return code,
    };
    init_tracing(&settings.log);

    // Stage 2: Validate request before touching any collaborator
    let request = args.request();
    if let Err(e) = request.validate() {
        eprintln!("error: {e}");
        return (&e).into();
    }

    // Stage 3: Wire collaborators
    let data = match build_data_port(&settings.data) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let (interpreter, narrator) = match build_collaborators(&settings, args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let sandbox = InterpreterSandbox::from_settings(&settings.sandbox);

    // Stage 4: Run
    eprintln!(
        "Running backtest: {} {} \"{}\"",
        request.symbol, request.interval, request.strategy_text
    );
    let orchestrator = BacktestOrchestrator::new(
        &*data,
        &*interpreter,
        &*narrator,
        &sandbox,
        settings.data.lookback,
    );
    let report = match orchestrator.run(&request) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 5: Console summary to stderr
    print_summary(&report);

    // Stage 6: Report
    match &args.output {
        Some(path) => match JsonReportAdapter.write(&report, path) {
            Ok(()) => {
                eprintln!("\nReport written to: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: failed to write report: {e}");
                (&e).into()
            }
        },
        None => match render_json(&report) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                (&e).into()
            }
        },
    }
}

fn run_check_predicate(source: Option<&str>, file: Option<&PathBuf>) -> ExitCode {
    let raw = match (source, file) {
        (_, Some(path)) => {
            eprintln!("Checking predicate: {}", path.display());
            match fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) => {
                    let err = PatternIqError::Io(e);
                    eprintln!("error: failed to read {}: {err}", path.display());
                    return (&err).into();
                }
            }
        }
        (Some(text), None) => text.to_string(),
        (None, None) => {
            eprintln!("error: no predicate given");
            return ExitCode::from(4);
        }
    };

    let source = PredicateSource::new(&raw);
    let predicate = match Predicate::compile(source.as_str()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error:\n{}", e.display_with_context(source.as_str()));
            return (&PatternIqError::from(e)).into();
        }
    };

    let rule = predicate.rule();
    eprintln!("\nPredicate (parsed):");
    eprintln!("  Parsed: {}", rule);
    eprintln!("  Raw:    {}", source.as_str());
    eprintln!("  Nodes:  {}", rule.node_count());

    let indicators = predicate.indicators();
    if indicators.is_empty() {
        eprintln!("\nIndicators to compute: none");
    } else {
        eprintln!("\nIndicators to compute:");
        for ind in &indicators {
            eprintln!("  {} -> {}", ind, ind.columns().join(", "));
        }
    }

    println!("{}", rule);
    eprintln!("\nPredicate is valid.");
    ExitCode::SUCCESS
}

fn run_scan(config_path: Option<&PathBuf>, symbols: Option<&str>) -> ExitCode {
    let mut settings = match load_config(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    init_tracing(&settings.log);

    if let Some(list) = symbols {
        settings.scan.symbols = parse_symbols(list);
    }
    if settings.scan.symbols.is_empty() {
        eprintln!("error: no symbols to scan");
        return ExitCode::from(2);
    }

    let data = match build_data_port(&settings.data) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!(
        "Scanning {} symbols (window {}, threshold {:.2}x)...",
        settings.scan.symbols.len(),
        settings.scan.window,
        settings.scan.threshold
    );
    let alerts = scan_volume(&*data, &settings.scan, Local::now().naive_local());

    for alert in &alerts {
        println!("{}: {}", alert.symbol, alert.anomaly.message);
    }
    eprintln!(
        "\n{} alert(s) across {} symbols",
        alerts.len(),
        settings.scan.symbols.len()
    );
    ExitCode::SUCCESS
}

fn run_serve(config_path: Option<&PathBuf>, offline: bool) -> ExitCode {
    #[cfg(feature = "web")]
    {
        use crate::adapters::web::{AppState, build_router};
        use std::net::SocketAddr;

        let settings = match load_config(config_path) {
            Ok(s) => s,
            Err(code) => return code,
        };
        init_tracing(&settings.log);

        let addr: SocketAddr = match settings.listen.parse() {
            Ok(a) => a,
            Err(e) => {
                let err = PatternIqError::ConfigInvalid {
                    section: "web".into(),
                    key: "listen".into(),
                    reason: format!("{e}"),
                };
                eprintln!("error: {err}");
                return (&err).into();
            }
        };

        let data = match build_data_port(&settings.data) {
            Ok(d) => d,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let collaborators = if offline {
            Ok((
                Arc::new(StaticInterpreter::templates_only()) as SharedInterpreter,
                Arc::new(LocalNarrator) as SharedNarrator,
            ))
        } else {
            remote_service(&settings)
        };
        let (interpreter, narrator) = match collaborators {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        // Built outside the runtime so blocking clients are dropped outside it too.
        let state = Arc::new(AppState {
            data,
            interpreter,
            narrator,
            sandbox: Arc::new(InterpreterSandbox::from_settings(&settings.sandbox)),
            lookback: settings.data.lookback,
            scan: settings.scan.clone(),
        });
        let router = build_router(Arc::clone(&state));

        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                let err = PatternIqError::Io(e);
                eprintln!("error: failed to start runtime: {err}");
                return (&err).into();
            }
        };

        eprintln!("Starting web server on {}", addr);
        let served = runtime.block_on(async {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await
        });
        drop(runtime);
        drop(state);

        match served {
            Ok(()) => {
                eprintln!("Server stopped");
                ExitCode::SUCCESS
            }
            Err(e) => {
                let err = PatternIqError::Io(e);
                eprintln!("error: {err}");
                (&err).into()
            }
        }
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = (config_path, offline);
        eprintln!("error: web feature is required for serve");
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn backtest_defaults() {
        let cli = parse(&[
            "patterniq",
            "backtest",
            "--symbol",
            "TCS",
            "--strategy",
            "RSI below 30",
        ]);
        let Command::Backtest(args) = cli.command else {
            panic!("expected backtest");
        };
        let request = args.request();
        assert_eq!(request.interval, "1d");
        assert_eq!(request.capital, 100_000.0);
        assert_eq!(request.risk_percent, 2.0);
        assert_eq!(request.sl_percent, 2.0);
        assert_eq!(request.target_percent, 4.0);
        assert!(!args.uses_static_interpreter());
    }

    #[test]
    fn spec_or_offline_selects_static_interpreter() {
        let cli = parse(&[
            "patterniq",
            "backtest",
            "--symbol",
            "TCS",
            "--strategy",
            "x",
            "--offline",
        ]);
        let Command::Backtest(args) = cli.command else {
            panic!("expected backtest");
        };
        assert!(args.uses_static_interpreter());
    }

    #[test]
    fn check_predicate_needs_input() {
        assert!(Cli::try_parse_from(["patterniq", "check-predicate"]).is_err());
        assert!(Cli::try_parse_from(["patterniq", "check-predicate", "ABOVE(close, 1)"]).is_ok());
    }

    #[test]
    fn csv_provider_builds_without_network() {
        let settings = DataSettings {
            provider: DataProvider::Csv,
            ..Settings::default().data
        };
        assert!(build_data_port(&settings).is_ok());
    }

    #[test]
    fn offline_backtest_needs_no_service() {
        let cli = parse(&[
            "patterniq",
            "backtest",
            "--symbol",
            "TCS",
            "--strategy",
            "golden cross",
            "--offline",
        ]);
        let Command::Backtest(args) = cli.command else {
            panic!("expected backtest");
        };
        let (interpreter, _narrator) =
            build_collaborators(&Settings::default(), &args).unwrap();
        let spec = interpreter.interpret(&args.strategy).unwrap();
        assert_eq!(spec.entry_condition, "golden cross");
    }
}
