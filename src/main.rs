use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use epochstat::config::Config;
use epochstat::{Engine, Result};

const DEMO_METRICS: [&str; 4] = ["metric-101", "metric-102", "metric-101", "metric-103"];

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let engine = Arc::new(Engine::start(cfg.engine_config())?);
    info!(
        window_secs = cfg.window_secs,
        samples = cfg.samples,
        producers = cfg.producers,
        "demo started; SIGUSR1 prints the report, Ctrl-C prints it and exits"
    );

    // --- Producers ---
    let stop = Arc::new(AtomicBool::new(false));
    let producers: Vec<_> = (0..cfg.producers)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let stop = Arc::clone(&stop);
            thread::spawn(move || produce(&engine, &stop))
        })
        .collect();

    // --- Report triggers ---
    let mut report_tick = cfg
        .report_secs
        .map(|secs| tokio::time::interval(Duration::from_secs(secs)));
    if let Some(tick) = report_tick.as_mut() {
        tick.tick().await; // consume immediate first tick
    }

    let mut usr1 = ReportSignal::install()?;

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!("ctrl-c listener failed: {e}");
                }
                break;
            }
            _ = usr1.recv() => print_report(&engine),
            _ = next_tick(report_tick.as_mut()) => print_report(&engine),
        }
    }

    print_report(&engine);

    stop.store(true, Ordering::Relaxed);
    for handle in producers {
        if handle.join().is_err() {
            warn!("producer thread panicked");
        }
    }
    engine.terminate();

    let health = engine.health();
    info!(
        accepted = health.samples_accepted,
        rotations = health.rotations,
        summarized = health.epochs_summarized,
        dropped = health.epochs_dropped,
        "demo finished"
    );
    Ok(())
}

/// Submits random values in [0, 200) until told to stop.
fn produce(engine: &Engine, stop: &AtomicBool) {
    let mut rng = rand::rng();
    while !stop.load(Ordering::Relaxed) {
        for metric in DEMO_METRICS {
            engine.submit(metric, rng.random_range(0..200));
        }
        // avoid pinning a core
        thread::sleep(Duration::from_micros(1));
    }
}

fn print_report(engine: &Engine) {
    println!("\n{}", engine.generate_report());
}

/// SIGUSR1 listener; never fires on platforms without it.
struct ReportSignal {
    #[cfg(unix)]
    inner: tokio::signal::unix::Signal,
}

impl ReportSignal {
    #[cfg(unix)]
    fn install() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self { inner: signal(SignalKind::user_defined1())? })
    }

    #[cfg(not(unix))]
    fn install() -> Result<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    async fn recv(&mut self) {
        if self.inner.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) {
        std::future::pending::<()>().await
    }
}

async fn next_tick(tick: Option<&mut tokio::time::Interval>) {
    match tick {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
