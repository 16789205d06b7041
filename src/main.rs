use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use signboard::clock::{Clock, SystemClock};
use signboard::config::{Configuration, DisplaySink};
use signboard::display::{Display, NullDisplay, PngDisplay, save_png};
use signboard::fetcher::{DirectoryDebugSink, FetchContext, HttpTransport};
use signboard::night_mode::NightModeGate;
use signboard::slide::SharedSlide;
use signboard::slides::{IdleSlide, SlideContext, WelcomeSlide, build_slides};
use signboard::surface::Surface;
use signboard::tasks::controller;
use signboard::tasks::readiness::{HttpProbe, Readiness};
use signboard::tasks::redraw::Renderer;
use signboard::tasks::slideshow::{Slideshow, SlideshowParts};

#[derive(Debug, Parser)]
#[command(name = "signboard", version, about = "LED sign slideshow")]
struct Args {
    /// Path to YAML config
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Render one frame of every slide into DIR and exit
    #[arg(long = "generate-images", value_name = "DIR")]
    generate_images: Option<PathBuf>,

    /// Save every raw HTTP response body into DIR
    #[arg(long = "debug-http", value_name = "DIR")]
    debug_http: Option<PathBuf>,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "signboard=debug,info",
        _ => "signboard=trace,info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        verbose,
        generate_images,
        debug_http,
    } = Args::parse();
    init_tracing(verbose);

    let mut cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    if debug_http.is_some() {
        cfg.debug_http_dir = debug_http;
    }
    tracing::debug!("loaded configuration from {}:\n{:#?}", config.display(), cfg);
    tracing::info!(
        slides = cfg.slides.len(),
        "advancing every {}",
        humantime::format_duration(cfg.advance_interval)
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(cfg.timezone));
    let transport = HttpTransport::new()?;
    let mut fetch = FetchContext::new(Arc::new(transport.clone()));
    if let Some(dir) = &cfg.debug_http_dir {
        tracing::info!("saving http responses to {}", dir.display());
        fetch = fetch.with_debug_sink(Arc::new(DirectoryDebugSink::new(dir)));
    }
    let slides = build_slides(
        &cfg.slides,
        &SlideContext {
            clock: clock.clone(),
            fetch,
        },
    )?;

    if let Some(dir) = generate_images {
        return generate_slide_images(&cfg, &slides, &dir).await;
    }

    let display: Arc<dyn Display> = match cfg.display.sink {
        DisplaySink::Png => Arc::new(PngDisplay::new(&cfg.display.output, cfg.display.scale)),
        DisplaySink::None => Arc::new(NullDisplay),
    };
    display.initialize().context("failed to initialize display")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut readiness = Readiness::new(
        Arc::new(HttpProbe::new(transport.client().clone(), &cfg.readiness.probe_url)?),
        cfg.readiness.probe_interval,
    );
    if let Some(command) = cfg.readiness.clock_sync() {
        readiness = readiness.with_clock_sync(command);
    }

    let show = Slideshow::new(SlideshowParts {
        slides,
        welcome: Arc::new(WelcomeSlide::new(
            cfg.welcome.title_or_default(),
            cfg.welcome.subtitle_or_default(),
        )),
        idle: Arc::new(IdleSlide),
        renderer: Renderer::new(
            display,
            NightModeGate::new(cfg.night_mode, clock),
            cfg.display.width,
            cfg.display.height,
        ),
        advance_interval: cfg.advance_interval,
        readiness,
        shutdown: cancel.clone(),
    });

    let startup = show.launch().await?;
    tokio::spawn(async move {
        match startup.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::info!("slideshow did not start: {err}"),
            Err(err) => tracing::warn!("slideshow startup task failed: {err}"),
        }
    });

    let addr = SocketAddr::new(cfg.controller.bind_address, cfg.controller.port);
    let served = controller::run_until_shutdown(addr, show.clone(), cancel.clone()).await;
    // A failed bind still has to take the show down.
    cancel.cancel();
    show.shutdown().await;
    served
}

/// Draws one frame of every slide without running the scheduler.
async fn generate_slide_images(cfg: &Configuration, slides: &[SharedSlide], dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create image directory {}", dir.display()))?;

    let welcome: SharedSlide = Arc::new(WelcomeSlide::new(
        cfg.welcome.title_or_default(),
        cfg.welcome.subtitle_or_default(),
    ));
    let idle: SharedSlide = Arc::new(IdleSlide);
    for slide in [welcome, idle].iter().chain(slides) {
        slide.initialize().await;
        slide.start_draw();
        let mut surface = Surface::blank(cfg.display.width, cfg.display.height);
        slide.draw(&mut surface);
        slide.stop_draw();
        slide.terminate().await;

        let path = dir.join(format!("{}.png", slide.name()));
        let scale = cfg.display.scale;
        let target = path.clone();
        tokio::task::spawn_blocking(move || save_png(&surface, &target, scale))
            .await
            .context("image writer task failed")??;
        tracing::info!(slide = slide.name(), "wrote {}", path.display());
    }
    Ok(())
}
