use std::time::Duration;

use anyhow::{Context, Result};

use shrike_engine::assets::{AssetCache, ContentHandle};
use shrike_engine::cli::CliOverrides;
use shrike_engine::config::load_config;
use shrike_engine::project;
use shrike_engine::scripts::AppHandle;
use shrike_engine::surface::{GraphicsHandle, SpriteBatch, SurfaceHandle};
use shrike_engine::time::Time;
use shrike_engine::{HostBindings, ScriptHost};

fn main() {
    env_logger::init();
    let overrides = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    if let Err(err) = run(overrides) {
        eprintln!("Application error: {err:?}");
        std::process::exit(1);
    }
}

fn run(overrides: CliOverrides) -> Result<()> {
    let cwd = std::env::current_dir().context("resolving working directory")?;
    let root = project::find_project_root(&cwd)?;
    let scripts_dir = root.join(project::SCRIPTS_SUBDIR);

    let mut config = load_config(&root.join("config/app.json"))?;
    overrides.apply_to(&mut config);

    let surface = SurfaceHandle::new(config.window.width, config.window.height);
    let app = AppHandle::new();
    let bindings = HostBindings {
        surface: surface.clone(),
        graphics: GraphicsHandle::new(&config.window),
        batch: SpriteBatch::new(surface.clone()),
        content: ContentHandle::new(AssetCache::new(root.join("assets"))),
        app: app.clone(),
    };

    let mut host = ScriptHost::new(&scripts_dir, config.scripts.clone(), bindings)?;
    host.initialize();
    host.load_content();

    let mut time = Time::new();
    let mut frames: u64 = 0;
    loop {
        time.tick();
        host.update(&time);
        host.render(&time);

        // This headless shell just drains the frame a real renderer would
        // replay against its backend. Script log lines already went through
        // the `log` facade; draining keeps the buffer bounded.
        let frame = surface.take_frame();
        log::debug!("[frame] {} draw commands", frame.len());
        app.drain_logs();

        frames += 1;
        if app.exit_requested() {
            break;
        }
        if let Some(limit) = overrides.frames() {
            if frames >= limit {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(16));
    }
    host.shutdown();
    log::info!("[app] exiting after {frames} frames");
    Ok(())
}
