use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use rift_taskbar::actor::taskbar::{ButtonFactory, Taskbar, TaskbarButton};
use rift_taskbar::actor::window_watcher::WindowWatcher;
use rift_taskbar::common::config::Config;
use rift_taskbar::common::log::init_logging;
use rift_taskbar::layout_engine::SlotLayout;
use rift_taskbar::model::window::{WindowId, WindowState};
use rift_taskbar::sys::geometry::Rect;
use rift_taskbar::sys::replay::{Script, ScriptedPlatform};
use rift_taskbar::sys::scheduler::ManualScheduler;
use rift_taskbar::sys::screen::DisplayId;

/// Upper bound on scheduler steps spent waiting for one pass to report.
const MAX_STEPS_PER_FRAME: usize = 100_000;

#[derive(Parser)]
#[command(version, about = "Taskbar window inventory and reconciliation")]
struct Cli {
    /// Config file; defaults to ~/.config/rift-taskbar/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a scripted host and print every button change.
    Replay {
        script: PathBuf,
        /// Display whose taskbar is driven.
        #[arg(long, default_value_t = 1)]
        display: u32,
        /// Width of the taskbar in points.
        #[arg(long, default_value_t = 1280.0)]
        width: f64,
        /// State-loop ticks to run after each frame's pass.
        #[arg(long, default_value_t = 1)]
        ticks: u32,
    },
    /// Load, validate and print the effective configuration.
    CheckConfig,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::CheckConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Command::Replay { script, display, width, ticks } => {
            replay(&config, &script, DisplayId::new(display), width, ticks)?;
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::read(path)?,
        None => match Config::default_path() {
            Some(path) => Config::read_or_default(&path)?,
            None => Config::default(),
        },
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn replay(
    config: &Config,
    path: &Path,
    display_id: DisplayId,
    width: f64,
    ticks: u32,
) -> anyhow::Result<()> {
    let script = Script::read(path)?;
    let settings = &config.settings;
    let state_interval = settings.window_state_poll_interval()?;

    let platform = ScriptedPlatform::default();
    platform.set_host_bundle_id(script.host_bundle_id.clone());
    let scheduler = ManualScheduler::new();
    let watcher =
        WindowWatcher::new(settings, Rc::new(platform.clone()), Rc::new(scheduler.clone()))
            .context("failed to build the window filter")?;

    let layout = SlotLayout::from_settings(0.0, 0.0, width, &settings.taskbar);
    let taskbar = Rc::new(RefCell::new(Taskbar::new(display_id, layout, PrintingFactory)));
    let subscriber = taskbar.clone();
    let subscription = watcher.subscribe(display_id, move |update| {
        subscriber.borrow_mut().handle_update(update);
    });

    for (index, frame) in script.frames.into_iter().enumerate() {
        println!("-- frame {index}");
        platform.set_frame(frame);

        let passes = watcher.completed_passes();
        let mut steps = 0;
        while watcher.completed_passes() == passes {
            if steps == MAX_STEPS_PER_FRAME || !scheduler.run_next() {
                bail!("frame {index}: enumeration pass never reported");
            }
            steps += 1;
        }
        for _ in 0..ticks {
            scheduler.advance(state_interval);
        }
    }

    subscription.unsubscribe();
    let data = taskbar.borrow().to_display_data();
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

struct PrintingFactory;

struct PrintingButton {
    id: WindowId,
}

impl ButtonFactory for PrintingFactory {
    type Button = PrintingButton;

    fn create(&mut self, frame: Rect, state: &WindowState) -> PrintingButton {
        println!("create {} {:?} at {}", state.id, state.title, fmt_rect(frame));
        PrintingButton { id: state.id }
    }
}

impl TaskbarButton for PrintingButton {
    fn set_frame(&mut self, frame: Rect) { println!("move {} to {}", self.id, fmt_rect(frame)); }

    fn update(&mut self, state: &WindowState) {
        let minimized = if state.is_minimized { " (minimized)" } else { "" };
        println!("update {} {:?}{minimized}", self.id, state.title);
    }

    fn teardown(&mut self) { println!("teardown {}", self.id); }
}

fn fmt_rect(r: Rect) -> String { format!("({:.1}, {:.1}, {:.1}x{:.1})", r.x, r.y, r.width, r.height) }
