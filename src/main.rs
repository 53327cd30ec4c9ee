//! Hotbar CLI.
//!
//! Drives the macro engine from the command line: profile management,
//! target selection, trigger capture and the run loop that pumps OS
//! hotkey messages and the focus poll.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use hotbar::{
    list_processes, FocusCheck, FocusGate, HookEvent, Hotbar, HotkeyEvent, InputHook, InputMethod,
    KeySender, KeyboardHotkeyService, MacroProfile, MouseHotkeyService, NativeBackend, SlotStatus,
};

#[derive(Parser)]
#[command(name = "hotbar", version, about = "Focus-gated hotbar macro engine")]
struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a stock 12-slot profile
    Init {
        /// Profile file to create
        #[arg(short, long, default_value = "hotbar.json")]
        profile: String,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the slots of a profile
    Show {
        #[arg(short, long, default_value = "hotbar.json")]
        profile: String,
    },
    /// List running processes for target selection
    Processes {
        /// Case-insensitive name filter
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Capture a trigger binding for a slot (press the combination)
    Capture {
        #[arg(short, long, default_value = "hotbar.json")]
        profile: String,
        /// Slot number to bind
        #[arg(short, long)]
        slot: u32,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
    /// Load a profile and run the engine until Ctrl-C
    Run {
        #[arg(short, long, default_value = "hotbar.json")]
        profile: String,
        /// Override the profile's target process name
        #[arg(short, long)]
        target: Option<String>,
        /// Override the injection method (sendinput, hardware, postmessage, legacy)
        #[arg(short, long)]
        method: Option<InputMethod>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Init { profile, force } => cmd_init(&profile, force),
        Command::Show { profile } => cmd_show(&profile),
        Command::Processes { filter } => cmd_processes(filter.as_deref()),
        Command::Capture {
            profile,
            slot,
            timeout,
        } => cmd_capture(&profile, slot, timeout),
        Command::Run {
            profile,
            target,
            method,
        } => cmd_run(&profile, target, method),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn cmd_init(path: &str, force: bool) -> Result<()> {
    if std::path::Path::new(path).exists() && !force {
        bail!("'{path}' already exists (use --force to overwrite)");
    }
    MacroProfile::default_profile().save_to_file(path)?;
    println!("{} wrote stock profile to '{path}'", "✓".green());
    Ok(())
}

fn cmd_show(path: &str) -> Result<()> {
    let profile = MacroProfile::from_file(path)?;
    if let Err(e) = profile.validate() {
        println!("{} {e}", "warning:".yellow());
    }
    println!(
        "{} ({}, poll {} ms, target: {})",
        profile.name.bold(),
        profile.input_method,
        profile.focus_poll_ms,
        profile
            .target_process_name
            .as_deref()
            .unwrap_or("not set")
    );
    for slot in &profile.slots {
        let enabled = if slot.enabled {
            "on ".green()
        } else {
            "off".dimmed()
        };
        println!(
            "  [{:2}] {} key {:<9} x{:<3} delay {:>4} ms  trigger {}",
            slot.slot_number,
            enabled,
            slot.key_name,
            slot.press_count,
            slot.delay_ms,
            slot.trigger_display
        );
    }
    Ok(())
}

fn cmd_processes(filter: Option<&str>) -> Result<()> {
    let entries = list_processes(filter);
    if entries.is_empty() {
        println!("no matching processes");
        return Ok(());
    }
    for (pid, name) in entries {
        println!("{pid:>8}  {name}");
    }
    Ok(())
}

fn cmd_capture(path: &str, slot_number: u32, timeout_secs: u64) -> Result<()> {
    let mut profile = MacroProfile::from_file(path)?;
    if profile.slot(slot_number).is_none() {
        bail!("profile has no slot {slot_number}");
    }

    let (_subscription, mut events) =
        InputHook::attach(true, true).context("installing input hooks")?;
    let mut keyboard = KeyboardHotkeyService::new(Arc::new(NativeBackend));
    let mut mouse = MouseHotkeyService::new();
    keyboard.start_capture();
    mouse.start_capture();

    println!(
        "press the trigger combination for slot {slot_number} (left/right click are rejected)..."
    );

    let deadline = Instant::now() + Duration::from_secs(timeout_secs);
    let captured = 'outer: loop {
        if Instant::now() >= deadline {
            break None;
        }
        pump_thread_messages();
        while let Ok(event) = events.try_recv() {
            let outcome = match &event {
                HookEvent::Key(k) => keyboard.on_key_event(k),
                HookEvent::Mouse(m) => mouse.on_mouse_event(m),
            };
            match outcome {
                Some(HotkeyEvent::Captured(binding)) => break 'outer Some(binding),
                Some(HotkeyEvent::CaptureRejected(vk)) => {
                    println!(
                        "{} {}",
                        "rejected:".red(),
                        hotbar::HotbarError::ReservedButton { virtual_key: vk }
                    );
                    break 'outer None;
                }
                _ => {}
            }
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let Some(binding) = captured else {
        bail!("no binding captured");
    };

    if let Some(slot) = profile.slot_mut(slot_number) {
        slot.set_trigger(binding);
    }
    profile.save_to_file(path)?;
    println!(
        "{} slot {slot_number} bound to {}",
        "✓".green(),
        binding.display().bold()
    );
    Ok(())
}

fn cmd_run(path: &str, target: Option<String>, method: Option<InputMethod>) -> Result<()> {
    if !cfg!(windows) {
        bail!("the run loop requires Windows (global hotkeys and synthetic input)");
    }

    let mut profile = MacroProfile::from_file(path)?;
    profile.validate()?;
    if let Some(method) = method {
        profile.input_method = method;
    }
    if let Some(target) = target {
        profile.target_process_id = None;
        profile.target_process_name = Some(target);
    }
    let requested_target = profile.target_process_name.clone();
    let poll_interval = Duration::from_millis(profile.focus_poll_ms);

    let focus = Arc::new(FocusGate::new());
    let hotbar = Hotbar::new(
        Arc::new(KeySender::new()),
        focus.clone(),
        Arc::new(NativeBackend),
    );
    hotbar.load_profile(profile);

    match focus.target_pid() {
        Some(pid) => {
            let name = focus.target_name().unwrap_or_else(|| "?".to_string());
            println!("🎯 target locked: {} (pid {pid})", name.bold());
        }
        None => {
            let reason = match requested_target {
                Some(name) => hotbar::HotbarError::process_not_found(name).to_string(),
                None => "no target configured".to_string(),
            };
            println!(
                "{} {reason}; slots stay NoFocus until a target is set",
                "warning:".yellow()
            );
        }
    }

    // Registration happens on this thread; WM_HOTKEY lands in its queue.
    let failed = hotbar.register_all(0);
    for slot_number in &failed {
        println!(
            "{} slot {slot_number} registration failed (combination in use?)",
            "warning:".yellow()
        );
    }
    let armed = hotbar
        .slots()
        .iter()
        .filter(|s| s.enabled && s.trigger.is_set() && !failed.contains(&s.slot_number))
        .count();
    println!("🔥 {armed} trigger(s) armed");

    let runtime = tokio::runtime::Runtime::new()?;

    if let Some(mut events) = hotbar.take_events() {
        runtime.spawn(async move {
            while let Some(event) = events.recv().await {
                let status = match event.status {
                    SlotStatus::NoFocus => "NoFocus".dimmed(),
                    SlotStatus::Ready => "Ready".green(),
                    SlotStatus::Executing => "Executing".red(),
                };
                println!("slot {:>2} → {status}", event.slot);
            }
        });
    }

    // The mouse hook is only worth the overhead when a slot needs it.
    let mut mouse_feed = if hotbar.has_mouse_bindings() {
        match InputHook::attach(false, true) {
            Ok((subscription, events)) => Some((subscription, events)),
            Err(e) => {
                println!("{} {e}; mouse triggers inactive", "warning:".yellow());
                None
            }
        }
    } else {
        None
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        runtime.spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            running.store(false, Ordering::SeqCst);
        });
    }

    println!("running; press Ctrl-C to stop");
    let mut last_tick = Instant::now();
    while running.load(Ordering::SeqCst) {
        pump_hotkey_messages(&hotbar, runtime.handle());

        if let Some((_, events)) = &mut mouse_feed {
            while let Ok(event) = events.try_recv() {
                if let HookEvent::Mouse(mouse_event) = event {
                    for slot_number in hotbar.on_mouse_event(&mouse_event) {
                        let hotbar = hotbar.clone();
                        runtime.spawn(async move { hotbar.execute_slot(slot_number).await });
                    }
                }
            }
        }

        if last_tick.elapsed() >= poll_interval {
            hotbar.poll_tick();
            last_tick = Instant::now();
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    hotbar.unregister_all(0);
    println!("stopped");
    Ok(())
}

/// Drain this thread's message queue, routing WM_HOTKEY into the engine.
#[cfg(windows)]
fn pump_hotkey_messages(hotbar: &Hotbar, runtime: &tokio::runtime::Handle) {
    use winapi::um::winuser::{
        DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE, WM_HOTKEY,
    };

    unsafe {
        let mut msg: MSG = std::mem::zeroed();
        while PeekMessageW(&mut msg, std::ptr::null_mut(), 0, 0, PM_REMOVE) != 0 {
            if msg.message == WM_HOTKEY {
                let id = msg.wParam as i32;
                if let Some(slot_number) = hotbar.dispatch_hotkey(id) {
                    let hotbar = hotbar.clone();
                    runtime.spawn(async move { hotbar.execute_slot(slot_number).await });
                }
                continue;
            }
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

#[cfg(not(windows))]
fn pump_hotkey_messages(_hotbar: &Hotbar, _runtime: &tokio::runtime::Handle) {}

/// Drain this thread's message queue so the low-level hooks get serviced.
#[cfg(windows)]
fn pump_thread_messages() {
    use winapi::um::winuser::{DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE};

    unsafe {
        let mut msg: MSG = std::mem::zeroed();
        while PeekMessageW(&mut msg, std::ptr::null_mut(), 0, 0, PM_REMOVE) != 0 {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

#[cfg(not(windows))]
fn pump_thread_messages() {}
