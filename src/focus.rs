//! Target-process focus tracking.
//!
//! The [`FocusGate`] answers "does the configured target process own the
//! foreground window right now?". Callers poll it on a fixed timer and per
//! execution, so the answer is cached for a short TTL to bound the OS query
//! rate; human-perceptible latency does not need a fresh syscall on every
//! poll tick.
//!
//! Resolution failures (process gone, name or title not found) are absorbed
//! locally: the target is cleared and the gate reports unfocused until a
//! valid target is set again. With no target configured nothing executes.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, trace};

/// How long a foreground check stays valid.
const FOCUS_CACHE_TTL: Duration = Duration::from_millis(50);

/// Focus tracking as the engine consumes it: one focus question plus
/// target management.
pub trait FocusCheck: Send + Sync {
    /// True iff a target is set and it owns the foreground window.
    fn is_target_focused(&self) -> bool;

    /// Target a process id; resolution failure clears the target silently.
    fn set_target(&self, pid: u32);

    /// Target by process-name substring; no match clears the target.
    fn set_target_by_name(&self, name: &str);

    /// Target by window-title substring; no match clears the target.
    fn set_target_by_window_title(&self, title: &str);

    /// The currently targeted process id, if any.
    fn target_pid(&self) -> Option<u32>;

    /// Name of the targeted process, if it is still running.
    fn target_name(&self) -> Option<String>;
}

type ForegroundProbe = Arc<dyn Fn() -> Option<u32> + Send + Sync>;

struct GateState {
    target_pid: Option<u32>,
    last_focus: bool,
    last_check: Option<Instant>,
}

/// Tracks the target process and caches the foreground comparison.
pub struct FocusGate {
    state: Mutex<GateState>,
    system: Mutex<System>,
    probe: ForegroundProbe,
}

impl Default for FocusGate {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusGate {
    pub fn new() -> Self {
        Self::with_probe(Arc::new(foreground_pid))
    }

    /// Build a gate with a custom foreground query. Used by tests.
    fn with_probe(probe: ForegroundProbe) -> Self {
        Self {
            state: Mutex::new(GateState {
                target_pid: None,
                last_focus: false,
                last_check: None,
            }),
            system: Mutex::new(System::new()),
            probe,
        }
    }

    fn set_target_pid(&self, pid: Option<u32>) {
        if let Ok(mut state) = self.state.lock() {
            state.target_pid = pid;
            // Invalidate the cache so the next query reflects the new target.
            state.last_check = None;
            state.last_focus = false;
        }
    }

    /// Remove the target; the gate reports unfocused from now on.
    pub fn clear_target(&self) {
        self.set_target_pid(None);
    }
}

impl FocusCheck for FocusGate {
    fn is_target_focused(&self) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let Some(target) = state.target_pid else {
            return false;
        };
        if let Some(checked_at) = state.last_check {
            if checked_at.elapsed() < FOCUS_CACHE_TTL {
                return state.last_focus;
            }
        }
        let foreground = (self.probe)();
        state.last_focus = foreground == Some(target);
        state.last_check = Some(Instant::now());
        trace!(target, ?foreground, focused = state.last_focus, "focus refreshed");
        state.last_focus
    }

    /// Target the given process id. If the process does not exist the
    /// target is cleared; the failure is absorbed, not surfaced.
    fn set_target(&self, pid: u32) {
        let exists = match self.system.lock() {
            Ok(mut system) => {
                system.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
                system.process(Pid::from_u32(pid)).is_some()
            }
            Err(_) => false,
        };
        if exists {
            debug!(pid, "focus target set");
            self.set_target_pid(Some(pid));
        } else {
            debug!(pid, "focus target process not found, target cleared");
            self.set_target_pid(None);
        }
    }

    /// Target the first process whose name contains `name`
    /// (case-insensitive). No match clears the target.
    fn set_target_by_name(&self, name: &str) {
        let needle = name.to_lowercase();
        let found = match self.system.lock() {
            Ok(mut system) => {
                system.refresh_processes(ProcessesToUpdate::All, true);
                system
                    .processes()
                    .iter()
                    .find(|(_, process)| {
                        process
                            .name()
                            .to_string_lossy()
                            .to_lowercase()
                            .contains(&needle)
                    })
                    .map(|(pid, _)| pid.as_u32())
            }
            Err(_) => None,
        };
        match found {
            Some(pid) => {
                debug!(pid, name, "focus target resolved by name");
                self.set_target_pid(Some(pid));
            }
            None => {
                debug!(name, "no process matched name, target cleared");
                self.set_target_pid(None);
            }
        }
    }

    /// Target the process owning the first visible window whose title
    /// contains `title` (case-insensitive). No match clears the target.
    fn set_target_by_window_title(&self, title: &str) {
        match pid_by_window_title(title) {
            Some(pid) => {
                debug!(pid, title, "focus target resolved by window title");
                self.set_target_pid(Some(pid));
            }
            None => {
                debug!(title, "no window matched title, target cleared");
                self.set_target_pid(None);
            }
        }
    }

    /// The currently targeted process id, if any.
    fn target_pid(&self) -> Option<u32> {
        self.state.lock().ok().and_then(|s| s.target_pid)
    }

    /// Name of the targeted process, if it is still running.
    fn target_name(&self) -> Option<String> {
        let pid = self.target_pid()?;
        let mut system = self.system.lock().ok()?;
        system.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
        system
            .process(Pid::from_u32(pid))
            .map(|p| p.name().to_string_lossy().into_owned())
    }
}

/// Enumerate running processes for the target picker, optionally filtered
/// by a case-insensitive name substring. Sorted by name, then pid.
pub fn list_processes(filter: Option<&str>) -> Vec<(u32, String)> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    let needle = filter.map(str::to_lowercase);
    let mut entries: Vec<(u32, String)> = system
        .processes()
        .iter()
        .map(|(pid, process)| (pid.as_u32(), process.name().to_string_lossy().into_owned()))
        .filter(|(_, name)| match &needle {
            Some(n) => name.to_lowercase().contains(n),
            None => true,
        })
        .collect();
    entries.sort_by(|a, b| a.1.to_lowercase().cmp(&b.1.to_lowercase()).then(a.0.cmp(&b.0)));
    entries
}

/// Process id owning the current foreground window.
#[cfg(windows)]
fn foreground_pid() -> Option<u32> {
    use winapi::um::winuser::{GetForegroundWindow, GetWindowThreadProcessId};

    unsafe {
        let hwnd = GetForegroundWindow();
        if hwnd.is_null() {
            return None;
        }
        let mut pid: u32 = 0;
        GetWindowThreadProcessId(hwnd, &mut pid);
        (pid != 0).then_some(pid)
    }
}

#[cfg(not(windows))]
fn foreground_pid() -> Option<u32> {
    None
}

#[cfg(windows)]
fn pid_by_window_title(title: &str) -> Option<u32> {
    use winapi::shared::minwindef::{BOOL, LPARAM};
    use winapi::shared::windef::HWND;
    use winapi::um::winuser::{
        EnumWindows, GetWindowTextW, GetWindowThreadProcessId, IsWindowVisible,
    };

    struct Search {
        needle: String,
        found: Option<u32>,
    }

    unsafe extern "system" fn enum_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let search = &mut *(lparam as *mut Search);
        if IsWindowVisible(hwnd) == 0 {
            return 1;
        }
        let mut buf = [0u16; 512];
        let len = GetWindowTextW(hwnd, buf.as_mut_ptr(), buf.len() as i32);
        if len > 0 {
            let text = String::from_utf16_lossy(&buf[..len as usize]).to_lowercase();
            if text.contains(&search.needle) {
                let mut pid: u32 = 0;
                GetWindowThreadProcessId(hwnd, &mut pid);
                if pid != 0 {
                    search.found = Some(pid);
                    return 0;
                }
            }
        }
        1
    }

    let mut search = Search {
        needle: title.to_lowercase(),
        found: None,
    };
    unsafe {
        EnumWindows(Some(enum_proc), &mut search as *mut Search as LPARAM);
    }
    search.found
}

#[cfg(not(windows))]
fn pid_by_window_title(_title: &str) -> Option<u32> {
    None
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use super::*;

    fn gate_with_foreground(pid: Arc<AtomicU32>, calls: Arc<AtomicUsize>) -> FocusGate {
        FocusGate::with_probe(Arc::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(pid.load(Ordering::SeqCst))
        }))
    }

    #[test]
    fn test_no_target_is_never_focused() {
        let gate = gate_with_foreground(
            Arc::new(AtomicU32::new(42)),
            Arc::new(AtomicUsize::new(0)),
        );
        assert!(!gate.is_target_focused());
    }

    #[test]
    fn test_cache_bounds_probe_rate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = gate_with_foreground(Arc::new(AtomicU32::new(42)), calls.clone());
        gate.set_target_pid(Some(42));

        assert!(gate.is_target_focused());
        assert!(gate.is_target_focused());
        assert!(gate.is_target_focused());
        // Back-to-back queries inside the TTL hit the cache.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cache_expires_and_sees_focus_change() {
        let foreground = Arc::new(AtomicU32::new(42));
        let gate = gate_with_foreground(foreground.clone(), Arc::new(AtomicUsize::new(0)));
        gate.set_target_pid(Some(42));

        assert!(gate.is_target_focused());

        // Foreground changes; the cached answer persists until the TTL runs
        // out, then the next query observes the change.
        foreground.store(7, Ordering::SeqCst);
        assert!(gate.is_target_focused());
        if let Ok(mut state) = gate.state.lock() {
            state.last_check = Some(Instant::now() - FOCUS_CACHE_TTL * 2);
        }
        assert!(!gate.is_target_focused());
    }

    #[test]
    fn test_setting_target_invalidates_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = gate_with_foreground(Arc::new(AtomicU32::new(42)), calls.clone());
        gate.set_target_pid(Some(42));
        assert!(gate.is_target_focused());

        gate.set_target_pid(Some(7));
        assert!(!gate.is_target_focused());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clear_target() {
        let gate = gate_with_foreground(
            Arc::new(AtomicU32::new(42)),
            Arc::new(AtomicUsize::new(0)),
        );
        gate.set_target_pid(Some(42));
        assert!(gate.is_target_focused());
        gate.clear_target();
        assert!(!gate.is_target_focused());
        assert_eq!(gate.target_pid(), None);
    }

    #[test]
    fn test_resolution_failure_clears_target() {
        let gate = FocusGate::new();
        gate.set_target_by_name("no_such_process_name_zz_qq_123");
        assert_eq!(gate.target_pid(), None);
        assert!(!gate.is_target_focused());
    }
}
