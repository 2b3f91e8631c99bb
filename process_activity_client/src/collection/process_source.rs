use crate::errors::AppError;
use std::path::PathBuf;
use sysinfo::System;

/// Raw view of one running process, before any record building.
#[derive(Debug, Clone, Default)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub executable_path: Option<PathBuf>,
    pub window_title: Option<String>,
}

/// Supplier of process snapshots. The collector only sees this trait, so
/// tests can feed it fixed entries.
pub trait ProcessSource {
    fn snapshot(&mut self) -> Result<Vec<ProcessEntry>, AppError>;
}

/// Snapshot of the live process table. Window titles are resolved on Windows
/// by walking the visible top-level windows; on other platforms no title is
/// available and records fall back to the process name.
pub struct SystemProcessSource {
    system: System,
}

impl SystemProcessSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for SystemProcessSource {
    fn snapshot(&mut self) -> Result<Vec<ProcessEntry>, AppError> {
        self.system.refresh_processes();
        let titles = window_titles::by_pid();

        let mut entries: Vec<ProcessEntry> = self
            .system
            .processes()
            .iter()
            .filter(|(_, process)| !process.name().is_empty())
            .map(|(pid, process)| {
                let pid = pid.as_u32();
                ProcessEntry {
                    pid,
                    name: process.name().to_string(),
                    executable_path: process.exe().map(|path| path.to_path_buf()),
                    window_title: titles.get(&pid).cloned(),
                }
            })
            .collect();

        // The process table iterates in hash order; keep snapshots stable so
        // batch contents are reproducible between cycles.
        entries.sort_by_key(|entry| entry.pid);

        tracing::debug!("Process snapshot captured: {} entries", entries.len());
        Ok(entries)
    }
}

#[cfg(windows)]
mod window_titles {
    use std::collections::HashMap;
    use windows_sys::Win32::Foundation::{BOOL, HWND, LPARAM};
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
        IsWindowVisible,
    };

    /// Maps process ids to the title of their first visible top-level window.
    pub fn by_pid() -> HashMap<u32, String> {
        let mut titles: HashMap<u32, String> = HashMap::new();
        unsafe {
            EnumWindows(Some(collect_window_title), &mut titles as *mut _ as LPARAM);
        }
        titles
    }

    unsafe extern "system" fn collect_window_title(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let titles = unsafe { &mut *(lparam as *mut HashMap<u32, String>) };

        if unsafe { IsWindowVisible(hwnd) } == 0 {
            return 1; // TRUE, keep enumerating
        }
        let title_length = unsafe { GetWindowTextLengthW(hwnd) };
        if title_length <= 0 {
            return 1;
        }

        let mut title_buffer: Vec<u16> = vec![0; (title_length + 1) as usize];
        let copied = unsafe { GetWindowTextW(hwnd, title_buffer.as_mut_ptr(), title_length + 1) };
        if copied <= 0 {
            return 1;
        }

        let mut process_id: u32 = 0;
        unsafe { GetWindowThreadProcessId(hwnd, &mut process_id) };
        if process_id != 0 {
            titles
                .entry(process_id)
                .or_insert_with(|| String::from_utf16_lossy(&title_buffer[..copied as usize]));
        }
        1
    }
}

#[cfg(not(windows))]
mod window_titles {
    use std::collections::HashMap;

    pub fn by_pid() -> HashMap<u32, String> {
        HashMap::new()
    }
}
