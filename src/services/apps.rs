//! Application launching from freedesktop `.desktop` entries

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, info, warn};

use super::{AppHandle, ApplicationControl, CollaboratorError};

/// Minimum similarity for a fuzzy name match
const MATCH_CUTOFF: f64 = 0.6;

pub struct DesktopApps {
    dirs: Vec<PathBuf>,
}

/// Read `Name=` and the program from `Exec=` out of one desktop entry
fn parse_desktop_entry(contents: &str) -> Option<(String, String)> {
    let mut name = None;
    let mut exec = None;

    for line in contents.lines() {
        if name.is_none() {
            if let Some(value) = line.strip_prefix("Name=") {
                name = Some(value.trim().to_lowercase());
            }
        }
        if exec.is_none() {
            if let Some(value) = line.strip_prefix("Exec=") {
                exec = value.split_whitespace().next().map(str::to_string);
            }
        }
    }

    Some((name?, exec?))
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];

    for (i, a_ch) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, b_ch) in b_chars.iter().enumerate() {
            let substitution = prev[j] + usize::from(a_ch != *b_ch);
            curr[j + 1] = substitution.min(curr[j] + 1).min(prev[j + 1] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Similarity in `[0, 1]`, 1 meaning identical
fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Closest installed name to `hint`, if it clears the cutoff
fn best_match<'a>(apps: &'a BTreeMap<String, String>, hint: &str) -> Option<&'a str> {
    let hint = hint.trim().to_lowercase();
    apps.keys()
        .map(|name| (similarity(&hint, name), name))
        .filter(|(score, _)| *score >= MATCH_CUTOFF)
        .fold(None, |best: Option<(f64, &String)>, candidate| match best {
            Some(b) if b.0 >= candidate.0 => Some(b),
            _ => Some(candidate),
        })
        .map(|(_, name)| name.as_str())
}

impl DesktopApps {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Installed applications keyed by lowercased display name
    fn installed(&self) -> BTreeMap<String, String> {
        let mut apps = BTreeMap::new();
        for dir in &self.dirs {
            scan_dir(dir, &mut apps);
        }
        apps
    }
}

fn scan_dir(dir: &Path, apps: &mut BTreeMap<String, String>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(?dir, ?e, "skipping application directory");
            return;
        }
    };

    for path in entries.flatten().map(|entry| entry.path()) {
        if !path.extension().is_some_and(|ext| ext == "desktop") {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                if let Some((name, exec)) = parse_desktop_entry(&contents) {
                    apps.entry(name).or_insert(exec);
                }
            }
            Err(e) => warn!(?path, ?e, "failed to read desktop entry"),
        }
    }
}

/// Start `exec` detached and hand the child to a reaper thread.
/// Returns the child's pid.
fn launch(exec: &str) -> io::Result<u32> {
    let mut child = Command::new(exec)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    let pid = child.id();

    let program = exec.to_string();
    let reaper = thread::Builder::new()
        .name(format!("reap-{}", pid))
        .spawn(move || match child.wait() {
            Ok(status) => debug!(%program, pid, %status, "application exited"),
            Err(e) => warn!(%program, pid, ?e, "failed to wait on application"),
        });
    if let Err(e) = reaper {
        // The child outlives us as a zombie; nothing else to do
        warn!(%exec, pid, ?e, "failed to spawn reaper thread");
    }

    Ok(pid)
}

impl ApplicationControl for DesktopApps {
    fn open(&self, name_hint: &str) -> Result<Option<AppHandle>, CollaboratorError> {
        let apps = self.installed();
        let Some(name) = best_match(&apps, name_hint) else {
            info!(name_hint, "no installed application matches");
            return Ok(None);
        };

        let exec = apps[name].clone();
        let pid = launch(&exec)?;

        info!(name, %exec, pid, "application launched");
        Ok(Some(AppHandle {
            name: name.to_string(),
            exec,
        }))
    }

    fn close(&self, app: &AppHandle) -> Result<(), CollaboratorError> {
        let status = Command::new("pkill").arg(&app.exec).status()?;
        if status.success() {
            info!(name = %app.name, "application closed");
        } else {
            warn!(name = %app.name, %status, "pkill found nothing to close");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_desktop_entry() {
        let entry = "[Desktop Entry]\nName=Calculator\nExec=gnome-calculator %U\nName=Other\n";
        assert_eq!(
            parse_desktop_entry(entry),
            Some(("calculator".to_string(), "gnome-calculator".to_string()))
        );
        assert_eq!(parse_desktop_entry("Name=NoExec"), None);
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("calculator", "calculator"), 1.0);
        assert!(similarity("calculater", "calculator") > 0.8);
        assert!(similarity("firefox", "calculator") < MATCH_CUTOFF);
    }

    #[test]
    fn test_best_match() {
        let mut apps = BTreeMap::new();
        apps.insert("calculator".to_string(), "gnome-calculator".to_string());
        apps.insert("calendar".to_string(), "gnome-calendar".to_string());

        assert_eq!(best_match(&apps, "Calculator"), Some("calculator"));
        assert_eq!(best_match(&apps, "calender"), Some("calendar"));
        assert_eq!(best_match(&apps, "spreadsheet"), None);
    }

    #[test]
    fn test_scan_and_open_without_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("calc.desktop"),
            "[Desktop Entry]\nName=Calculator\nExec=gnome-calculator\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("readme.txt"), "Name=Nope\nExec=nope\n").unwrap();

        let apps = DesktopApps::new(vec![dir.path().to_path_buf(), dir.path().join("missing")]);
        let installed = apps.installed();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed["calculator"], "gnome-calculator");

        assert_eq!(apps.open("text editor").unwrap(), None);
    }

    /// A reaped child no longer has a /proc entry; a zombie still does
    #[cfg(target_os = "linux")]
    #[test]
    fn test_launched_applications_are_reaped() {
        let pids: Vec<u32> = (0..3).map(|_| launch("true").unwrap()).collect();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        let lingering = |pid: &u32| Path::new(&format!("/proc/{}", pid)).exists();
        while pids.iter().any(lingering) && std::time::Instant::now() < deadline {
            thread::sleep(std::time::Duration::from_millis(20));
        }

        assert!(!pids.iter().any(lingering), "children were not reaped");
    }

    #[test]
    fn test_open_launches_matching_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("truth.desktop"),
            "[Desktop Entry]\nName=Truth\nExec=true\n",
        )
        .unwrap();

        let apps = DesktopApps::new(vec![dir.path().to_path_buf()]);
        let handle = apps.open("truth").unwrap().unwrap();

        assert_eq!(handle.name, "truth");
        assert_eq!(handle.exec, "true");
    }
}
