//! Script resolution and detached helper launch.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use log::{debug, info, warn};

use crate::config::HelperConfig;
use crate::error::LifecycleError;
use crate::model::{Mode, RunningProcessHandle};
use crate::process::spawn::spawn_hidden;

#[cfg(target_os = "windows")]
const SCRIPT_EXTENSIONS: &[&str] = &["bat", "cmd"];
#[cfg(not(target_os = "windows"))]
const SCRIPT_EXTENSIONS: &[&str] = &["sh"];

pub trait ProcessSpawner: Send + Sync {
    /// Start `script` detached from us and return the new pid.
    fn spawn(&self, script: &Path, working_dir: &Path) -> io::Result<u32>;
}

/// Spawns through the platform shell and reaps the child on its own thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemSpawner;

impl ProcessSpawner for SystemSpawner {
    fn spawn(&self, script: &Path, working_dir: &Path) -> io::Result<u32> {
        let mut child = spawn_hidden(script, working_dir)?;
        let pid = child.id();
        let label = script.display().to_string();

        let reaper = thread::Builder::new()
            .name(format!("reaper-{}", pid))
            .spawn(move || match child.wait() {
                Ok(status) => debug!("Helper shell {} (PID {}) exited: {}", label, pid, status),
                Err(e) => debug!("Failed to wait for PID {}: {}", pid, e),
            });
        if let Err(e) = reaper {
            warn!("Could not start reaper for PID {}: {}", pid, e);
        }
        Ok(pid)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptCatalog {
    base_dir: PathBuf,
    primary: String,
    variants: Vec<String>,
}

impl ScriptCatalog {
    pub fn new(base_dir: PathBuf, primary: String, variants: Vec<String>) -> Self {
        Self {
            base_dir,
            primary,
            variants,
        }
    }

    pub fn from_config(helper: &HelperConfig) -> Self {
        Self::new(
            helper.resolved_scripts_dir(),
            helper.primary_script.clone(),
            helper.variants.clone(),
        )
    }

    /// Configured variants, or the scripts found next to the primary one.
    pub fn variants(&self) -> Vec<String> {
        if !self.variants.is_empty() {
            return self.variants.clone();
        }
        discover_variants(&self.base_dir, &self.primary)
    }

    pub fn resolve(&self, mode: Mode, variant: Option<&str>) -> Result<PathBuf, LifecycleError> {
        let file_name = match mode {
            Mode::Primary => self.primary.clone(),
            Mode::Alternate => match variant {
                Some(v) => v.to_string(),
                None => self
                    .variants()
                    .into_iter()
                    .next()
                    .ok_or_else(|| LifecycleError::NotFound(self.base_dir.clone()))?,
            },
        };

        // Variant names are bare file names; never let one escape the directory
        if Path::new(&file_name).file_name() != Some(OsStr::new(&file_name)) {
            return Err(LifecycleError::NotFound(self.base_dir.join(&file_name)));
        }

        let path = self.base_dir.join(&file_name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(LifecycleError::NotFound(path))
        }
    }
}

fn discover_variants(dir: &Path, primary: &str) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list scripts in {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| {
                    let ext = ext.to_string_lossy().to_ascii_lowercase();
                    SCRIPT_EXTENSIONS.contains(&ext.as_str())
                })
                .unwrap_or(false)
        })
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| !name.eq_ignore_ascii_case(primary))
        .collect();
    names.sort_by_key(|name| name.to_lowercase());
    names
}

pub struct Launcher {
    spawner: Arc<dyn ProcessSpawner>,
    settle: Duration,
}

impl Launcher {
    pub fn new(spawner: Arc<dyn ProcessSpawner>, settle: Duration) -> Self {
        Self { spawner, settle }
    }

    /// Start the helper script and give it `settle` to come up before returning.
    pub fn launch(&self, script: &Path) -> Result<RunningProcessHandle, LifecycleError> {
        if !script.is_file() {
            return Err(LifecycleError::NotFound(script.to_path_buf()));
        }
        let working_dir = script
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let launched_at = Instant::now();
        let started_at = SystemTime::now();
        let pid = self
            .spawner
            .spawn(script, &working_dir)
            .map_err(|e| LifecycleError::Launch {
                script: script.to_path_buf(),
                reason: e.to_string(),
            })?;
        info!("Started {} (PID {})", script.display(), pid);

        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }

        Ok(RunningProcessHandle {
            pid,
            launched_at,
            started_at,
            script: script.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scratch_dir(tag: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!(
            "aether-{}-{}-{}",
            tag,
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "exit 0\n").unwrap();
        path
    }

    fn ext() -> &'static str {
        SCRIPT_EXTENSIONS[0]
    }

    #[derive(Default)]
    struct RecordingSpawner {
        calls: Mutex<Vec<(PathBuf, PathBuf)>>,
    }

    impl ProcessSpawner for RecordingSpawner {
        fn spawn(&self, script: &Path, working_dir: &Path) -> io::Result<u32> {
            self.calls
                .lock()
                .unwrap()
                .push((script.to_path_buf(), working_dir.to_path_buf()));
            Ok(4242)
        }
    }

    struct FailingSpawner;

    impl ProcessSpawner for FailingSpawner {
        fn spawn(&self, _script: &Path, _working_dir: &Path) -> io::Result<u32> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "access is denied"))
        }
    }

    #[test]
    fn resolve_primary_and_missing() {
        let dir = scratch_dir("resolve");
        let primary = format!("general.{}", ext());
        let catalog = ScriptCatalog::new(dir.clone(), primary.clone(), Vec::new());

        assert_eq!(
            catalog.resolve(Mode::Primary, None),
            Err(LifecycleError::NotFound(dir.join(&primary)))
        );
        let path = touch(&dir, &primary);
        assert_eq!(catalog.resolve(Mode::Primary, None), Ok(path));
    }

    #[test]
    fn alternate_uses_selected_or_first_variant() {
        let dir = scratch_dir("alternate");
        let primary = format!("general.{}", ext());
        touch(&dir, &primary);
        let alt_b = touch(&dir, &format!("general (FAKE TLS).{}", ext()));
        let alt_a = touch(&dir, &format!("general (ALT).{}", ext()));
        touch(&dir, "readme.txt");

        let catalog = ScriptCatalog::new(dir.clone(), primary, Vec::new());
        assert_eq!(
            catalog.variants(),
            vec![
                format!("general (ALT).{}", ext()),
                format!("general (FAKE TLS).{}", ext())
            ]
        );
        assert_eq!(catalog.resolve(Mode::Alternate, None), Ok(alt_a));
        let selected = format!("general (FAKE TLS).{}", ext());
        assert_eq!(catalog.resolve(Mode::Alternate, Some(&selected)), Ok(alt_b));
    }

    #[test]
    fn alternate_without_variants_is_not_found() {
        let dir = scratch_dir("novariants");
        let catalog = ScriptCatalog::new(dir.clone(), "general.bat".into(), Vec::new());
        assert_eq!(
            catalog.resolve(Mode::Alternate, None),
            Err(LifecycleError::NotFound(dir))
        );
    }

    #[test]
    fn variant_cannot_escape_scripts_dir() {
        let dir = scratch_dir("escape");
        let catalog = ScriptCatalog::new(dir, "general.bat".into(), Vec::new());
        assert!(matches!(
            catalog.resolve(Mode::Alternate, Some("../evil.bat")),
            Err(LifecycleError::NotFound(_))
        ));
    }

    #[test]
    fn launch_runs_in_script_directory() {
        let dir = scratch_dir("launch");
        let script = touch(&dir, &format!("general.{}", ext()));
        let spawner = Arc::new(RecordingSpawner::default());
        let launcher = Launcher::new(spawner.clone(), Duration::ZERO);

        let before = SystemTime::now();
        let handle = launcher.launch(&script).unwrap();
        assert_eq!(handle.pid, 4242);
        assert!(handle.started_at >= before);
        assert_eq!(handle.stamp().pid, 4242);
        assert_eq!(handle.script, script);
        assert_eq!(*spawner.calls.lock().unwrap(), vec![(script, dir)]);
    }

    #[test]
    fn launch_errors_are_typed() {
        let dir = scratch_dir("launcherr");
        let launcher = Launcher::new(Arc::new(FailingSpawner), Duration::ZERO);

        let missing = dir.join("missing.bat");
        assert_eq!(
            launcher.launch(&missing),
            Err(LifecycleError::NotFound(missing))
        );

        let script = touch(&dir, "general.bat");
        match launcher.launch(&script) {
            Err(LifecycleError::Launch { script: s, reason }) => {
                assert_eq!(s, script);
                assert!(reason.contains("access is denied"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn system_spawner_starts_a_real_script() {
        let dir = scratch_dir("spawn");
        let script = touch(&dir, "quick.sh");
        let pid = SystemSpawner.spawn(&script, &dir).unwrap();
        assert!(pid > 0);
    }
}
