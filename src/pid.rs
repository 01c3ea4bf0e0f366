use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

pub const PID_FILE_NAME: &str = "binner.pid";

/// PID file of the running server, kept in the data directory
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(PID_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current process PID
    pub fn write(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pid = std::process::id();
        fs::write(&self.path, pid.to_string())?;
        tracing::info!("PID {} written to {:?}", pid, self.path);
        Ok(())
    }

    pub fn read(&self) -> io::Result<u32> {
        let pid_str = fs::read_to_string(&self.path)?;
        pid_str
            .trim()
            .parse::<u32>()
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
    }

    pub fn cleanup(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("PID file removed: {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// PID of a live server, cleaning up a stale file
    pub fn running_pid(&self) -> Option<u32> {
        let pid = self.read().ok()?;
        if is_process_running(pid) {
            Some(pid)
        } else {
            let _ = self.cleanup();
            None
        }
    }
}

/// Check if a process is running
#[cfg(unix)]
pub fn is_process_running(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    kill(Pid::from_raw(raw), None::<Signal>).is_ok()
}

#[cfg(windows)]
pub fn is_process_running(pid: u32) -> bool {
    use std::process::Command;

    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid)])
        .output()
        .ok()
        .and_then(|output| {
            String::from_utf8(output.stdout)
                .ok()
                .map(|s| s.contains(&pid.to_string()))
        })
        .unwrap_or(false)
}

/// Ask a running server to shut down
#[cfg(unix)]
pub fn stop_process(pid: u32) -> io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;
    kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(io::Error::from)
}

#[cfg(windows)]
pub fn stop_process(pid: u32) -> io::Result<()> {
    use std::process::Command;

    let status = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::new(ErrorKind::Other, format!("taskkill exited with {}", status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_read_cleanup() {
        let dir = TempDir::new().unwrap();
        let pid_file = PidFile::in_dir(&dir.path().join("data"));

        pid_file.write().unwrap();
        assert_eq!(pid_file.read().unwrap(), std::process::id());
        assert_eq!(pid_file.running_pid(), Some(std::process::id()));

        pid_file.cleanup().unwrap();
        assert!(!pid_file.path().exists());
        // cleaning up twice is fine
        pid_file.cleanup().unwrap();
    }

    #[test]
    fn test_garbage_pid_is_invalid_data() {
        let dir = TempDir::new().unwrap();
        let pid_file = PidFile::in_dir(dir.path());
        fs::write(pid_file.path(), "not-a-pid").unwrap();

        let err = pid_file.read().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(pid_file.running_pid(), None);
    }
}
