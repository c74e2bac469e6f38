use {
    std::{
        fs, mem,
        path::PathBuf,
        sync::{Mutex, PoisonError},
        thread::{self, JoinHandle},
    },
    tracing::debug,
};

/// Backups selected for deletion by one cleanup pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    paths: Vec<PathBuf>,
}

impl Deletion {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Deletion { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Remove every file, ignoring failures.
    ///
    /// A file that cannot be removed stays on disk until a later pass
    /// selects it again; nothing is retried here.
    pub fn run(self) {
        for path in self.paths {
            if let Err(err) = fs::remove_file(&path) {
                debug!(path = %path.display(), error = %err, "failed to remove old log file");
            }
        }
    }
}

/// Runs cleanup work handed over by the roller.
///
/// The roller never waits for a submitted task, so a slow or failing
/// deletion cannot hold up writes.
pub trait Housekeeper: Send + Sync + 'static {
    fn submit(&self, task: Deletion);
}

/// Runs each task on its own detached thread. This is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedThreads;

impl Housekeeper for DetachedThreads {
    fn submit(&self, task: Deletion) {
        thread::spawn(move || task.run());
    }
}

/// Runs each task on its own thread and remembers it, so the owner can wait
/// for all outstanding cleanup, e.g. before shutdown or in tests.
#[derive(Debug, Default)]
pub struct TrackedThreads {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TrackedThreads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until every task submitted so far has finished.
    pub fn wait(&self) {
        let handles = mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl Housekeeper for TrackedThreads {
    fn submit(&self, task: Deletion) {
        let handle = thread::spawn(move || task.run());
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }
}

/// Runs each task immediately on the submitting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineHousekeeper;

impl Housekeeper for InlineHousekeeper {
    fn submit(&self, task: Deletion) {
        task.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletion_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.log");
        fs::write(&present, "x").unwrap();

        Deletion::new(vec![dir.path().join("missing.log"), present.clone()]).run();

        assert!(!present.exists());
    }

    #[test]
    fn tracked_threads_wait_for_completion() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..5).map(|i| dir.path().join(format!("{i}.log"))).collect();
        for path in &paths {
            fs::write(path, "x").unwrap();
        }

        let housekeeper = TrackedThreads::new();
        housekeeper.submit(Deletion::new(paths[..2].to_vec()));
        housekeeper.submit(Deletion::new(paths[2..].to_vec()));
        housekeeper.wait();

        assert!(paths.iter().all(|p| !p.exists()));
        // Nothing left to join.
        housekeeper.wait();
    }

    #[test]
    fn tracked_threads_forget_finished_tasks() {
        let housekeeper = TrackedThreads::new();
        for _ in 0..20 {
            housekeeper.submit(Deletion::new(Vec::new()));
            // Let the empty task finish before the next submit prunes it.
            while !housekeeper.handles.lock().unwrap().iter().all(JoinHandle::is_finished) {
                thread::yield_now();
            }
        }

        assert_eq!(housekeeper.handles.lock().unwrap().len(), 1);
    }

    #[test]
    fn inline_runs_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        fs::write(&path, "x").unwrap();

        InlineHousekeeper.submit(Deletion::new(vec![path.clone()]));

        assert!(!path.exists());
    }
}
