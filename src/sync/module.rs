//! Single-module sync pipeline

use super::{emit_event, SyncCallback, SyncEvent, Workspace};
use crate::config::Module;
use crate::executor::{copy_tree, remove_tree};
use crate::git::{FetchRequest, Fetcher};
use crate::mapper::plan_module;
use crate::types::{CopyStats, DemodError, ModuleReport, PlannedCopy, SyncStage};
use indicatif::HumanBytes;
use std::path::Path;
use tracing::{debug, info, info_span};

/// Runs one module through fetch, mapping, and copy (or dry-run report)
pub struct ModuleSyncer<'a, F: ?Sized> {
    fetcher: &'a F,
    module: &'a Module,
    dry_run: bool,
    on_event: Option<&'a SyncCallback>,
}

impl<'a, F: Fetcher + ?Sized> ModuleSyncer<'a, F> {
    pub fn new(fetcher: &'a F, module: &'a Module, dry_run: bool) -> Self {
        Self {
            fetcher,
            module,
            dry_run,
            on_event: None,
        }
    }

    pub fn with_callback(mut self, on_event: &'a SyncCallback) -> Self {
        self.on_event = Some(on_event);
        self
    }

    /// Sync the module.
    ///
    /// Live runs delete `dest` and rebuild it from the module's path specs.
    /// The workspace is released on every exit path.
    ///
    /// # Errors
    /// Any failure, attributed to this module by name
    pub fn run(&self) -> Result<ModuleReport, DemodError> {
        let span = info_span!("module", module = %self.module.name);
        let _guard = span.enter();

        self.enter(SyncStage::Fetching);
        let workspace = Workspace::acquire().map_err(|e| e.in_module(&self.module.name))?;
        let result = self.sync_in(&workspace.repo_dir());
        workspace.release();

        result.map_err(|e| e.in_module(&self.module.name))
    }

    fn sync_in(&self, workdir: &Path) -> Result<ModuleReport, DemodError> {
        self.fetcher
            .fetch(&FetchRequest::for_module(self.module), workdir)?;

        self.enter(SyncStage::Mapping);
        let mappings = plan_module(self.module)?;
        let planned_copies: Vec<PlannedCopy> = mappings
            .iter()
            .map(|mapping| mapping.planned_copy(&self.module.dest))
            .collect();

        if self.dry_run {
            self.enter(SyncStage::DryRunReport);
            info!(dest = %self.module.dest.display(), revision = %self.module.revision, "would sync");
            for copy in &planned_copies {
                info!(
                    src = %copy.src.display(),
                    dest = %copy.dest.display(),
                    exclude = ?copy.exclude,
                    "would copy"
                );
            }
            self.enter(SyncStage::Done);
            return Ok(ModuleReport {
                planned_copies,
                stats: CopyStats::default(),
            });
        }

        self.enter(SyncStage::Replacing);
        remove_tree(&self.module.dest)?;

        self.enter(SyncStage::Copying);
        let mut stats = CopyStats::default();
        for (mapping, copy) in mappings.iter().zip(&planned_copies) {
            info!(src = %copy.src.display(), dest = %copy.dest.display(), "copying");
            let copied = copy_tree(
                &mapping.source_root(workdir),
                &mapping.dest_base,
                &self.module.dest,
                &mapping.exclude,
            )?;
            debug!(files = copied.files, symlinks = copied.symlinks, "path copied");
            stats.merge(copied);
        }

        info!(
            files = stats.files,
            size = %HumanBytes(stats.bytes),
            dest = %self.module.dest.display(),
            "synced"
        );
        self.enter(SyncStage::Done);

        Ok(ModuleReport {
            planned_copies,
            stats,
        })
    }

    fn enter(&self, stage: SyncStage) {
        debug!(stage = %stage, "stage");
        emit_event(
            self.on_event,
            SyncEvent::Stage {
                module: self.module.name.clone(),
                stage,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathSpec;
    use crate::mapper::ExcludeMatcher;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Fills the workdir from a local fixture tree and remembers where
    struct FixtureFetcher {
        fixture: PathBuf,
        workdirs: Mutex<Vec<PathBuf>>,
    }

    impl FixtureFetcher {
        fn new(fixture: &Path) -> Self {
            Self {
                fixture: fixture.to_path_buf(),
                workdirs: Mutex::new(Vec::new()),
            }
        }
    }

    impl Fetcher for FixtureFetcher {
        fn fetch(&self, _request: &FetchRequest<'_>, workdir: &Path) -> Result<(), DemodError> {
            self.workdirs
                .lock()
                .expect("workdirs lock")
                .push(workdir.to_path_buf());
            copy_tree(&self.fixture, Path::new("."), workdir, &ExcludeMatcher::empty())?;
            Ok(())
        }
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().expect("create fixture");
        fs::create_dir_all(dir.path().join("lib/sub")).expect("create lib");
        fs::write(dir.path().join("lib/a.go"), "package a").expect("write a.go");
        fs::write(dir.path().join("lib/sub/b.go"), "package sub").expect("write b.go");
        fs::write(dir.path().join("LICENSE"), "MIT").expect("write license");
        dir
    }

    fn stages_of(events: &Mutex<Vec<SyncEvent>>) -> Vec<SyncStage> {
        events
            .lock()
            .expect("events lock")
            .iter()
            .filter_map(|event| match event {
                SyncEvent::Stage { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_live_run_walks_every_stage() {
        let upstream = fixture();
        let out = TempDir::new().expect("create out");
        let module = Module::new("foo", "fixture", "main", out.path().join("foo"))
            .with_path(PathSpec::new("lib").with_rename("vendor/lib"))
            .with_path(PathSpec::new("LICENSE"));

        let events = Arc::new(Mutex::new(Vec::new()));
        let callback = {
            let events = Arc::clone(&events);
            move |event: &SyncEvent| {
                if let Ok(mut events) = events.lock() {
                    events.push(event.clone());
                }
            }
        };

        let fetcher = FixtureFetcher::new(upstream.path());
        let report = ModuleSyncer::new(&fetcher, &module, false)
            .with_callback(&callback)
            .run()
            .expect("sync module");

        assert_eq!(
            stages_of(&events),
            vec![
                SyncStage::Fetching,
                SyncStage::Mapping,
                SyncStage::Replacing,
                SyncStage::Copying,
                SyncStage::Done,
            ]
        );
        assert_eq!(report.stats.files, 3);
        assert_eq!(report.planned_copies.len(), 2);
        assert!(out.path().join("foo/vendor/lib/sub/b.go").exists());
        assert_eq!(
            fs::read_to_string(out.path().join("foo/LICENSE")).expect("read license"),
            "MIT"
        );
    }

    #[test]
    fn test_dry_run_reports_plan_only() {
        let upstream = fixture();
        let out = TempDir::new().expect("create out");
        let dest = out.path().join("foo");
        fs::create_dir_all(&dest).expect("create dest");
        fs::write(dest.join("keep.txt"), "local").expect("write existing");

        let module = Module::new("foo", "fixture", "main", &dest)
            .with_path(PathSpec::new("lib").with_exclude(["**/sub/**"]));

        let events = Arc::new(Mutex::new(Vec::new()));
        let callback = {
            let events = Arc::clone(&events);
            move |event: &SyncEvent| {
                if let Ok(mut events) = events.lock() {
                    events.push(event.clone());
                }
            }
        };

        let fetcher = FixtureFetcher::new(upstream.path());
        let report = ModuleSyncer::new(&fetcher, &module, true)
            .with_callback(&callback)
            .run()
            .expect("dry run");

        assert_eq!(
            stages_of(&events),
            vec![
                SyncStage::Fetching,
                SyncStage::Mapping,
                SyncStage::DryRunReport,
                SyncStage::Done,
            ]
        );
        assert_eq!(
            report.planned_copies,
            vec![PlannedCopy {
                src: PathBuf::from("lib"),
                dest: dest.join("lib"),
                exclude: vec!["**/sub/**".to_string()],
            }]
        );
        assert_eq!(report.stats, CopyStats::default());
        assert!(dest.join("keep.txt").exists());
        assert!(!dest.join("lib").exists());
    }

    #[test]
    fn test_workspace_is_released_after_failure() {
        let upstream = fixture();
        let out = TempDir::new().expect("create out");
        let module = Module::new("foo", "fixture", "main", out.path().join("foo"))
            .with_path(PathSpec::new("missing"));

        let fetcher = FixtureFetcher::new(upstream.path());
        let err = ModuleSyncer::new(&fetcher, &module, false)
            .run()
            .expect_err("missing source path");

        assert_eq!(err.module_name(), Some("foo"));
        assert!(err.is_copy_error());

        let workdirs = fetcher.workdirs.lock().expect("workdirs lock");
        assert_eq!(workdirs.len(), 1);
        let workspace_root = workdirs[0].parent().expect("workdir has a parent");
        assert!(!workspace_root.exists());
    }
}
