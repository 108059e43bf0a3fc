//! Concurrent multi-module orchestration

use super::{emit_event, ModuleSyncer, SyncCallback, SyncEvent, SyncOptions};
use crate::config::{Config, Module};
use crate::git::Fetcher;
use crate::types::{DemodError, ModuleReport, SyncOutcome, SyncReport};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Builder;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Syncs every module of a config concurrently.
///
/// Each module runs on its own blocking thread (bounded by
/// [`SyncOptions::jobs`]). The first failure raises a shared flag; modules
/// that have not started yet see it and fail with
/// [`DemodError::Cancelled`]. Running modules are never interrupted.
pub struct SyncCoordinator<F> {
    fetcher: Arc<F>,
    options: SyncOptions,
    on_event: Option<Arc<SyncCallback>>,
}

impl<F: Fetcher + 'static> SyncCoordinator<F> {
    pub fn new(fetcher: F, options: SyncOptions) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            options,
            on_event: None,
        }
    }

    /// Receive stage, per-module, and completion events
    pub fn with_callback<C>(mut self, callback: C) -> Self
    where
        C: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.on_event = Some(Arc::new(callback));
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Sync all modules and report each outcome, in config order.
    ///
    /// Module failures are recorded in the report, not returned.
    ///
    /// # Errors
    /// * `DemodError::Io` if the worker runtime cannot be created
    pub fn run(&self, config: &Config) -> Result<SyncReport, DemodError> {
        let modules = &config.modules;
        if modules.is_empty() {
            info!("no modules configured");
            emit_event(
                self.on_event.as_deref(),
                SyncEvent::Complete {
                    succeeded: 0,
                    failed: 0,
                },
            );
            return Ok(SyncReport::default());
        }

        let jobs = self.options.jobs.unwrap_or(modules.len()).max(1);
        debug!(modules = modules.len(), jobs, dry_run = self.options.dry_run, "starting sync");

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(jobs)
            .enable_all()
            .build()
            .map_err(DemodError::Io)?;

        let cancelled = Arc::new(AtomicBool::new(false));
        let mut slots: Vec<Option<SyncOutcome>> = modules.iter().map(|_| None).collect();

        runtime.block_on(async {
            let mut tasks = JoinSet::new();
            for (index, module) in modules.iter().enumerate() {
                let task = ModuleTask {
                    index,
                    module: module.clone(),
                    fetcher: Arc::clone(&self.fetcher),
                    dry_run: self.options.dry_run,
                    cancelled: Arc::clone(&cancelled),
                    on_event: self.on_event.clone(),
                };
                tasks.spawn_blocking(move || task.run());
            }

            let mut completion = 0usize;
            while let Some(joined) = tasks.join_next().await {
                // Tasks catch their own panics, so a join error means the runtime
                // dropped the task; its slot is filled in below.
                let Ok((index, result)) = joined else {
                    continue;
                };
                let module = modules[index].name.clone();
                emit_event(
                    self.on_event.as_deref(),
                    SyncEvent::ModuleFinished {
                        module: module.clone(),
                        success: result.is_ok(),
                    },
                );
                slots[index] = Some(SyncOutcome::from_result(module, result, completion));
                completion += 1;
            }
        });

        let mut completion = slots.iter().flatten().count();
        let outcomes: Vec<SyncOutcome> = slots
            .into_iter()
            .zip(modules)
            .map(|(slot, module)| {
                slot.unwrap_or_else(|| {
                    let error = DemodError::Task("sync task did not complete".to_string())
                        .in_module(&module.name);
                    completion += 1;
                    SyncOutcome::from_result(module.name.clone(), Err(error), completion - 1)
                })
            })
            .collect();

        let report = SyncReport { outcomes };
        let failed = report.failed().count();
        if failed == 0 {
            info!("done");
        } else {
            debug!(failed, "sync finished with failures");
        }
        emit_event(
            self.on_event.as_deref(),
            SyncEvent::Complete {
                succeeded: report.succeeded_count(),
                failed,
            },
        );

        Ok(report)
    }
}

/// One module's unit of work, moved onto a blocking thread
struct ModuleTask<F> {
    index: usize,
    module: Module,
    fetcher: Arc<F>,
    dry_run: bool,
    cancelled: Arc<AtomicBool>,
    on_event: Option<Arc<SyncCallback>>,
}

impl<F: Fetcher> ModuleTask<F> {
    fn run(self) -> (usize, Result<ModuleReport, DemodError>) {
        let name = self.module.name.as_str();

        if self.cancelled.load(Ordering::SeqCst) {
            debug!(module = name, "skipped: another module already failed");
            return (self.index, Err(DemodError::Cancelled.in_module(name)));
        }

        let mut syncer = ModuleSyncer::new(self.fetcher.as_ref(), &self.module, self.dry_run);
        if let Some(callback) = self.on_event.as_deref() {
            syncer = syncer.with_callback(callback);
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| syncer.run())).unwrap_or_else(
            |payload| Err(DemodError::Task(panic_message(payload.as_ref())).in_module(name)),
        );

        if result.is_err() {
            self.cancelled.store(true, Ordering::SeqCst);
        }

        (self.index, result)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathSpec;
    use crate::git::FetchRequest;
    use std::path::Path;
    use std::sync::Mutex;

    struct PanickingFetcher;

    impl Fetcher for PanickingFetcher {
        fn fetch(&self, request: &FetchRequest<'_>, _workdir: &Path) -> Result<(), DemodError> {
            panic!("fetcher exploded for {}", request.module);
        }
    }

    #[test]
    fn test_empty_config_completes_immediately() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let coordinator = SyncCoordinator::new(PanickingFetcher, SyncOptions::default())
            .with_callback({
                let events = Arc::clone(&events);
                move |event: &SyncEvent| {
                    if let Ok(mut events) = events.lock() {
                        events.push(event.clone());
                    }
                }
            });

        let report = coordinator.run(&Config::default()).expect("run");

        assert!(report.is_success());
        assert!(report.outcomes.is_empty());
        assert_eq!(
            *events.lock().expect("events lock"),
            vec![SyncEvent::Complete {
                succeeded: 0,
                failed: 0
            }]
        );
    }

    #[test]
    fn test_panicking_module_is_reported_as_failure() {
        let config = Config {
            modules: vec![Module::new("boom", "repo", "main", "out/boom")
                .with_path(PathSpec::new("lib"))],
            ..Config::default()
        };

        let report = SyncCoordinator::new(PanickingFetcher, SyncOptions::default())
            .run(&config)
            .expect("run");

        let error = report.into_result().expect_err("module panicked");
        assert_eq!(error.module_name(), Some("boom"));
        assert!(matches!(error.root(), DemodError::Task(msg) if msg.contains("fetcher exploded")));
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"static"), "panicked: static");
        assert_eq!(panic_message(&"owned".to_string()), "panicked: owned");
        assert_eq!(panic_message(&42u8), "panicked");
    }
}
