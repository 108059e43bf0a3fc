//! Sparse fetch protocol

use super::Vcs;
use crate::config::Module;
use crate::types::{DemodError, FetchStage};
use std::path::Path;
use tracing::{debug, info};

/// Everything a fetcher needs to know about one module
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub module: &'a str,
    pub repo: &'a str,
    pub revision: &'a str,
    /// Repository-relative paths the sparse checkout is restricted to
    pub src_paths: Vec<&'a str>,
}

impl<'a> FetchRequest<'a> {
    pub fn for_module(module: &'a Module) -> Self {
        Self {
            module: &module.name,
            repo: &module.repo,
            revision: &module.revision,
            src_paths: module.src_paths(),
        }
    }
}

/// Materializes a module's sources into a local working directory
pub trait Fetcher: Send + Sync {
    /// Populate `workdir` with the requested paths at the requested revision.
    ///
    /// `workdir` does not exist yet; its parent does.
    fn fetch(&self, request: &FetchRequest<'_>, workdir: &Path) -> Result<(), DemodError>;
}

/// Fetcher running clone, sparse init, sparse set, and checkout in order
#[derive(Debug, Clone, Default)]
pub struct RepoFetcher<V> {
    vcs: V,
}

impl<V: Vcs> RepoFetcher<V> {
    pub fn new(vcs: V) -> Self {
        Self { vcs }
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }
}

impl<V: Vcs> Fetcher for RepoFetcher<V> {
    fn fetch(&self, request: &FetchRequest<'_>, workdir: &Path) -> Result<(), DemodError> {
        info!(repo = request.repo, "cloning");
        self.vcs
            .clone_repo(request.repo, workdir)
            .map_err(|e| e.at_stage(FetchStage::Clone))?;

        self.vcs
            .sparse_checkout_init(workdir)
            .map_err(|e| e.at_stage(FetchStage::SparseInit))?;

        debug!(paths = ?request.src_paths, "sparse checkout");
        self.vcs
            .sparse_checkout_set(workdir, &request.src_paths)
            .map_err(|e| e.at_stage(FetchStage::SparseSet))?;

        info!(revision = request.revision, "checking out");
        self.vcs
            .checkout(workdir, request.revision)
            .map_err(|e| e.at_stage(FetchStage::Checkout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathSpec;
    use std::sync::Mutex;

    /// Records every call and fails at a chosen step
    #[derive(Default)]
    struct RecordingVcs {
        calls: Mutex<Vec<String>>,
        fail_at: Option<&'static str>,
    }

    impl RecordingVcs {
        fn failing_at(step: &'static str) -> Self {
            Self {
                fail_at: Some(step),
                ..Self::default()
            }
        }

        fn record(&self, step: &'static str, detail: String) -> Result<(), DemodError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(format!("{step} {detail}").trim_end().to_string());
            if self.fail_at == Some(step) {
                return Err(DemodError::Git {
                    command: step.to_string(),
                    status: "exit status: 128".to_string(),
                    output: "fatal: nope".to_string(),
                });
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    impl Vcs for RecordingVcs {
        fn clone_repo(&self, repo: &str, _workdir: &Path) -> Result<(), DemodError> {
            self.record("clone", repo.to_string())
        }

        fn sparse_checkout_init(&self, _workdir: &Path) -> Result<(), DemodError> {
            self.record("init", String::new())
        }

        fn sparse_checkout_set(&self, _workdir: &Path, paths: &[&str]) -> Result<(), DemodError> {
            self.record("set", paths.join(" "))
        }

        fn checkout(&self, _workdir: &Path, revision: &str) -> Result<(), DemodError> {
            self.record("checkout", revision.to_string())
        }
    }

    fn module() -> Module {
        Module::new("foo", "https://example.com/foo.git", "v1.2.0", "third_party/foo")
            .with_path(PathSpec::new("lib"))
            .with_path(PathSpec::new("LICENSE"))
    }

    #[test]
    fn test_request_from_module() {
        let module = module();
        let request = FetchRequest::for_module(&module);
        assert_eq!(request.module, "foo");
        assert_eq!(request.revision, "v1.2.0");
        assert_eq!(request.src_paths, vec!["lib", "LICENSE"]);
    }

    #[test]
    fn test_fetch_runs_protocol_in_order() {
        let module = module();
        let fetcher = RepoFetcher::new(RecordingVcs::default());

        fetcher
            .fetch(&FetchRequest::for_module(&module), Path::new("/ws/repo"))
            .expect("fetch");

        assert_eq!(
            fetcher.vcs().calls(),
            vec![
                "clone https://example.com/foo.git",
                "init",
                "set lib LICENSE",
                "checkout v1.2.0",
            ]
        );
    }

    #[test]
    fn test_fetch_stops_at_failing_stage() {
        let module = module();
        let fetcher = RepoFetcher::new(RecordingVcs::failing_at("set"));

        let err = fetcher
            .fetch(&FetchRequest::for_module(&module), Path::new("/ws/repo"))
            .expect_err("sparse set fails");

        assert!(err.is_fetch_error());
        assert!(err.to_string().starts_with("sparse-checkout set: "));
        assert_eq!(fetcher.vcs().calls().len(), 3);
    }
}
