// Test utilities: a throwaway document root plus a pipeline built from rule text

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use http::header::HeaderName;
use http::Method;
use tempfile::TempDir;
use webmerge::cache::{CacheConfig, ResponseCache};
use webmerge::modules::ModuleRegistry;
use webmerge::pipeline::{DirectivePipeline, ModuleRequest, ModuleResponse, Services};
use webmerge::resource::DocumentRoot;
use webmerge::rules::parse_rules;
use webmerge::server::StaticFileHandler;

pub struct Site {
    pub dir: TempDir,
}

impl Site {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file below the root, creating parent directories
    pub fn write(&self, path: &str, content: &str) -> &Self {
        let full = self.dir.path().join(path.trim_start_matches('/'));
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
        self
    }

    /// Set a file's modification time to `secs` seconds plus `millis` after the epoch
    pub fn touch(&self, path: &str, secs: u64, millis: u64) {
        let full = self.dir.path().join(path.trim_start_matches('/'));
        let time = UNIX_EPOCH + Duration::from_secs(secs) + Duration::from_millis(millis);
        File::options()
            .write(true)
            .open(full)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    pub fn pipeline(&self, rules: &str) -> DirectivePipeline {
        self.pipeline_with_cache(rules, Arc::new(ResponseCache::new(&CacheConfig::default())))
    }

    pub fn pipeline_with_cache(&self, rules: &str, cache: Arc<ResponseCache>) -> DirectivePipeline {
        let rules = parse_rules(rules, &ModuleRegistry::builtin()).unwrap();
        let root = DocumentRoot::new(self.root());
        DirectivePipeline::new(
            rules,
            Services::new(root.clone(), cache),
            Arc::new(StaticFileHandler::new(root)),
        )
    }
}

/// A fixed point in time used for modification times, 2023-11-14T22:13:20Z
pub const EPOCH_SECS: u64 = 1_700_000_000;

pub fn get(path: &str) -> ModuleRequest {
    ModuleRequest::new(Method::GET, path)
}

pub fn get_with(path: &str, headers: &[(HeaderName, &str)]) -> ModuleRequest {
    headers
        .iter()
        .fold(get(path), |request, (name, value)| request.with_header(name.clone(), value))
}

pub fn body_text(response: &ModuleResponse) -> String {
    String::from_utf8(response.body().to_vec()).unwrap()
}
