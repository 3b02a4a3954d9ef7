// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Asynchronous and parallel engine APIs.
//!
//! Compilation is CPU-bound and runs on the calling task; only file reads
//! and access to the shared VM are awaited.
//!
//! # Example
//!
//! ```ignore
//! use cinder_engine::AsyncEngine;
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = AsyncEngine::new();
//!     let printed = engine.eval_file("prog.cn").await.unwrap();
//!     println!("{:?}", printed);
//! }
//! ```

#[cfg(feature = "async")]
use std::path::Path;
#[cfg(feature = "async")]
use std::sync::Arc;

#[cfg(feature = "async")]
use tokio::fs;
#[cfg(feature = "async")]
use tokio::sync::RwLock;

#[cfg(feature = "parallel")]
use crate::ast::Program;
#[cfg(feature = "parallel")]
use crate::compiler::Bytecode;
#[cfg(feature = "async")]
use crate::compiler::Word;
#[cfg(feature = "async")]
use crate::config::EngineConfig;
use crate::error::{Error, Result};
#[cfg(feature = "async")]
use crate::vm::VM;

/// An engine whose VM can be shared across tasks.
#[cfg(feature = "async")]
pub struct AsyncEngine {
    config: EngineConfig,
    /// The underlying VM (thread-safe wrapper)
    vm: Arc<RwLock<VM>>,
}

#[cfg(feature = "async")]
impl AsyncEngine {
    /// Creates a new async engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an async engine with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        let vm = VM::new(config.vm.clone());
        Self {
            config,
            vm: Arc::new(RwLock::new(vm)),
        }
    }

    /// Compiles and runs source text, returning the printed values.
    pub async fn eval(&self, source: &str) -> Result<Vec<Word>> {
        self.eval_unit(source, &self.config.unit).await
    }

    async fn eval_unit(&self, source: &str, unit: &str) -> Result<Vec<Word>> {
        let bytecode = crate::compile(source, unit)?;
        let mut vm = self.vm.write().await;
        vm.execute(&bytecode)
    }

    /// Reads a file without blocking, then compiles and runs it.
    pub async fn eval_file(&self, path: impl AsRef<Path>) -> Result<Vec<Word>> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .await
            .map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        self.eval_unit(&source, &path.display().to_string()).await
    }

    /// Runs several files concurrently.
    ///
    /// Reads overlap; runs take turns on the shared VM. Results come back in
    /// the order of `paths`.
    pub async fn eval_files(&self, paths: &[impl AsRef<Path>]) -> Vec<Result<Vec<Word>>> {
        let futures: Vec<_> = paths.iter().map(|p| self.eval_file(p)).collect();
        futures::future::join_all(futures).await
    }

    /// Gets a clone of the VM for inspection.
    pub async fn vm(&self) -> VM {
        self.vm.read().await.clone()
    }
}

#[cfg(feature = "async")]
impl Default for AsyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiles independent units on a thread pool.
#[cfg(feature = "parallel")]
pub struct ParallelExecutor {
    /// Thread pool for CPU-bound work
    pool: rayon::ThreadPool,
}

#[cfg(feature = "parallel")]
impl ParallelExecutor {
    /// Creates a parallel executor with the default number of threads.
    pub fn new() -> Result<Self> {
        Self::build(rayon::ThreadPoolBuilder::new())
    }

    /// Creates a parallel executor with a specific number of threads.
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        Self::build(rayon::ThreadPoolBuilder::new().num_threads(num_threads))
    }

    fn build(builder: rayon::ThreadPoolBuilder) -> Result<Self> {
        let pool = builder
            .build()
            .map_err(|e| Error::Internal(format!("failed to create thread pool: {}", e)))?;
        Ok(Self { pool })
    }

    /// Compiles `(unit, source)` pairs in parallel, preserving order.
    pub fn compile_parallel(&self, units: &[(&str, &str)]) -> Vec<Result<Bytecode>> {
        use rayon::prelude::*;

        self.pool.install(|| {
            units
                .par_iter()
                .map(|(unit, source)| crate::compile(source, unit))
                .collect()
        })
    }

    /// Parses `(unit, source)` pairs in parallel, preserving order.
    pub fn parse_parallel(&self, units: &[(&str, &str)]) -> Vec<Result<Program>> {
        use rayon::prelude::*;

        self.pool.install(|| {
            units
                .par_iter()
                .map(|(unit, source)| crate::parse(source, unit))
                .collect()
        })
    }
}

#[cfg(all(test, feature = "async"))]
mod tests {
    use super::*;
    use crate::config::VmConfig;

    fn quiet() -> AsyncEngine {
        AsyncEngine::with_config(EngineConfig {
            vm: VmConfig::quiet(),
            ..EngineConfig::default()
        })
    }

    #[tokio::test]
    async fn test_async_eval() {
        let engine = quiet();
        assert_eq!(engine.eval("print 1 + 2;").await.unwrap(), vec![3]);
        assert_eq!(engine.vm().await.output(), &[3]);
    }

    #[tokio::test]
    async fn test_async_eval_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.cn");
        let second = dir.path().join("second.cn");
        std::fs::write(&first, "print 1;").unwrap();
        std::fs::write(&second, "print 2; print 3;").unwrap();
        let missing = dir.path().join("missing.cn");

        let engine = quiet();
        let results = engine.eval_files(&[&first, &second, &missing]).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &vec![1]);
        assert_eq!(results[1].as_ref().unwrap(), &vec![2, 3]);
        assert!(matches!(results[2], Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_async_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.cn");
        std::fs::write(&path, "print nope;").unwrap();
        let err = quiet().eval_file(&path).await.unwrap_err();
        assert!(err.to_string().contains("bad.cn:1: UndefinedName"));
    }
}

#[cfg(all(test, feature = "parallel"))]
mod parallel_tests {
    use super::*;

    #[test]
    fn test_compile_parallel_preserves_order() {
        let executor = ParallelExecutor::with_threads(2).unwrap();
        let results = executor.compile_parallel(&[
            ("a.cn", "print 1;"),
            ("b.cn", "print x;"),
            ("c.cn", "int x; print x;"),
        ]);
        assert!(results[0].is_ok());
        assert!(results[1].as_ref().unwrap_err().to_string().starts_with("b.cn:1:"));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_parse_parallel() {
        let executor = ParallelExecutor::new().unwrap();
        let results = executor.parse_parallel(&[("a.cn", "int x;"), ("b.cn", "int ;")]);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Syntax { .. })));
    }
}
