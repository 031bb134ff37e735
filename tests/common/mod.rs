//! Common test utilities
//!
//! - `MockBackend`: records compiled text and deletions behind a shared handle
//! - `ShaderDir`: temporary shader directory with write/touch helpers
//! - `init_logging`: env_logger in test mode

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use myth_glsl::{
    AttributeBinding, ProgramHandle, Result, ShaderBackend, ShaderCompiler, ShaderError,
    ShaderHandle, ShaderSettings, ShaderStage,
};
use tempfile::TempDir;

/// Marker that makes the mock reject a stage.
pub const SYNTAX_ERROR: &str = "SYNTAX_ERROR";

#[derive(Debug, Default)]
pub struct MockState {
    next_id: u32,
    /// Assembled text of every compiled stage, by handle.
    pub compiled: Vec<(ShaderHandle, ShaderStage, String)>,
    pub linked: Vec<(ProgramHandle, Vec<ShaderHandle>, Vec<AttributeBinding>)>,
    pub deleted_shaders: Vec<ShaderHandle>,
    pub deleted_programs: Vec<ProgramHandle>,
    pub fail_link: bool,
}

impl MockState {
    pub fn text(&self, handle: ShaderHandle) -> Option<&str> {
        self.compiled
            .iter()
            .find(|(h, _, _)| *h == handle)
            .map(|(_, _, text)| text.as_str())
    }

    pub fn compile_count(&self) -> usize {
        self.compiled.len()
    }
}

/// Backend whose state stays observable after it is boxed into a compiler.
#[derive(Clone, Default)]
pub struct MockBackend {
    pub state: Rc<RefCell<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShaderBackend for MockBackend {
    fn compile_stage(
        &mut self,
        stage: ShaderStage,
        name: &str,
        segments: &[&str],
    ) -> Result<ShaderHandle> {
        let text = segments.concat();
        if text.contains(SYNTAX_ERROR) {
            return Err(ShaderError::CompilationFailed {
                name: name.to_owned(),
                log: "0:1: error: syntax error".to_owned(),
            });
        }

        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let handle = ShaderHandle(state.next_id);
        state.compiled.push((handle, stage, text));
        Ok(handle)
    }

    fn link_program(
        &mut self,
        shaders: &[ShaderHandle],
        attributes: &[AttributeBinding],
    ) -> Result<ProgramHandle> {
        let mut state = self.state.borrow_mut();
        if state.fail_link {
            return Err(ShaderError::LinkageFailed("mock link failure".to_owned()));
        }
        state.next_id += 1;
        let handle = ProgramHandle(state.next_id);
        state
            .linked
            .push((handle, shaders.to_vec(), attributes.to_vec()));
        Ok(handle)
    }

    fn delete_shader(&mut self, handle: ShaderHandle) {
        self.state.borrow_mut().deleted_shaders.push(handle);
    }

    fn delete_program(&mut self, handle: ProgramHandle) {
        self.state.borrow_mut().deleted_programs.push(handle);
    }
}

/// Temporary directory holding shader files.
pub struct ShaderDir {
    pub temp_dir: TempDir,
}

impl ShaderDir {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> PathBuf {
        fs::canonicalize(self.temp_dir.path()).expect("Failed to canonicalize temp dir")
    }

    /// Writes `name` and returns its canonical path.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create shader subdirectory");
        }
        fs::write(&path, content).expect("Failed to write shader file");
        path
    }

    /// Rewrites `name` and moves its mtime `secs` seconds into the future so
    /// the change is visible regardless of filesystem timestamp resolution.
    pub fn rewrite(&self, name: &str, content: &str, secs: u64) -> PathBuf {
        let path = self.write(name, content);
        touch(&path, secs);
        path
    }

    /// Settings with this directory as the only include path.
    pub fn settings(&self) -> ShaderSettings {
        ShaderSettings {
            include_paths: vec![self.path()],
            ..ShaderSettings::default()
        }
    }

    pub fn compiler(&self) -> (ShaderCompiler, Rc<RefCell<MockState>>) {
        let backend = MockBackend::new();
        let state = Rc::clone(&backend.state);
        (ShaderCompiler::new(backend, self.settings()), state)
    }
}

/// Routes `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Sets the mtime of `path` to now + `secs`.
pub fn touch(path: &Path, secs: u64) {
    let file = File::options()
        .write(true)
        .open(path)
        .expect("Failed to open file for touch");
    file.set_modified(SystemTime::now() + Duration::from_secs(secs))
        .expect("Failed to set mtime");
}
