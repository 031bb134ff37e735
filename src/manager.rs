//! Shader Manager
//!
//! [`ShaderManager`] pairs a [`ShaderCompiler`] with a registry of
//! [`ShaderProgram`]s addressed by generation-checked [`ProgramId`]s, so that
//! stale ids held by game code can never reach a recycled slot.
//!
//! The registry is what a console command such as `shader reload` drives:
//! [`ShaderManager::reload_all`] hot-reloads every registered program and
//! reports how many were replaced, unchanged or kept after a failure.

use slotmap::{SlotMap, new_key_type};

use crate::backend::{ProgramHandle, ShaderBackend};
use crate::compiler::ShaderCompiler;
use crate::errors::{Result, ShaderError};
use crate::program::ShaderProgram;
use crate::settings::ShaderSettings;
use crate::source::{ShaderSource, ShaderStage};

new_key_type! {
    /// Handle of a program registered in a [`ShaderManager`].
    pub struct ProgramId;
}

/// Outcome counts of [`ShaderManager::reload_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub reloaded: usize,
    pub unchanged: usize,
    pub failed: usize,
}

pub struct ShaderManager {
    compiler: ShaderCompiler,
    programs: SlotMap<ProgramId, ShaderProgram>,
}

impl ShaderManager {
    pub fn new(backend: impl ShaderBackend + 'static, settings: ShaderSettings) -> Self {
        Self::from_compiler(ShaderCompiler::new(backend, settings))
    }

    #[must_use]
    pub fn from_compiler(compiler: ShaderCompiler) -> Self {
        Self {
            compiler,
            programs: SlotMap::with_key(),
        }
    }

    #[must_use]
    pub fn compiler(&self) -> &ShaderCompiler {
        &self.compiler
    }

    pub fn compiler_mut(&mut self) -> &mut ShaderCompiler {
        &mut self.compiler
    }

    // ─── Registry ────────────────────────────────────────────────────────────

    pub fn create_program(&mut self) -> ProgramId {
        self.programs.insert(ShaderProgram::new())
    }

    #[must_use]
    pub fn program(&self, id: ProgramId) -> Option<&ShaderProgram> {
        self.programs.get(id)
    }

    #[must_use]
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn program_ids(&self) -> impl Iterator<Item = ProgramId> + '_ {
        self.programs.keys()
    }

    /// Unregisters a program and releases its handle and shaders.
    pub fn remove_program(&mut self, id: ProgramId) -> bool {
        match self.programs.remove(id) {
            Some(mut program) => {
                program.release(&mut self.compiler);
                true
            }
            None => false,
        }
    }

    fn split(&mut self, id: ProgramId) -> Result<(&mut ShaderProgram, &mut ShaderCompiler)> {
        let program = self.programs.get_mut(id).ok_or(ShaderError::UnknownProgram)?;
        Ok((program, &mut self.compiler))
    }

    // ─── Program operations ──────────────────────────────────────────────────

    pub fn add_shader_file(
        &mut self,
        id: ProgramId,
        name: &str,
        stage: Option<ShaderStage>,
    ) -> Result<()> {
        let (program, compiler) = self.split(id)?;
        program.add_shader_file(compiler, name, stage)
    }

    pub fn add_shader_source(&mut self, id: ProgramId, source: ShaderSource) -> Result<()> {
        let (program, compiler) = self.split(id)?;
        program.add_source(compiler, source)
    }

    pub fn add_shader_string(
        &mut self,
        id: ProgramId,
        stage: ShaderStage,
        name: &str,
        code: &str,
    ) -> Result<()> {
        let (program, compiler) = self.split(id)?;
        program.add_shader_string(compiler, stage, name, code)
    }

    pub fn bind_attribute(&mut self, id: ProgramId, location: u32, name: &str) -> Result<()> {
        let (program, _) = self.split(id)?;
        program.bind_attribute(location, name);
        Ok(())
    }

    pub fn link(&mut self, id: ProgramId) -> Result<ProgramHandle> {
        let (program, compiler) = self.split(id)?;
        program.link(compiler)
    }

    pub fn reload(&mut self, id: ProgramId) -> Result<bool> {
        let (program, compiler) = self.split(id)?;
        program.reload(compiler)
    }

    /// Hot-reloads every registered program. Failures are logged and leave
    /// the affected program running.
    pub fn reload_all(&mut self) -> ReloadSummary {
        let mut summary = ReloadSummary::default();
        for (id, program) in &mut self.programs {
            match program.reload(&mut self.compiler) {
                Ok(true) => summary.reloaded += 1,
                Ok(false) => summary.unchanged += 1,
                Err(err) => {
                    log::error!("Shader program {id:?} kept after failed reload: {err}");
                    summary.failed += 1;
                }
            }
        }
        log::info!(
            "Shader reload: {} reloaded, {} unchanged, {} failed",
            summary.reloaded,
            summary.unchanged,
            summary.failed
        );
        summary
    }
}

impl Drop for ShaderManager {
    fn drop(&mut self) {
        for (_, mut program) in self.programs.drain() {
            program.release(&mut self.compiler);
        }
    }
}
