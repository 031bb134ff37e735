//! `#include` / `#need` Resolution
//!
//! [`IncludeResolver`] is the directive state shared by the two handlers the
//! shader pipeline registers on a [`Preprocessor`]:
//!
//! - `#include "file"` / `#include <file>` splices the file's text in place of
//!   the directive and records `(path, mtime)` for staleness checks.
//! - `#need "file"` / `#need <file>` does not read the file; it records a
//!   dependency that the compile state builds alongside the current source.
//!
//! Names are resolved against the ordered include-path list (first match
//! wins); absolute names are used as-is. Each file's text is spliced at most
//! once per compilation: a file already included earlier, or one still being
//! processed higher up the include stack (the root included), is skipped
//! silently. Diamonds and cycles therefore yield every file's text once.

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};

use super::{BufferId, DirectiveContext, Directives, Preprocessor};
use crate::errors::ShaderError;
use crate::object::IncludedFile;
use crate::source::{modified_time, ShaderSource, ShaderStage, SourceKey};

/// Parses `"name"` or `<name>` at the start of a directive argument.
///
/// Leading blanks are skipped and anything after the closing delimiter is
/// ignored.
#[must_use]
pub fn parse_path_argument(argument: &str) -> Option<&str> {
    let rest = argument.trim_start_matches([' ', '\t']);
    let close = match rest.chars().next()? {
        '"' => '"',
        '<' => '>',
        _ => return None,
    };
    let body = &rest[1..];
    let end = body.find(close)?;
    let name = &body[..end];
    (!name.is_empty() && !name.contains('\n')).then_some(name)
}

/// Finds `name` in the include paths and returns its canonical path.
#[must_use]
pub fn resolve_in_paths(name: &str, include_paths: &[PathBuf]) -> Option<PathBuf> {
    let requested = Path::new(name);
    if requested.is_absolute() {
        return requested
            .is_file()
            .then(|| fs::canonicalize(requested).ok())
            .flatten();
    }

    include_paths
        .iter()
        .map(|dir| dir.join(requested))
        .find(|candidate| candidate.is_file())
        .and_then(|candidate| fs::canonicalize(candidate).ok())
}

/// Per-source state of the include and need handlers.
#[derive(Debug, Default)]
pub struct IncludeResolver {
    include_paths: Vec<PathBuf>,
    buffer_paths: FxHashMap<BufferId, PathBuf>,
    visiting: FxHashSet<PathBuf>,
    included: FxHashSet<PathBuf>,
    includes: Vec<IncludedFile>,
    dependencies: Vec<ShaderSource>,
    dependency_keys: FxHashSet<SourceKey>,
}

impl IncludeResolver {
    #[must_use]
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Self {
            include_paths,
            ..Default::default()
        }
    }

    /// The directive table: `include`, `need`, and the frame hooks.
    #[must_use]
    pub fn directives() -> Directives<Self> {
        Directives::new()
            .with("include", handle_include)
            .with("need", handle_need)
            .on_begin(enter_buffer)
            .on_end(leave_buffer)
    }

    /// Associates a buffer with the file it was read from, so that the file
    /// counts as visited while the buffer is processed.
    pub fn track(&mut self, buffer: BufferId, path: PathBuf) {
        self.buffer_paths.insert(buffer, path);
    }

    #[must_use]
    pub fn is_visiting(&self, path: &Path) -> bool {
        self.visiting.contains(path)
    }

    #[must_use]
    pub fn includes(&self) -> &[IncludedFile] {
        &self.includes
    }

    #[must_use]
    pub fn dependencies(&self) -> &[ShaderSource] {
        &self.dependencies
    }

    pub fn into_parts(self) -> (Vec<IncludedFile>, Vec<ShaderSource>) {
        (self.includes, self.dependencies)
    }

    /// Records the first include of `path`. Returns `false` if it was
    /// already included in this compilation.
    fn record_include(&mut self, path: &Path, mtime: std::time::SystemTime) -> bool {
        let first = self.included.insert(path.to_path_buf());
        if first {
            self.includes.push(IncludedFile {
                path: path.to_path_buf(),
                mtime,
            });
        }
        first
    }

    fn add_dependency(&mut self, source: ShaderSource) {
        if self.dependency_keys.insert(source.key().clone()) {
            self.dependencies.push(source);
        }
    }
}

fn enter_buffer(state: &mut IncludeResolver, _: &mut Preprocessor, buffer: BufferId) {
    if let Some(path) = state.buffer_paths.get(&buffer) {
        state.visiting.insert(path.clone());
    }
}

fn leave_buffer(state: &mut IncludeResolver, _: &mut Preprocessor, buffer: BufferId) {
    if let Some(path) = state.buffer_paths.get(&buffer) {
        state.visiting.remove(path);
    }
}

fn malformed(pp: &Preprocessor, ctx: &DirectiveContext) -> ShaderError {
    ShaderError::MalformedDirective {
        file: pp.buffer_name(ctx.buffer).to_owned(),
        line: ctx.line_number,
        directive: pp.directive_name(ctx).to_owned(),
    }
}

fn handle_include(
    state: &mut IncludeResolver,
    pp: &mut Preprocessor,
    directives: &Directives<IncludeResolver>,
    ctx: &DirectiveContext,
) {
    let Some(name) = parse_path_argument(pp.directive_argument(ctx)).map(str::to_owned) else {
        pp.set_error(malformed(pp, ctx));
        return;
    };
    let Some(path) = resolve_in_paths(&name, &state.include_paths) else {
        pp.set_error(ShaderError::IncludeNotFound(name));
        return;
    };
    let mtime = match modified_time(&path) {
        Ok(mtime) => mtime,
        Err(err) => {
            pp.set_error(ShaderError::file(path, err));
            return;
        }
    };

    if !state.record_include(&path, mtime) {
        log::debug!("Skipping repeated include of {}", path.display());
        return;
    }
    if state.is_visiting(&path) {
        log::debug!("Skipping recursive include of {}", path.display());
        return;
    }

    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) => {
            pp.set_error(ShaderError::file(path, err));
            return;
        }
    };

    log::debug!(
        "{}:{} includes {}",
        pp.buffer_name(ctx.buffer),
        ctx.line_number,
        path.display()
    );

    let child = pp.add_buffer(path.display().to_string(), text);
    state.track(child, path);
    pp.process(child, directives, state);
}

fn handle_need(
    state: &mut IncludeResolver,
    pp: &mut Preprocessor,
    _: &Directives<IncludeResolver>,
    ctx: &DirectiveContext,
) {
    let Some(name) = parse_path_argument(pp.directive_argument(ctx)).map(str::to_owned) else {
        pp.set_error(malformed(pp, ctx));
        return;
    };
    let Some(path) = resolve_in_paths(&name, &state.include_paths) else {
        pp.set_error(ShaderError::FileNotInPath(name));
        return;
    };
    let Some(stage) = ShaderStage::from_path(&path) else {
        pp.set_error(ShaderError::InvalidShaderType(name));
        return;
    };

    log::debug!(
        "{}:{} needs {} ({stage})",
        pp.buffer_name(ctx.buffer),
        ctx.line_number,
        path.display()
    );

    state.add_dependency(ShaderSource::file(path, Some(stage)));
}
