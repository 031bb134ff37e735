//! Shader Sources
//!
//! A [`ShaderSource`] is an immutable descriptor of where shader text comes
//! from and which pipeline stage it targets. It is identified by a
//! [`SourceKey`]: the canonical absolute path for files, or a content hash for
//! inline code. Two sources with equal keys are interchangeable for caching.
//!
//! [`ShaderSource::load`] runs the preprocessor over the source, hands the
//! assembled segments to the backend and wraps the result in a
//! [`ShaderObject`].

use std::borrow::Borrow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use xxhash_rust::xxh3::xxh3_128;

use crate::compile_state::CompileState;
use crate::errors::{Result, ShaderError};
use crate::object::ShaderObject;
use crate::preprocessor::Preprocessor;
use crate::preprocessor::include::IncludeResolver;

/// Modification time of `path`.
pub(crate) fn modified_time(path: &Path) -> std::io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

/// Unique identity of a shader source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey(Rc<str>);

impl SourceKey {
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into())
    }

    /// Key of inline code: `inline:` followed by the xxh3-128 of the text.
    #[must_use]
    pub fn for_code(code: &str) -> Self {
        Self(format!("inline:{:032x}", xxh3_128(code.as_bytes())).into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SourceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shader pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    TessControl,
    TessEvaluation,
    Compute,
}

impl ShaderStage {
    /// Guesses the stage from a file extension (case-insensitive).
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        let stage = match extension.to_ascii_lowercase().as_str() {
            "vert" | "vs" => Self::Vertex,
            "frag" | "fs" => Self::Fragment,
            "geom" | "gs" => Self::Geometry,
            "tesc" | "tcs" => Self::TessControl,
            "tese" | "tes" => Self::TessEvaluation,
            "comp" | "cs" => Self::Compute,
            _ => return None,
        };
        Some(stage)
    }

    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Geometry => "geometry",
            Self::TessControl => "tess-control",
            Self::TessEvaluation => "tess-evaluation",
            Self::Compute => "compute",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the text of a source lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    File { path: PathBuf },
    Inline { name: String, code: Rc<str> },
}

/// Immutable description of a shader source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    key: SourceKey,
    stage: Option<ShaderStage>,
    kind: SourceKind,
}

impl ShaderSource {
    /// A file source; `stage: None` guesses the stage from the extension at
    /// load time.
    ///
    /// An existing file is keyed by its canonical path, so `/s/./a.vert` and
    /// `/s/a.vert` share one key. A path that cannot be canonicalized is kept
    /// as given and fails when loaded.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>, stage: Option<ShaderStage>) -> Self {
        let path = path.into();
        let path = fs::canonicalize(&path).unwrap_or(path);
        Self {
            key: SourceKey::for_path(&path),
            stage,
            kind: SourceKind::File { path },
        }
    }

    /// An in-memory source keyed by the hash of its code.
    #[must_use]
    pub fn inline(stage: ShaderStage, name: impl Into<String>, code: impl Into<Rc<str>>) -> Self {
        let code = code.into();
        Self {
            key: SourceKey::for_code(&code),
            stage: Some(stage),
            kind: SourceKind::Inline {
                name: name.into(),
                code,
            },
        }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &SourceKey {
        &self.key
    }

    #[inline]
    #[must_use]
    pub fn stage(&self) -> Option<ShaderStage> {
        self.stage
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.kind {
            SourceKind::File { path } => Some(path),
            SourceKind::Inline { .. } => None,
        }
    }

    /// Name used in logs and backend diagnostics.
    #[must_use]
    pub fn name(&self) -> String {
        match &self.kind {
            SourceKind::File { path } => path.display().to_string(),
            SourceKind::Inline { name, .. } => name.clone(),
        }
    }

    /// The explicit stage, or the one guessed from the file extension.
    pub fn resolve_stage(&self) -> Result<ShaderStage> {
        self.stage
            .or_else(|| self.path().and_then(ShaderStage::from_path))
            .ok_or_else(|| ShaderError::InvalidShaderType(self.name()))
    }

    /// Preprocesses and compiles this source into a new object.
    pub fn load(&self, state: &mut CompileState<'_>) -> Result<Rc<ShaderObject>> {
        let stage = self.resolve_stage()?;
        let name = self.name();

        let mut pp = Preprocessor::new();
        state.inject_prelude(&mut pp);

        let mut resolver = IncludeResolver::new(state.include_paths().to_vec());
        let (root, mtime) = match &self.kind {
            SourceKind::File { path } => {
                let mtime = modified_time(path).map_err(|err| ShaderError::file(path, err))?;
                let text = fs::read_to_string(path).map_err(|err| ShaderError::file(path, err))?;
                let root = pp.add_buffer(name.as_str(), text);
                resolver.track(root, path.clone());
                (root, Some(mtime))
            }
            SourceKind::Inline { code, .. } => (pp.add_buffer(name.as_str(), &**code), None),
        };

        pp.process(root, &IncludeResolver::directives(), &mut resolver);
        if let Some(err) = pp.take_error() {
            return Err(err);
        }

        let handle = state.compile_stage(stage, &name, &pp.segment_strs())?;
        let (includes, dependencies) = resolver.into_parts();

        log::debug!(
            "Compiled {name} as {stage} ({handle}, {} segments, {} includes, {} dependencies)",
            pp.segments().len(),
            includes.len(),
            dependencies.len()
        );

        Ok(ShaderObject::new(
            handle,
            stage,
            self.clone(),
            mtime,
            includes,
            dependencies,
            state.release_queue(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_from_extension() {
        assert_eq!(ShaderStage::from_path(Path::new("/s/a.vert")), Some(ShaderStage::Vertex));
        assert_eq!(ShaderStage::from_path(Path::new("b.FS")), Some(ShaderStage::Fragment));
        assert_eq!(ShaderStage::from_path(Path::new("c.geom")), Some(ShaderStage::Geometry));
        assert_eq!(ShaderStage::from_path(Path::new("d.tesc")), Some(ShaderStage::TessControl));
        assert_eq!(ShaderStage::from_path(Path::new("e.tes")), Some(ShaderStage::TessEvaluation));
        assert_eq!(ShaderStage::from_path(Path::new("f.comp")), Some(ShaderStage::Compute));
        assert_eq!(ShaderStage::from_path(Path::new("common.glsl")), None);
        assert_eq!(ShaderStage::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_resolve_stage() {
        let guessed = ShaderSource::file("/shaders/a.frag", None);
        assert_eq!(guessed.resolve_stage().unwrap(), ShaderStage::Fragment);

        let explicit = ShaderSource::file("/shaders/a.glsl", Some(ShaderStage::Vertex));
        assert_eq!(explicit.resolve_stage().unwrap(), ShaderStage::Vertex);

        let unknown = ShaderSource::file("/shaders/a.glsl", None);
        assert!(matches!(unknown.resolve_stage(), Err(ShaderError::InvalidShaderType(_))));
    }

    #[test]
    fn test_keys() {
        let a = ShaderSource::file("/shaders/a.vert", None);
        let b = ShaderSource::file("/shaders/a.vert", Some(ShaderStage::Vertex));
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().as_str(), "/shaders/a.vert");

        let x = ShaderSource::inline(ShaderStage::Fragment, "x", "void main(){}");
        let y = ShaderSource::inline(ShaderStage::Fragment, "y", "void main(){}");
        let z = ShaderSource::inline(ShaderStage::Fragment, "z", "void main(){ }");
        assert_eq!(x.key(), y.key());
        assert_ne!(x.key(), z.key());
        assert!(x.key().as_str().starts_with("inline:"));
        assert_eq!(x.path(), None);
    }
}
