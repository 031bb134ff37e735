//! Settings Tests
//!
//! Tests for:
//! - Loading ShaderSettings from a JSON file
//! - Cache policy flags driving program compilation

mod common;

use common::{MockBackend, ShaderDir};
use myth_glsl::{CompileFlags, ShaderError, ShaderManager, ShaderSettings};

#[test]
fn settings_file_configures_manager() -> anyhow::Result<()> {
    common::init_logging();
    let dir = ShaderDir::new();
    dir.write("a.vert", "void main(){}\n");
    let settings_path = dir.write(
        "shaders.json",
        &format!(
            r#"{{
                "include_paths": [{:?}],
                "defines": {{ "QUALITY": "2" }},
                "version": "330 core"
            }}"#,
            dir.path().display().to_string()
        ),
    );

    let settings = ShaderSettings::load(&settings_path)?;
    assert_eq!(settings.flags(), CompileFlags::CACHED);

    let backend = MockBackend::new();
    let state = backend.state.clone();
    let mut manager = ShaderManager::new(backend, settings);

    let id = manager.create_program();
    manager.add_shader_file(id, "a.vert", None)?;
    let shader = manager.program(id).unwrap().shaders()[0].handle();

    assert_eq!(
        state.borrow().text(shader),
        Some("#version 330 core\n#define QUALITY 2\nvoid main(){}\n")
    );
    Ok(())
}

#[test]
fn disabled_cache_compiles_every_time() -> anyhow::Result<()> {
    let dir = ShaderDir::new();
    dir.write("a.vert", "void main(){}\n");
    let mut settings = ShaderSettings::from_json_str(r#"{ "use_cache": false }"#)?;
    settings.include_paths.push(dir.path());
    assert!(!settings.flags().contains(CompileFlags::LOOKUP_CACHE));

    let backend = MockBackend::new();
    let state = backend.state.clone();
    let mut manager = ShaderManager::new(backend, settings);

    let a = manager.create_program();
    let b = manager.create_program();
    manager.add_shader_file(a, "a.vert", None)?;
    manager.add_shader_file(b, "a.vert", None)?;

    assert_eq!(state.borrow().compile_count(), 2);
    assert!(manager.compiler().cache().is_empty());
    Ok(())
}

#[test]
fn malformed_settings_are_reported() {
    let err = ShaderSettings::from_json_str("{ \"include_paths\": 3 }").unwrap_err();
    assert!(matches!(err, ShaderError::Settings(_)));
}
