//! `glslpp`: run the shader preprocessor from the command line.
//!
//! ```text
//! glslpp [--settings FILE] [-I DIR]... [-D NAME[=VALUE]]... [--glsl-version V] FILE
//! ```
//!
//! Every stage reached from `FILE` through `#need` is printed in compile
//! order, preceded by a `// ---- <stage> <name>` banner.

use std::path::Path;
use std::process::ExitCode;

use myth_glsl::{
    AttributeBinding, CompileFlags, ProgramHandle, Result, ShaderBackend, ShaderCompiler,
    ShaderError, ShaderHandle, ShaderSettings, ShaderSource, ShaderStage,
};

/// Backend that writes the assembled text of each stage to stdout.
#[derive(Default)]
struct PrintBackend {
    next: u32,
}

impl ShaderBackend for PrintBackend {
    fn compile_stage(
        &mut self,
        stage: ShaderStage,
        name: &str,
        segments: &[&str],
    ) -> Result<ShaderHandle> {
        self.next += 1;
        println!("// ---- {stage} {name}");
        print!("{}", segments.concat());
        println!();
        Ok(ShaderHandle(self.next))
    }

    fn link_program(
        &mut self,
        _: &[ShaderHandle],
        _: &[AttributeBinding],
    ) -> Result<ProgramHandle> {
        Err(ShaderError::Backend("glslpp does not link programs".into()))
    }

    fn delete_shader(&mut self, _: ShaderHandle) {}

    fn delete_program(&mut self, _: ProgramHandle) {}
}

struct Options {
    settings: ShaderSettings,
    file: String,
}

fn usage() -> ExitCode {
    eprintln!("usage: glslpp [--settings FILE] [-I DIR]... [-D NAME[=VALUE]]... [--glsl-version V] FILE");
    ExitCode::from(2)
}

fn parse_args() -> std::result::Result<Options, String> {
    let mut settings = ShaderSettings::default();
    let mut file = None;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => {
                let path = args.next().ok_or("--settings expects a file")?;
                let loaded = ShaderSettings::load(&path).map_err(|e| format!("{path}: {e}"))?;
                settings.include_paths.extend(loaded.include_paths);
                settings.defines.merge(&loaded.defines);
                if loaded.version.is_some() {
                    settings.version = loaded.version;
                }
            }
            "-I" => settings
                .include_paths
                .push(args.next().ok_or("-I expects a directory")?.into()),
            "-D" => {
                let define = args.next().ok_or("-D expects NAME[=VALUE]")?;
                let (name, value) = define.split_once('=').unwrap_or((&define, ""));
                settings.defines.set(name, value);
            }
            "--glsl-version" => {
                settings.version = Some(args.next().ok_or("--glsl-version expects a value")?);
            }
            other if other.starts_with("-I") => settings.include_paths.push(other[2..].into()),
            other if other.starts_with('-') => return Err(format!("unknown option {other}")),
            other => {
                if file.replace(other.to_owned()).is_some() {
                    return Err("only one input file is accepted".into());
                }
            }
        }
    }

    let file = file.ok_or("missing input file")?;
    Ok(Options { settings, file })
}

fn main() -> ExitCode {
    env_logger::init();

    let options = match parse_args() {
        Ok(options) => options,
        Err(message) => {
            eprintln!("glslpp: {message}");
            return usage();
        }
    };

    let mut settings = options.settings;
    let input = Path::new(&options.file);
    // The input's own directory is searched last.
    if let Some(parent) = input.parent() {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        settings.include_paths.push(parent.to_path_buf());
    }

    let mut compiler = ShaderCompiler::new(PrintBackend::default(), settings);
    // A path naming an existing file is taken as is; anything else is looked
    // up in the include paths.
    let source = if input.is_file() {
        Ok(ShaderSource::file(input, None))
    } else {
        compiler.file_source(&options.file, None)
    };
    let result = source.and_then(|source| compiler.compile(source, CompileFlags::empty()));

    match result {
        Ok(compiled) => {
            log::info!(
                "{} stage(s) compiled from {}",
                compiled.objects.len(),
                options.file
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{err}");
            eprintln!("glslpp: {err}");
            ExitCode::FAILURE
        }
    }
}
