use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use rwacc::source::Source;
use rwacc::{codegen, mkexe, parser, tokenizer};

/// What a C compiler – compile a C subset to an x86_64 ELF executable.
#[derive(Parser)]
#[command(name = "rwacc", version, about)]
struct Cli {
  /// The file to compile
  file: PathBuf,

  /// The output executable path
  #[arg(short, long, default_value = "a.out")]
  out: PathBuf,

  /// Print the generated assembly to stdout instead of building an executable
  #[arg(long)]
  emit_asm: bool,

  /// Print the parsed syntax tree to stdout before code generation
  #[arg(long)]
  dump_ast: bool,
}

fn main() -> ExitCode {
  env_logger::init();
  let cli = Cli::parse();

  let source = match Source::from_file(&cli.file) {
    Ok(source) => source,
    Err(err) => {
      eprintln!("error: failed to open '{}': {err}", cli.file.display());
      return ExitCode::FAILURE;
    }
  };

  match run(&cli, &source) {
    Ok(()) => ExitCode::SUCCESS,
    Err(message) => {
      eprintln!("{message}");
      ExitCode::FAILURE
    }
  }
}

fn run(cli: &Cli, source: &Source) -> Result<(), String> {
  let tokens = tokenizer::tokenize(source.text()).map_err(|err| source.render(&err))?;
  let program = parser::parse(tokens, source.text()).map_err(|err| source.render(&err))?;

  if cli.dump_ast {
    print!("{program}");
  }

  let mut asm = String::new();
  codegen::generate(&program, &mut asm).map_err(|err| source.render(&err))?;

  if cli.emit_asm {
    print!("{asm}");
    return Ok(());
  }

  mkexe::mkexe(&asm, &cli.out).map_err(|err| format!("error: {err}"))
}
