//! Turn generated assembly into an ELF executable.
//!
//! The classic two-step: assemble with `nasm -f elf64` into an object
//! file, then link with `ld`. Both tools are looked up on `PATH` and run
//! in a scratch directory that is removed when the build finishes.

use std::fs;
use std::path::Path;
use std::process::Command;

use log::info;
use snafu::ResultExt;

use crate::error::{BuildIoSnafu, BuildResult, ToolFailedSnafu, ToolNotFoundSnafu};

/// Assemble and link `assembly`, writing the executable to `output`.
pub fn mkexe(assembly: &str, output: &Path) -> BuildResult<()> {
  let dir = tempfile::tempdir().context(BuildIoSnafu {
    action: "create a scratch directory",
  })?;
  let asm_path = dir.path().join("out.s");
  let obj_path = dir.path().join("out.o");
  fs::write(&asm_path, assembly).context(BuildIoSnafu {
    action: "write the assembly file",
  })?;

  let nasm = which::which("nasm").context(ToolNotFoundSnafu { tool: "nasm" })?;
  info!("assembling with {}", nasm.display());
  let status = Command::new(&nasm)
    .args(["-f", "elf64", "-o"])
    .arg(&obj_path)
    .arg(&asm_path)
    .status()
    .context(BuildIoSnafu {
      action: "run the assembler",
    })?;
  if !status.success() {
    return ToolFailedSnafu {
      tool: "nasm",
      status,
    }
    .fail();
  }

  let ld = which::which("ld").context(ToolNotFoundSnafu { tool: "ld" })?;
  info!("linking with {}", ld.display());
  let status = Command::new(&ld)
    .arg("-o")
    .arg(output)
    .arg(&obj_path)
    .status()
    .context(BuildIoSnafu {
      action: "run the linker",
    })?;
  if !status.success() {
    return ToolFailedSnafu { tool: "ld", status }.fail();
  }

  Ok(())
}
