#![cfg(unix)]

use std::{os::unix::fs::PermissionsExt, path::Path};

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

const COMPILER: &str = r#"
outdir=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    -output-directory) shift; outdir="$1" ;;
  esac
  shift
done
printf '%%PDF-1.5\n' > "$outdir/input.pdf"
"#;

const CONVERTER: &str = r#"
for arg in "$@"; do last="$arg"; done
case "$1" in
  -svg) printf '<svg xmlns="http://www.w3.org/2000/svg"></svg>' > "$last" ;;
  *) printf '\211PNG\r\n\032\n' > "$last.png" ;;
esac
"#;

struct Toolchain {
    dir: TempDir,
}

impl Toolchain {
    fn new(compiler: &str) -> Self {
        let dir = TempDir::new().expect("tools dir");
        write_script(dir.path(), "lualatex", compiler);
        write_script(dir.path(), "pdftocairo", CONVERTER);
        Self { dir }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("texrender"));
        cmd.current_dir(self.dir.path())
            .env_remove("PORT")
            .env_remove("RENDER_EXTERNAL_URL")
            .env_remove("TEXRENDER_CONFIG_FILE")
            .arg("--compiler-path")
            .arg(self.dir.path().join("lualatex"))
            .arg("--converter-path")
            .arg(self.dir.path().join("pdftocairo"))
            .arg("--log-level")
            .arg("error");
        cmd
    }

    fn fragment(&self, markup: &str) -> std::path::PathBuf {
        let path = self.dir.path().join("fragment.tex");
        std::fs::write(&path, markup).expect("write fragment");
        path
    }
}

fn write_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
    let mut permissions = std::fs::metadata(&path).expect("metadata").permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).expect("chmod");
}

#[test]
fn renders_svg_to_stdout() {
    let tools = Toolchain::new(COMPILER);
    let fragment = tools.fragment("$x^2$");

    tools
        .command()
        .arg("render")
        .arg(&fragment)
        .assert()
        .success()
        .stdout(contains("<svg"));
}

#[test]
fn renders_png_from_stdin_to_file() {
    let tools = Toolchain::new(COMPILER);
    let output = tools.dir.path().join("out.png");

    tools
        .command()
        .args(["render", "-", "--format", "png", "--output"])
        .arg(&output)
        .write_stdin(r"\frac{1}{2}")
        .assert()
        .success();

    let bytes = std::fs::read(&output).expect("png written");
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
}

#[test]
fn unknown_format_fails_with_message() {
    let tools = Toolchain::new(COMPILER);
    let fragment = tools.fragment("$x$");

    tools
        .command()
        .arg("render")
        .arg(&fragment)
        .args(["--format", "gif"])
        .assert()
        .failure()
        .stderr(contains("Invalid format. Must be 'svg' or 'png'."));
}

#[test]
fn compilation_failure_prints_diagnostics() {
    let tools = Toolchain::new("echo '! Missing $ inserted.'\nexit 1\n");
    let fragment = tools.fragment("x^2");

    tools
        .command()
        .arg("render")
        .arg(&fragment)
        .assert()
        .failure()
        .stderr(contains("LaTeX compilation failed. Check your LaTeX syntax."))
        .stderr(contains("Missing $ inserted."));
}
